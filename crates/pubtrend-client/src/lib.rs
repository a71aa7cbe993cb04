//! pubtrend Client - OAI-PMH transport
//!
//! This crate provides the network side of a harvest:
//!
//! - [`oai`] - HTTP client implementing `pubtrend_core::OaiTransport`
//! - [`xml`] - parsing of OAI-PMH list responses
//!
//! # Overview
//!
//! The client builds request URLs, performs one GET per page and turns the
//! reply into a `PageResult` or a classified `AppError`. Retry decisions are
//! made by the caller.

pub mod oai;
pub mod xml;

// Re-export main client types
pub use oai::OaiPmhClient;
pub use xml::parse_list_response;
