//! pubtrend Server - REST API over the harvested publication counts
//!
//! Endpoints live under `/api/v1`:
//!
//! - **Health**: version and database reachability
//! - **Sync**: start a full or quick run, watch its progress
//! - **Categories**: the tracked taxonomy, monthly counts, per-category stats
//! - **Trends**: categories ranked by growth
//!
//! The binary also runs a daily quick sync (see [`scheduler`]).

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod scheduler;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use router::create_router;
pub use state::AppState;
