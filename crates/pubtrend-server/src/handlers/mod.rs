//! HTTP request handlers for API endpoints.

pub mod categories;
pub mod health;
pub mod sync;
pub mod trends;
