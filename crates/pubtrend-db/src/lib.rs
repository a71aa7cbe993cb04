//! pubtrend DB - SQLite persistence for publication counts
//!
//! This crate provides the repository behind `pubtrend_core::CountsStore`.
//!
//! # Overview
//!
//! The main components are:
//! - [`CountsRepository`] - counts, sync metadata and the category table
//! - [`connect`] - opens (and creates) a SQLite database and applies the schema

mod repository;

pub use repository::CountsRepository;

use pubtrend_core::error::AppError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

/// Default database location, relative to the working directory.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://pubtrend.db";

/// Opens a pool for `database_url`, creating the file if needed, and runs
/// the schema migrations.
///
/// # Errors
///
/// `AppError::DatabaseError` if the URL is invalid or the database cannot
/// be opened.
pub async fn connect(
    database_url: &str,
    max_connections: u32,
) -> Result<CountsRepository, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(AppError::DatabaseError)?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(AppError::DatabaseError)?;

    let repo = CountsRepository::new(pool);
    repo.migrate().await?;
    Ok(repo)
}
