/// Database abstraction layer
///
/// This module provides a unified interface for endpoint, episode, settings
/// and recipient storage on top of a local LibSQL (SQLite) database.
pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::{Database, DatabaseImpl};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
