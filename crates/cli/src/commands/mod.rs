//! CLI command implementations.

pub mod job;
pub mod migrate;
pub mod sync;

use thiserror::Error;

/// Errors shared by the CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] shopsync_engine::config::ConfigError),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Repository operation failed.
    #[error("Store error: {0}")]
    Repository(#[from] shopsync_engine::db::RepositoryError),

    /// Sync or onboarding failed.
    #[error("Sync error: {0}")]
    Sync(#[from] shopsync_engine::error::SyncError),

    /// Output could not be rendered.
    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),

    /// Requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Print a value as pretty JSON on stdout.
#[allow(clippy::print_stdout)]
fn print_json(value: &impl serde::Serialize) -> Result<(), CommandError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
