//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! shopsync migrate
//! ```
//!
//! # Environment Variables
//!
//! - `SHOPSYNC_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Migrations live in `crates/engine/migrations/` and are embedded at compile
//! time.

use sqlx::PgPool;

use super::CommandError;

/// Resolve the database URL from the environment.
pub(crate) fn database_url() -> Result<String, CommandError> {
    std::env::var("SHOPSYNC_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CommandError::MissingEnvVar("SHOPSYNC_DATABASE_URL"))
}

/// Run all pending engine migrations.
///
/// # Errors
///
/// Returns an error if the URL is missing, the connection fails or a
/// migration fails.
pub async fn run() -> Result<(), CommandError> {
    dotenvy::dotenv().ok();

    let database_url = database_url()?;

    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(&database_url).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../engine/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
