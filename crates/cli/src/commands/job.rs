//! Sync job inspection.

use sqlx::PgPool;

use shopsync_core::SyncJobId;
use shopsync_engine::db::{PgSyncStore, SyncStore};

use super::migrate::database_url;
use super::{CommandError, print_json};

/// Print a sync job record, including its per-entity breakdown.
///
/// # Errors
///
/// Returns an error if the job does not exist or the store is unreachable.
pub async fn show(id: SyncJobId) -> Result<(), CommandError> {
    dotenvy::dotenv().ok();

    let pool = PgPool::connect(&database_url()?).await?;
    let store = PgSyncStore::new(pool);

    let job = store
        .get_sync_job(id)
        .await?
        .ok_or_else(|| CommandError::NotFound(format!("sync job {id}")))?;

    print_json(&serde_json::json!({
        "job": job,
        "breakdown": job.breakdown(),
    }))
}
