//! Sync job audit record.

use chrono::{DateTime, Utc};
use serde::Serialize;

use shopsync_core::{SyncBreakdown, SyncJobId, SyncJobStatus, SyncJobType, TenantId};

/// One tracked full-sync attempt.
#[derive(Debug, Clone, Serialize)]
pub struct SyncJob {
    pub id: SyncJobId,
    pub tenant_id: TenantId,
    pub job_type: SyncJobType,
    pub status: SyncJobStatus,
    /// Records created or updated across all phases.
    pub processed_records: i64,
    /// Per-record failures across all phases.
    pub error_count: i64,
    /// JSON-serialized [`SyncBreakdown`] (set on completion).
    pub metadata: Option<String>,
    /// Failure message (set on failure).
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncJob {
    /// Parse the persisted breakdown, if the job completed.
    #[must_use]
    pub fn breakdown(&self) -> Option<SyncBreakdown> {
        self.metadata
            .as_deref()
            .and_then(|m| serde_json::from_str(m).ok())
    }
}

/// Terminal update applied to a running job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobCompletion {
    Completed {
        processed_records: i64,
        error_count: i64,
        metadata: String,
    },
    Failed {
        error: String,
    },
}

impl JobCompletion {
    /// Build a completion from a finished breakdown.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the breakdown cannot be serialized.
    pub fn completed(breakdown: &SyncBreakdown) -> Result<Self, serde_json::Error> {
        Ok(Self::Completed {
            processed_records: i64::from(breakdown.processed()),
            error_count: i64::from(breakdown.errors()),
            metadata: breakdown.to_metadata()?,
        })
    }

    /// Status the job ends in.
    #[must_use]
    pub const fn status(&self) -> SyncJobStatus {
        match self {
            Self::Completed { .. } => SyncJobStatus::Completed,
            Self::Failed { .. } => SyncJobStatus::Failed,
        }
    }
}
