//! Status enums for sync bookkeeping.

use serde::{Deserialize, Serialize};

/// Lifecycle of a sync job.
///
/// `Running` is the only non-terminal state. A job moves to exactly one of
/// `Completed` or `Failed` and is never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "sync_job_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobStatus {
    #[default]
    Running,
    Completed,
    Failed,
}

impl SyncJobStatus {
    /// Whether the status is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Running, Self::Completed | Self::Failed)
        )
    }

    /// Database/string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SyncJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncJobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid sync job status: {s}")),
        }
    }
}

/// Kind of work a sync job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobType {
    /// Fetch and reconcile customers, products and orders.
    #[default]
    FullSync,
}

impl SyncJobType {
    /// Tag persisted on the job record.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FullSync => "full_sync",
        }
    }
}

impl std::fmt::Display for SyncJobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncJobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full_sync" => Ok(Self::FullSync),
            _ => Err(format!("invalid sync job type: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_is_only_non_terminal_state() {
        assert!(!SyncJobStatus::Running.is_terminal());
        assert!(SyncJobStatus::Completed.is_terminal());
        assert!(SyncJobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_terminal_states_never_reopen() {
        use SyncJobStatus::{Completed, Failed, Running};

        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Running.can_transition_to(Running));
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            SyncJobStatus::Running,
            SyncJobStatus::Completed,
            SyncJobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<SyncJobStatus>(), Ok(status));
        }
        assert!("paused".parse::<SyncJobStatus>().is_err());
    }

    #[test]
    fn test_job_type_tag() {
        assert_eq!(SyncJobType::FullSync.to_string(), "full_sync");
    }
}
