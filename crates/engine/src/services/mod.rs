//! Business logic services of the sync engine.
//!
//! # Services
//!
//! - [`sync`] - Full-sync orchestration with job tracking, retries and
//!   per-tenant exclusion
//! - [`webhooks`] - Signature verification and single-record dispatch
//! - [`tenants`] - Connecting a store domain and credentials to a tenant

pub mod sync;
pub mod tenants;
pub mod webhooks;

pub use sync::{FullSyncSummary, SyncOrchestrator};
pub use tenants::{ConnectedStore, onboard_tenant, set_webhook_secret};
pub use webhooks::{WebhookOutcome, WebhookProcessor, WebhookTopic, verify};
