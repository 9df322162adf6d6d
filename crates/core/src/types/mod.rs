//! Core types for shopsync.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod stats;
pub mod status;

pub use id::*;
pub use stats::{ReconcileStats, SyncBreakdown};
pub use status::*;
