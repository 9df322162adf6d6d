//! shopsync core - Shared types library.
//!
//! This crate provides common types used across all shopsync components:
//! - `engine` - Upstream client, reconciler, webhook processor and sync orchestrator
//! - `cli` - Command-line tools for migrations and manual syncs
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, sync statuses and counters

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
