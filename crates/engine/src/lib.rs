//! shopsync engine library.
//!
//! Pulls customers, products and orders from the Shopify Admin REST API,
//! reconciles them into tenant-scoped local records, applies webhook
//! deliveries and keeps an audit trail of every full sync.
//!
//! # Modules
//!
//! - [`shopify`] - REST client, pagination and payload decoding
//! - [`reconcile`] - Per-entity upsert logic
//! - [`services`] - Sync orchestrator, webhook processor, tenant onboarding
//! - [`db`] - Repository trait with `PostgreSQL` and in-memory implementations
//! - [`routes`] - Webhook and health endpoints

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod routes;
pub mod services;
pub mod shopify;
pub mod state;
