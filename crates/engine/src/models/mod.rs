//! Domain models persisted by the sync engine.
//!
//! Two families of types live here:
//!
//! - `*Record` types are the strongly-typed intermediate form produced by
//!   decoding an upstream payload (see [`crate::shopify::conversions`]). They
//!   carry external ids only and are what the reconciler hands to the store.
//! - Stored types (`Customer`, `Product`, `Order`, ...) are rows as the
//!   store returns them, with local ids and timestamps.

pub mod customer;
pub mod event;
pub mod order;
pub mod product;
pub mod sync_job;
pub mod tenant;

pub use customer::{AddressRecord, Customer, CustomerAddress, CustomerRecord};
pub use event::{CustomEvent, NewCustomEvent};
pub use order::{LineItem, LineItemRecord, NewLineItem, Order, OrderRecord};
pub use product::{Product, ProductRecord, Variant, VariantRecord};
pub use sync_job::{JobCompletion, SyncJob};
pub use tenant::{NewTenant, StoreRecord, Tenant};
