//! Billing persistence boundary.
//!
//! Defines the storage contract the billing core needs without making any
//! storage assumptions, plus an in-memory implementation for tests/dev.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryBillingStore;
pub use r#trait::{check_cycle_base, BillingStore, StoreError};
