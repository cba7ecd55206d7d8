//! Infrastructure layer: persistence boundary, config and the billing
//! application service.

pub mod config;
pub mod error;
pub mod service;
pub mod store;

pub use config::BillingConfig;
pub use error::{BillingError, BillingResult};
pub use service::{
    BillingService, ClosedBill, CycleSummary, ManualBill, MeterCycleResult, MeterSelector,
    TransitionOutcome,
};
pub use store::{BillingStore, InMemoryBillingStore, StoreError};
