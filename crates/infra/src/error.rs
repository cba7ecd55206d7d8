use thiserror::Error;

use aquabill_core::DomainError;

use crate::store::StoreError;

/// Error returned by `BillingService` operations.
///
/// Store concurrency and missing-record failures are mapped onto their
/// domain kinds so callers match a single set of variants; anything else
/// from the store stays a `Store` error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillingError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("store failure: {0}")]
    Store(String),
}

impl BillingError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            BillingError::Domain(e) => Some(e),
            BillingError::Store(_) => None,
        }
    }
}

impl From<StoreError> for BillingError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => BillingError::Domain(DomainError::conflict(msg)),
            StoreError::NotFound(what) => BillingError::Domain(DomainError::not_found(what)),
            StoreError::Rejected(e) => BillingError::Domain(e),
            StoreError::Storage(msg) => BillingError::Store(msg),
        }
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
