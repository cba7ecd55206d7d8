//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// configuration, workflow rules, conflicts). Storage concerns belong in the
/// infrastructure crate and are mapped into these variants at the boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed tariff or bill input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A tariff, bill or meter was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The requested workflow action is not allowed from the bill's current status.
    #[error("invalid state transition: cannot {action} a bill in status {from}")]
    InvalidStateTransition { from: String, action: String },

    /// The acting principal lacks the capability required by the action.
    #[error("permission denied: missing capability '{0}'")]
    PermissionDenied(String),

    /// Charge fields were mutated outside an editable status.
    #[error("bill is locked in status {0}")]
    BillLocked(String),

    /// A stale version lost a race against a concurrent writer.
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    /// The tariff has no rent price for the meter size.
    #[error("missing meter rent price for meter size '{0}'")]
    MissingRentPrice(String),

    /// Tier lists or fee tables violate their invariants.
    #[error("invalid tariff configuration: {0}")]
    InvalidTariffConfiguration(String),

    /// The penalty table cannot produce a rate for the overdue period.
    #[error("invalid penalty configuration: {0}")]
    InvalidPenaltyConfiguration(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_transition(from: impl ToString, action: impl ToString) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            action: action.to_string(),
        }
    }

    pub fn permission_denied(capability: impl ToString) -> Self {
        Self::PermissionDenied(capability.to_string())
    }

    pub fn bill_locked(status: impl ToString) -> Self {
        Self::BillLocked(status.to_string())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::ConcurrentModification(msg.into())
    }

    pub fn missing_rent_price(meter_size: impl ToString) -> Self {
        Self::MissingRentPrice(meter_size.to_string())
    }

    pub fn invalid_tariff(msg: impl Into<String>) -> Self {
        Self::InvalidTariffConfiguration(msg.into())
    }

    pub fn invalid_penalty(msg: impl Into<String>) -> Self {
        Self::InvalidPenaltyConfiguration(msg.into())
    }

    /// Configuration errors originate from tariff data rather than caller input.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingRentPrice(_)
                | Self::InvalidTariffConfiguration(_)
                | Self::InvalidPenaltyConfiguration(_)
        )
    }
}
