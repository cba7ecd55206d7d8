use serde::{Deserialize, Serialize};
use thiserror::Error;

use aquabill_core::{DomainError, UserId};

use crate::{Capability, CapabilitySet};

/// A resolved caller for authorization decisions.
///
/// Construction is decoupled from sessions and storage: the UI/job layer
/// derives the capability set from whatever policy source it uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub capabilities: CapabilitySet,
}

impl Actor {
    pub fn new(user_id: UserId, capabilities: CapabilitySet) -> Self {
        Self {
            user_id,
            capabilities,
        }
    }

    /// System actor for scheduled jobs. Holds every capability.
    pub fn system() -> Self {
        Self {
            user_id: UserId::from_uuid(uuid::Uuid::nil()),
            capabilities: CapabilitySet::all(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing capability '{0}'")]
    Forbidden(Capability),
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Forbidden(cap) => DomainError::permission_denied(cap),
        }
    }
}

/// Authorize an actor for a capability.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(actor: &Actor, required: Capability) -> Result<(), AuthzError> {
    if actor.capabilities.contains(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required))
    }
}
