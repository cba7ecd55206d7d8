//! `aquabill-auth`: pure capability-based authorization boundary.
//!
//! Callers resolve sessions and roles into an `Actor`; nothing here touches storage.

pub mod authorize;
pub mod capability;

pub use authorize::{authorize, Actor, AuthzError};
pub use capability::{Capability, CapabilitySet};
