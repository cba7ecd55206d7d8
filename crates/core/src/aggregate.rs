//! Versioned aggregates and optimistic concurrency.
//!
//! A bill is loaded with its version, decides on a command without touching
//! state, applies what it decided, and is written back only if the stored
//! version is still the one it was loaded at.

use crate::error::{DomainError, DomainResult};

/// Identity and version of a persisted aggregate.
pub trait AggregateRoot {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// 0 when first created, +1 for every accepted change.
    fn version(&self) -> u64;
}

/// What a writer believes the stored version to be.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Unconditional write.
    Any,
    /// Write only if the stored version equals this one. An absent record
    /// counts as version 0.
    Exact(u64),
}

impl ExpectedVersion {
    /// Expect the version `aggregate` was loaded at.
    pub fn of<A: AggregateRoot>(aggregate: &A) -> Self {
        ExpectedVersion::Exact(aggregate.version())
    }

    pub fn matches(self, stored: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(expected) => expected == stored,
        }
    }

    /// `ConcurrentModification` when a competing writer got there first.
    pub fn check(self, stored: u64) -> DomainResult<()> {
        match self {
            ExpectedVersion::Exact(expected) if expected != stored => {
                Err(DomainError::conflict(format!(
                    "expected version {expected}, found {stored}"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Decide/apply split for aggregates driven by commands.
///
/// `handle` validates a command against current state and returns the events
/// it would produce; it never mutates. `apply` folds one event into state and
/// bumps the version. Neither side does IO.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    fn apply(&mut self, event: &Self::Event);

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u64);

    impl AggregateRoot for Counter {
        type Id = u8;

        fn id(&self) -> &u8 {
            &0
        }

        fn version(&self) -> u64 {
            self.0
        }
    }

    #[test]
    fn stale_exact_version_is_a_conflict() {
        let err = ExpectedVersion::Exact(3).check(4).unwrap_err();
        assert!(matches!(err, DomainError::ConcurrentModification(msg) if msg.contains("found 4")));
        assert!(ExpectedVersion::Any.check(4).is_ok());
        assert!(ExpectedVersion::Exact(4).check(4).is_ok());
    }

    #[test]
    fn of_captures_the_loaded_version() {
        assert_eq!(ExpectedVersion::of(&Counter(7)), ExpectedVersion::Exact(7));
        assert!(!ExpectedVersion::of(&Counter(7)).matches(8));
    }
}
