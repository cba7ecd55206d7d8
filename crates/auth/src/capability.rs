use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A single workflow capability.
///
/// Capabilities name *actions* rather than roles; mapping a role taxonomy onto
/// capabilities is the caller's policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Submit,
    Approve,
    Reject,
    Post,
    Correct,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::Submit,
        Capability::Approve,
        Capability::Reject,
        Capability::Post,
        Capability::Correct,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Submit => "submit",
            Capability::Approve => "approve",
            Capability::Reject => "reject",
            Capability::Post => "post",
            Capability::Correct => "correct",
        }
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown capability '{s}'"))
    }
}

/// Explicit set of granted capabilities (`{can_submit, can_approve, ...}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self(Capability::ALL.into_iter().collect())
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.0.insert(capability);
        self
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn can_submit(&self) -> bool {
        self.contains(Capability::Submit)
    }

    pub fn can_approve(&self) -> bool {
        self.contains(Capability::Approve)
    }

    pub fn can_reject(&self) -> bool {
        self.contains(Capability::Reject)
    }

    pub fn can_post(&self) -> bool {
        self.contains(Capability::Post)
    }

    pub fn can_correct(&self) -> bool {
        self.contains(Capability::Correct)
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_grants_only_named_capabilities() {
        let set = CapabilitySet::empty()
            .with(Capability::Submit)
            .with(Capability::Post);
        assert!(set.can_submit());
        assert!(set.can_post());
        assert!(!set.can_approve());
        assert!(!set.can_correct());
    }

    #[test]
    fn parses_snake_case_names() {
        assert_eq!("approve".parse::<Capability>().unwrap(), Capability::Approve);
        assert!("admin".parse::<Capability>().is_err());
    }

    #[test]
    fn serializes_as_a_plain_list() {
        let set = CapabilitySet::empty().with(Capability::Reject);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["reject"]"#);
    }
}
