//! Billing engine configuration.

use anyhow::Context;

use aquabill_core::DomainError;
use aquabill_tariffs::{FeeOptions, MeterSize};

pub const ENV_LENIENT_METER_RENT: &str = "AQUABILL_LENIENT_METER_RENT";
pub const ENV_DUE_DAYS: &str = "AQUABILL_DUE_DAYS";
pub const ENV_DEFAULT_METER_SIZE: &str = "AQUABILL_DEFAULT_METER_SIZE";
pub const ENV_CYCLE_WORKERS: &str = "AQUABILL_CYCLE_WORKERS";

/// Billing service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingConfig {
    /// Missing rent prices degrade to 0 instead of failing the bill.
    pub lenient_meter_rent: bool,
    /// Days after the end of the billing month a bill falls due.
    pub due_days: u32,
    /// Size used for meters with no recorded size.
    pub default_meter_size: MeterSize,
    /// Threads used to close meters in an "all meters" cycle run.
    pub cycle_workers: usize,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            lenient_meter_rent: false,
            due_days: 30,
            default_meter_size: MeterSize::half_inch(),
            cycle_workers: 1,
        }
    }
}

impl BillingConfig {
    pub fn with_lenient_meter_rent(mut self, lenient: bool) -> Self {
        self.lenient_meter_rent = lenient;
        self
    }

    pub fn with_due_days(mut self, days: u32) -> Self {
        self.due_days = days;
        self
    }

    pub fn with_default_meter_size(mut self, size: MeterSize) -> Self {
        self.default_meter_size = size;
        self
    }

    pub fn with_cycle_workers(mut self, workers: usize) -> Self {
        self.cycle_workers = workers.max(1);
        self
    }

    pub fn fee_options(&self) -> FeeOptions {
        FeeOptions {
            lenient_meter_rent: self.lenient_meter_rent,
        }
    }

    /// Read overrides from the process environment. Unset variables keep
    /// their defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Malformed values fail with a
    /// `DomainError::Validation` wrapped with the variable name.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_LENIENT_METER_RENT) {
            config.lenient_meter_rent = parse_bool(&raw).context(ENV_LENIENT_METER_RENT)?;
        }
        if let Some(raw) = lookup(ENV_DUE_DAYS) {
            config.due_days = raw
                .trim()
                .parse::<u32>()
                .map_err(|e| DomainError::validation(format!("'{raw}' is not a day count: {e}")))
                .context(ENV_DUE_DAYS)?;
        }
        if let Some(raw) = lookup(ENV_DEFAULT_METER_SIZE) {
            config.default_meter_size = MeterSize::parse(&raw).context(ENV_DEFAULT_METER_SIZE)?;
        }
        if let Some(raw) = lookup(ENV_CYCLE_WORKERS) {
            config.cycle_workers = raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| DomainError::validation(format!("'{raw}' is not a positive worker count")))
                .context(ENV_CYCLE_WORKERS)?;
        }

        Ok(config)
    }
}

fn parse_bool(raw: &str) -> Result<bool, DomainError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(DomainError::validation(format!("'{other}' is not a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_are_fail_closed() {
        let config = BillingConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, BillingConfig::default());
        assert!(!config.fee_options().lenient_meter_rent);
        assert_eq!(config.due_days, 30);
        assert_eq!(config.default_meter_size.to_string(), MeterSize::half_inch().to_string());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = BillingConfig::from_lookup(lookup(&[
            (ENV_LENIENT_METER_RENT, "true"),
            (ENV_DUE_DAYS, "14"),
            (ENV_DEFAULT_METER_SIZE, "3/4"),
            (ENV_CYCLE_WORKERS, "4"),
        ]))
        .unwrap();
        assert!(config.lenient_meter_rent);
        assert_eq!(config.due_days, 14);
        assert_eq!(config.default_meter_size, MeterSize::parse("0.75").unwrap());
        assert_eq!(config.cycle_workers, 4);
    }

    #[test]
    fn malformed_values_are_validation_errors() {
        let err = BillingConfig::from_lookup(lookup(&[(ENV_DUE_DAYS, "soon")])).unwrap_err();
        assert!(err.to_string().contains(ENV_DUE_DAYS));
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Validation(_))
        ));

        let err = BillingConfig::from_lookup(lookup(&[(ENV_CYCLE_WORKERS, "0")])).unwrap_err();
        assert!(err.to_string().contains(ENV_CYCLE_WORKERS));

        let err = BillingConfig::from_lookup(lookup(&[(ENV_LENIENT_METER_RENT, "maybe")])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Validation(_))
        ));
    }
}
