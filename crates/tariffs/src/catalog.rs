//! Versioned tariff catalog.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use aquabill_core::{DomainError, DomainResult};

use crate::model::{CustomerType, TariffVersion};

/// Pick the version in effect on `on_or_before` from an unordered set.
///
/// Used by stores that hand back a plain list of versions.
pub fn resolve_in<'a>(
    versions: &'a [TariffVersion],
    customer_type: CustomerType,
    on_or_before: NaiveDate,
) -> DomainResult<&'a TariffVersion> {
    versions
        .iter()
        .filter(|v| v.customer_type == customer_type && v.effective_date <= on_or_before)
        .max_by_key(|v| v.effective_date)
        .ok_or_else(|| no_tariff(customer_type, on_or_before))
}

fn no_tariff(customer_type: CustomerType, date: NaiveDate) -> DomainError {
    DomainError::not_found(format!("{customer_type} tariff effective on or before {date}"))
}

/// Effective-dated tariff versions per customer type.
///
/// Only the latest version of a customer type may be amended; earlier
/// versions are read-only once superseded.
#[derive(Debug, Clone, Default)]
pub struct TariffCatalog {
    versions: BTreeMap<CustomerType, BTreeMap<NaiveDate, TariffVersion>>,
}

impl TariffCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Version with the latest `effective_date <= on_or_before`.
    pub fn resolve(
        &self,
        customer_type: CustomerType,
        on_or_before: NaiveDate,
    ) -> DomainResult<&TariffVersion> {
        self.versions
            .get(&customer_type)
            .and_then(|by_date| by_date.range(..=on_or_before).next_back())
            .map(|(_, version)| version)
            .ok_or_else(|| no_tariff(customer_type, on_or_before))
    }

    pub fn get(&self, customer_type: CustomerType, effective_date: NaiveDate) -> Option<&TariffVersion> {
        self.versions.get(&customer_type)?.get(&effective_date)
    }

    pub fn latest(&self, customer_type: CustomerType) -> Option<&TariffVersion> {
        self.versions
            .get(&customer_type)?
            .last_key_value()
            .map(|(_, version)| version)
    }

    /// All versions of a customer type, oldest first.
    pub fn versions(&self, customer_type: CustomerType) -> Vec<&TariffVersion> {
        self.versions
            .get(&customer_type)
            .map(|by_date| by_date.values().collect())
            .unwrap_or_default()
    }

    pub fn is_mutable(&self, customer_type: CustomerType, effective_date: NaiveDate) -> bool {
        self.latest(customer_type)
            .is_some_and(|latest| latest.effective_date == effective_date)
    }

    /// Add a new version. It must be newer than every existing version of its
    /// customer type.
    pub fn publish(&mut self, version: TariffVersion) -> DomainResult<()> {
        version.validate()?;
        if let Some(latest) = self.latest(version.customer_type) {
            if version.effective_date <= latest.effective_date {
                return Err(DomainError::validation(format!(
                    "{} tariff effective {} does not supersede the latest version ({})",
                    version.customer_type, version.effective_date, latest.effective_date
                )));
            }
        }
        self.versions
            .entry(version.customer_type)
            .or_default()
            .insert(version.effective_date, version);
        Ok(())
    }

    /// Replace the latest version of a customer type in place.
    pub fn amend(&mut self, version: TariffVersion) -> DomainResult<()> {
        version.validate()?;
        let customer_type = version.customer_type;
        let effective_date = version.effective_date;
        if self.get(customer_type, effective_date).is_none() {
            return Err(DomainError::not_found(format!(
                "{customer_type} tariff effective {effective_date}"
            )));
        }
        if !self.is_mutable(customer_type, effective_date) {
            return Err(DomainError::validation(format!(
                "{customer_type} tariff effective {effective_date} is superseded and read-only"
            )));
        }
        self.versions
            .entry(customer_type)
            .or_default()
            .insert(effective_date, version);
        Ok(())
    }
}
