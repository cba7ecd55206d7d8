//! Canonical tariff model.
//!
//! Everything in here is post-normalization: calculation code only ever sees
//! these types, never the legacy persisted shapes (see `normalize`).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use aquabill_core::{DomainError, DomainResult};

use crate::normalize;

/// Tariff customer category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    Domestic,
    NonDomestic,
    RentalDomestic,
    RentalNonDomestic,
}

impl CustomerType {
    /// Domestic categories bill band-by-band; the others charge all usage at
    /// one selected rate.
    pub fn tier_mode(&self) -> TierMode {
        match self {
            CustomerType::Domestic | CustomerType::RentalDomestic => TierMode::Progressive,
            CustomerType::NonDomestic | CustomerType::RentalNonDomestic => TierMode::SingleRate,
        }
    }

    /// Whether VAT is waived up to `domestic_vat_threshold_m3`.
    pub fn has_vat_threshold(&self) -> bool {
        matches!(self, CustomerType::Domestic | CustomerType::RentalDomestic)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerType::Domestic => "domestic",
            CustomerType::NonDomestic => "non_domestic",
            CustomerType::RentalDomestic => "rental_domestic",
            CustomerType::RentalNonDomestic => "rental_non_domestic",
        }
    }
}

impl core::fmt::Display for CustomerType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for CustomerType {
    type Err = DomainError;

    /// Accepts `snake_case`, `kebab-case`, spaced and `PascalCase` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "domestic" => Ok(CustomerType::Domestic),
            "nondomestic" => Ok(CustomerType::NonDomestic),
            "rentaldomestic" => Ok(CustomerType::RentalDomestic),
            "rentalnondomestic" => Ok(CustomerType::RentalNonDomestic),
            _ => Err(DomainError::validation(format!("unknown customer type '{s}'"))),
        }
    }
}

/// Allocation rule selected by customer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierMode {
    Progressive,
    SingleRate,
}

/// Upper bound of a tier band. The last tier of every list is `Unbounded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TierLimit {
    Bounded(Decimal),
    Unbounded,
}

impl TierLimit {
    pub fn is_unbounded(&self) -> bool {
        matches!(self, TierLimit::Unbounded)
    }

    pub fn covers(&self, usage: Decimal) -> bool {
        match self {
            TierLimit::Bounded(limit) => usage <= *limit,
            TierLimit::Unbounded => true,
        }
    }
}

impl core::fmt::Display for TierLimit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TierLimit::Bounded(limit) => core::fmt::Display::fmt(limit, f),
            TierLimit::Unbounded => f.write_str("Infinity"),
        }
    }
}

impl Serialize for TierLimit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TierLimit::Bounded(limit) => Serialize::serialize(limit, serializer),
            TierLimit::Unbounded => serializer.serialize_str("Infinity"),
        }
    }
}

impl<'de> Deserialize<'de> for TierLimit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        normalize::parse_limit(&value).map_err(serde::de::Error::custom)
    }
}

/// A consumption band and its per-m³ rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub limit: TierLimit,
    pub rate: Decimal,
}

impl Tier {
    pub fn bounded(limit: Decimal, rate: Decimal) -> Self {
        Self {
            limit: TierLimit::Bounded(limit),
            rate,
        }
    }

    pub fn unbounded(rate: Decimal) -> Self {
        Self {
            limit: TierLimit::Unbounded,
            rate,
        }
    }
}

/// Check the ordered-tier invariants.
///
/// Non-empty, strictly ascending bounded limits, exactly one `Unbounded`
/// terminator in last position, no negative limits or rates.
pub fn validate_tiers(tiers: &[Tier]) -> DomainResult<()> {
    let Some(last) = tiers.last() else {
        return Err(DomainError::invalid_tariff("tier list is empty"));
    };
    if !last.limit.is_unbounded() {
        return Err(DomainError::invalid_tariff(
            "last tier must have an unbounded (Infinity) limit",
        ));
    }

    let mut previous: Option<Decimal> = None;
    for (idx, tier) in tiers.iter().enumerate() {
        if tier.rate < Decimal::ZERO {
            return Err(DomainError::invalid_tariff(format!(
                "tier {idx} has a negative rate"
            )));
        }
        match tier.limit {
            TierLimit::Unbounded if idx + 1 != tiers.len() => {
                return Err(DomainError::invalid_tariff(format!(
                    "tier {idx} is unbounded but not last"
                )));
            }
            TierLimit::Unbounded => {}
            TierLimit::Bounded(limit) => {
                if limit < Decimal::ZERO {
                    return Err(DomainError::invalid_tariff(format!(
                        "tier {idx} has a negative limit"
                    )));
                }
                if previous.is_some_and(|p| limit <= p) {
                    return Err(DomainError::invalid_tariff(format!(
                        "tiers are not sorted ascending by limit (tier {idx})"
                    )));
                }
                previous = Some(limit);
            }
        }
    }
    Ok(())
}

/// Meter bore size in canonical decimal inches (`"1/2"` becomes `0.5`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeterSize(Decimal);

impl MeterSize {
    pub fn new(inches: Decimal) -> DomainResult<Self> {
        if inches <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "meter size must be positive, got {inches}"
            )));
        }
        Ok(Self(inches.normalize()))
    }

    /// Parse any accepted spelling, including legacy fraction keys.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        normalize::canonical_meter_size(raw)
    }

    /// The 1/2" residential meter.
    pub fn half_inch() -> Self {
        Self(Decimal::new(5, 1))
    }

    pub fn inches(&self) -> Decimal {
        self.0
    }
}

impl core::fmt::Display for MeterSize {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for MeterSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MeterSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let raw = match &value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "meter size must be a string or number, got {other}"
                )));
            }
        };
        MeterSize::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeKind {
    /// Fraction of the base water charge.
    Percentage,
    /// Fixed amount per bill.
    Flat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalFee {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FeeKind,
    pub value: Decimal,
}

/// Penalty rate that applies from `month` months overdue onward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyTier {
    pub month: u32,
    pub rate: Decimal,
}

/// One effective-dated tariff definition for a customer type.
///
/// Percentages and rates are fractions (`0.05` is 5%).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffVersion {
    pub customer_type: CustomerType,
    pub effective_date: NaiveDate,
    pub tiers: Vec<Tier>,
    /// Empty when the tariff carries no sewerage charge.
    pub sewerage_tiers: Vec<Tier>,
    pub meter_rent_prices: BTreeMap<MeterSize, Decimal>,
    pub maintenance_percentage: Decimal,
    pub sanitation_percentage: Decimal,
    pub vat_rate: Decimal,
    pub domestic_vat_threshold_m3: Decimal,
    pub additional_fees: Vec<AdditionalFee>,
    pub penalty_month_threshold: u32,
    pub bank_lending_rate: Decimal,
    pub penalty_tiered_rates: Vec<PenaltyTier>,
}

impl TariffVersion {
    /// Validate all tables. Run on publish/amend; calculations re-check the
    /// parts they use.
    pub fn validate(&self) -> DomainResult<()> {
        validate_tiers(&self.tiers)?;
        if !self.sewerage_tiers.is_empty() {
            validate_tiers(&self.sewerage_tiers)?;
        }

        let non_negative = [
            ("maintenance_percentage", self.maintenance_percentage),
            ("sanitation_percentage", self.sanitation_percentage),
            ("vat_rate", self.vat_rate),
            ("domestic_vat_threshold_m3", self.domestic_vat_threshold_m3),
            ("bank_lending_rate", self.bank_lending_rate),
        ];
        for (name, value) in non_negative {
            if value < Decimal::ZERO {
                return Err(DomainError::invalid_tariff(format!("{name} is negative")));
            }
        }

        for (size, price) in &self.meter_rent_prices {
            if *price < Decimal::ZERO {
                return Err(DomainError::invalid_tariff(format!(
                    "meter rent for size {size} is negative"
                )));
            }
        }

        for fee in &self.additional_fees {
            if fee.value < Decimal::ZERO {
                return Err(DomainError::invalid_tariff(format!(
                    "additional fee '{}' is negative",
                    fee.name
                )));
            }
        }

        crate::penalty::validate_penalty_table(&self.penalty_tiered_rates)
    }

    pub fn meter_rent(&self, size: &MeterSize) -> Option<Decimal> {
        self.meter_rent_prices.get(size).copied()
    }
}
