//! Normalization boundary for persisted tariff records.
//!
//! Tier lists, rent tables, fee lists and penalty tables have been stored in
//! several shapes over the years:
//!
//! - a JSON array of objects (`[{"limit": 5, "rate": 10}, ...]`)
//! - an object keyed by position (`{"0": {...}, "1": {...}}`)
//! - either of the above serialized into a JSON string
//! - a single bare object for one-entry tables
//! - meter sizes written as fractions (`"1/2"`, `"1 1/2"`)
//!
//! Everything is converted into the canonical model here, before any
//! calculation runs.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde_json::{Map, Value};

use aquabill_core::{DomainError, DomainResult};

use crate::model::{
    AdditionalFee, CustomerType, FeeKind, MeterSize, PenaltyTier, TariffVersion, Tier, TierLimit,
};

/// JSON-in-a-string nesting we are willing to unwrap.
const MAX_STRING_NESTING: usize = 3;

/// Legacy fraction spellings and their canonical decimal inches.
const FRACTION_SIZES: &[(&str, &str)] = &[
    ("1/2", "0.5"),
    ("5/8", "0.625"),
    ("3/4", "0.75"),
    ("1", "1"),
    ("1 1/4", "1.25"),
    ("1 1/2", "1.5"),
    ("2", "2"),
    ("2 1/2", "2.5"),
    ("3", "3"),
    ("4", "4"),
    ("6", "6"),
    ("8", "8"),
];

/// A tariff row as persisted, before normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTariff {
    pub customer_type: String,
    pub effective_date: NaiveDate,
    pub tiers: Value,
    #[serde(default)]
    pub sewerage_tiers: Value,
    #[serde(default)]
    pub meter_rent_prices: Value,
    #[serde(default)]
    pub maintenance_percentage: Value,
    #[serde(default)]
    pub sanitation_percentage: Value,
    #[serde(default)]
    pub vat_rate: Value,
    #[serde(default)]
    pub domestic_vat_threshold_m3: Value,
    #[serde(default)]
    pub additional_fees: Value,
    #[serde(default)]
    pub penalty_month_threshold: Value,
    #[serde(default)]
    pub bank_lending_rate: Value,
    #[serde(default)]
    pub penalty_tiered_rates: Value,
}

impl RawTariff {
    /// Convert to the canonical model and validate it.
    pub fn normalize(&self) -> DomainResult<TariffVersion> {
        let version = TariffVersion {
            customer_type: CustomerType::from_str(&self.customer_type)?,
            effective_date: self.effective_date,
            tiers: parse_tiers(&self.tiers)?,
            sewerage_tiers: parse_tiers(&self.sewerage_tiers)?,
            meter_rent_prices: parse_meter_rent_prices(&self.meter_rent_prices)?,
            maintenance_percentage: decimal_or_zero(&self.maintenance_percentage, "maintenance_percentage")?,
            sanitation_percentage: decimal_or_zero(&self.sanitation_percentage, "sanitation_percentage")?,
            vat_rate: decimal_or_zero(&self.vat_rate, "vat_rate")?,
            domestic_vat_threshold_m3: decimal_or_zero(
                &self.domestic_vat_threshold_m3,
                "domestic_vat_threshold_m3",
            )?,
            additional_fees: parse_additional_fees(&self.additional_fees)?,
            penalty_month_threshold: month_or_zero(&self.penalty_month_threshold, "penalty_month_threshold")?,
            bank_lending_rate: decimal_or_zero(&self.bank_lending_rate, "bank_lending_rate")?,
            penalty_tiered_rates: parse_penalty_rates(&self.penalty_tiered_rates)?,
        };
        version.validate()?;
        Ok(version)
    }
}

/// Parse a decimal from a JSON number or numeric string.
pub fn parse_decimal(value: &Value, field: &str) -> DomainResult<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map_err(|e| DomainError::validation(format!("{field}: {e}")))
        }
        Value::String(s) => {
            let text = s.trim();
            Decimal::from_str(text)
                .or_else(|_| Decimal::from_scientific(text))
                .map_err(|e| DomainError::validation(format!("{field}: '{s}' {e}")))
        }
        other => Err(DomainError::validation(format!(
            "{field}: expected a number, got {other}"
        ))),
    }
}

fn decimal_or_zero(value: &Value, field: &str) -> DomainResult<Decimal> {
    match value {
        Value::Null => Ok(Decimal::ZERO),
        Value::String(s) if s.trim().is_empty() => Ok(Decimal::ZERO),
        other => parse_decimal(other, field),
    }
}

fn parse_month(value: &Value, field: &str) -> DomainResult<u32> {
    let month = parse_decimal(value, field)?;
    if month < Decimal::ZERO || !month.fract().is_zero() {
        return Err(DomainError::validation(format!(
            "{field}: expected a whole number of months, got {month}"
        )));
    }
    month
        .to_u32()
        .ok_or_else(|| DomainError::validation(format!("{field}: {month} out of range")))
}

fn month_or_zero(value: &Value, field: &str) -> DomainResult<u32> {
    match value {
        Value::Null => Ok(0),
        other => parse_month(other, field),
    }
}

/// Parse a tier limit. `null`, missing and `"Infinity"`-like strings are the
/// unbounded sentinel.
pub fn parse_limit(value: &Value) -> DomainResult<TierLimit> {
    match value {
        Value::Null => Ok(TierLimit::Unbounded),
        Value::String(s) => {
            let t = s.trim().to_ascii_lowercase();
            if matches!(t.as_str(), "" | "infinity" | "inf" | "+inf" | "∞" | "unlimited") {
                Ok(TierLimit::Unbounded)
            } else {
                parse_decimal(value, "tier limit").map(TierLimit::Bounded)
            }
        }
        other => parse_decimal(other, "tier limit").map(TierLimit::Bounded),
    }
}

/// Unwrap a value that was serialized into a JSON string (possibly more than
/// once). Blank strings read as `null`.
fn unwrap_json_string(value: &Value, what: &str) -> DomainResult<Value> {
    let mut current = value.clone();
    let mut depth = 0;
    while let Value::String(s) = &current {
        if s.trim().is_empty() {
            return Ok(Value::Null);
        }
        if depth == MAX_STRING_NESTING {
            return Err(DomainError::validation(format!(
                "{what}: JSON string nested too deeply"
            )));
        }
        let parsed = serde_json::from_str(s).map_err(|e| {
            DomainError::validation(format!("{what}: string is not valid JSON: {e}"))
        })?;
        current = parsed;
        depth += 1;
    }
    Ok(current)
}

/// Flatten the accepted list shapes into an ordered list of entries.
///
/// `is_bare` recognizes a single entry stored without any wrapper.
fn entries(
    value: &Value,
    what: &str,
    is_bare: fn(&Map<String, Value>) -> bool,
) -> DomainResult<Vec<Value>> {
    match unwrap_json_string(value, what)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items),
        Value::Object(map) if is_bare(&map) => Ok(vec![Value::Object(map)]),
        Value::Object(map) => {
            let mut keyed = Vec::with_capacity(map.len());
            for (key, item) in map {
                let position = key.trim().parse::<u64>().map_err(|_| {
                    DomainError::validation(format!("{what}: unrecognized key '{key}'"))
                })?;
                keyed.push((position, item));
            }
            keyed.sort_by_key(|(position, _)| *position);
            Ok(keyed.into_iter().map(|(_, item)| item).collect())
        }
        other => Err(DomainError::validation(format!(
            "{what}: unsupported shape {other}"
        ))),
    }
}

fn object<'a>(value: &'a Value, what: &str) -> DomainResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| DomainError::validation(format!("{what}: expected an object, got {value}")))
}

/// Normalize a tier list. Order is preserved; sorting is validated, not fixed.
pub fn parse_tiers(value: &Value) -> DomainResult<Vec<Tier>> {
    entries(value, "tiers", |m| m.contains_key("rate"))?
        .iter()
        .map(|item| {
            let map = object(item, "tier")?;
            let limit = parse_limit(map.get("limit").unwrap_or(&Value::Null))?;
            let rate = map
                .get("rate")
                .ok_or_else(|| DomainError::validation("tier is missing 'rate'"))
                .and_then(|v| parse_decimal(v, "tier rate"))?;
            Ok(Tier { limit, rate })
        })
        .collect()
}

/// Map a meter size spelling onto the canonical decimal key.
pub fn canonical_meter_size(raw: &str) -> DomainResult<MeterSize> {
    if raw.trim_start().starts_with('-') {
        return Err(DomainError::validation(format!("meter size '{raw}' is negative")));
    }
    let cleaned = raw
        .trim()
        .trim_end_matches(|c: char| c == '"' || c == '\'')
        .trim_end_matches("inches")
        .trim_end_matches("inch")
        .trim_end_matches("in")
        .trim()
        .replace('-', " ");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some((_, canonical)) = FRACTION_SIZES.iter().find(|(legacy, _)| *legacy == cleaned) {
        return MeterSize::new(Decimal::from_str(canonical).map_err(|e| {
            DomainError::validation(format!("meter size '{raw}': {e}"))
        })?);
    }

    let inches = Decimal::from_str(&cleaned)
        .map_err(|_| DomainError::validation(format!("unrecognized meter size '{raw}'")))?;
    MeterSize::new(inches)
}

/// Normalize a meter rent table (`size -> price`).
pub fn parse_meter_rent_prices(value: &Value) -> DomainResult<BTreeMap<MeterSize, Decimal>> {
    let mut prices = BTreeMap::new();
    match unwrap_json_string(value, "meter_rent_prices")? {
        Value::Null => {}
        Value::Object(map) => {
            for (key, price) in &map {
                prices.insert(
                    canonical_meter_size(key)?,
                    parse_decimal(price, "meter rent price")?,
                );
            }
        }
        Value::Array(items) => {
            for item in &items {
                let map = object(item, "meter rent entry")?;
                let size = map
                    .get("size")
                    .or_else(|| map.get("meter_size"))
                    .ok_or_else(|| DomainError::validation("meter rent entry is missing 'size'"))?;
                let size = match size {
                    Value::String(s) => canonical_meter_size(s)?,
                    other => canonical_meter_size(&other.to_string())?,
                };
                let price = map
                    .get("price")
                    .ok_or_else(|| DomainError::validation("meter rent entry is missing 'price'"))?;
                prices.insert(size, parse_decimal(price, "meter rent price")?);
            }
        }
        other => {
            return Err(DomainError::validation(format!(
                "meter_rent_prices: unsupported shape {other}"
            )));
        }
    }
    Ok(prices)
}

fn parse_fee_kind(value: &Value) -> DomainResult<FeeKind> {
    let raw = value.as_str().unwrap_or_default().trim().to_ascii_lowercase();
    match raw.as_str() {
        "percentage" | "percent" | "%" => Ok(FeeKind::Percentage),
        "flat" | "fixed" => Ok(FeeKind::Flat),
        _ => Err(DomainError::validation(format!(
            "additional fee type must be 'percentage' or 'flat', got {value}"
        ))),
    }
}

pub fn parse_additional_fees(value: &Value) -> DomainResult<Vec<AdditionalFee>> {
    entries(value, "additional_fees", |m| m.contains_key("type"))?
        .iter()
        .map(|item| {
            let map = object(item, "additional fee")?;
            let name = map
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string();
            let kind = parse_fee_kind(map.get("type").unwrap_or(&Value::Null))?;
            let value = map
                .get("value")
                .ok_or_else(|| DomainError::validation(format!("additional fee '{name}' is missing 'value'")))
                .and_then(|v| parse_decimal(v, "additional fee value"))?;
            Ok(AdditionalFee { name, kind, value })
        })
        .collect()
}

pub fn parse_penalty_rates(value: &Value) -> DomainResult<Vec<PenaltyTier>> {
    entries(value, "penalty_tiered_rates", |m| m.contains_key("month"))?
        .iter()
        .map(|item| {
            let map = object(item, "penalty rate")?;
            let month = map
                .get("month")
                .ok_or_else(|| DomainError::validation("penalty rate is missing 'month'"))
                .and_then(|v| parse_month(v, "penalty month"))?;
            let rate = map
                .get("rate")
                .ok_or_else(|| DomainError::validation("penalty rate is missing 'rate'"))
                .and_then(|v| parse_decimal(v, "penalty rate"))?;
            Ok(PenaltyTier { month, rate })
        })
        .collect()
}
