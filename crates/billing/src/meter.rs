//! Meters and their readings.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use aquabill_core::{DomainError, DomainResult, MeterId};
use aquabill_tariffs::{CustomerType, MeterSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeterKind {
    Individual,
    Bulk,
}

/// The meter a bill is for. Exactly one of individual or bulk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "meter_id", rename_all = "snake_case")]
pub enum MeterRef {
    Individual(MeterId),
    Bulk(MeterId),
}

impl MeterRef {
    pub fn new(kind: MeterKind, id: MeterId) -> Self {
        match kind {
            MeterKind::Individual => MeterRef::Individual(id),
            MeterKind::Bulk => MeterRef::Bulk(id),
        }
    }

    pub fn meter_id(&self) -> MeterId {
        match self {
            MeterRef::Individual(id) | MeterRef::Bulk(id) => *id,
        }
    }

    pub fn kind(&self) -> MeterKind {
        match self {
            MeterRef::Individual(_) => MeterKind::Individual,
            MeterRef::Bulk(_) => MeterKind::Bulk,
        }
    }
}

/// Billing attributes of a meter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meter {
    pub id: MeterId,
    pub kind: MeterKind,
    pub customer_type: CustomerType,
    /// `None` for legacy records; callers fall back to a configured default.
    pub meter_size: Option<MeterSize>,
    pub sewerage_connection: bool,
}

impl Meter {
    pub fn reference(&self) -> MeterRef {
        MeterRef::new(self.kind, self.id)
    }
}

/// Previous and current register values for the open cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterReading {
    pub previous: Decimal,
    pub current: Decimal,
}

impl MeterReading {
    pub fn new(previous: Decimal, current: Decimal) -> DomainResult<Self> {
        let reading = Self { previous, current };
        reading.usage()?;
        Ok(reading)
    }

    /// Consumption for the cycle. The register never runs backwards.
    pub fn usage(&self) -> DomainResult<Decimal> {
        if self.previous < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "previous reading must not be negative, got {}",
                self.previous
            )));
        }
        if self.current < self.previous {
            return Err(DomainError::validation(format!(
                "current reading {} is below previous reading {}",
                self.current, self.previous
            )));
        }
        Ok(self.current - self.previous)
    }

    /// Reading that opens the next cycle: this cycle's current value becomes
    /// the next previous value.
    pub fn rolled_over(&self) -> MeterReading {
        MeterReading {
            previous: self.current,
            current: self.current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn usage_is_current_minus_previous() {
        let reading = MeterReading::new(dec!(120), dec!(132.5)).unwrap();
        assert_eq!(reading.usage().unwrap(), dec!(12.5));
    }

    #[test]
    fn backwards_register_is_rejected() {
        let err = MeterReading::new(dec!(120), dec!(100)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rollover_carries_current_forward() {
        let reading = MeterReading::new(dec!(10), dec!(25)).unwrap().rolled_over();
        assert_eq!(reading.previous, dec!(25));
        assert_eq!(reading.usage().unwrap(), Decimal::ZERO);
    }

    #[test]
    fn meter_ref_serializes_with_kind_tag() {
        let id = MeterId::new();
        let json = serde_json::to_value(MeterRef::Bulk(id)).unwrap();
        assert_eq!(json["kind"], "bulk");
        assert_eq!(json["meter_id"], id.to_string());
    }
}
