//! Fixtures shared by the service integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use aquabill_auth::{Actor, Capability, CapabilitySet};
use aquabill_billing::{Meter, MeterKind};
use aquabill_core::{BillingPeriod, MeterId, UserId};
use aquabill_infra::{BillingConfig, BillingService, BillingStore, InMemoryBillingStore};
use aquabill_tariffs::{CustomerType, MeterSize, PenaltyTier, TariffVersion, Tier};

pub type Service = BillingService<InMemoryBillingStore>;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn period(raw: &str) -> BillingPeriod {
    raw.parse().unwrap()
}

/// Non-domestic flat tariff: 10 per unit, no fees, rent or VAT, so bill
/// totals are easy to reason about.
pub fn flat_tariff() -> TariffVersion {
    TariffVersion {
        customer_type: CustomerType::NonDomestic,
        effective_date: date(2024, 1, 1),
        tiers: vec![Tier::unbounded(dec!(10))],
        sewerage_tiers: vec![],
        meter_rent_prices: BTreeMap::from([(MeterSize::half_inch(), Decimal::ZERO)]),
        maintenance_percentage: Decimal::ZERO,
        sanitation_percentage: Decimal::ZERO,
        vat_rate: Decimal::ZERO,
        domestic_vat_threshold_m3: Decimal::ZERO,
        additional_fees: vec![],
        penalty_month_threshold: 3,
        bank_lending_rate: dec!(0.15),
        penalty_tiered_rates: vec![
            PenaltyTier { month: 3, rate: dec!(0) },
            PenaltyTier { month: 4, rate: dec!(0.10) },
        ],
    }
}

/// Domestic progressive tariff with a single rent price (1/2").
pub fn domestic_tariff() -> TariffVersion {
    TariffVersion {
        customer_type: CustomerType::Domestic,
        effective_date: date(2024, 1, 1),
        tiers: vec![
            Tier::bounded(dec!(5), dec!(10)),
            Tier::bounded(dec!(20), dec!(15)),
            Tier::unbounded(dec!(20)),
        ],
        sewerage_tiers: vec![Tier::bounded(dec!(10), dec!(2)), Tier::unbounded(dec!(4))],
        meter_rent_prices: BTreeMap::from([(MeterSize::half_inch(), dec!(25))]),
        maintenance_percentage: dec!(0.10),
        sanitation_percentage: dec!(0.05),
        vat_rate: dec!(0.15),
        domestic_vat_threshold_m3: dec!(15),
        additional_fees: vec![],
        penalty_month_threshold: 3,
        bank_lending_rate: dec!(0.15),
        penalty_tiered_rates: vec![PenaltyTier { month: 3, rate: dec!(0) }],
    }
}

pub fn service() -> Service {
    let service = BillingService::new(InMemoryBillingStore::new(), BillingConfig::default());
    service.publish_tariff(flat_tariff()).unwrap();
    service.publish_tariff(domestic_tariff()).unwrap();
    service
}

pub fn add_meter(service: &Service, customer_type: CustomerType, size: Option<&str>) -> MeterId {
    let meter = Meter {
        id: MeterId::new(),
        kind: MeterKind::Individual,
        customer_type,
        meter_size: size.map(|s| MeterSize::parse(s).unwrap()),
        sewerage_connection: false,
    };
    let id = meter.id;
    service.register_meter(meter, Decimal::ZERO).unwrap();
    id
}

/// Advance the register by `usage` for the open cycle.
pub fn consume(service: &Service, meter_id: MeterId, usage: Decimal) {
    let previous = service
        .store()
        .get_meter_reading(meter_id)
        .unwrap()
        .unwrap()
        .previous;
    service.record_meter_reading(meter_id, previous + usage).unwrap();
}

pub fn actor(capabilities: &[Capability]) -> Actor {
    Actor::new(
        UserId::new(),
        capabilities.iter().copied().collect::<CapabilitySet>(),
    )
}
