//! Shared fixtures for unit tests in this crate.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use aquabill_core::{BillId, MeterId};
use aquabill_tariffs::{
    compute_charges, CustomerType, FeeOptions, MeterSize, PenaltyTier, TariffVersion, Tier,
};

use crate::aging::AgingBuckets;
use crate::bill::{Bill, NewBill};
use crate::meter::{MeterReading, MeterRef};

pub fn domestic_tariff() -> TariffVersion {
    TariffVersion {
        customer_type: CustomerType::Domestic,
        effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        tiers: vec![
            Tier::bounded(dec!(5), dec!(10)),
            Tier::bounded(dec!(20), dec!(15)),
            Tier::unbounded(dec!(20)),
        ],
        sewerage_tiers: vec![Tier::bounded(dec!(10), dec!(2)), Tier::unbounded(dec!(4))],
        meter_rent_prices: BTreeMap::from([
            (MeterSize::new(dec!(0.5)).unwrap(), dec!(25)),
            (MeterSize::new(dec!(0.75)).unwrap(), dec!(40)),
        ]),
        maintenance_percentage: dec!(0.10),
        sanitation_percentage: dec!(0.05),
        vat_rate: dec!(0.15),
        domestic_vat_threshold_m3: dec!(15),
        additional_fees: vec![],
        penalty_month_threshold: 3,
        bank_lending_rate: dec!(0.15),
        penalty_tiered_rates: vec![
            PenaltyTier { month: 3, rate: dec!(0) },
            PenaltyTier { month: 4, rate: dec!(0.10) },
            PenaltyTier { month: 5, rate: dec!(0.15) },
        ],
    }
}

pub fn draft_bill(tariff: &TariffVersion, reading: MeterReading, carried: AgingBuckets) -> Bill {
    let size = MeterSize::parse("1/2").unwrap();
    let usage = reading.usage().unwrap();
    let charges = compute_charges(usage, tariff, &size, false, FeeOptions::default()).unwrap();
    Bill::draft(NewBill {
        id: BillId::new(),
        meter: MeterRef::Individual(MeterId::new()),
        customer_type: tariff.customer_type,
        meter_size: size,
        sewerage_connection: false,
        month_year: "2024-03".parse().unwrap(),
        tariff_effective_date: tariff.effective_date,
        reading,
        charges,
        penalty_amount: Decimal::ZERO,
        months_overdue: 0,
        carried,
        due_date: NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(),
        created_at: Utc::now(),
    })
    .unwrap()
}
