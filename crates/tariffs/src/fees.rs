//! Fee aggregator: composes all charge components of a bill.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use aquabill_core::{DomainError, DomainResult, round_money};

use crate::model::{FeeKind, MeterSize, TariffVersion};
use crate::tier::{allocate, TierAllocation};

/// Caller-selected calculation behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeOptions {
    /// Bill zero rent instead of failing when the tariff has no price for the
    /// meter size. Off by default.
    pub lenient_meter_rent: bool,
}

impl FeeOptions {
    pub fn lenient() -> Self {
        Self {
            lenient_meter_rent: true,
        }
    }
}

/// Charge components of one bill, rounded to 2 dp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillCharges {
    pub usage: Decimal,
    pub base_water_charge: Decimal,
    pub sewerage_charge: Decimal,
    pub maintenance_fee: Decimal,
    pub sanitation_fee: Decimal,
    pub meter_rent: Decimal,
    pub additional_fees_charge: Decimal,
    pub pre_vat_total: Decimal,
    pub vat_amount: Decimal,
    pub total: Decimal,
    pub water_breakdown: TierAllocation,
    pub sewerage_breakdown: TierAllocation,
}

/// Compute every charge for `usage` under `tariff`.
///
/// Components are computed in a fixed order because the VAT base is the sum
/// of everything before it. Components keep full precision until the end.
pub fn compute(
    usage: Decimal,
    tariff: &TariffVersion,
    meter_size: &MeterSize,
    sewerage_connection: bool,
    options: FeeOptions,
) -> DomainResult<BillCharges> {
    let mode = tariff.customer_type.tier_mode();

    let water = allocate(usage, &tariff.tiers, mode)?;
    let base_water_charge = water.total;

    let sewerage = if sewerage_connection {
        if tariff.sewerage_tiers.is_empty() {
            return Err(DomainError::invalid_tariff(format!(
                "{} tariff effective {} has no sewerage tiers",
                tariff.customer_type, tariff.effective_date
            )));
        }
        allocate(usage, &tariff.sewerage_tiers, mode)?
    } else {
        TierAllocation::default()
    };
    let sewerage_charge = sewerage.total;

    let maintenance_fee = base_water_charge * tariff.maintenance_percentage;
    let sanitation_fee = base_water_charge * tariff.sanitation_percentage;

    let meter_rent = match tariff.meter_rent(meter_size) {
        Some(price) => price,
        None if options.lenient_meter_rent => Decimal::ZERO,
        None => return Err(DomainError::missing_rent_price(meter_size)),
    };

    let additional_fees_charge: Decimal = tariff
        .additional_fees
        .iter()
        .map(|fee| match fee.kind {
            FeeKind::Percentage => base_water_charge * fee.value,
            FeeKind::Flat => fee.value,
        })
        .sum();

    let pre_vat_total = base_water_charge
        + sewerage_charge
        + maintenance_fee
        + sanitation_fee
        + meter_rent
        + additional_fees_charge;

    let vat_applies = !tariff.customer_type.has_vat_threshold()
        || usage > tariff.domestic_vat_threshold_m3;
    let vat_amount = if vat_applies {
        pre_vat_total * tariff.vat_rate
    } else {
        Decimal::ZERO
    };

    let total = pre_vat_total + vat_amount;

    Ok(BillCharges {
        usage,
        base_water_charge: round_money(base_water_charge),
        sewerage_charge: round_money(sewerage_charge),
        maintenance_fee: round_money(maintenance_fee),
        sanitation_fee: round_money(sanitation_fee),
        meter_rent: round_money(meter_rent),
        additional_fees_charge: round_money(additional_fees_charge),
        pre_vat_total: round_money(pre_vat_total),
        vat_amount: round_money(vat_amount),
        total: round_money(total),
        water_breakdown: water.rounded(),
        sewerage_breakdown: sewerage.rounded(),
    })
}
