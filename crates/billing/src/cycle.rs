//! Month-end cycle close for a single meter.
//!
//! Everything here is pure: the caller loads the meter, its reading, the
//! prior bill and the resolved tariff, and persists what comes back.

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;

use aquabill_core::{BillId, BillingPeriod, DomainError, DomainResult};
use aquabill_tariffs::{compute_charges, penalty_amount, FeeOptions, MeterSize, TariffVersion};

use crate::aging::AgingBuckets;
use crate::bill::{Bill, NewBill, PaymentStatus};
use crate::meter::{Meter, MeterReading};

/// Everything needed to close one meter's cycle.
#[derive(Debug, Clone)]
pub struct CycleInput<'a> {
    pub meter: &'a Meter,
    /// The meter's own size, or the configured default when it has none.
    pub meter_size: MeterSize,
    pub reading: MeterReading,
    /// Latest existing bill for the meter, if any.
    pub prior: Option<&'a Bill>,
    pub tariff: &'a TariffVersion,
    pub period: BillingPeriod,
    pub carry_balance: bool,
    pub fee_options: FeeOptions,
    pub due_days: u32,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    /// The prior bill after a write-off, when one happened.
    pub settled_prior: Option<Bill>,
    pub bill: Bill,
    pub next_reading: MeterReading,
}

pub fn due_date(period: BillingPeriod, due_days: u32) -> DomainResult<NaiveDate> {
    period
        .last_day()
        .checked_add_days(Days::new(u64::from(due_days)))
        .ok_or_else(|| DomainError::validation(format!("due date out of range for {period}")))
}

/// Close `input.period` for one meter.
///
/// With `carry_balance` the prior bill's buckets are aged by one cycle and a
/// penalty is charged on its outstanding balance. Without it the prior bill
/// is written off and the new bill starts from a clean ledger.
pub fn close_meter_cycle(input: CycleInput<'_>) -> DomainResult<CycleOutcome> {
    let CycleInput {
        meter,
        meter_size,
        reading,
        prior,
        tariff,
        period,
        carry_balance,
        fee_options,
        due_days,
        now,
    } = input;

    if tariff.customer_type != meter.customer_type {
        return Err(DomainError::validation(format!(
            "tariff is for {} but meter {} is {}",
            tariff.customer_type, meter.id, meter.customer_type
        )));
    }
    if let Some(prior) = prior {
        if prior.month_year() >= period {
            return Err(DomainError::validation(format!(
                "meter {} already has a bill for {}; cannot close {}",
                meter.id,
                prior.month_year(),
                period
            )));
        }
    }

    let usage = reading.usage()?;
    let charges = compute_charges(
        usage,
        tariff,
        &meter_size,
        meter.sewerage_connection,
        fee_options,
    )?;

    let mut settled_prior = None;
    let (carried, months_overdue, penalty) = match prior {
        Some(prior) if carry_balance => {
            let principal = prior.outstanding_amount();
            if prior.payment_status() == PaymentStatus::Unpaid && principal > Decimal::ZERO {
                let months = prior.months_overdue() + 1;
                let penalty = penalty_amount(principal, months, tariff)?;
                (prior.aging(), months, penalty)
            } else {
                (prior.aging(), 0, Decimal::ZERO)
            }
        }
        Some(prior) => {
            if prior.payment_status() == PaymentStatus::Unpaid || !prior.aging().is_clear() {
                let mut settled = prior.clone();
                settled.write_off();
                settled_prior = Some(settled);
            }
            (AgingBuckets::cleared(), 0, Decimal::ZERO)
        }
        None => (AgingBuckets::cleared(), 0, Decimal::ZERO),
    };

    let bill = Bill::draft(NewBill {
        id: BillId::new(),
        meter: meter.reference(),
        customer_type: meter.customer_type,
        meter_size,
        sewerage_connection: meter.sewerage_connection,
        month_year: period,
        tariff_effective_date: tariff.effective_date,
        reading,
        charges,
        penalty_amount: penalty,
        months_overdue,
        carried,
        due_date: due_date(period, due_days)?,
        created_at: now,
    })?;

    Ok(CycleOutcome {
        settled_prior,
        bill,
        next_reading: reading.rolled_over(),
    })
}
