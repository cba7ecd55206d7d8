//! Late-payment penalty engine.

use rust_decimal::Decimal;

use aquabill_core::{DomainError, DomainResult, round_money};

use crate::model::{PenaltyTier, TariffVersion};

/// Check the penalty table: ascending by month, no negative rates.
pub fn validate_penalty_table(rates: &[PenaltyTier]) -> DomainResult<()> {
    for (idx, entry) in rates.iter().enumerate() {
        if entry.rate < Decimal::ZERO {
            return Err(DomainError::invalid_penalty(format!(
                "penalty entry for month {} has a negative rate",
                entry.month
            )));
        }
        if idx > 0 && entry.month <= rates[idx - 1].month {
            return Err(DomainError::invalid_penalty(
                "penalty entries are not sorted ascending by month",
            ));
        }
    }
    Ok(())
}

/// Penalty rate for a balance `months_overdue` months old.
///
/// Zero below the tariff's threshold. Otherwise the bank lending rate plus
/// the entry with the greatest `month` not exceeding `months_overdue`.
pub fn penalty_rate(months_overdue: u32, tariff: &TariffVersion) -> DomainResult<Decimal> {
    if months_overdue < tariff.penalty_month_threshold {
        return Ok(Decimal::ZERO);
    }
    validate_penalty_table(&tariff.penalty_tiered_rates)?;

    let selected = tariff
        .penalty_tiered_rates
        .iter()
        .take_while(|entry| entry.month <= months_overdue)
        .last()
        .ok_or_else(|| {
            DomainError::invalid_penalty(format!(
                "no penalty entry applies at {months_overdue} months overdue"
            ))
        })?;

    Ok(tariff.bank_lending_rate + selected.rate)
}

/// Penalty charged on the currently unpaid principal.
///
/// Recomputed every cycle against the live balance, so partial settlements
/// shrink the penalty base.
pub fn penalty_amount(
    unpaid_principal: Decimal,
    months_overdue: u32,
    tariff: &TariffVersion,
) -> DomainResult<Decimal> {
    if unpaid_principal < Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "unpaid principal must not be negative, got {unpaid_principal}"
        )));
    }
    let rate = penalty_rate(months_overdue, tariff)?;
    Ok(round_money(unpaid_principal * rate))
}
