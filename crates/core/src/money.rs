//! Monetary rounding.
//!
//! Amounts and rates are `rust_decimal::Decimal` end to end. Intermediate sums
//! keep full precision; only values that leave a calculation are rounded.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places for currency amounts.
pub const MONEY_DP: u32 = 2;

/// Round an amount to 2 decimal places, half-up.
///
/// Billing amounts are non-negative, where midpoint-away-from-zero is
/// round-half-up.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}
