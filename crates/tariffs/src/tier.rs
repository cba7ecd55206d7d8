//! Tier allocator: usage + ordered tiers -> per-tier charge breakdown.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use aquabill_core::{DomainError, DomainResult, round_money};

use crate::model::{validate_tiers, Tier, TierLimit, TierMode};

/// Usage billed within one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCharge {
    /// Position of the tier in the tariff's list.
    pub index: usize,
    /// Exclusive lower bound of the band.
    pub lower: Decimal,
    pub upper: TierLimit,
    pub rate: Decimal,
    pub usage: Decimal,
    pub charge: Decimal,
}

/// Result of an allocation. Charges carry full precision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierAllocation {
    pub per_tier: Vec<TierCharge>,
    pub total: Decimal,
}

impl TierAllocation {
    pub fn allocated_usage(&self) -> Decimal {
        self.per_tier.iter().map(|t| t.usage).sum()
    }

    /// Same breakdown with each charge and the total rounded for display.
    pub fn rounded(&self) -> TierAllocation {
        TierAllocation {
            per_tier: self
                .per_tier
                .iter()
                .map(|t| TierCharge {
                    charge: round_money(t.charge),
                    ..t.clone()
                })
                .collect(),
            total: round_money(self.total),
        }
    }
}

/// Allocate `usage` across `tiers` with the rule for `mode`.
///
/// - `Progressive`: band `(previous limit, limit]` is consumed at its own rate;
///   the unbounded tier absorbs the remainder.
/// - `SingleRate`: the first tier whose limit covers the usage prices all of it.
///
/// Zero usage yields an empty breakdown and a zero total. The tier list is
/// validated first, whatever the usage.
pub fn allocate(usage: Decimal, tiers: &[Tier], mode: TierMode) -> DomainResult<TierAllocation> {
    if usage < Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "usage must not be negative, got {usage}"
        )));
    }
    validate_tiers(tiers)?;

    if usage.is_zero() {
        return Ok(TierAllocation::default());
    }

    let per_tier = match mode {
        TierMode::Progressive => progressive(usage, tiers),
        TierMode::SingleRate => single_rate(usage, tiers)?,
    };
    let total = per_tier.iter().map(|t| t.charge).sum();
    Ok(TierAllocation { per_tier, total })
}

fn progressive(usage: Decimal, tiers: &[Tier]) -> Vec<TierCharge> {
    let mut per_tier = Vec::new();
    let mut remaining = usage;
    let mut lower = Decimal::ZERO;

    for (index, tier) in tiers.iter().enumerate() {
        if remaining <= Decimal::ZERO {
            break;
        }
        let consumed = match tier.limit {
            TierLimit::Bounded(limit) => remaining.min(limit - lower),
            TierLimit::Unbounded => remaining,
        };
        if consumed > Decimal::ZERO {
            per_tier.push(TierCharge {
                index,
                lower,
                upper: tier.limit,
                rate: tier.rate,
                usage: consumed,
                charge: consumed * tier.rate,
            });
            remaining -= consumed;
        }
        if let TierLimit::Bounded(limit) = tier.limit {
            lower = limit;
        }
    }
    per_tier
}

fn single_rate(usage: Decimal, tiers: &[Tier]) -> DomainResult<Vec<TierCharge>> {
    let mut lower = Decimal::ZERO;
    for (index, tier) in tiers.iter().enumerate() {
        if tier.limit.covers(usage) {
            return Ok(vec![TierCharge {
                index,
                lower,
                upper: tier.limit,
                rate: tier.rate,
                usage,
                charge: usage * tier.rate,
            }]);
        }
        if let TierLimit::Bounded(limit) = tier.limit {
            lower = limit;
        }
    }
    // Unreachable for a validated list: the terminator covers everything.
    Err(DomainError::invalid_tariff("no tier covers the usage"))
}
