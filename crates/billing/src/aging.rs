//! Aging ledger: unpaid balance by cycles outstanding.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 0-30 / 30-60 / 60+ day buckets.
///
/// The outstanding amount is always derived from the buckets; it is never
/// stored on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingBuckets {
    pub debit_30: Decimal,
    pub debit_30_60: Decimal,
    pub debit_60: Decimal,
}

impl AgingBuckets {
    pub fn new(debit_30: Decimal, debit_30_60: Decimal, debit_60: Decimal) -> Self {
        Self {
            debit_30,
            debit_30_60,
            debit_60,
        }
    }

    pub fn outstanding(&self) -> Decimal {
        self.debit_30 + self.debit_30_60 + self.debit_60
    }

    pub fn is_clear(&self) -> bool {
        self.outstanding().is_zero()
    }

    /// Age every bucket by one cycle and open a new 0-30 bucket holding this
    /// cycle's bill.
    pub fn shift(&self, cycle_total: Decimal) -> AgingBuckets {
        AgingBuckets {
            debit_30: cycle_total,
            debit_30_60: self.debit_30,
            debit_60: self.debit_30_60 + self.debit_60,
        }
    }

    /// Replace the current-cycle bucket (used when a draft is recalculated).
    pub fn with_current(&self, cycle_total: Decimal) -> AgingBuckets {
        AgingBuckets {
            debit_30: cycle_total,
            ..*self
        }
    }

    pub fn cleared() -> AgingBuckets {
        AgingBuckets::default()
    }
}
