//! Bill aggregate: charges, aging, payment state and workflow status.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use aquabill_auth::authorize;
use aquabill_core::{
    round_money, Aggregate, AggregateRoot, BillId, BillingPeriod, DomainError, DomainResult,
};
use aquabill_tariffs::{BillCharges, CustomerType, MeterSize};

use crate::aging::AgingBuckets;
use crate::meter::{MeterReading, MeterRef};
use crate::workflow::{next_status, BillStatus, TransitionBill, WorkflowLogEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
}

/// Input for a new Draft bill, from the cycle closer or manual entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBill {
    pub id: BillId,
    pub meter: MeterRef,
    pub customer_type: CustomerType,
    pub meter_size: MeterSize,
    pub sewerage_connection: bool,
    pub month_year: BillingPeriod,
    pub tariff_effective_date: NaiveDate,
    pub reading: MeterReading,
    pub charges: BillCharges,
    pub penalty_amount: Decimal,
    pub months_overdue: u32,
    /// Buckets inherited from the prior bill, before this cycle's shift.
    pub carried: AgingBuckets,
    pub due_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Aggregate root: Bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    id: BillId,
    meter: MeterRef,
    customer_type: CustomerType,
    meter_size: MeterSize,
    sewerage_connection: bool,
    month_year: BillingPeriod,
    tariff_effective_date: NaiveDate,
    previous_reading: Decimal,
    current_reading: Decimal,
    charges: BillCharges,
    penalty_amount: Decimal,
    months_overdue: u32,
    aging: AgingBuckets,
    total_bill_amount: Decimal,
    payment_status: PaymentStatus,
    written_off: bool,
    status: BillStatus,
    due_date: NaiveDate,
    created_at: DateTime<Utc>,
    version: u64,
}

impl Bill {
    /// Create a bill in Draft.
    ///
    /// The total is this cycle's charges plus any penalty; the aging buckets
    /// are the carried buckets shifted by one cycle with the total opening
    /// the 0-30 bucket.
    pub fn draft(new: NewBill) -> DomainResult<Self> {
        let usage = new.reading.usage()?;
        if usage != new.charges.usage {
            return Err(DomainError::validation(format!(
                "charges were computed for usage {} but readings give {}",
                new.charges.usage, usage
            )));
        }
        if new.penalty_amount < Decimal::ZERO {
            return Err(DomainError::validation("penalty amount must not be negative"));
        }

        let total_bill_amount = round_money(new.charges.total + new.penalty_amount);

        Ok(Self {
            id: new.id,
            meter: new.meter,
            customer_type: new.customer_type,
            meter_size: new.meter_size,
            sewerage_connection: new.sewerage_connection,
            month_year: new.month_year,
            tariff_effective_date: new.tariff_effective_date,
            previous_reading: new.reading.previous,
            current_reading: new.reading.current,
            charges: new.charges,
            penalty_amount: new.penalty_amount,
            months_overdue: new.months_overdue,
            aging: new.carried.shift(total_bill_amount),
            total_bill_amount,
            payment_status: PaymentStatus::Unpaid,
            written_off: false,
            status: BillStatus::Draft,
            due_date: new.due_date,
            created_at: new.created_at,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> BillId {
        self.id
    }

    pub fn meter(&self) -> MeterRef {
        self.meter
    }

    pub fn customer_type(&self) -> CustomerType {
        self.customer_type
    }

    pub fn meter_size(&self) -> &MeterSize {
        &self.meter_size
    }

    pub fn sewerage_connection(&self) -> bool {
        self.sewerage_connection
    }

    pub fn month_year(&self) -> BillingPeriod {
        self.month_year
    }

    pub fn tariff_effective_date(&self) -> NaiveDate {
        self.tariff_effective_date
    }

    pub fn previous_reading(&self) -> Decimal {
        self.previous_reading
    }

    pub fn current_reading(&self) -> Decimal {
        self.current_reading
    }

    pub fn reading(&self) -> MeterReading {
        MeterReading {
            previous: self.previous_reading,
            current: self.current_reading,
        }
    }

    pub fn usage(&self) -> Decimal {
        self.charges.usage
    }

    pub fn charges(&self) -> &BillCharges {
        &self.charges
    }

    pub fn penalty_amount(&self) -> Decimal {
        self.penalty_amount
    }

    pub fn months_overdue(&self) -> u32 {
        self.months_overdue
    }

    pub fn aging(&self) -> AgingBuckets {
        self.aging
    }

    pub fn total_bill_amount(&self) -> Decimal {
        self.total_bill_amount
    }

    pub fn outstanding_amount(&self) -> Decimal {
        self.aging.outstanding()
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    /// Settled by a cycle close with `carry_balance = false`, not by a payment.
    pub fn is_written_off(&self) -> bool {
        self.written_off
    }

    pub fn status(&self) -> BillStatus {
        self.status
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn ensure_editable(&self) -> DomainResult<()> {
        if self.status.is_editable() {
            Ok(())
        } else {
            Err(DomainError::bill_locked(self.status))
        }
    }

    /// Replace readings and charges. Penalty and inherited buckets are kept.
    pub fn recalculate(
        &mut self,
        reading: MeterReading,
        charges: BillCharges,
        tariff_effective_date: NaiveDate,
    ) -> DomainResult<()> {
        self.ensure_editable()?;

        let usage = reading.usage()?;
        if usage != charges.usage {
            return Err(DomainError::validation(format!(
                "charges were computed for usage {} but readings give {}",
                charges.usage, usage
            )));
        }

        let total_bill_amount = round_money(charges.total + self.penalty_amount);
        self.previous_reading = reading.previous;
        self.current_reading = reading.current;
        self.charges = charges;
        self.tariff_effective_date = tariff_effective_date;
        self.total_bill_amount = total_bill_amount;
        self.aging = self.aging.with_current(total_bill_amount);
        self.version += 1;
        Ok(())
    }

    /// Capture a full payment: every bucket goes to zero.
    pub fn record_payment(&mut self) -> DomainResult<()> {
        if self.payment_status == PaymentStatus::Paid && self.aging.is_clear() {
            return Err(DomainError::validation(format!("bill {} is already paid", self.id)));
        }
        self.payment_status = PaymentStatus::Paid;
        self.aging = AgingBuckets::cleared();
        self.version += 1;
        Ok(())
    }

    /// Zero the balance without capturing a payment ("mark paid" at cycle close).
    pub fn write_off(&mut self) {
        self.payment_status = PaymentStatus::Paid;
        self.written_off = true;
        self.aging = AgingBuckets::cleared();
        self.version += 1;
    }
}

impl AggregateRoot for Bill {
    type Id = BillId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for Bill {
    type Command = TransitionBill;
    type Event = WorkflowLogEntry;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        self.status = event.to_status;

        // +1 per applied event.
        self.version += 1;
    }

    /// Capability, then transition table, then the reason requirement.
    /// Accepted commands yield exactly one log entry.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if command.bill_id != self.id {
            return Err(DomainError::validation(format!(
                "command for bill {} sent to bill {}",
                command.bill_id, self.id
            )));
        }

        authorize(&command.actor, command.action.required_capability())?;

        let to_status = next_status(self.status, command.action)
            .ok_or_else(|| DomainError::invalid_transition(self.status, command.action))?;

        let reason = command
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        if command.action.requires_reason() && reason.is_none() {
            return Err(DomainError::validation(format!(
                "a reason is required to {} a bill",
                command.action
            )));
        }

        Ok(vec![WorkflowLogEntry {
            entry_id: Uuid::now_v7(),
            bill_id: self.id,
            action: command.action,
            from_status: self.status,
            to_status,
            reason,
            changed_by: command.actor.user_id,
            created_at: command.occurred_at,
        }])
    }
}
