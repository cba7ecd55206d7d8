use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;

use aquabill_billing::{Bill, CycleOutcome, Meter, MeterReading, WorkflowLogEntry};
use aquabill_core::{AggregateRoot, BillId, DomainError, ExpectedVersion, MeterId};
use aquabill_tariffs::{CustomerType, TariffVersion};

/// Billing store operation error.
///
/// These are **infrastructure errors** (storage, concurrency) as opposed to
/// domain errors (validation, workflow rules). Domain errors raised while a
/// store applies a write (tariff publication rules) are carried through in
/// `Rejected`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("write rejected: {0}")]
    Rejected(#[from] DomainError),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Persistence contract of the billing core.
///
/// ## Bill writes
///
/// Every bill write carries the `ExpectedVersion` the caller loaded. A bill
/// that does not exist yet has version 0. On mismatch the write fails with
/// `StoreError::Concurrency` and nothing is changed.
///
/// ## Workflow log
///
/// The log is append-only. `commit_transition` saves the bill and appends
/// its log entry as one unit: both land or neither does.
pub trait BillingStore: Send + Sync {
    /// Tariff version with exactly this effective date.
    fn get_tariff(
        &self,
        customer_type: CustomerType,
        effective_date: NaiveDate,
    ) -> Result<Option<TariffVersion>, StoreError>;

    /// All versions of a customer type, oldest first.
    fn list_tariff_versions(
        &self,
        customer_type: CustomerType,
    ) -> Result<Vec<TariffVersion>, StoreError>;

    /// Add a version newer than every existing one for its customer type.
    fn publish_tariff(&self, version: TariffVersion) -> Result<(), StoreError>;

    /// Replace the latest version of its customer type.
    fn amend_tariff(&self, version: TariffVersion) -> Result<(), StoreError>;

    fn get_bill(&self, id: BillId) -> Result<Option<Bill>, StoreError>;

    fn save_bill(&self, bill: &Bill, expected_version: ExpectedVersion) -> Result<(), StoreError>;

    /// Most recent bill (by billing period) for a meter.
    fn latest_bill_for_meter(&self, meter_id: MeterId) -> Result<Option<Bill>, StoreError>;

    fn append_workflow_log(&self, entry: WorkflowLogEntry) -> Result<(), StoreError>;

    /// Save a transitioned bill and append its log entry atomically.
    fn commit_transition(
        &self,
        bill: &Bill,
        expected_version: ExpectedVersion,
        entry: WorkflowLogEntry,
    ) -> Result<(), StoreError>;

    /// Log entries for a bill in append order.
    fn workflow_log(&self, bill_id: BillId) -> Result<Vec<WorkflowLogEntry>, StoreError>;

    fn get_meter(&self, id: MeterId) -> Result<Option<Meter>, StoreError>;

    fn list_meters(&self) -> Result<Vec<Meter>, StoreError>;

    fn put_meter(&self, meter: Meter) -> Result<(), StoreError>;

    fn get_meter_reading(&self, meter_id: MeterId) -> Result<Option<MeterReading>, StoreError>;

    fn set_meter_reading(&self, meter_id: MeterId, reading: MeterReading) -> Result<(), StoreError>;

    /// Persist a new bill for a meter together with the rolled-over reading
    /// and, in write-off mode, the settled prior bill.
    ///
    /// `prior` is the latest bill as it was loaded when `outcome` was
    /// computed. The commit is refused if the stored meter no longer matches
    /// it (see `check_cycle_base`). The default implementation issues the
    /// writes one by one; stores that can should override it to check and
    /// write under one lock.
    fn commit_cycle_close(
        &self,
        outcome: &CycleOutcome,
        prior: Option<&Bill>,
    ) -> Result<(), StoreError> {
        let meter_id = outcome.bill.meter().meter_id();
        let latest = self.latest_bill_for_meter(meter_id)?;
        let reading = self.get_meter_reading(meter_id)?;
        check_cycle_base(outcome, prior, latest.as_ref(), reading)?;

        if let (Some(settled), Some(prior)) = (&outcome.settled_prior, prior) {
            self.save_bill(settled, ExpectedVersion::of(prior))?;
        }
        self.save_bill(&outcome.bill, ExpectedVersion::Exact(0))?;
        self.set_meter_reading(meter_id, outcome.next_reading)
    }
}

/// Check that a cycle outcome was computed from the meter's current state.
///
/// - no stored bill for the meter is at or after the new bill's period
/// - the stored latest bill is `prior`, at the version it was loaded at
/// - a written-off bill is that same prior
/// - the open reading starts where the new bill starts, so no consumption
///   is billed twice
pub fn check_cycle_base(
    outcome: &CycleOutcome,
    prior: Option<&Bill>,
    stored_latest: Option<&Bill>,
    stored_reading: Option<MeterReading>,
) -> Result<(), StoreError> {
    let bill = &outcome.bill;
    let meter_id = bill.meter().meter_id();

    if let Some(latest) = stored_latest {
        if latest.month_year() >= bill.month_year() {
            return Err(DomainError::validation(format!(
                "meter {meter_id} already has a bill for {}; cannot bill {}",
                latest.month_year(),
                bill.month_year()
            ))
            .into());
        }
    }

    match (prior, stored_latest) {
        (None, None) => {}
        (Some(prior), Some(latest)) if prior.id_typed() == latest.id_typed() => {
            if !ExpectedVersion::of(prior).matches(latest.version()) {
                return Err(StoreError::Concurrency(format!(
                    "bill {} changed from version {} to {} during cycle close",
                    prior.id_typed(),
                    prior.version(),
                    latest.version()
                )));
            }
        }
        _ => {
            return Err(StoreError::Concurrency(format!(
                "latest bill for meter {meter_id} changed during cycle close"
            )));
        }
    }

    if let Some(settled) = &outcome.settled_prior {
        if prior.map(Bill::id_typed) != Some(settled.id_typed()) {
            return Err(StoreError::Storage(format!(
                "written-off bill {} is not the prior bill of meter {meter_id}",
                settled.id_typed()
            )));
        }
    }

    let reading = stored_reading
        .ok_or_else(|| StoreError::NotFound(format!("reading for meter {meter_id}")))?;
    if reading.previous != bill.previous_reading() {
        return Err(StoreError::Concurrency(format!(
            "open reading for meter {meter_id} starts at {}, bill starts at {}",
            reading.previous,
            bill.previous_reading()
        )));
    }
    Ok(())
}

impl<S> BillingStore for Arc<S>
where
    S: BillingStore + ?Sized,
{
    fn get_tariff(
        &self,
        customer_type: CustomerType,
        effective_date: NaiveDate,
    ) -> Result<Option<TariffVersion>, StoreError> {
        (**self).get_tariff(customer_type, effective_date)
    }

    fn list_tariff_versions(
        &self,
        customer_type: CustomerType,
    ) -> Result<Vec<TariffVersion>, StoreError> {
        (**self).list_tariff_versions(customer_type)
    }

    fn publish_tariff(&self, version: TariffVersion) -> Result<(), StoreError> {
        (**self).publish_tariff(version)
    }

    fn amend_tariff(&self, version: TariffVersion) -> Result<(), StoreError> {
        (**self).amend_tariff(version)
    }

    fn get_bill(&self, id: BillId) -> Result<Option<Bill>, StoreError> {
        (**self).get_bill(id)
    }

    fn save_bill(&self, bill: &Bill, expected_version: ExpectedVersion) -> Result<(), StoreError> {
        (**self).save_bill(bill, expected_version)
    }

    fn latest_bill_for_meter(&self, meter_id: MeterId) -> Result<Option<Bill>, StoreError> {
        (**self).latest_bill_for_meter(meter_id)
    }

    fn append_workflow_log(&self, entry: WorkflowLogEntry) -> Result<(), StoreError> {
        (**self).append_workflow_log(entry)
    }

    fn commit_transition(
        &self,
        bill: &Bill,
        expected_version: ExpectedVersion,
        entry: WorkflowLogEntry,
    ) -> Result<(), StoreError> {
        (**self).commit_transition(bill, expected_version, entry)
    }

    fn workflow_log(&self, bill_id: BillId) -> Result<Vec<WorkflowLogEntry>, StoreError> {
        (**self).workflow_log(bill_id)
    }

    fn get_meter(&self, id: MeterId) -> Result<Option<Meter>, StoreError> {
        (**self).get_meter(id)
    }

    fn list_meters(&self) -> Result<Vec<Meter>, StoreError> {
        (**self).list_meters()
    }

    fn put_meter(&self, meter: Meter) -> Result<(), StoreError> {
        (**self).put_meter(meter)
    }

    fn get_meter_reading(&self, meter_id: MeterId) -> Result<Option<MeterReading>, StoreError> {
        (**self).get_meter_reading(meter_id)
    }

    fn set_meter_reading(&self, meter_id: MeterId, reading: MeterReading) -> Result<(), StoreError> {
        (**self).set_meter_reading(meter_id, reading)
    }

    fn commit_cycle_close(
        &self,
        outcome: &CycleOutcome,
        prior: Option<&Bill>,
    ) -> Result<(), StoreError> {
        (**self).commit_cycle_close(outcome, prior)
    }
}
