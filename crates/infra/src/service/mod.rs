//! Billing application service.
//!
//! `BillingService` is the entry point UI actions and scheduled jobs call.
//! It loads state through a `BillingStore`, runs the pure tariff and billing
//! rules, and persists the result with optimistic concurrency:
//!
//! ```text
//! Request
//!   ↓
//! 1. Load bill / meter / tariff versions from the store
//!   ↓
//! 2. Decide (pure: fee aggregation, workflow handle, cycle close)
//!   ↓
//! 3. Persist with the version that was loaded
//! ```
//!
//! Workflow transitions live in `workflow`, the month-end batch in `cycle`.

pub mod cycle;
pub mod workflow;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument};

use aquabill_billing::{
    due_date, AgingBuckets, Bill, CycleOutcome, Meter, MeterReading, NewBill, WorkflowLogEntry,
};
use aquabill_core::{BillId, BillingPeriod, DomainError, ExpectedVersion, MeterId};
use aquabill_tariffs::{
    compute_charges, resolve_in, BillCharges, CustomerType, MeterSize, RawTariff, TariffVersion,
};

use crate::config::BillingConfig;
use crate::error::BillingResult;
use crate::store::BillingStore;

pub use cycle::{ClosedBill, CycleSummary, MeterCycleResult, MeterSelector};
pub use workflow::TransitionOutcome;

/// Operator-entered bill outside the cycle close.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualBill {
    pub meter_id: MeterId,
    pub month_year: BillingPeriod,
    pub reading: MeterReading,
    /// Opening balance carried into this bill, before the cycle shift.
    pub opening_balance: AgingBuckets,
}

#[derive(Debug)]
pub struct BillingService<S> {
    store: S,
    config: BillingConfig,
}

impl<S> BillingService<S> {
    pub fn new(store: S, config: BillingConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }
}

impl<S> BillingService<S>
where
    S: BillingStore,
{
    /// Version of `customer_type`'s tariff in effect on `on_or_before`.
    pub fn resolve_tariff(
        &self,
        customer_type: CustomerType,
        on_or_before: chrono::NaiveDate,
    ) -> BillingResult<TariffVersion> {
        let versions = self.store.list_tariff_versions(customer_type)?;
        Ok(resolve_in(&versions, customer_type, on_or_before)?.clone())
    }

    pub fn tariff_versions(&self, customer_type: CustomerType) -> BillingResult<Vec<TariffVersion>> {
        Ok(self.store.list_tariff_versions(customer_type)?)
    }

    #[instrument(skip(self, version), fields(customer_type = %version.customer_type, effective_date = %version.effective_date))]
    pub fn publish_tariff(&self, version: TariffVersion) -> BillingResult<()> {
        self.store.publish_tariff(version)?;
        info!("tariff version published");
        Ok(())
    }

    #[instrument(skip(self, version), fields(customer_type = %version.customer_type, effective_date = %version.effective_date))]
    pub fn amend_tariff(&self, version: TariffVersion) -> BillingResult<()> {
        self.store.amend_tariff(version)?;
        info!("tariff version amended");
        Ok(())
    }

    /// Publish a tariff record in any of its persisted shapes.
    pub fn publish_raw_tariff(&self, raw: &serde_json::Value) -> BillingResult<TariffVersion> {
        let raw: RawTariff = serde_json::from_value(raw.clone())
            .map_err(|e| DomainError::validation(format!("malformed tariff record: {e}")))?;
        let version = raw.normalize()?;
        self.publish_tariff(version.clone())?;
        Ok(version)
    }

    /// Charges for `usage` under the tariff in effect for `month_year`.
    #[instrument(skip(self))]
    pub fn calculate_bill(
        &self,
        usage: Decimal,
        customer_type: CustomerType,
        sewerage_connection: bool,
        meter_size: MeterSize,
        month_year: BillingPeriod,
    ) -> BillingResult<BillCharges> {
        let tariff = self.resolve_tariff(customer_type, month_year.first_day())?;
        Ok(compute_charges(
            usage,
            &tariff,
            &meter_size,
            sewerage_connection,
            self.config.fee_options(),
        )?)
    }

    pub fn get_bill(&self, bill_id: BillId) -> BillingResult<Bill> {
        Ok(self
            .store
            .get_bill(bill_id)?
            .ok_or_else(|| DomainError::not_found(format!("bill {bill_id}")))?)
    }

    pub fn get_meter(&self, meter_id: MeterId) -> BillingResult<Meter> {
        Ok(self
            .store
            .get_meter(meter_id)?
            .ok_or_else(|| DomainError::not_found(format!("meter {meter_id}")))?)
    }

    fn meter_size_of(&self, meter: &Meter) -> MeterSize {
        meter.meter_size.unwrap_or(self.config.default_meter_size)
    }

    /// Add a meter with its opening register value.
    #[instrument(skip(self, meter), fields(meter_id = %meter.id))]
    pub fn register_meter(&self, meter: Meter, opening_reading: Decimal) -> BillingResult<()> {
        let reading = MeterReading::new(opening_reading, opening_reading)?;
        let meter_id = meter.id;
        self.store.put_meter(meter)?;
        self.store.set_meter_reading(meter_id, reading)?;
        info!("meter registered");
        Ok(())
    }

    /// Record the register value read during the open cycle.
    #[instrument(skip(self))]
    pub fn record_meter_reading(&self, meter_id: MeterId, current: Decimal) -> BillingResult<MeterReading> {
        let previous = self
            .store
            .get_meter_reading(meter_id)?
            .ok_or_else(|| DomainError::not_found(format!("reading for meter {meter_id}")))?
            .previous;
        let reading = MeterReading::new(previous, current)?;
        self.store.set_meter_reading(meter_id, reading)?;
        Ok(reading)
    }

    /// Persist an operator-entered Draft bill.
    #[instrument(skip(self, manual), fields(meter_id = %manual.meter_id, month_year = %manual.month_year))]
    pub fn create_manual_bill(&self, manual: ManualBill) -> BillingResult<Bill> {
        let meter = self.get_meter(manual.meter_id)?;
        let latest = self.store.latest_bill_for_meter(meter.id)?;
        if let Some(latest) = &latest {
            if latest.month_year() >= manual.month_year {
                return Err(DomainError::validation(format!(
                    "meter {} already has a bill for {}",
                    meter.id,
                    latest.month_year()
                ))
                .into());
            }
        }
        let open = self
            .store
            .get_meter_reading(meter.id)?
            .ok_or_else(|| DomainError::not_found(format!("reading for meter {}", meter.id)))?;
        if manual.reading.previous != open.previous {
            return Err(DomainError::validation(format!(
                "manual reading starts at {}, open reading for meter {} starts at {}",
                manual.reading.previous, meter.id, open.previous
            ))
            .into());
        }

        let tariff = self.resolve_tariff(meter.customer_type, manual.month_year.first_day())?;
        let meter_size = self.meter_size_of(&meter);
        let charges = compute_charges(
            manual.reading.usage()?,
            &tariff,
            &meter_size,
            meter.sewerage_connection,
            self.config.fee_options(),
        )?;

        let bill = Bill::draft(NewBill {
            id: BillId::new(),
            meter: meter.reference(),
            customer_type: meter.customer_type,
            meter_size,
            sewerage_connection: meter.sewerage_connection,
            month_year: manual.month_year,
            tariff_effective_date: tariff.effective_date,
            reading: manual.reading,
            charges,
            penalty_amount: Decimal::ZERO,
            months_overdue: 0,
            carried: manual.opening_balance,
            due_date: due_date(manual.month_year, self.config.due_days)?,
            created_at: Utc::now(),
        })?;
        let outcome = CycleOutcome {
            settled_prior: None,
            bill,
            next_reading: manual.reading.rolled_over(),
        };
        self.store.commit_cycle_close(&outcome, latest.as_ref())?;

        let bill = outcome.bill;
        info!(bill_id = %bill.id_typed(), total = %bill.total_bill_amount(), "manual bill created");
        Ok(bill)
    }

    /// Re-run the fee aggregation for an editable bill, optionally with
    /// corrected readings.
    #[instrument(skip(self))]
    pub fn recalculate_bill(
        &self,
        bill_id: BillId,
        reading: Option<MeterReading>,
    ) -> BillingResult<Bill> {
        let mut bill = self.get_bill(bill_id)?;
        if !bill.status().is_editable() {
            return Err(DomainError::bill_locked(bill.status()).into());
        }

        let expected = ExpectedVersion::of(&bill);
        let reading = reading.unwrap_or_else(|| bill.reading());
        let tariff = self.resolve_tariff(bill.customer_type(), bill.month_year().first_day())?;
        let charges = compute_charges(
            reading.usage()?,
            &tariff,
            bill.meter_size(),
            bill.sewerage_connection(),
            self.config.fee_options(),
        )?;

        bill.recalculate(reading, charges, tariff.effective_date)?;
        self.store.save_bill(&bill, expected)?;

        info!(total = %bill.total_bill_amount(), "bill recalculated");
        Ok(bill)
    }

    /// Capture full payment of a bill's outstanding balance.
    #[instrument(skip(self))]
    pub fn record_payment(&self, bill_id: BillId) -> BillingResult<Bill> {
        let mut bill = self.get_bill(bill_id)?;
        let expected = ExpectedVersion::of(&bill);
        let settled = bill.outstanding_amount();
        bill.record_payment()?;
        self.store.save_bill(&bill, expected)?;

        info!(amount = %settled, "payment recorded");
        Ok(bill)
    }

    /// Audit trail for a bill, oldest first.
    pub fn workflow_history(&self, bill_id: BillId) -> BillingResult<Vec<WorkflowLogEntry>> {
        self.get_bill(bill_id)?;
        Ok(self.store.workflow_log(bill_id)?)
    }
}
