use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;

use aquabill_billing::{Bill, CycleOutcome, Meter, MeterReading, WorkflowLogEntry};
use aquabill_core::{AggregateRoot, BillId, ExpectedVersion, MeterId};
use aquabill_tariffs::{CustomerType, TariffCatalog, TariffVersion};

use super::r#trait::{check_cycle_base, BillingStore, StoreError};

#[derive(Debug, Default)]
struct StoreState {
    tariffs: TariffCatalog,
    bills: HashMap<BillId, Bill>,
    workflow_log: HashMap<BillId, Vec<WorkflowLogEntry>>,
    meters: HashMap<MeterId, Meter>,
    readings: HashMap<MeterId, MeterReading>,
}

impl StoreState {
    fn check_bill_version(&self, bill: &Bill, expected: ExpectedVersion) -> Result<(), StoreError> {
        let current = self
            .bills
            .get(&bill.id_typed())
            .map(|stored| stored.version())
            .unwrap_or(0);
        expected
            .check(current)
            .map_err(|err| StoreError::Concurrency(format!("bill {}: {err}", bill.id_typed())))
    }

    fn latest_for_meter(&self, meter_id: MeterId) -> Option<&Bill> {
        self.bills
            .values()
            .filter(|bill| bill.meter().meter_id() == meter_id)
            .max_by_key(|bill| (bill.month_year(), bill.created_at()))
    }

    fn put_bill(&mut self, bill: &Bill) {
        self.bills.insert(bill.id_typed(), bill.clone());
    }
}

/// In-memory billing store.
///
/// Intended for tests/dev. One lock guards all state, so multi-record
/// commits are atomic.
#[derive(Debug, Default)]
pub struct InMemoryBillingStore {
    state: RwLock<StoreState>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))
    }
}

impl BillingStore for InMemoryBillingStore {
    fn get_tariff(
        &self,
        customer_type: CustomerType,
        effective_date: NaiveDate,
    ) -> Result<Option<TariffVersion>, StoreError> {
        Ok(self.read()?.tariffs.get(customer_type, effective_date).cloned())
    }

    fn list_tariff_versions(
        &self,
        customer_type: CustomerType,
    ) -> Result<Vec<TariffVersion>, StoreError> {
        Ok(self
            .read()?
            .tariffs
            .versions(customer_type)
            .into_iter()
            .cloned()
            .collect())
    }

    fn publish_tariff(&self, version: TariffVersion) -> Result<(), StoreError> {
        self.write()?.tariffs.publish(version)?;
        Ok(())
    }

    fn amend_tariff(&self, version: TariffVersion) -> Result<(), StoreError> {
        self.write()?.tariffs.amend(version)?;
        Ok(())
    }

    fn get_bill(&self, id: BillId) -> Result<Option<Bill>, StoreError> {
        Ok(self.read()?.bills.get(&id).cloned())
    }

    fn save_bill(&self, bill: &Bill, expected_version: ExpectedVersion) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state.check_bill_version(bill, expected_version)?;
        state.put_bill(bill);
        Ok(())
    }

    fn latest_bill_for_meter(&self, meter_id: MeterId) -> Result<Option<Bill>, StoreError> {
        Ok(self.read()?.latest_for_meter(meter_id).cloned())
    }

    fn append_workflow_log(&self, entry: WorkflowLogEntry) -> Result<(), StoreError> {
        self.write()?
            .workflow_log
            .entry(entry.bill_id)
            .or_default()
            .push(entry);
        Ok(())
    }

    fn commit_transition(
        &self,
        bill: &Bill,
        expected_version: ExpectedVersion,
        entry: WorkflowLogEntry,
    ) -> Result<(), StoreError> {
        if entry.bill_id != bill.id_typed() {
            return Err(StoreError::Storage(format!(
                "log entry for bill {} committed with bill {}",
                entry.bill_id,
                bill.id_typed()
            )));
        }

        let mut state = self.write()?;
        if !state.bills.contains_key(&bill.id_typed()) {
            return Err(StoreError::NotFound(format!("bill {}", bill.id_typed())));
        }
        state.check_bill_version(bill, expected_version)?;
        state.put_bill(bill);
        state
            .workflow_log
            .entry(entry.bill_id)
            .or_default()
            .push(entry);
        Ok(())
    }

    fn workflow_log(&self, bill_id: BillId) -> Result<Vec<WorkflowLogEntry>, StoreError> {
        Ok(self
            .read()?
            .workflow_log
            .get(&bill_id)
            .cloned()
            .unwrap_or_default())
    }

    fn get_meter(&self, id: MeterId) -> Result<Option<Meter>, StoreError> {
        Ok(self.read()?.meters.get(&id).cloned())
    }

    fn list_meters(&self) -> Result<Vec<Meter>, StoreError> {
        let mut meters: Vec<Meter> = self.read()?.meters.values().cloned().collect();
        meters.sort_by_key(|m| m.id);
        Ok(meters)
    }

    fn put_meter(&self, meter: Meter) -> Result<(), StoreError> {
        self.write()?.meters.insert(meter.id, meter);
        Ok(())
    }

    fn get_meter_reading(&self, meter_id: MeterId) -> Result<Option<MeterReading>, StoreError> {
        Ok(self.read()?.readings.get(&meter_id).copied())
    }

    fn set_meter_reading(&self, meter_id: MeterId, reading: MeterReading) -> Result<(), StoreError> {
        self.write()?.readings.insert(meter_id, reading);
        Ok(())
    }

    fn commit_cycle_close(
        &self,
        outcome: &CycleOutcome,
        prior: Option<&Bill>,
    ) -> Result<(), StoreError> {
        let meter_id = outcome.bill.meter().meter_id();
        let mut state = self.write()?;

        check_cycle_base(
            outcome,
            prior,
            state.latest_for_meter(meter_id),
            state.readings.get(&meter_id).copied(),
        )?;

        if let Some(settled) = &outcome.settled_prior {
            state.put_bill(settled);
        }
        state.put_bill(&outcome.bill);
        state.readings.insert(meter_id, outcome.next_reading);
        Ok(())
    }
}
