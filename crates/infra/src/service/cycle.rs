//! Month-end billing cycle across meters.

use std::thread;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use aquabill_billing::{close_meter_cycle, Bill, CycleInput, Meter};
use aquabill_core::{BillId, BillingPeriod, DomainError, MeterId};

use crate::error::{BillingError, BillingResult};
use crate::store::BillingStore;

use super::BillingService;

/// Which meters a cycle run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterSelector {
    All,
    Meter(MeterId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedBill {
    pub bill_id: BillId,
    pub total_bill_amount: Decimal,
    pub outstanding_amount: Decimal,
}

impl From<&Bill> for ClosedBill {
    fn from(bill: &Bill) -> Self {
        Self {
            bill_id: bill.id_typed(),
            total_bill_amount: bill.total_bill_amount(),
            outstanding_amount: bill.outstanding_amount(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterCycleResult {
    pub meter_id: MeterId,
    pub outcome: BillingResult<ClosedBill>,
}

/// Batch outcome: one result per meter, in meter order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub period: BillingPeriod,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<MeterCycleResult>,
}

impl CycleSummary {
    pub fn new(period: BillingPeriod) -> Self {
        Self {
            period,
            succeeded: 0,
            failed: 0,
            results: Vec::new(),
        }
    }

    pub fn record(&mut self, meter_id: MeterId, outcome: BillingResult<ClosedBill>) {
        match &outcome {
            Ok(_) => self.succeeded += 1,
            Err(_) => self.failed += 1,
        }
        self.results.push(MeterCycleResult { meter_id, outcome });
    }

    pub fn result_for(&self, meter_id: MeterId) -> Option<&MeterCycleResult> {
        self.results.iter().find(|r| r.meter_id == meter_id)
    }
}

impl<S> BillingService<S>
where
    S: BillingStore,
{
    /// Close `period` for the selected meters.
    ///
    /// Meters are independent: a failure is recorded against its meter and
    /// the run continues. With `carry_balance = false` each prior bill is
    /// written off ("mark paid") instead of aged.
    #[instrument(skip(self))]
    pub fn run_billing_cycle(
        &self,
        selector: MeterSelector,
        period: BillingPeriod,
        carry_balance: bool,
    ) -> BillingResult<CycleSummary> {
        let targets: Vec<(MeterId, Option<Meter>)> = match selector {
            MeterSelector::All => self
                .store
                .list_meters()?
                .into_iter()
                .map(|m| (m.id, Some(m)))
                .collect(),
            MeterSelector::Meter(id) => vec![(id, self.store.get_meter(id)?)],
        };

        let outcomes = self.close_all(&targets, period, carry_balance);

        let mut summary = CycleSummary::new(period);
        for ((meter_id, _), outcome) in targets.iter().zip(outcomes) {
            if let Err(e) = &outcome {
                let configuration = e.domain().is_some_and(DomainError::is_configuration);
                warn!(meter_id = %meter_id, configuration, error = %e, "meter cycle close failed");
            }
            summary.record(*meter_id, outcome);
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "billing cycle closed"
        );
        Ok(summary)
    }

    fn close_all(
        &self,
        targets: &[(MeterId, Option<Meter>)],
        period: BillingPeriod,
        carry_balance: bool,
    ) -> Vec<BillingResult<ClosedBill>> {
        let close = |(meter_id, meter): &(MeterId, Option<Meter>)| match meter {
            Some(meter) => self.close_meter(meter, period, carry_balance),
            None => Err(DomainError::not_found(format!("meter {meter_id}")).into()),
        };

        let workers = self.config.cycle_workers.max(1);
        if workers == 1 || targets.len() < 2 {
            return targets.iter().map(close).collect();
        }

        let chunk_size = targets.len().div_ceil(workers);
        thread::scope(|scope| {
            let handles: Vec<_> = targets
                .chunks(chunk_size)
                .map(|chunk| (chunk.len(), scope.spawn(move || chunk.iter().map(close).collect::<Vec<_>>())))
                .collect();

            handles
                .into_iter()
                .flat_map(|(len, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        vec![Err(BillingError::Store("cycle worker panicked".to_string())); len]
                    })
                })
                .collect()
        })
    }

    fn close_meter(
        &self,
        meter: &Meter,
        period: BillingPeriod,
        carry_balance: bool,
    ) -> BillingResult<ClosedBill> {
        let reading = self
            .store
            .get_meter_reading(meter.id)?
            .ok_or_else(|| DomainError::not_found(format!("reading for meter {}", meter.id)))?;
        let prior = self.store.latest_bill_for_meter(meter.id)?;
        let tariff = self.resolve_tariff(meter.customer_type, period.first_day())?;

        let outcome = close_meter_cycle(CycleInput {
            meter,
            meter_size: self.meter_size_of(meter),
            reading,
            prior: prior.as_ref(),
            tariff: &tariff,
            period,
            carry_balance,
            fee_options: self.config.fee_options(),
            due_days: self.config.due_days,
            now: Utc::now(),
        })?;

        self.store.commit_cycle_close(&outcome, prior.as_ref())?;

        info!(
            meter_id = %meter.id,
            bill_id = %outcome.bill.id_typed(),
            total = %outcome.bill.total_bill_amount(),
            written_off = outcome.settled_prior.is_some(),
            "meter cycle closed"
        );
        Ok(ClosedBill::from(&outcome.bill))
    }
}
