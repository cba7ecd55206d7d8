//! Bill workflow transitions.

use chrono::Utc;
use tracing::{info, instrument, warn};

use aquabill_auth::Actor;
use aquabill_billing::{BillStatus, TransitionBill, WorkflowAction, WorkflowLogEntry};
use aquabill_core::{Aggregate, BillId, DomainError, ExpectedVersion};

use crate::error::BillingResult;
use crate::store::BillingStore;

use super::BillingService;

/// Result of an accepted transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub status: BillStatus,
    pub log_entry: WorkflowLogEntry,
}

impl<S> BillingService<S>
where
    S: BillingStore,
{
    pub fn submit_bill(&self, bill_id: BillId, actor: &Actor) -> BillingResult<TransitionOutcome> {
        self.transition(bill_id, WorkflowAction::Submit, None, actor)
    }

    pub fn approve_bill(&self, bill_id: BillId, actor: &Actor) -> BillingResult<TransitionOutcome> {
        self.transition(bill_id, WorkflowAction::Approve, None, actor)
    }

    pub fn reject_bill(
        &self,
        bill_id: BillId,
        reason: &str,
        actor: &Actor,
    ) -> BillingResult<TransitionOutcome> {
        self.transition(bill_id, WorkflowAction::Reject, Some(reason), actor)
    }

    pub fn post_bill(&self, bill_id: BillId, actor: &Actor) -> BillingResult<TransitionOutcome> {
        self.transition(bill_id, WorkflowAction::Post, None, actor)
    }

    pub fn correct_bill(
        &self,
        bill_id: BillId,
        reason: &str,
        actor: &Actor,
    ) -> BillingResult<TransitionOutcome> {
        self.transition(bill_id, WorkflowAction::Correct, Some(reason), actor)
    }

    /// Load, decide, then commit the new status and its log entry together
    /// against the loaded version. Any failure leaves bill and log untouched.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub fn transition(
        &self,
        bill_id: BillId,
        action: WorkflowAction,
        reason: Option<&str>,
        actor: &Actor,
    ) -> BillingResult<TransitionOutcome> {
        let mut bill = self.get_bill(bill_id)?;
        let expected = ExpectedVersion::of(&bill);

        let mut command = TransitionBill::new(bill_id, action, actor.clone(), Utc::now());
        command.reason = reason.map(str::to_string);

        let events = bill.handle(&command).inspect_err(|e| {
            warn!(status = %bill.status(), error = %e, "workflow transition refused");
        })?;
        let [entry]: [WorkflowLogEntry; 1] = events.try_into().map_err(|events: Vec<_>| {
            DomainError::validation(format!(
                "transition must yield exactly one log entry, got {}",
                events.len()
            ))
        })?;

        bill.apply(&entry);
        self.store
            .commit_transition(&bill, expected, entry.clone())
            .inspect_err(|e| warn!(error = %e, "workflow transition not committed"))?;

        info!(
            from = %entry.from_status,
            to = %entry.to_status,
            "bill transitioned"
        );
        Ok(TransitionOutcome {
            status: bill.status(),
            log_entry: entry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BillingConfig;
    use crate::store::InMemoryBillingStore;
    use aquabill_auth::{Capability, CapabilitySet};
    use aquabill_billing::{AgingBuckets, Bill, MeterReading, MeterRef, NewBill};
    use aquabill_core::{AggregateRoot, MeterId, UserId};
    use aquabill_tariffs::{BillCharges, CustomerType, MeterSize};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn service_with_draft() -> (BillingService<InMemoryBillingStore>, BillId) {
        let service = BillingService::new(InMemoryBillingStore::new(), BillingConfig::default());
        let bill = Bill::draft(NewBill {
            id: BillId::new(),
            meter: MeterRef::Individual(MeterId::new()),
            customer_type: CustomerType::Domestic,
            meter_size: MeterSize::half_inch(),
            sewerage_connection: false,
            month_year: "2024-02".parse().unwrap(),
            tariff_effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            reading: MeterReading::new(dec!(10), dec!(10)).unwrap(),
            charges: BillCharges::default(),
            penalty_amount: dec!(0),
            months_overdue: 0,
            carried: AgingBuckets::default(),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 30).unwrap(),
            created_at: Utc::now(),
        })
        .unwrap();
        service.store().save_bill(&bill, ExpectedVersion::Exact(0)).unwrap();
        (service, bill.id_typed())
    }

    fn actor(caps: &[Capability]) -> Actor {
        Actor::new(UserId::new(), caps.iter().copied().collect::<CapabilitySet>())
    }

    #[test]
    fn full_lifecycle_logs_every_step() {
        let (service, id) = service_with_draft();
        let all = Actor::system();

        assert_eq!(service.submit_bill(id, &all).unwrap().status, BillStatus::Pending);
        let rejected = service.reject_bill(id, "reading looks wrong", &all).unwrap();
        assert_eq!(rejected.status, BillStatus::Rework);
        assert_eq!(rejected.log_entry.reason.as_deref(), Some("reading looks wrong"));
        service.submit_bill(id, &all).unwrap();
        service.approve_bill(id, &all).unwrap();
        service.post_bill(id, &all).unwrap();
        let corrected = service.correct_bill(id, "tariff misapplied", &all).unwrap();
        assert_eq!(corrected.status, BillStatus::Corrected);

        let history = service.workflow_history(id).unwrap();
        let steps: Vec<(BillStatus, BillStatus)> =
            history.iter().map(|e| (e.from_status, e.to_status)).collect();
        assert_eq!(
            steps,
            vec![
                (BillStatus::Draft, BillStatus::Pending),
                (BillStatus::Pending, BillStatus::Rework),
                (BillStatus::Rework, BillStatus::Pending),
                (BillStatus::Pending, BillStatus::Approved),
                (BillStatus::Approved, BillStatus::Posted),
                (BillStatus::Posted, BillStatus::Corrected),
            ]
        );
        assert_eq!(service.get_bill(id).unwrap().version(), 6);
    }

    #[test]
    fn refused_transition_leaves_no_trace() {
        let (service, id) = service_with_draft();

        let err = service.post_bill(id, &Actor::system()).unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::InvalidStateTransition { .. })));

        let err = service
            .approve_bill(id, &actor(&[Capability::Submit]))
            .unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::PermissionDenied(_))));

        let bill = service.get_bill(id).unwrap();
        assert_eq!(bill.status(), BillStatus::Draft);
        assert_eq!(bill.version(), 0);
        assert!(service.workflow_history(id).unwrap().is_empty());
    }

    #[test]
    fn unknown_bill_is_not_found() {
        let (service, _) = service_with_draft();
        let err = service.submit_bill(BillId::new(), &Actor::system()).unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::NotFound(_))));
    }
}
