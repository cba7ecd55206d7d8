//! Bill approval workflow: statuses, actions, the transition table and the
//! audit log entry every accepted transition produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use aquabill_auth::{Actor, Capability};
use aquabill_core::{BillId, UserId};

/// Bill lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    Draft,
    Pending,
    Rework,
    Approved,
    Posted,
    Corrected,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Draft => "draft",
            BillStatus::Pending => "pending",
            BillStatus::Rework => "rework",
            BillStatus::Approved => "approved",
            BillStatus::Posted => "posted",
            BillStatus::Corrected => "corrected",
        }
    }

    /// Charge fields may only change in these statuses.
    pub fn is_editable(&self) -> bool {
        matches!(
            self,
            BillStatus::Draft | BillStatus::Rework | BillStatus::Corrected
        )
    }
}

impl core::fmt::Display for BillStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowAction {
    Submit,
    Approve,
    Reject,
    Post,
    Correct,
}

impl WorkflowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowAction::Submit => "submit",
            WorkflowAction::Approve => "approve",
            WorkflowAction::Reject => "reject",
            WorkflowAction::Post => "post",
            WorkflowAction::Correct => "correct",
        }
    }

    pub fn required_capability(&self) -> Capability {
        match self {
            WorkflowAction::Submit => Capability::Submit,
            WorkflowAction::Approve => Capability::Approve,
            WorkflowAction::Reject => Capability::Reject,
            WorkflowAction::Post => Capability::Post,
            WorkflowAction::Correct => Capability::Correct,
        }
    }

    pub fn requires_reason(&self) -> bool {
        matches!(self, WorkflowAction::Reject | WorkflowAction::Correct)
    }
}

impl core::fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transition table. `None` means the action is not allowed from `from`.
pub fn next_status(from: BillStatus, action: WorkflowAction) -> Option<BillStatus> {
    use BillStatus::*;
    use WorkflowAction::*;

    match (from, action) {
        (Draft | Rework | Corrected, Submit) => Some(Pending),
        (Pending, Approve) => Some(Approved),
        (Pending, Reject) => Some(Rework),
        (Approved, Post) => Some(Posted),
        (Posted, Correct) => Some(Corrected),
        _ => None,
    }
}

/// Command: apply a workflow action to a bill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionBill {
    pub bill_id: BillId,
    pub action: WorkflowAction,
    pub reason: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

impl TransitionBill {
    pub fn new(bill_id: BillId, action: WorkflowAction, actor: Actor, occurred_at: DateTime<Utc>) -> Self {
        Self {
            bill_id,
            action,
            reason: None,
            actor,
            occurred_at,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Append-only audit record of one status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowLogEntry {
    pub entry_id: Uuid,
    pub bill_id: BillId,
    pub action: WorkflowAction,
    pub from_status: BillStatus,
    pub to_status: BillStatus,
    pub reason: Option<String>,
    pub changed_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [BillStatus; 6] = [
        BillStatus::Draft,
        BillStatus::Pending,
        BillStatus::Rework,
        BillStatus::Approved,
        BillStatus::Posted,
        BillStatus::Corrected,
    ];

    const ALL_ACTIONS: [WorkflowAction; 5] = [
        WorkflowAction::Submit,
        WorkflowAction::Approve,
        WorkflowAction::Reject,
        WorkflowAction::Post,
        WorkflowAction::Correct,
    ];

    #[test]
    fn table_allows_exactly_the_documented_transitions() {
        let allowed: Vec<(BillStatus, WorkflowAction, BillStatus)> = ALL_STATUSES
            .iter()
            .flat_map(|from| {
                ALL_ACTIONS
                    .iter()
                    .filter_map(move |action| next_status(*from, *action).map(|to| (*from, *action, to)))
            })
            .collect();

        assert_eq!(
            allowed,
            vec![
                (BillStatus::Draft, WorkflowAction::Submit, BillStatus::Pending),
                (BillStatus::Pending, WorkflowAction::Approve, BillStatus::Approved),
                (BillStatus::Pending, WorkflowAction::Reject, BillStatus::Rework),
                (BillStatus::Rework, WorkflowAction::Submit, BillStatus::Pending),
                (BillStatus::Approved, WorkflowAction::Post, BillStatus::Posted),
                (BillStatus::Posted, WorkflowAction::Correct, BillStatus::Corrected),
                (BillStatus::Corrected, WorkflowAction::Submit, BillStatus::Pending),
            ]
        );
    }

    #[test]
    fn editable_statuses() {
        let editable: Vec<BillStatus> = ALL_STATUSES.into_iter().filter(|s| s.is_editable()).collect();
        assert_eq!(
            editable,
            vec![BillStatus::Draft, BillStatus::Rework, BillStatus::Corrected]
        );
    }

    #[test]
    fn reject_and_correct_need_reasons() {
        let needing: Vec<WorkflowAction> =
            ALL_ACTIONS.into_iter().filter(|a| a.requires_reason()).collect();
        assert_eq!(needing, vec![WorkflowAction::Reject, WorkflowAction::Correct]);
    }
}
