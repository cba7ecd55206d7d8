//! Billing domain module.
//!
//! The `Bill` aggregate, its aging ledger, the approval workflow state
//! machine and the per-meter cycle close. Pure domain logic; persistence and
//! orchestration live in the infrastructure crate.

pub mod aging;
pub mod bill;
pub mod cycle;
pub mod meter;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use aging::AgingBuckets;
pub use bill::{Bill, NewBill, PaymentStatus};
pub use cycle::{close_meter_cycle, due_date, CycleInput, CycleOutcome};
pub use meter::{Meter, MeterKind, MeterReading, MeterRef};
pub use workflow::{next_status, BillStatus, TransitionBill, WorkflowAction, WorkflowLogEntry};
