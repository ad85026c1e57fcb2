//! Pure transition rules for the letting workflow.
//!
//! The store applies these inside a transaction; handlers map the
//! outcomes onto HTTP statuses (applied -> 200, duplicate -> 200 no-op,
//! conflicting terminal -> 409).

use crate::model::{JoinRequestStatus, MaintenanceStatus, PaymentStatus, TenancyStatus};

/// The landlord's verdict on a pending join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approve,
    Reject,
}

impl Verdict {
    pub fn target(&self) -> JoinRequestStatus {
        match self {
            Verdict::Approve => JoinRequestStatus::Approved,
            Verdict::Reject => JoinRequestStatus::Rejected,
        }
    }
}

/// Outcome of applying a verdict to a join request. First writer wins:
/// repeating the winning verdict is a no-op, contradicting it is a
/// conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    /// The request was pending and the verdict was applied.
    Applied,
    /// The request already carries this verdict; nothing to do.
    AlreadyApplied,
    /// The request was resolved the other way.
    Conflict { current: JoinRequestStatus },
}

/// Decide how a verdict lands on a request in `current` state.
pub fn decide_join_request(current: JoinRequestStatus, verdict: Verdict) -> DecisionOutcome {
    match current {
        JoinRequestStatus::Pending => DecisionOutcome::Applied,
        terminal if terminal == verdict.target() => DecisionOutcome::AlreadyApplied,
        terminal => DecisionOutcome::Conflict { current: terminal },
    }
}

/// Maintenance moves forward only: open -> in_progress -> resolved, with
/// open -> resolved allowed for issues fixed on the spot.
pub fn maintenance_transition_allowed(from: MaintenanceStatus, to: MaintenanceStatus) -> bool {
    matches!(
        (from, to),
        (MaintenanceStatus::Open, MaintenanceStatus::InProgress)
            | (MaintenanceStatus::Open, MaintenanceStatus::Resolved)
            | (MaintenanceStatus::InProgress, MaintenanceStatus::Resolved)
    )
}

/// Only pending payments can be settled (confirmed or failed).
pub fn payment_settle_allowed(current: PaymentStatus) -> bool {
    current == PaymentStatus::Pending
}

/// Only active tenancies can be ended.
pub fn tenancy_end_allowed(current: TenancyStatus) -> bool {
    current == TenancyStatus::Active
}
