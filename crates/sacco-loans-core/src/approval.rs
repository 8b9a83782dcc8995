//! Multi-admin approval workflow.
//!
//! The approver set is frozen at application time. Approval requires
//! every member of the snapshot; rejection requires only one admin —
//! a single veto is authoritative. The asymmetry is deliberate and
//! matches the organisation's rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LoanError;
use crate::model::{ApprovalRecord, Loan};
use crate::types::{AdminId, LoanStatus};
use crate::LoanResult;

/// Outcome of recording one approval decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    pub new_status: LoanStatus,
    pub remaining_approvers: usize,
}

/// Move an application into review. Applied → UnderReview only.
pub fn send_to_review(loan: &mut Loan) -> LoanResult<()> {
    if loan.status != LoanStatus::Applied {
        return Err(LoanError::InvalidTransition {
            action: "send to review",
            status: loan.status,
            required: "APPLIED",
        });
    }
    loan.status = LoanStatus::UnderReview;
    Ok(())
}

/// Record one admin's approval. When the last outstanding approver
/// decides, the loan atomically becomes Approved.
pub fn record_approval(
    loan: &mut Loan,
    admin: AdminId,
    now: DateTime<Utc>,
) -> LoanResult<ApprovalOutcome> {
    if !loan.status.is_decidable() {
        return Err(LoanError::InvalidTransition {
            action: "approve",
            status: loan.status,
            required: "APPLIED or UNDER_REVIEW",
        });
    }
    if !loan.approver_snapshot.contains(&admin) {
        return Err(LoanError::NotAuthorized {
            actor: format!("admin {}", admin.0),
            action: "approve this loan",
        });
    }
    // Decisions are idempotent in the strict sense: a second decision
    // from the same admin is rejected, never re-counted.
    if loan.has_decided(admin) {
        return Err(LoanError::NotAuthorized {
            actor: format!("admin {}", admin.0),
            action: "decide twice on the same loan",
        });
    }

    loan.approvals.push(ApprovalRecord {
        admin,
        approved: true,
        decision_date: now,
        comments: None,
    });

    let remaining = loan.remaining_approvers().len();
    if remaining == 0 {
        loan.status = LoanStatus::Approved;
        loan.approvals_completed = true;
        loan.approval_date = Some(now);
    }

    Ok(ApprovalOutcome {
        new_status: loan.status,
        remaining_approvers: remaining,
    })
}

/// Reject the application. One veto moves the loan to Rejected no
/// matter how many approvals remain pending.
pub fn reject(
    loan: &mut Loan,
    admin: AdminId,
    reason: &str,
    now: DateTime<Utc>,
) -> LoanResult<ApprovalOutcome> {
    if reason.trim().is_empty() {
        return Err(LoanError::InvalidInput {
            field: "rejection_reason".into(),
            reason: "Rejection reason is required".into(),
        });
    }
    if !loan.status.is_decidable() {
        return Err(LoanError::InvalidTransition {
            action: "reject",
            status: loan.status,
            required: "APPLIED or UNDER_REVIEW",
        });
    }
    if !loan.approver_snapshot.contains(&admin) {
        return Err(LoanError::NotAuthorized {
            actor: format!("admin {}", admin.0),
            action: "reject this loan",
        });
    }
    if loan.has_decided(admin) {
        return Err(LoanError::NotAuthorized {
            actor: format!("admin {}", admin.0),
            action: "decide twice on the same loan",
        });
    }

    loan.approvals.push(ApprovalRecord {
        admin,
        approved: false,
        decision_date: now,
        comments: Some(reason.to_string()),
    });
    loan.status = LoanStatus::Rejected;
    loan.rejection_reason = Some(reason.to_string());

    Ok(ApprovalOutcome {
        new_status: LoanStatus::Rejected,
        remaining_approvers: loan.remaining_approvers().len(),
    })
}
