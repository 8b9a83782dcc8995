//! Domain records for the loan lifecycle.
//!
//! A loan is created on application and never deleted; closure is
//! modelled by status transitions. Repayments, penalties, guarantees
//! and approval decisions hang off the loan and are written only by
//! their designated actor.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    AdminId, GuarantorStatus, InterestConvention, LoanRef, LoanStatus, LoanType, MemberId, Money,
    PenaltyMethod, PenaltyStatus, RatePercent, RepaymentFrequency, RepaymentPeriod,
    RepaymentStatus,
};

/// A loan issued to a member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub loan_ref: LoanRef,
    pub member: MemberId,
    pub loan_type: LoanType,
    pub principal: Money,
    /// Percent per annum, e.g. 12 for 12%.
    pub interest_rate: RatePercent,
    pub interest_convention: InterestConvention,
    pub term_months: u32,
    pub repayment_frequency: RepaymentFrequency,
    pub repayment_period: RepaymentPeriod,
    pub purpose: String,
    pub has_collateral: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collateral_details: Option<String>,

    pub status: LoanStatus,

    // Frozen on disbursement.
    pub total_interest: Money,
    pub total_repayable: Money,
    pub installment_amount: Money,

    // None until the loan is disbursed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_balance: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest_balance: Option<Money>,

    pub application_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disbursement_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_payment_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maturity_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,

    /// Approver roster frozen at application time. Quorum membership
    /// does not change if the admin roster changes mid-approval.
    pub approver_snapshot: Vec<AdminId>,
    /// Append-only decision records, at most one per admin.
    pub approvals: Vec<ApprovalRecord>,
    pub approvals_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,

    /// Optimistic-lock token, bumped on every committed mutation.
    pub version: u64,
}

impl Loan {
    /// Admins in the frozen snapshot who have not yet decided.
    pub fn remaining_approvers(&self) -> Vec<AdminId> {
        self.approver_snapshot
            .iter()
            .copied()
            .filter(|a| !self.approvals.iter().any(|r| r.admin == *a))
            .collect()
    }

    pub fn has_decided(&self, admin: AdminId) -> bool {
        self.approvals.iter().any(|r| r.admin == admin)
    }

    /// Combined outstanding balance, zero before disbursement.
    pub fn outstanding_balance(&self) -> Money {
        self.principal_balance.unwrap_or_default() + self.interest_balance.unwrap_or_default()
    }
}

/// A single admin's decision on a loan. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub admin: AdminId,
    pub approved: bool,
    pub decision_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

/// A guarantee pledged by another member against a loan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guarantor {
    pub guarantor: MemberId,
    pub guaranteed_amount: Money,
    pub status: GuarantorStatus,
    pub request_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

/// A repayment transaction. The principal/interest split arrives
/// pre-computed from upstream (frozen schedule or explicit allocation);
/// the processor only debits balances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRepayment {
    pub payment_amount: Money,
    pub principal_component: Money,
    pub interest_component: Money,
    pub penalty_component: Money,
    pub payment_date: DateTime<Utc>,
    pub payment_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_number: Option<String>,
    pub status: RepaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_by: Option<AdminId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_balance_after: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest_balance_after: Option<Money>,
}

impl LoanRepayment {
    /// A fresh pending repayment awaiting processing.
    pub fn pending(
        amount: Money,
        principal_component: Money,
        interest_component: Money,
        payment_date: DateTime<Utc>,
        payment_method: impl Into<String>,
        transaction_reference: Option<String>,
    ) -> Self {
        LoanRepayment {
            payment_amount: amount,
            principal_component,
            interest_component,
            penalty_component: Money::ZERO,
            payment_date,
            payment_method: payment_method.into(),
            transaction_reference,
            receipt_number: None,
            status: RepaymentStatus::Pending,
            processed_by: None,
            principal_balance_after: None,
            interest_balance_after: None,
        }
    }
}

/// Configuration for a class of penalty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyType {
    pub name: String,
    pub description: String,
    pub method: PenaltyMethod,
    /// Percentage when method is Percentage, amount when Fixed.
    pub rate_or_amount: Money,
    pub grace_period_days: u32,
    pub active: bool,
}

/// A penalty imposed on a loan. At most one per loan per rolling
/// 30-day delinquency window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Penalty {
    pub penalty_type: String,
    pub amount: Money,
    pub date_imposed: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub status: PenaltyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiver_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waived_by: Option<AdminId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waived_at: Option<DateTime<Utc>>,
}
