use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Interest rates expressed as percent per annum (12 = 12% p.a.),
/// matching how SACCO loan products are quoted.
pub type RatePercent = Decimal;

/// Member account identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub u64);

/// Administrator (loan approver) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdminId(pub u64);

/// Human-readable loan reference, e.g. `L2026082517`.
pub type LoanRef = String;

/// Build a loan reference from the application date and a sequential id.
pub fn make_loan_ref(date: NaiveDate, seq: u64) -> LoanRef {
    format!("L{}{}", date.format("%Y%m%d"), seq)
}

/// Loan product category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanType {
    Personal,
    Business,
    Emergency,
    Education,
    Asset,
}

/// Loan lifecycle status. Closed set; every transition is handled
/// exhaustively by the workflow modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Applied,
    UnderReview,
    Approved,
    Disbursed,
    Active,
    FullyPaid,
    Defaulted,
    WrittenOff,
    Rejected,
}

impl LoanStatus {
    /// Statuses that block a member from taking another loan and that
    /// count as "live" for penalty sweeps and portfolio statistics.
    pub fn is_outstanding(self) -> bool {
        matches!(
            self,
            LoanStatus::Approved | LoanStatus::Disbursed | LoanStatus::Active
        )
    }

    /// Statuses from which an approval decision may still be recorded.
    pub fn is_decidable(self) -> bool {
        matches!(self, LoanStatus::Applied | LoanStatus::UnderReview)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoanStatus::Applied => "APPLIED",
            LoanStatus::UnderReview => "UNDER_REVIEW",
            LoanStatus::Approved => "APPROVED",
            LoanStatus::Disbursed => "DISBURSED",
            LoanStatus::Active => "ACTIVE",
            LoanStatus::FullyPaid => "FULLY_PAID",
            LoanStatus::Defaulted => "DEFAULTED",
            LoanStatus::WrittenOff => "WRITTEN_OFF",
            LoanStatus::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

/// How interest is charged over the life of the loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterestConvention {
    /// Interest on the original principal for the full term.
    Flat,
    /// Interest each period on the outstanding principal.
    ReducingBalance,
}

/// Cadence of scheduled installments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepaymentFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

/// Interval driving the loan's rolling due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepaymentPeriod {
    Monthly,
    TwoMonths,
    ThreeMonths,
    FourMonths,
}

impl RepaymentPeriod {
    pub fn months(self) -> u32 {
        match self {
            RepaymentPeriod::Monthly => 1,
            RepaymentPeriod::TwoMonths => 2,
            RepaymentPeriod::ThreeMonths => 3,
            RepaymentPeriod::FourMonths => 4,
        }
    }
}

/// Guarantee invitation status. Only the invited guarantor may move it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuarantorStatus {
    Requested,
    Accepted,
    Rejected,
}

/// Repayment processing status. Pending moves to Processed or Failed
/// exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepaymentStatus {
    Pending,
    Processed,
    Failed,
}

/// Penalty instance status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PenaltyStatus {
    Imposed,
    Paid,
    Waived,
}

/// How a penalty type computes its charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PenaltyMethod {
    /// Fixed amount per imposition.
    Fixed,
    /// Percentage of the outstanding principal balance.
    Percentage,
}
