//! Repayment processing.
//!
//! A repayment arrives with its principal/interest split already
//! decided upstream (frozen schedule or explicit allocation). The
//! processor only debits the loan balances, advances the status and
//! snapshots the balances-after for audit. The fully-paid check uses
//! `<= 0` so an overpaying final installment still closes the loan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LoanError;
use crate::model::{Loan, LoanRepayment};
use crate::types::{AdminId, LoanStatus, Money, RepaymentStatus};
use crate::LoanResult;

/// Result of processing one repayment, returned to the payment
/// collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub success: bool,
    pub new_status: LoanStatus,
    pub principal_balance: Money,
    pub interest_balance: Money,
}

/// Apply a pending repayment to the loan balances.
pub fn process_payment(
    loan: &mut Loan,
    repayment: &mut LoanRepayment,
    processed_by: Option<AdminId>,
) -> LoanResult<PaymentOutcome> {
    if repayment.status != RepaymentStatus::Pending {
        return Err(LoanError::InvalidTransition {
            action: "process",
            status: loan.status,
            required: "a PENDING repayment",
        });
    }

    let principal_balance =
        loan.principal_balance.ok_or(LoanError::InvalidTransition {
            action: "process a repayment against",
            status: loan.status,
            required: "DISBURSED or ACTIVE",
        })? - repayment.principal_component;
    let interest_balance =
        loan.interest_balance.ok_or(LoanError::InvalidTransition {
            action: "process a repayment against",
            status: loan.status,
            required: "DISBURSED or ACTIVE",
        })? - repayment.interest_component;

    loan.principal_balance = Some(principal_balance);
    loan.interest_balance = Some(interest_balance);

    if principal_balance <= Money::ZERO && interest_balance <= Money::ZERO {
        loan.status = LoanStatus::FullyPaid;
    } else if loan.status == LoanStatus::Disbursed {
        // The first processed payment activates the loan.
        loan.status = LoanStatus::Active;
    }

    repayment.status = RepaymentStatus::Processed;
    repayment.processed_by = processed_by;
    repayment.principal_balance_after = Some(principal_balance);
    repayment.interest_balance_after = Some(interest_balance);

    Ok(PaymentOutcome {
        success: true,
        new_status: loan.status,
        principal_balance,
        interest_balance,
    })
}

/// Mark a pending repayment as failed. No balance mutation.
pub fn fail_payment(loan: &Loan, repayment: &mut LoanRepayment) -> LoanResult<()> {
    if repayment.status != RepaymentStatus::Pending {
        return Err(LoanError::InvalidTransition {
            action: "fail",
            status: loan.status,
            required: "a PENDING repayment",
        });
    }
    repayment.status = RepaymentStatus::Failed;
    Ok(())
}
