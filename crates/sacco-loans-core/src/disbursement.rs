//! Disbursement: the one-shot transition from Approved to Disbursed.
//!
//! Disbursement freezes the loan's financial shape: the amortization
//! totals, the opening balances, and the maturity/due dates. Maturity
//! uses a fixed 30-day-month convention rather than calendar months.

use chrono::{DateTime, Days, Utc};

use crate::amortization::ScheduleTotals;
use crate::error::LoanError;
use crate::model::Loan;
use crate::types::LoanStatus;
use crate::LoanResult;

const DAYS_PER_TERM_MONTH: u64 = 30;

/// Disburse an approved loan.
///
/// Balances are seeded only if not already set, so the transition is
/// one-shot: a repeated call fails the status guard and can never
/// re-initialise the balance fields.
pub fn disburse(
    loan: &mut Loan,
    first_payment_date: chrono::NaiveDate,
    now: DateTime<Utc>,
) -> LoanResult<()> {
    if loan.status != LoanStatus::Approved {
        return Err(LoanError::InvalidTransition {
            action: "disburse",
            status: loan.status,
            required: "APPROVED",
        });
    }

    loan.status = LoanStatus::Disbursed;
    loan.disbursement_date = Some(now);
    loan.first_payment_date = Some(first_payment_date);

    if loan.principal_balance.is_none() {
        let totals = ScheduleTotals::compute(
            loan.principal,
            loan.interest_rate,
            loan.term_months,
            loan.interest_convention,
        )?;
        loan.total_interest = totals.total_interest;
        loan.total_repayable = totals.total_repayable;
        loan.installment_amount = totals.installment_amount;
        loan.principal_balance = Some(loan.principal);
        loan.interest_balance = Some(totals.total_interest);
    }

    if loan.maturity_date.is_none() {
        loan.maturity_date = Some(
            now.date_naive() + Days::new(DAYS_PER_TERM_MONTH * u64::from(loan.term_months)),
        );
    }
    if loan.due_date.is_none() {
        loan.due_date = Some(
            now.date_naive()
                + Days::new(DAYS_PER_TERM_MONTH * u64::from(loan.repayment_period.months())),
        );
    }

    Ok(())
}
