//! Late-payment penalty accrual.
//!
//! The sweep is a periodic batch job, not request-driven. A loan is
//! delinquent when no processed repayment landed in the trailing 30
//! days and disbursement itself is more than 30 days old. The
//! existence check for a penalty in the same trailing window runs
//! inside the loan's own store transaction, which is what makes the
//! sweep idempotent: two back-to-back runs, or two concurrent runs,
//! can never double-charge a loan within one window.
//!
//! The rolling 30-day window approximates per-installment delinquency
//! rather than checking the frozen schedule's due dates; that is the
//! organisation's rule as it stands.

use chrono::{DateTime, Days, Duration, Utc};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::LoanError;
use crate::model::{Penalty, PenaltyType};
use crate::store::LoanStore;
use crate::types::{AdminId, LoanRef, LoanStatus, MemberId, Money, PenaltyMethod, PenaltyStatus, RepaymentStatus};
use crate::LoanResult;

const DELINQUENCY_WINDOW_DAYS: i64 = 30;
const PENALTY_DUE_DAYS: u64 = 15;

/// One penalty imposed during a sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImposedPenalty {
    pub loan_ref: LoanRef,
    pub member: MemberId,
    pub amount: Money,
}

/// Outcome of one sweep run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub imposed: Vec<ImposedPenalty>,
}

/// Scan every disbursed/active loan and impose late-payment penalties.
///
/// Each loan's check-then-insert is its own transaction, so completed
/// loans stay committed if the run dies partway through.
pub fn run_sweep(
    store: &LoanStore,
    penalty_types: &[PenaltyType],
    now: DateTime<Utc>,
) -> LoanResult<SweepReport> {
    let penalty_type = penalty_types
        .iter()
        .find(|t| t.active)
        .ok_or_else(|| LoanError::InvalidInput {
            field: "penalty_types".into(),
            reason: "No active penalty types found".into(),
        })?;

    let window_start = now - Duration::days(DELINQUENCY_WINDOW_DAYS);
    let mut report = SweepReport {
        scanned: 0,
        imposed: Vec::new(),
    };

    for loan_ref in store.loan_refs() {
        let imposed = store.update(&loan_ref, None, |account| {
            if !matches!(
                account.loan.status,
                LoanStatus::Disbursed | LoanStatus::Active
            ) {
                return Ok(None);
            }

            let paid_recently = account.repayments.iter().any(|r| {
                r.status == RepaymentStatus::Processed && r.payment_date >= window_start
            });
            let disbursed_long_enough = account
                .loan
                .disbursement_date
                .map(|d| d < window_start)
                .unwrap_or(false);
            let already_penalised = account
                .penalties
                .iter()
                .any(|p| p.date_imposed >= window_start);

            if paid_recently || !disbursed_long_enough || already_penalised {
                return Ok(None);
            }

            let amount = match penalty_type.method {
                PenaltyMethod::Fixed => penalty_type.rate_or_amount,
                PenaltyMethod::Percentage => {
                    account.loan.principal_balance.unwrap_or_default()
                        * penalty_type.rate_or_amount
                        / dec!(100)
                }
            };

            account.penalties.push(Penalty {
                penalty_type: penalty_type.name.clone(),
                amount,
                date_imposed: now,
                due_date: now.date_naive() + Days::new(PENALTY_DUE_DAYS),
                status: PenaltyStatus::Imposed,
                waiver_reason: None,
                waived_by: None,
                waived_at: None,
            });

            Ok(Some(ImposedPenalty {
                loan_ref: account.loan.loan_ref.clone(),
                member: account.loan.member,
                amount,
            }))
        })?;

        report.scanned += 1;
        if let Some(imposed) = imposed {
            debug!(loan_ref = %imposed.loan_ref, amount = %imposed.amount, "penalty imposed");
            report.imposed.push(imposed);
        }
    }

    info!(
        scanned = report.scanned,
        imposed = report.imposed.len(),
        "penalty sweep complete"
    );
    Ok(report)
}

/// Waive an imposed penalty. Paid penalties cannot be waived, and a
/// reason is always recorded with the waiving actor.
pub fn waive(
    penalty: &mut Penalty,
    actor: AdminId,
    reason: &str,
    now: DateTime<Utc>,
) -> LoanResult<()> {
    if reason.trim().is_empty() {
        return Err(LoanError::InvalidInput {
            field: "waiver_reason".into(),
            reason: "Waiver reason is required".into(),
        });
    }
    if penalty.status == PenaltyStatus::Paid {
        return Err(LoanError::InvalidInput {
            field: "penalty".into(),
            reason: "Cannot waive a paid penalty".into(),
        });
    }

    penalty.status = PenaltyStatus::Waived;
    penalty.waiver_reason = Some(reason.to_string());
    penalty.waived_by = Some(actor);
    penalty.waived_at = Some(now);
    Ok(())
}
