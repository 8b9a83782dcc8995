//! The engine facade.
//!
//! `LoanEngine` owns the store and exposes the operations external
//! collaborators call: application, approval decisions, guarantor
//! responses, disbursement, payment confirmation, schedule queries,
//! penalty sweeps and portfolio statistics. Every balance-touching
//! operation runs as one store transaction on one loan; notifications
//! are queued only after that transaction commits.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::info;

use crate::amortization::{PeriodEntry, Schedule};
use crate::approval::{self, ApprovalOutcome};
use crate::disbursement;
use crate::eligibility::{self, EligibilityReport, MemberStanding};
use crate::error::LoanError;
use crate::events::{EventType, NotificationEvent};
use crate::model::{Guarantor, Loan, LoanRepayment, PenaltyType};
use crate::penalty::{self, SweepReport};
use crate::repayment::{self, PaymentOutcome};
use crate::store::{LoanAccount, LoanStore};
use crate::types::{
    make_loan_ref, AdminId, GuarantorStatus, InterestConvention, LoanRef, LoanStatus, LoanType,
    MemberId, Money, RatePercent, RepaymentFrequency, RepaymentPeriod,
};
use crate::LoanResult;

/// Bounded retries for optimistic-lock conflicts before the conflict
/// surfaces to the caller.
const CONFLICT_RETRIES: u32 = 3;

/// A member's loan application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanApplication {
    pub member: MemberId,
    pub loan_type: LoanType,
    pub principal: Money,
    pub interest_rate: RatePercent,
    pub interest_convention: InterestConvention,
    pub term_months: u32,
    pub repayment_frequency: RepaymentFrequency,
    pub repayment_period: RepaymentPeriod,
    pub purpose: String,
    #[serde(default)]
    pub has_collateral: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collateral_details: Option<String>,
}

/// An admin's approval/rejection submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalAction {
    pub loan_ref: LoanRef,
    pub admin: AdminId,
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Reject,
}

/// Inbound "payment received" confirmation from the payment gateway
/// or a manual teller entry. The principal/interest split is decided
/// upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceived {
    pub loan_ref: LoanRef,
    pub amount: Money,
    pub principal_component: Money,
    pub interest_component: Money,
    pub payment_date: DateTime<Utc>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
}

/// Portfolio-level counts and values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioStatistics {
    pub active_count: usize,
    pub active_principal: Money,
    pub outstanding_balance: Money,
    pub by_status: BTreeMap<String, StatusBucket>,
    pub by_type: BTreeMap<String, StatusBucket>,
    pub defaulted_count: usize,
    pub defaulted_amount: Money,
    /// Percentage of completed loans (fully paid, defaulted or written
    /// off) that defaulted.
    pub default_rate: Money,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusBucket {
    pub count: usize,
    pub amount: Money,
}

pub struct LoanEngine {
    store: Arc<LoanStore>,
    outbox: Mutex<Vec<NotificationEvent>>,
}

impl Default for LoanEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LoanEngine {
    pub fn new() -> Self {
        Self::with_store(Arc::new(LoanStore::new()))
    }

    pub fn with_store(store: Arc<LoanStore>) -> Self {
        LoanEngine {
            store,
            outbox: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &Arc<LoanStore> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Application
    // -----------------------------------------------------------------------

    /// Open a loan application.
    ///
    /// Terms are validated, the member is gated through the eligibility
    /// evaluator (every violated rule is reported), and the approver
    /// roster is frozen onto the loan as the quorum snapshot.
    pub fn apply(
        &self,
        application: LoanApplication,
        standing: &MemberStanding,
        approver_roster: &[AdminId],
        now: DateTime<Utc>,
    ) -> LoanResult<LoanRef> {
        eligibility::validate_terms(
            application.principal,
            application.interest_rate,
            application.term_months,
        )?;
        if approver_roster.is_empty() {
            return Err(LoanError::InvalidInput {
                field: "approver_roster".into(),
                reason: "At least one approver is required".into(),
            });
        }

        // The engine owns loan records, so active-loan exclusivity is
        // checked against its own store on top of the pulled standing.
        let mut effective = standing.clone();
        effective.has_outstanding_loan =
            standing.has_outstanding_loan || self.member_has_outstanding_loan(application.member);

        let report = eligibility::evaluate(&effective, application.principal, None);
        if !report.eligible {
            return Err(LoanError::Ineligible {
                reasons: report.reasons,
            });
        }

        let loan_ref = make_loan_ref(now.date_naive(), self.store.next_seq());
        let loan = Loan {
            loan_ref: loan_ref.clone(),
            member: application.member,
            loan_type: application.loan_type,
            principal: application.principal,
            interest_rate: application.interest_rate,
            interest_convention: application.interest_convention,
            term_months: application.term_months,
            repayment_frequency: application.repayment_frequency,
            repayment_period: application.repayment_period,
            purpose: application.purpose,
            has_collateral: application.has_collateral,
            collateral_details: application.collateral_details,
            status: LoanStatus::Applied,
            total_interest: Money::ZERO,
            total_repayable: Money::ZERO,
            installment_amount: Money::ZERO,
            principal_balance: None,
            interest_balance: None,
            application_date: now,
            approval_date: None,
            disbursement_date: None,
            first_payment_date: None,
            maturity_date: None,
            due_date: None,
            approver_snapshot: approver_roster.to_vec(),
            approvals: Vec::new(),
            approvals_completed: false,
            rejection_reason: None,
            version: 0,
        };
        self.store.insert(LoanAccount::new(loan))?;

        info!(%loan_ref, member = application.member.0, "loan application opened");
        Ok(loan_ref)
    }

    /// Maximum principal available to a member: the shares value.
    pub fn available_amount(&self, standing: &MemberStanding) -> Money {
        standing.shares_value.unwrap_or_default()
    }

    /// Read-only eligibility check for a prospective application.
    pub fn check_eligibility(
        &self,
        standing: &MemberStanding,
        requested_principal: Money,
    ) -> EligibilityReport {
        let mut effective = standing.clone();
        effective.has_outstanding_loan =
            standing.has_outstanding_loan || self.member_has_outstanding_loan(standing.member);
        eligibility::evaluate(&effective, requested_principal, None)
    }

    // -----------------------------------------------------------------------
    // Approval
    // -----------------------------------------------------------------------

    pub fn send_to_review(&self, loan_ref: &str) -> LoanResult<LoanStatus> {
        self.with_loan(loan_ref, |account| {
            approval::send_to_review(&mut account.loan)?;
            Ok(account.loan.status)
        })
    }

    /// Record one admin's decision and report the quorum state back.
    pub fn decide(&self, action: &ApprovalAction, now: DateTime<Utc>) -> LoanResult<ApprovalOutcome> {
        let (outcome, member) = self.with_loan(&action.loan_ref, |account| {
            let outcome = match action.decision {
                Decision::Approve => approval::record_approval(&mut account.loan, action.admin, now)?,
                Decision::Reject => {
                    let reason = action.reason.as_deref().unwrap_or_default();
                    approval::reject(&mut account.loan, action.admin, reason, now)?
                }
            };
            Ok((outcome, account.loan.member))
        })?;

        match outcome.new_status {
            LoanStatus::Approved => self.notify(
                &action.loan_ref,
                member,
                EventType::LoanApproved,
                json!({ "approved_at": now }),
            ),
            LoanStatus::Rejected => self.notify(
                &action.loan_ref,
                member,
                EventType::LoanRejected,
                json!({ "reason": action.reason }),
            ),
            _ => {}
        }

        info!(
            loan_ref = %action.loan_ref,
            admin = action.admin.0,
            new_status = %outcome.new_status,
            remaining = outcome.remaining_approvers,
            "approval decision recorded"
        );
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Guarantors
    // -----------------------------------------------------------------------

    /// Invite a member to guarantee part of the principal.
    pub fn invite_guarantor(
        &self,
        loan_ref: &str,
        guarantor: MemberId,
        amount: Money,
        now: DateTime<Utc>,
    ) -> LoanResult<()> {
        if amount <= Money::ZERO {
            return Err(LoanError::InvalidInput {
                field: "guaranteed_amount".into(),
                reason: "Guaranteed amount must be positive".into(),
            });
        }
        self.with_loan(loan_ref, |account| {
            if !account.loan.status.is_decidable() {
                return Err(LoanError::InvalidTransition {
                    action: "invite a guarantor for",
                    status: account.loan.status,
                    required: "APPLIED or UNDER_REVIEW",
                });
            }
            account.guarantors.push(Guarantor {
                guarantor,
                guaranteed_amount: amount,
                status: GuarantorStatus::Requested,
                request_date: now,
                response_date: None,
                rejection_reason: None,
            });
            Ok(())
        })
    }

    /// The invited guarantor accepts or rejects their request. Only the
    /// invited member may respond; rejection requires a reason.
    pub fn respond_to_guarantee(
        &self,
        loan_ref: &str,
        actor: MemberId,
        accept: bool,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> LoanResult<GuarantorStatus> {
        self.with_loan(loan_ref, |account| {
            let entry = account
                .guarantors
                .iter_mut()
                .find(|g| g.guarantor == actor)
                .ok_or_else(|| LoanError::NotAuthorized {
                    actor: format!("member {}", actor.0),
                    action: "respond to this guarantee request",
                })?;
            if entry.status != GuarantorStatus::Requested {
                return Err(LoanError::InvalidInput {
                    field: "guarantor".into(),
                    reason: "Only pending guarantor requests can be answered".into(),
                });
            }

            if accept {
                entry.status = GuarantorStatus::Accepted;
            } else {
                let reason = reason.unwrap_or_default();
                if reason.trim().is_empty() {
                    return Err(LoanError::InvalidInput {
                        field: "rejection_reason".into(),
                        reason: "Rejection reason is required".into(),
                    });
                }
                entry.status = GuarantorStatus::Rejected;
                entry.rejection_reason = Some(reason.to_string());
            }
            entry.response_date = Some(now);
            Ok(entry.status)
        })
    }

    // -----------------------------------------------------------------------
    // Disbursement
    // -----------------------------------------------------------------------

    /// Disburse an approved loan. When guarantors were invited, the
    /// accepted coverage must meet or exceed the principal first.
    pub fn disburse(
        &self,
        loan_ref: &str,
        first_payment_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> LoanResult<()> {
        let member = self.with_loan(loan_ref, |account| {
            if !account.guarantors.is_empty() {
                let covered = account.accepted_guarantee_total();
                if covered < account.loan.principal {
                    return Err(LoanError::Ineligible {
                        reasons: vec![format!(
                            "Insufficient guarantor amount. Required: {}, Got: {covered}",
                            account.loan.principal
                        )],
                    });
                }
            }
            disbursement::disburse(&mut account.loan, first_payment_date, now)?;
            Ok(account.loan.member)
        })?;

        self.notify(
            loan_ref,
            member,
            EventType::LoanDisbursed,
            json!({ "first_payment_date": first_payment_date }),
        );
        info!(%loan_ref, "loan disbursed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Repayment
    // -----------------------------------------------------------------------

    /// Confirm an inbound payment against a loan.
    ///
    /// The repayment record is stored either way: Processed with a
    /// balances-after snapshot on success, or Failed (no balance
    /// mutation) when the loan cannot accept payments, in which case
    /// the outcome carries `success: false`.
    pub fn payment_received(&self, payment: &PaymentReceived) -> LoanResult<PaymentOutcome> {
        if payment.amount <= Money::ZERO {
            return Err(LoanError::InvalidInput {
                field: "amount".into(),
                reason: "Payment amount must be positive".into(),
            });
        }
        if payment.principal_component < Money::ZERO || payment.interest_component < Money::ZERO {
            return Err(LoanError::InvalidInput {
                field: "components".into(),
                reason: "Payment components cannot be negative".into(),
            });
        }

        let (outcome, member) = self.with_loan(&payment.loan_ref, |account| {
            let mut record = LoanRepayment::pending(
                payment.amount,
                payment.principal_component,
                payment.interest_component,
                payment.payment_date,
                payment.payment_method.clone().unwrap_or_else(|| "GATEWAY".into()),
                payment.external_reference.clone(),
            );

            let outcome = match repayment::process_payment(&mut account.loan, &mut record, None) {
                Ok(outcome) => outcome,
                Err(LoanError::InvalidTransition { .. }) => {
                    // Keep the failed attempt for audit; balances are
                    // untouched.
                    repayment::fail_payment(&account.loan, &mut record)?;
                    PaymentOutcome {
                        success: false,
                        new_status: account.loan.status,
                        principal_balance: account.loan.principal_balance.unwrap_or_default(),
                        interest_balance: account.loan.interest_balance.unwrap_or_default(),
                    }
                }
                Err(other) => return Err(other),
            };

            account.repayments.push(record);
            Ok((outcome, account.loan.member))
        })?;

        if outcome.new_status == LoanStatus::FullyPaid {
            self.notify(
                &payment.loan_ref,
                member,
                EventType::LoanFullyPaid,
                json!({ "final_payment": payment.amount.to_string() }),
            );
        }

        info!(
            loan_ref = %payment.loan_ref,
            success = outcome.success,
            new_status = %outcome.new_status,
            "payment processed"
        );
        Ok(outcome)
    }

    /// The frozen repayment schedule. Available only once the loan is
    /// approved; empty until a first payment date is known.
    pub fn repayment_schedule(&self, loan_ref: &str) -> LoanResult<Vec<PeriodEntry>> {
        self.store.read(loan_ref, |account| {
            if !account.loan.status.is_outstanding() {
                return Err(LoanError::InvalidTransition {
                    action: "generate a schedule for",
                    status: account.loan.status,
                    required: "APPROVED, DISBURSED or ACTIVE",
                });
            }
            let Some(first_payment_date) = account.loan.first_payment_date else {
                return Ok(Vec::new());
            };
            let schedule = Schedule::new(
                account.loan.principal,
                account.loan.interest_rate,
                account.loan.term_months,
                account.loan.interest_convention,
                account.loan.repayment_frequency,
                first_payment_date,
            )?;
            Ok(schedule.iter().collect())
        })?
    }

    // -----------------------------------------------------------------------
    // Penalties
    // -----------------------------------------------------------------------

    /// Run the periodic late-payment sweep and queue a notification
    /// for every penalty imposed.
    pub fn run_penalty_sweep(
        &self,
        penalty_types: &[PenaltyType],
        now: DateTime<Utc>,
    ) -> LoanResult<SweepReport> {
        let report = penalty::run_sweep(&self.store, penalty_types, now)?;
        for imposed in &report.imposed {
            self.notify(
                &imposed.loan_ref,
                imposed.member,
                EventType::PenaltyImposed,
                json!({ "amount": imposed.amount.to_string() }),
            );
        }
        Ok(report)
    }

    /// Waive one of a loan's penalties, by position in its penalty list.
    pub fn waive_penalty(
        &self,
        loan_ref: &str,
        penalty_index: usize,
        actor: AdminId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> LoanResult<()> {
        self.with_loan(loan_ref, |account| {
            let penalty = account.penalties.get_mut(penalty_index).ok_or_else(|| {
                LoanError::NotFound {
                    entity: "Penalty",
                    reference: format!("{loan_ref}#{penalty_index}"),
                }
            })?;
            penalty::waive(penalty, actor, reason, now)
        })
    }

    // -----------------------------------------------------------------------
    // Reporting
    // -----------------------------------------------------------------------

    /// Portfolio-wide counts and balances.
    pub fn statistics(&self) -> PortfolioStatistics {
        let accounts = self.store.snapshot();

        let mut stats = PortfolioStatistics {
            active_count: 0,
            active_principal: Money::ZERO,
            outstanding_balance: Money::ZERO,
            by_status: BTreeMap::new(),
            by_type: BTreeMap::new(),
            defaulted_count: 0,
            defaulted_amount: Money::ZERO,
            default_rate: Money::ZERO,
        };
        let mut completed = 0usize;

        for account in &accounts {
            let loan = &account.loan;

            let status_bucket = stats.by_status.entry(loan.status.to_string()).or_default();
            status_bucket.count += 1;
            status_bucket.amount += loan.principal;

            let type_key = serde_json::to_string(&loan.loan_type)
                .unwrap_or_default()
                .trim_matches('"')
                .to_string();
            let type_bucket = stats.by_type.entry(type_key).or_default();
            type_bucket.count += 1;
            type_bucket.amount += loan.principal;

            if matches!(loan.status, LoanStatus::Disbursed | LoanStatus::Active) {
                stats.active_count += 1;
                stats.active_principal += loan.principal;
                stats.outstanding_balance += loan.outstanding_balance();
            }
            if matches!(
                loan.status,
                LoanStatus::FullyPaid | LoanStatus::Defaulted | LoanStatus::WrittenOff
            ) {
                completed += 1;
            }
            if loan.status == LoanStatus::Defaulted {
                stats.defaulted_count += 1;
                stats.defaulted_amount += loan.principal_balance.unwrap_or_default();
            }
        }

        if completed > 0 {
            stats.default_rate = Money::from(stats.defaulted_count as u64) * Money::from(100u64)
                / Money::from(completed as u64);
        }
        stats
    }

    /// Drain queued notification events for delivery.
    pub fn drain_events(&self) -> Vec<NotificationEvent> {
        let mut outbox = self.outbox.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *outbox)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// One optimistic unit of work against a single loan, retried a
    /// bounded number of times on version conflict with a fresh read.
    fn with_loan<R>(
        &self,
        loan_ref: &str,
        f: impl Fn(&mut LoanAccount) -> LoanResult<R>,
    ) -> LoanResult<R> {
        let mut attempts = 0;
        loop {
            let version = self.store.version(loan_ref)?;
            match self.store.update(loan_ref, Some(version), &f) {
                Err(LoanError::ConcurrencyConflict { .. }) if attempts < CONFLICT_RETRIES => {
                    attempts += 1;
                }
                other => return other,
            }
        }
    }

    fn member_has_outstanding_loan(&self, member: MemberId) -> bool {
        self.store
            .snapshot()
            .iter()
            .any(|acc| acc.loan.member == member && acc.loan.status.is_outstanding())
    }

    fn notify(
        &self,
        loan_ref: &str,
        member: MemberId,
        event_type: EventType,
        payload: serde_json::Value,
    ) {
        let mut outbox = self.outbox.lock().unwrap_or_else(PoisonError::into_inner);
        outbox.push(NotificationEvent {
            loan_ref: loan_ref.to_string(),
            member,
            event_type,
            payload,
        });
    }
}
