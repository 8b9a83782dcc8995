use chrono::{DateTime, NaiveDate, Utc};
use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use sacco_loans_core::eligibility::MemberStanding;
use sacco_loans_core::engine::{
    ApprovalAction, Decision, LoanApplication, LoanEngine, PaymentReceived,
};
use sacco_loans_core::model::PenaltyType;
use sacco_loans_core::types::{AdminId, LoanStatus, MemberId};

use crate::input;

/// A complete lifecycle scenario, driven through the engine in order:
/// application, review, guarantors, approval decisions, disbursement,
/// payments, penalty sweep.
#[derive(Deserialize)]
struct Scenario {
    standing: MemberStanding,
    application: LoanApplication,
    approvers: Vec<AdminId>,
    #[serde(default)]
    send_to_review: bool,
    #[serde(default)]
    guarantors: Vec<GuarantorRequest>,
    /// Explicit decisions; omitted means every approver approves.
    #[serde(default)]
    decisions: Option<Vec<ScenarioDecision>>,
    #[serde(default)]
    first_payment_date: Option<NaiveDate>,
    #[serde(default)]
    payments: Vec<ScenarioPayment>,
    #[serde(default)]
    penalty_types: Vec<PenaltyType>,
    #[serde(default)]
    sweep_at: Option<DateTime<Utc>>,
    /// Clock for the scenario, defaults to the wall clock.
    #[serde(default)]
    now: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct GuarantorRequest {
    member: MemberId,
    amount: Decimal,
    accept: bool,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct ScenarioDecision {
    admin: AdminId,
    decision: Decision,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct ScenarioPayment {
    amount: Decimal,
    principal_component: Decimal,
    interest_component: Decimal,
    payment_date: DateTime<Utc>,
    #[serde(default)]
    payment_method: Option<String>,
    #[serde(default)]
    reference: Option<String>,
}

/// Arguments for lifecycle simulation
#[derive(Args)]
pub struct LifecycleArgs {
    /// Path to JSON scenario file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_lifecycle(args: LifecycleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario: Scenario = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <scenario.json> or stdin required for lifecycle".into());
    };

    let now = scenario.now.unwrap_or_else(Utc::now);
    let engine = LoanEngine::new();

    let loan_ref = engine.apply(
        scenario.application,
        &scenario.standing,
        &scenario.approvers,
        now,
    )?;

    if scenario.send_to_review {
        engine.send_to_review(&loan_ref)?;
    }

    for request in &scenario.guarantors {
        engine.invite_guarantor(&loan_ref, request.member, request.amount, now)?;
        engine.respond_to_guarantee(
            &loan_ref,
            request.member,
            request.accept,
            request.reason.as_deref(),
            now,
        )?;
    }

    match scenario.decisions {
        Some(decisions) => {
            for d in decisions {
                engine.decide(
                    &ApprovalAction {
                        loan_ref: loan_ref.clone(),
                        admin: d.admin,
                        decision: d.decision,
                        reason: d.reason,
                    },
                    now,
                )?;
            }
        }
        None => {
            for admin in &scenario.approvers {
                engine.decide(
                    &ApprovalAction {
                        loan_ref: loan_ref.clone(),
                        admin: *admin,
                        decision: Decision::Approve,
                        reason: None,
                    },
                    now,
                )?;
            }
        }
    }

    let approved = engine
        .store()
        .read(&loan_ref, |acc| acc.loan.status == LoanStatus::Approved)?;

    if approved {
        if let Some(first) = scenario.first_payment_date {
            engine.disburse(&loan_ref, first, now)?;

            for payment in &scenario.payments {
                engine.payment_received(&PaymentReceived {
                    loan_ref: loan_ref.clone(),
                    amount: payment.amount,
                    principal_component: payment.principal_component,
                    interest_component: payment.interest_component,
                    payment_date: payment.payment_date,
                    payment_method: payment.payment_method.clone(),
                    external_reference: payment.reference.clone(),
                })?;
            }

            if let Some(sweep_at) = scenario.sweep_at {
                if !scenario.penalty_types.is_empty() {
                    engine.run_penalty_sweep(&scenario.penalty_types, sweep_at)?;
                }
            }
        }
    }

    let (loan, repayments, penalties) = engine.store().read(&loan_ref, |acc| {
        (acc.loan.clone(), acc.repayments.clone(), acc.penalties.clone())
    })?;
    let events = engine.drain_events();

    Ok(json!({
        "result": {
            "loan_ref": loan.loan_ref,
            "final_status": loan.status.to_string(),
            "total_interest": loan.total_interest,
            "total_repayable": loan.total_repayable,
            "installment_amount": loan.installment_amount,
            "principal_balance": loan.principal_balance,
            "interest_balance": loan.interest_balance,
            "maturity_date": loan.maturity_date,
            "due_date": loan.due_date,
            "penalties_imposed": penalties.len(),
        },
        "repayments": repayments,
        "penalties": penalties,
        "events": events,
    }))
}
