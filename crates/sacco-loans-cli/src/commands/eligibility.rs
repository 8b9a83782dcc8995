use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use sacco_loans_core::eligibility::{self, MemberStanding};
use sacco_loans_core::types::MemberId;

use crate::input;

/// JSON shape accepted via --input or stdin.
#[derive(Deserialize)]
struct EligibilityInput {
    standing: MemberStanding,
    requested_principal: Decimal,
    #[serde(default)]
    accepted_guarantee_total: Option<Decimal>,
}

/// Arguments for member eligibility evaluation
#[derive(Args)]
pub struct EligibilityArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Member id
    #[arg(long)]
    pub member: Option<u64>,

    /// Requested principal
    #[arg(long)]
    pub amount: Option<Decimal>,

    /// Member's total shares value (omit when no share record exists)
    #[arg(long)]
    pub shares: Option<Decimal>,

    /// Member is not an active SACCO member
    #[arg(long)]
    pub inactive: bool,

    /// Current month welfare contribution is unpaid
    #[arg(long)]
    pub welfare_unpaid: bool,

    /// Member already has an outstanding loan
    #[arg(long)]
    pub has_active_loan: bool,

    /// Total amount covered by accepted guarantors, enables the
    /// coverage check
    #[arg(long)]
    pub guaranteed: Option<Decimal>,
}

pub fn run_eligibility(args: EligibilityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let eligibility_input: EligibilityInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        let member = args.member.ok_or("--member is required (or provide --input)")?;
        let amount = args.amount.ok_or("--amount is required (or provide --input)")?;

        EligibilityInput {
            standing: MemberStanding {
                member: MemberId(member),
                is_active_member: !args.inactive,
                shares_value: args.shares,
                welfare_paid_current_month: !args.welfare_unpaid,
                has_outstanding_loan: args.has_active_loan,
            },
            requested_principal: amount,
            accepted_guarantee_total: args.guaranteed,
        }
    };

    let report = eligibility::evaluate(
        &eligibility_input.standing,
        eligibility_input.requested_principal,
        eligibility_input.accepted_guarantee_total,
    );

    Ok(json!({
        "result": {
            "eligible": report.eligible,
            "available_amount": report.available_amount,
            "shares_value": report.shares_value,
        },
        "reasons": report.reasons,
    }))
}
