use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use sacco_loans_core::amortization::{PeriodEntry, Schedule, ScheduleTotals};
use sacco_loans_core::types::{InterestConvention, RepaymentFrequency};

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConventionArg {
    Flat,
    ReducingBalance,
}

impl From<ConventionArg> for InterestConvention {
    fn from(value: ConventionArg) -> Self {
        match value {
            ConventionArg::Flat => InterestConvention::Flat,
            ConventionArg::ReducingBalance => InterestConvention::ReducingBalance,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FrequencyArg {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

impl From<FrequencyArg> for RepaymentFrequency {
    fn from(value: FrequencyArg) -> Self {
        match value {
            FrequencyArg::Daily => RepaymentFrequency::Daily,
            FrequencyArg::Weekly => RepaymentFrequency::Weekly,
            FrequencyArg::Monthly => RepaymentFrequency::Monthly,
            FrequencyArg::Quarterly => RepaymentFrequency::Quarterly,
        }
    }
}

/// JSON shape accepted via --input or stdin.
#[derive(Deserialize)]
struct ScheduleInput {
    principal: Decimal,
    interest_rate: Decimal,
    term_months: u32,
    interest_convention: InterestConvention,
    #[serde(default = "default_frequency")]
    repayment_frequency: RepaymentFrequency,
    first_payment_date: NaiveDate,
}

fn default_frequency() -> RepaymentFrequency {
    RepaymentFrequency::Monthly
}

/// Arguments for amortization schedule generation
#[derive(Args)]
pub struct ScheduleArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Loan principal
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Annual interest rate in percent (12 = 12% p.a.)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Term in months
    #[arg(long)]
    pub term: Option<u32>,

    /// Interest convention
    #[arg(long, default_value = "reducing-balance")]
    pub convention: ConventionArg,

    /// Installment cadence
    #[arg(long, default_value = "monthly")]
    pub frequency: FrequencyArg,

    /// First payment date (YYYY-MM-DD)
    #[arg(long)]
    pub first_payment_date: Option<NaiveDate>,
}

pub fn run_schedule(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let schedule_input: ScheduleInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        let principal = args
            .principal
            .ok_or("--principal is required (or provide --input)")?;
        let rate = args.rate.ok_or("--rate is required (or provide --input)")?;
        let term = args.term.ok_or("--term is required (or provide --input)")?;
        let first = args
            .first_payment_date
            .ok_or("--first-payment-date is required (or provide --input)")?;

        ScheduleInput {
            principal,
            interest_rate: rate,
            term_months: term,
            interest_convention: args.convention.into(),
            repayment_frequency: args.frequency.into(),
            first_payment_date: first,
        }
    };

    let schedule = Schedule::new(
        schedule_input.principal,
        schedule_input.interest_rate,
        schedule_input.term_months,
        schedule_input.interest_convention,
        schedule_input.repayment_frequency,
        schedule_input.first_payment_date,
    )?;
    let entries: Vec<PeriodEntry> = schedule.iter().collect();

    Ok(json!({
        "result": {
            "total_interest": schedule.totals.total_interest,
            "total_repayable": schedule.totals.total_repayable,
            "installment_amount": schedule.totals.installment_amount,
            "periods": entries.len(),
        },
        "schedule": entries,
    }))
}

/// Arguments for frozen-totals computation
#[derive(Args)]
pub struct TotalsArgs {
    /// Loan principal
    #[arg(long)]
    pub principal: Decimal,

    /// Annual interest rate in percent (12 = 12% p.a.)
    #[arg(long)]
    pub rate: Decimal,

    /// Term in months
    #[arg(long)]
    pub term: u32,

    /// Interest convention
    #[arg(long, default_value = "reducing-balance")]
    pub convention: ConventionArg,
}

pub fn run_totals(args: TotalsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let totals = ScheduleTotals::compute(
        args.principal,
        args.rate,
        args.term,
        args.convention.into(),
    )?;
    Ok(json!({ "result": totals }))
}
