//! Amortization schedule computation.
//!
//! Two interest conventions are supported. Flat-rate charges interest
//! on the original principal for the full term. Reducing-balance
//! recomputes each period's interest on the outstanding principal and
//! seeds the frozen totals with the SACCO approximation
//! `principal * rate * (term + 1) / 2400` — deliberately not a strict
//! actuarial amortization, because the frozen totals are persisted on
//! the loan and compared against the live per-period figures.
//!
//! The schedule itself is a lazy, finite, restartable iterator; the
//! caller decides what to persist.

use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::eligibility::validate_terms;
use crate::types::{InterestConvention, Money, RatePercent, RepaymentFrequency};
use crate::LoanResult;

const MONTHS_PER_YEAR: Decimal = dec!(12);
const PERCENT_MONTHLY_DIVISOR: Decimal = dec!(1200);
/// Divisor of the reducing-balance total-interest approximation.
const REDUCING_APPROX_DIVISOR: Decimal = dec!(2400);

/// Totals frozen onto the loan at disbursement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTotals {
    pub total_interest: Money,
    pub total_repayable: Money,
    pub installment_amount: Money,
}

impl ScheduleTotals {
    pub fn compute(
        principal: Money,
        rate: RatePercent,
        term_months: u32,
        convention: InterestConvention,
    ) -> LoanResult<Self> {
        validate_terms(principal, rate, term_months)?;

        let term = Decimal::from(term_months);
        let total_interest = match convention {
            InterestConvention::Flat => {
                principal * rate * term / (dec!(100) * MONTHS_PER_YEAR)
            }
            InterestConvention::ReducingBalance => {
                principal * rate * (term + Decimal::ONE) / REDUCING_APPROX_DIVISOR
            }
        }
        .round_dp(2);

        let total_repayable = principal + total_interest;
        let installment_amount = (total_repayable / term).round_dp(2);

        Ok(ScheduleTotals {
            total_interest,
            total_repayable,
            installment_amount,
        })
    }
}

/// One scheduled installment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodEntry {
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub principal_component: Money,
    pub interest_component: Money,
    pub total_payment: Money,
    pub principal_balance: Money,
    pub interest_balance: Money,
}

/// Frozen schedule parameters. `iter()` may be called any number of
/// times; every iteration restarts from the first installment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub principal: Money,
    pub rate: RatePercent,
    pub term_months: u32,
    pub convention: InterestConvention,
    pub frequency: RepaymentFrequency,
    pub first_payment_date: NaiveDate,
    pub totals: ScheduleTotals,
}

impl Schedule {
    pub fn new(
        principal: Money,
        rate: RatePercent,
        term_months: u32,
        convention: InterestConvention,
        frequency: RepaymentFrequency,
        first_payment_date: NaiveDate,
    ) -> LoanResult<Self> {
        let totals = ScheduleTotals::compute(principal, rate, term_months, convention)?;
        Ok(Schedule {
            principal,
            rate,
            term_months,
            convention,
            frequency,
            first_payment_date,
            totals,
        })
    }

    pub fn iter(&self) -> ScheduleIter<'_> {
        ScheduleIter {
            schedule: self,
            period: 0,
            next_date: self.first_payment_date,
            remaining_principal: self.principal,
            remaining_interest: self.totals.total_interest,
        }
    }
}

/// Lazy walk over the schedule's installments.
pub struct ScheduleIter<'a> {
    schedule: &'a Schedule,
    period: u32,
    next_date: NaiveDate,
    remaining_principal: Money,
    remaining_interest: Money,
}

impl Iterator for ScheduleIter<'_> {
    type Item = PeriodEntry;

    fn next(&mut self) -> Option<PeriodEntry> {
        if self.period >= self.schedule.term_months {
            return None;
        }
        self.period += 1;

        let term = Decimal::from(self.schedule.term_months);
        let last = self.period == self.schedule.term_months;

        // The final period absorbs all rounding residue so the schedule
        // sums exactly to the frozen totals.
        let (principal_component, interest_component) = if last {
            (self.remaining_principal, self.remaining_interest)
        } else {
            let principal = (self.schedule.principal / term).round_dp(2);
            let interest = match self.schedule.convention {
                InterestConvention::Flat => {
                    (self.schedule.totals.total_interest / term).round_dp(2)
                }
                InterestConvention::ReducingBalance => (self.remaining_principal
                    * self.schedule.rate
                    / PERCENT_MONTHLY_DIVISOR)
                    .round_dp(2),
            };
            (principal, interest)
        };

        self.remaining_principal -= principal_component;
        self.remaining_interest -= interest_component;

        let entry = PeriodEntry {
            installment_number: self.period,
            due_date: self.next_date,
            principal_component,
            interest_component,
            total_payment: principal_component + interest_component,
            principal_balance: self.remaining_principal.max(Money::ZERO),
            interest_balance: self.remaining_interest.max(Money::ZERO),
        };

        self.next_date = next_payment_date(self.next_date, self.schedule.frequency);
        Some(entry)
    }
}

/// Advance a payment date by one period.
///
/// Month arithmetic keeps the anchor day; when the anchor day does not
/// exist in the target month the date clamps to that month's last day
/// (Jan 31 + 1 month = Feb 28/29).
pub fn next_payment_date(date: NaiveDate, frequency: RepaymentFrequency) -> NaiveDate {
    match frequency {
        RepaymentFrequency::Daily => date + Days::new(1),
        RepaymentFrequency::Weekly => date + Days::new(7),
        RepaymentFrequency::Monthly => add_months(date, 1),
        RepaymentFrequency::Quarterly => add_months(date, 3),
    }
}

fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    let zero_based = date.month0() + months;
    let year = date.year() + (zero_based / 12) as i32;
    let month = zero_based % 12 + 1;
    let day = date.day().min(days_in_month(year, month));
    // year/month/day are all in range by construction
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(date)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_y, next_m) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_y, next_m, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // -----------------------------------------------------------------------
    // 1. Reducing-balance worked example: 20000 @ 12% x 12 months
    // -----------------------------------------------------------------------
    #[test]
    fn test_reducing_balance_worked_example() {
        let totals = ScheduleTotals::compute(
            dec!(20000),
            dec!(12),
            12,
            InterestConvention::ReducingBalance,
        )
        .unwrap();

        // 20000 * 12 * 13 / 2400 = 1300
        assert_eq!(totals.total_interest, dec!(1300.00));
        assert_eq!(totals.total_repayable, dec!(21300.00));
        assert_eq!(totals.installment_amount, dec!(1775.00));
    }

    // -----------------------------------------------------------------------
    // 2. Flat-rate totals
    // -----------------------------------------------------------------------
    #[test]
    fn test_flat_rate_totals() {
        let totals =
            ScheduleTotals::compute(dec!(10000), dec!(10), 24, InterestConvention::Flat).unwrap();

        // 10000 * 10 * 24 / 1200 = 2000
        assert_eq!(totals.total_interest, dec!(2000.00));
        assert_eq!(totals.total_repayable, dec!(12000.00));
        assert_eq!(totals.installment_amount, dec!(500.00));
    }

    // -----------------------------------------------------------------------
    // 3. Flat schedule components sum exactly to the frozen totals
    // -----------------------------------------------------------------------
    #[test]
    fn test_flat_schedule_sums_exactly() {
        let schedule = Schedule::new(
            dec!(10000),
            dec!(13),
            7, // deliberately indivisible
            InterestConvention::Flat,
            RepaymentFrequency::Monthly,
            date(2026, 9, 1),
        )
        .unwrap();

        let entries: Vec<PeriodEntry> = schedule.iter().collect();
        assert_eq!(entries.len(), 7);

        let principal_sum: Money = entries.iter().map(|e| e.principal_component).sum();
        let interest_sum: Money = entries.iter().map(|e| e.interest_component).sum();
        assert_eq!(principal_sum, dec!(10000));
        assert_eq!(interest_sum, schedule.totals.total_interest);

        let last = entries.last().unwrap();
        assert_eq!(last.principal_balance, Money::ZERO);
        assert_eq!(last.interest_balance, Money::ZERO);
    }

    // -----------------------------------------------------------------------
    // 4. Reducing schedule: per-period interest tracks the balance
    // -----------------------------------------------------------------------
    #[test]
    fn test_reducing_schedule_interest_declines() {
        let schedule = Schedule::new(
            dec!(20000),
            dec!(12),
            12,
            InterestConvention::ReducingBalance,
            RepaymentFrequency::Monthly,
            date(2026, 9, 1),
        )
        .unwrap();

        let entries: Vec<PeriodEntry> = schedule.iter().collect();

        // Period 1 interest on the full principal: 20000 * 12 / 1200 = 200
        assert_eq!(entries[0].interest_component, dec!(200.00));
        // Period 2 on 20000 - 1666.67: declines
        assert!(entries[1].interest_component < entries[0].interest_component);

        // The schedule still sums exactly to the approximated totals,
        // the final period absorbing the residue.
        let interest_sum: Money = entries.iter().map(|e| e.interest_component).sum();
        let principal_sum: Money = entries.iter().map(|e| e.principal_component).sum();
        assert_eq!(interest_sum, dec!(1300.00));
        assert_eq!(principal_sum, dec!(20000));
    }

    // -----------------------------------------------------------------------
    // 5. installment * term ~ total_repayable within the residue rule
    // -----------------------------------------------------------------------
    #[test]
    fn test_installment_times_term_close_to_total() {
        let totals =
            ScheduleTotals::compute(dec!(9999), dec!(11), 7, InterestConvention::Flat).unwrap();
        let product = totals.installment_amount * Decimal::from(7u32);
        let diff = (product - totals.total_repayable).abs();
        // Each non-final installment rounds to 2 dp, so the drift is
        // bounded by half a cent per period.
        assert!(diff <= dec!(0.04), "drift {diff} too large");
    }

    // -----------------------------------------------------------------------
    // 6. Iterator is lazy and restartable
    // -----------------------------------------------------------------------
    #[test]
    fn test_iterator_restartable() {
        let schedule = Schedule::new(
            dec!(6000),
            dec!(12),
            6,
            InterestConvention::Flat,
            RepaymentFrequency::Monthly,
            date(2026, 9, 1),
        )
        .unwrap();

        let first_a = schedule.iter().next().unwrap();
        let first_b = schedule.iter().next().unwrap();
        assert_eq!(first_a.principal_component, first_b.principal_component);
        assert_eq!(first_a.due_date, first_b.due_date);

        // A partially consumed iterator does not disturb a fresh one.
        let mut partial = schedule.iter();
        partial.next();
        partial.next();
        let fresh: Vec<PeriodEntry> = schedule.iter().collect();
        assert_eq!(fresh.len(), 6);
        assert_eq!(fresh[0].installment_number, 1);
    }

    // -----------------------------------------------------------------------
    // 7. Date advancement: monthly rollover and weekly/daily steps
    // -----------------------------------------------------------------------
    #[test]
    fn test_next_payment_date_advancement() {
        assert_eq!(
            next_payment_date(date(2026, 12, 15), RepaymentFrequency::Monthly),
            date(2027, 1, 15)
        );
        assert_eq!(
            next_payment_date(date(2026, 11, 20), RepaymentFrequency::Quarterly),
            date(2027, 2, 20)
        );
        assert_eq!(
            next_payment_date(date(2026, 8, 28), RepaymentFrequency::Weekly),
            date(2026, 9, 4)
        );
        assert_eq!(
            next_payment_date(date(2026, 8, 31), RepaymentFrequency::Daily),
            date(2026, 9, 1)
        );
    }

    // -----------------------------------------------------------------------
    // 8. Missing anchor day clamps to the end of the target month
    // -----------------------------------------------------------------------
    #[test]
    fn test_month_end_anchor_clamps() {
        assert_eq!(
            next_payment_date(date(2026, 1, 31), RepaymentFrequency::Monthly),
            date(2026, 2, 28)
        );
        assert_eq!(
            next_payment_date(date(2024, 1, 31), RepaymentFrequency::Monthly),
            date(2024, 2, 29)
        );
        assert_eq!(
            next_payment_date(date(2026, 8, 31), RepaymentFrequency::Monthly),
            date(2026, 9, 30)
        );
    }

    // -----------------------------------------------------------------------
    // 9. Due dates follow the frequency from the first payment date
    // -----------------------------------------------------------------------
    #[test]
    fn test_schedule_due_dates() {
        let schedule = Schedule::new(
            dec!(3000),
            dec!(12),
            3,
            InterestConvention::Flat,
            RepaymentFrequency::Quarterly,
            date(2026, 9, 30),
        )
        .unwrap();

        let dates: Vec<NaiveDate> = schedule.iter().map(|e| e.due_date).collect();
        assert_eq!(
            dates,
            vec![date(2026, 9, 30), date(2026, 12, 30), date(2027, 3, 30)]
        );
    }

    // -----------------------------------------------------------------------
    // 10. Invalid terms rejected
    // -----------------------------------------------------------------------
    #[test]
    fn test_invalid_terms_rejected() {
        assert!(ScheduleTotals::compute(dec!(0), dec!(12), 12, InterestConvention::Flat).is_err());
        assert!(
            ScheduleTotals::compute(dec!(1000), dec!(-1), 12, InterestConvention::Flat).is_err()
        );
        assert!(ScheduleTotals::compute(dec!(1000), dec!(12), 0, InterestConvention::Flat).is_err());
    }

    // -----------------------------------------------------------------------
    // 11. Single-period loan: the one installment is also the last
    // -----------------------------------------------------------------------
    #[test]
    fn test_single_period_loan() {
        let schedule = Schedule::new(
            dec!(5000),
            dec!(12),
            1,
            InterestConvention::Flat,
            RepaymentFrequency::Monthly,
            date(2026, 9, 1),
        )
        .unwrap();

        let entries: Vec<PeriodEntry> = schedule.iter().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].principal_component, dec!(5000));
        assert_eq!(entries[0].interest_component, dec!(50.00));
        assert_eq!(entries[0].principal_balance, Money::ZERO);
    }
}
