//! Member eligibility evaluation.
//!
//! A pure function of member state: no side effects, and every
//! violated rule is reported so the caller can render a complete
//! validation report rather than the first failure.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LoanError;
use crate::types::{MemberId, Money};
use crate::LoanResult;

/// Snapshot of a member's standing, pulled from the external account
/// and welfare services before evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberStanding {
    pub member: MemberId,
    /// Active, registered SACCO member.
    pub is_active_member: bool,
    /// Total share-capital value, None when no share record exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares_value: Option<Money>,
    /// CONFIRMED welfare contribution dated within the current
    /// calendar month.
    pub welfare_paid_current_month: bool,
    /// Another loan in APPROVED/DISBURSED/ACTIVE status exists.
    pub has_outstanding_loan: bool,
}

/// Result of an eligibility evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub eligible: bool,
    /// Every violated rule, not just the first.
    pub reasons: Vec<String>,
    /// Hard ceiling on the principal: the member's shares value.
    pub available_amount: Money,
    pub shares_value: Money,
}

/// Evaluate a member against the loan eligibility rules.
///
/// `accepted_guarantee_total` is `Some` when guarantors are in use for
/// this application; `None` disables the coverage check.
pub fn evaluate(
    standing: &MemberStanding,
    requested_principal: Money,
    accepted_guarantee_total: Option<Money>,
) -> EligibilityReport {
    let mut reasons = Vec::new();

    if !standing.is_active_member {
        reasons.push("Must be an active SACCO member".to_string());
    }

    if !standing.welfare_paid_current_month {
        reasons.push("Must pay current month welfare contribution".to_string());
    }

    let shares_value = match standing.shares_value {
        Some(value) => {
            if value < requested_principal {
                reasons.push("Insufficient shares value for requested loan amount".to_string());
            }
            value
        }
        None => {
            reasons.push("No shares found for member".to_string());
            Money::ZERO
        }
    };

    if standing.has_outstanding_loan {
        reasons.push("Member has other active loans".to_string());
    }

    if let Some(guaranteed) = accepted_guarantee_total {
        if guaranteed < requested_principal {
            reasons.push(format!(
                "Insufficient guarantor amount. Required: {requested_principal}, Got: {guaranteed}"
            ));
        }
    }

    EligibilityReport {
        eligible: reasons.is_empty(),
        reasons,
        // Loan amount is capped by shares, not merely checked.
        available_amount: shares_value,
        shares_value,
    }
}

/// Validate the requested loan terms themselves.
pub fn validate_terms(
    principal: Money,
    interest_rate: Decimal,
    term_months: u32,
) -> LoanResult<()> {
    if principal <= Money::ZERO {
        return Err(LoanError::InvalidInput {
            field: "principal".into(),
            reason: "Principal must be positive".into(),
        });
    }
    if interest_rate <= Decimal::ZERO {
        return Err(LoanError::InvalidInput {
            field: "interest_rate".into(),
            reason: "Interest rate must be positive".into(),
        });
    }
    if term_months == 0 {
        return Err(LoanError::InvalidInput {
            field: "term_months".into(),
            reason: "Term must be at least 1 month".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn good_standing() -> MemberStanding {
        MemberStanding {
            member: MemberId(7),
            is_active_member: true,
            shares_value: Some(dec!(50000)),
            welfare_paid_current_month: true,
            has_outstanding_loan: false,
        }
    }

    // -----------------------------------------------------------------------
    // 1. Fully eligible member
    // -----------------------------------------------------------------------
    #[test]
    fn test_eligible_member_passes_all_checks() {
        let report = evaluate(&good_standing(), dec!(20000), None);
        assert!(report.eligible);
        assert_eq!(report.reasons, Vec::<String>::new());
        assert_eq!(report.available_amount, dec!(50000));
    }

    // -----------------------------------------------------------------------
    // 2. Insufficient shares
    // -----------------------------------------------------------------------
    #[test]
    fn test_insufficient_shares() {
        let mut standing = good_standing();
        standing.shares_value = Some(dec!(15000));

        let report = evaluate(&standing, dec!(20000), None);
        assert!(!report.eligible);
        assert_eq!(
            report.reasons,
            vec!["Insufficient shares value for requested loan amount".to_string()]
        );
        assert_eq!(report.available_amount, dec!(15000));
    }

    // -----------------------------------------------------------------------
    // 3. All violations reported, not just the first
    // -----------------------------------------------------------------------
    #[test]
    fn test_all_violations_reported() {
        let standing = MemberStanding {
            member: MemberId(9),
            is_active_member: false,
            shares_value: None,
            welfare_paid_current_month: false,
            has_outstanding_loan: true,
        };

        let report = evaluate(&standing, dec!(5000), None);
        assert!(!report.eligible);
        assert_eq!(report.reasons.len(), 4);
        assert!(report
            .reasons
            .contains(&"Must be an active SACCO member".to_string()));
        assert!(report
            .reasons
            .contains(&"Must pay current month welfare contribution".to_string()));
        assert!(report.reasons.contains(&"No shares found for member".to_string()));
        assert!(report
            .reasons
            .contains(&"Member has other active loans".to_string()));
        assert_eq!(report.available_amount, Money::ZERO);
    }

    // -----------------------------------------------------------------------
    // 4. Guarantor coverage shortfall
    // -----------------------------------------------------------------------
    #[test]
    fn test_guarantor_coverage_shortfall() {
        let report = evaluate(&good_standing(), dec!(20000), Some(dec!(12000)));
        assert!(!report.eligible);
        assert_eq!(report.reasons.len(), 1);
        assert!(report.reasons[0].contains("Insufficient guarantor amount"));

        let covered = evaluate(&good_standing(), dec!(20000), Some(dec!(20000)));
        assert!(covered.eligible);
    }

    // -----------------------------------------------------------------------
    // 5. Shares exactly equal to the principal pass
    // -----------------------------------------------------------------------
    #[test]
    fn test_shares_exactly_at_ceiling() {
        let mut standing = good_standing();
        standing.shares_value = Some(dec!(20000));

        let report = evaluate(&standing, dec!(20000), None);
        assert!(report.eligible);
    }

    // -----------------------------------------------------------------------
    // 6. Term validation
    // -----------------------------------------------------------------------
    #[test]
    fn test_validate_terms() {
        assert!(validate_terms(dec!(1000), dec!(12), 6).is_ok());

        let err = validate_terms(dec!(0), dec!(12), 6).unwrap_err();
        match err {
            LoanError::InvalidInput { field, .. } => assert_eq!(field, "principal"),
            other => panic!("Expected InvalidInput, got {other:?}"),
        }

        let err = validate_terms(dec!(1000), dec!(0), 6).unwrap_err();
        match err {
            LoanError::InvalidInput { field, .. } => assert_eq!(field, "interest_rate"),
            other => panic!("Expected InvalidInput, got {other:?}"),
        }

        let err = validate_terms(dec!(1000), dec!(12), 0).unwrap_err();
        match err {
            LoanError::InvalidInput { field, .. } => assert_eq!(field, "term_months"),
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }
}
