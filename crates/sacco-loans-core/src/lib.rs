//! Loan lifecycle and repayment engine for a SACCO (savings and credit
//! cooperative).
//!
//! The engine covers the full life of a loan: eligibility evaluation,
//! application, multi-admin approval, guarantor coverage, disbursement,
//! amortization schedules, repayment processing, late-payment penalties
//! and portfolio statistics. All monetary arithmetic uses
//! [`rust_decimal::Decimal`].
//!
//! [`engine::LoanEngine`] is the entry point; the workflow modules
//! underneath it are pure functions over the domain records and can be
//! used directly.

pub mod amortization;
pub mod approval;
pub mod disbursement;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod events;
pub mod model;
pub mod penalty;
pub mod repayment;
pub mod store;
pub mod types;

pub use error::LoanError;

/// Convenience alias used across the crate.
pub type LoanResult<T> = Result<T, LoanError>;
