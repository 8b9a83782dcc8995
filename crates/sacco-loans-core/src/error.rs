use thiserror::Error;

use crate::types::{LoanRef, LoanStatus};

#[derive(Debug, Error)]
pub enum LoanError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Member is not eligible: {}", reasons.join(" | "))]
    Ineligible { reasons: Vec<String> },

    #[error("Cannot {action} a loan in {status} status (requires {required})")]
    InvalidTransition {
        action: &'static str,
        status: LoanStatus,
        required: &'static str,
    },

    #[error("Not authorized: {actor} may not {action}")]
    NotAuthorized { actor: String, action: &'static str },

    #[error("Concurrent modification of loan {loan_ref}, try again")]
    ConcurrencyConflict { loan_ref: LoanRef },

    #[error("{entity} not found: {reference}")]
    NotFound {
        entity: &'static str,
        reference: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for LoanError {
    fn from(e: serde_json::Error) -> Self {
        LoanError::Serialization(e.to_string())
    }
}
