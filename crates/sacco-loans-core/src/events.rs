//! Outbound notification events.
//!
//! The engine never awaits delivery: events are pushed into an outbox
//! only after the local transaction commits, and a transport of the
//! caller's choosing drains them fire-and-forget.

use serde::{Deserialize, Serialize};

use crate::types::{LoanRef, MemberId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    LoanApproved,
    LoanRejected,
    LoanDisbursed,
    LoanFullyPaid,
    PenaltyImposed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub loan_ref: LoanRef,
    pub member: MemberId,
    pub event_type: EventType,
    pub payload: serde_json::Value,
}
