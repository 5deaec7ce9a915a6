//! Payment lifecycle state machine
//!
//! All status changes are decided here, keyed by `(current status, event)`.
//! Service code and webhook reconciliation fire events; they never assign
//! `status` directly.
//!
//! ```text
//!              IntentCreated
//!   Pending ─────────────────▶ Processing
//!      │  \                      │   │  \
//!      │   \ ManualSettlement    │   │   \ GatewayCanceled
//!      │    \ GatewaySucceeded   │   │    ▼
//!      │     ▼                   │   │  Cancelled
//!      │   Completed ◀───────────┘   │
//!      │     │  Refund{full:false}   │ GatewayRequiresPaymentMethod
//!      │     ▼                       │ ProcessingFailed
//!      │   PartiallyRefunded         ▼
//!      │     │  Refund{full:true}  Failed
//!      │     ▼
//!      └─▶ Refunded
//! ```
//!
//! `GatewaySucceeded` also completes a `Failed` payment: a declined intent
//! stays open at the gateway and the payer may retry it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PaymentError;
use crate::payment::PaymentStatus;

/// Something that happened to a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum PaymentEvent {
    /// A gateway intent was created for the payment
    IntentCreated,
    /// Descriptive fields are being edited
    Edit,
    /// The payment is being soft-deleted
    Delete,
    /// Entry guard for synchronous processing
    BeginProcessing,
    /// Gateway reported `succeeded`
    GatewaySucceeded,
    /// Gateway reported `requires_payment_method`
    GatewayRequiresPaymentMethod,
    /// Gateway reported any other in-flight status
    GatewayPending,
    /// Settled outside the gateway
    ManualSettlement,
    /// Processing raised an error after the entry guard
    ProcessingFailed,
    /// Gateway cancelled the intent
    GatewayCanceled,
    /// Money went back to the payer
    Refund { full: bool },
}

impl PaymentEvent {
    /// Verb used in rejection messages
    pub fn action(&self) -> &'static str {
        match self {
            PaymentEvent::IntentCreated => "start gateway collection for",
            PaymentEvent::Edit => "update",
            PaymentEvent::Delete => "delete",
            PaymentEvent::BeginProcessing
            | PaymentEvent::GatewaySucceeded
            | PaymentEvent::GatewayRequiresPaymentMethod
            | PaymentEvent::GatewayPending
            | PaymentEvent::ManualSettlement
            | PaymentEvent::ProcessingFailed => "process",
            PaymentEvent::GatewayCanceled => "cancel",
            PaymentEvent::Refund { .. } => "refund",
        }
    }
}

impl fmt::Display for PaymentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentEvent::Refund { full: true } => f.write_str("refund(full)"),
            PaymentEvent::Refund { full: false } => f.write_str("refund(partial)"),
            other => write!(f, "{:?}", other),
        }
    }
}

impl PaymentStatus {
    /// Looks up the transition table
    ///
    /// # Returns
    ///
    /// The status after the event, which equals `self` for events that only
    /// guard an operation.
    ///
    /// # Errors
    ///
    /// `PaymentError::InvalidTransition` when the event is not allowed from
    /// the current status.
    pub fn apply(self, event: PaymentEvent) -> Result<PaymentStatus, PaymentError> {
        use PaymentEvent as E;
        use PaymentStatus as S;

        let next = match (self, event) {
            (S::Pending, E::IntentCreated) => Some(S::Processing),

            (S::Completed | S::Failed | S::Refunded, E::Edit) => None,
            (current, E::Edit) => Some(current),

            (S::Completed, E::Delete) => None,
            (current, E::Delete) => Some(current),

            (S::Pending | S::Processing, E::BeginProcessing | E::GatewayPending) => Some(self),
            (S::Pending | S::Processing | S::Failed, E::GatewaySucceeded) => Some(S::Completed),
            (S::Pending | S::Processing, E::ManualSettlement) => Some(S::Completed),
            (S::Pending | S::Processing, E::GatewayRequiresPaymentMethod | E::ProcessingFailed) => {
                Some(S::Failed)
            }
            (S::Pending | S::Processing, E::GatewayCanceled) => Some(S::Cancelled),

            (S::Completed | S::PartiallyRefunded, E::Refund { full: true }) => Some(S::Refunded),
            (S::Completed | S::PartiallyRefunded, E::Refund { full: false }) => {
                Some(S::PartiallyRefunded)
            }

            _ => None,
        };

        next.ok_or(PaymentError::InvalidTransition {
            from: self,
            action: event.action(),
        })
    }

    /// True when `event` is allowed from this status
    pub fn permits(self, event: PaymentEvent) -> bool {
        self.apply(event).is_ok()
    }
}
