//! Payment domain errors

use thiserror::Error;

use core_kernel::{CoreError, MoneyError, PortError};

use crate::payment::PaymentStatus;

/// Errors that can occur in the payment domain
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Payment not found
    #[error("Payment not found: {0}")]
    NotFound(String),

    /// Input failed a business rule
    #[error("Validation error: {0}")]
    Validation(String),

    /// The lifecycle table rejected the requested change
    #[error("Cannot {action} a payment that is {from}")]
    InvalidTransition {
        from: PaymentStatus,
        action: &'static str,
    },

    /// A gateway call was needed but no gateway is wired in
    #[error("Payment gateway not configured")]
    GatewayNotConfigured,

    /// The payment gateway failed or refused the call
    #[error("Payment gateway error: {0}")]
    Gateway(#[source] PortError),

    /// Persistence failed
    #[error("Repository error: {0}")]
    Repository(#[from] PortError),

    /// Money arithmetic failed
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    /// Kernel error (calendar arithmetic)
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl PaymentError {
    pub fn validation(message: impl Into<String>) -> Self {
        PaymentError::Validation(message.into())
    }
}

/// Result alias for payment operations
pub type PaymentResult<T> = Result<T, PaymentError>;
