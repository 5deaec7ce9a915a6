//! Core error types used across the system

use thiserror::Error;
use crate::money::MoneyError;

/// Core error type for the kernel
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Calendar error: {0}")]
    Calendar(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn calendar(message: impl Into<String>) -> Self {
        CoreError::Calendar(message.into())
    }
}
