//! Domain Adapters
//!
//! Implementations of domain ports over the PostgreSQL repositories.

pub mod payment;

pub use payment::{row_to_payment, PostgresPaymentAdapter};
