//! SQL repositories
//!
//! Repositories speak rows and [`DatabaseError`](crate::DatabaseError);
//! the adapters in [`crate::adapters`] turn them into domain values.

pub mod payment;

pub use payment::{PaymentRow, PaymentStore, PAYMENT_COLUMNS};
