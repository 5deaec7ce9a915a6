//! Request and response bodies

pub mod payment;
