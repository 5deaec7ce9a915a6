//! Core Kernel - Foundational types shared by every payments crate
//!
//! This crate provides the building blocks used across the domain, infrastructure
//! and interface layers:
//! - Money types with precise decimal arithmetic
//! - Calendar helpers for billing cycles and monthly reporting windows
//! - Strongly-typed identifiers
//! - Port abstractions for the hexagonal architecture

pub mod calendar;
pub mod error;
pub mod identifiers;
pub mod money;
pub mod ports;

pub use calendar::{add_months_clamped, month_start, trailing_months, MonthWindow};
pub use error::CoreError;
pub use identifiers::{
    BookingId, MaintenanceRequestId, PaymentId, PropertyId, TenancyId, UserId,
};
pub use money::{Currency, Money, MoneyError};
pub use ports::{
    AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PortError,
};
