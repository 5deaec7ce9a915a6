//! Test Utilities Crate
//!
//! Shared test infrastructure, fixtures, and helpers for the payments test
//! suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built test data for common values
//! - `builders`: Builders for payment inputs and stored payments
//! - `database`: PostgreSQL container management and seeding
//! - `assertions`: Assertion helpers for payment invariants
//! - `generators`: Property-based test data generators

pub mod assertions;
pub mod builders;
pub mod database;
pub mod fixtures;
pub mod generators;

pub use assertions::*;
pub use builders::*;
pub use database::*;
pub use fixtures::*;
pub use generators::*;
