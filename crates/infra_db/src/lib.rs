//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for payments using SQLx.
//!
//! # Architecture
//!
//! - [`repositories`]: SQL against the `payments` table and its lookup tables,
//!   returning plain row types and [`DatabaseError`]
//! - [`adapters`]: implementations of the domain ports over the repositories,
//!   translating rows to domain values and errors to `PortError`
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresPaymentAdapter};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/rentora")).await?;
//! run_migrations(&pool).await?;
//! let repository = PostgresPaymentAdapter::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::PostgresPaymentAdapter;
pub use error::DatabaseError;
pub use pool::{create_pool, run_migrations, DatabaseConfig, DatabasePool};
