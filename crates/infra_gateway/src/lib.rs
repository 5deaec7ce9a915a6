//! Card Gateway Infrastructure
//!
//! Stripe adapter for the `PaymentGateway` port: payment intents, refunds
//! and signed webhook events.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use infra_gateway::{StripeConfig, StripeGateway};
//!
//! let gateway = StripeGateway::new(StripeConfig::new(secret_key, webhook_secret))?;
//! let service = PaymentService::new(repository).with_gateway(Arc::new(gateway));
//! ```

pub mod config;
pub mod stripe;
pub mod webhook;

pub use config::StripeConfig;
pub use stripe::StripeGateway;
pub use webhook::{parse_event, sign_payload, verify_signature, SignatureError};
