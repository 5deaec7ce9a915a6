//! HTTP API Layer
//!
//! REST API for the payments module using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: payment CRUD and settlement, dashboard, webhooks, health
//! - **Middleware**: JWT authentication and audit logging
//! - **DTOs**: flat request and response bodies in a `{success, message, data}` envelope
//! - **Scheduler**: background task for the recurring payment batch
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let app = create_router(Arc::new(service), config);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod scheduler;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use domain_payment::PaymentService;

use crate::config::ApiConfig;
use crate::handlers::{health, payments, webhooks};
use crate::middleware::{audit_middleware, auth_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PaymentService>,
    pub config: ApiConfig,
}

/// Creates the main API router
pub fn create_router(service: Arc<PaymentService>, config: ApiConfig) -> Router {
    let state = AppState { service, config };

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/webhooks/stripe", post(webhooks::stripe_webhook));

    let payment_routes = Router::new()
        .route("/", post(payments::create_payment).get(payments::list_payments))
        .route("/dashboard", get(payments::dashboard))
        .route("/stripe/payment-intent", post(payments::create_payment_intent))
        .route("/recurring/run", post(payments::run_recurring))
        .route(
            "/:id",
            get(payments::get_payment)
                .patch(payments::update_payment)
                .delete(payments::delete_payment),
        )
        .route("/:id/process", post(payments::process_payment))
        .route("/:id/refund", post(payments::refund_payment));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/payments", payment_routes)
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
