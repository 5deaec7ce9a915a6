//! Rentora Payments - API Server Binary
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin rentora-api
//!
//! # Run with environment variables
//! API_PORT=8080 API_DATABASE_URL=postgres://... API_STRIPE_SECRET_KEY=sk_test_... cargo run --bin rentora-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_JWT_SECRET` - JWT signing secret (required in production)
//! * `API_JWT_EXPIRATION_SECS` - JWT token expiration in seconds (default: 3600)
//! * `API_DATABASE_URL` - PostgreSQL connection string
//! * `API_DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! * `API_LOG_LEVEL` - Log level when `RUST_LOG` is unset (default: info)
//! * `API_STRIPE_SECRET_KEY` - Stripe secret key; unset disables card processing
//! * `API_STRIPE_WEBHOOK_SECRET` - Endpoint secret for `/webhooks/stripe`
//! * `API_STRIPE_API_BASE` - Override the Stripe endpoint (stripe-mock, tests)
//! * `API_DEFAULT_CURRENCY` - Currency for payments created without one (default: GBP)
//! * `API_RECURRING_INTERVAL_SECS` - Seconds between recurring runs, 0 disables (default: 3600)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_payment::{PaymentService, ServiceSettings};
use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresPaymentAdapter};
use infra_gateway::{StripeConfig, StripeGateway};
use interface_api::{config::ApiConfig, create_router, scheduler::RecurringScheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("invalid API_* configuration")?;

    init_tracing(&config.log_level);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        stripe = config.stripe_enabled(),
        "Starting Rentora Payments API Server"
    );

    let pool = create_pool(
        DatabaseConfig::new(config.database_url.clone()).max_connections(config.db_max_connections),
    )
    .await
    .context("database connection failed")?;
    run_migrations(&pool).await.context("database migrations failed")?;
    tracing::info!("Database ready");

    let service = Arc::new(build_service(&config, pool)?);

    let scheduler = match config.recurring_interval_secs {
        0 => {
            tracing::info!("Recurring payment scheduler disabled");
            None
        }
        secs => Some(RecurringScheduler::spawn(
            service.clone(),
            Duration::from_secs(secs),
        )),
    };

    let app = create_router(service, config.clone());

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("invalid listen address {}", config.server_addr()))?;
    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wires the payment service to Postgres and, when configured, Stripe
fn build_service(config: &ApiConfig, pool: infra_db::DatabasePool) -> anyhow::Result<PaymentService> {
    let settings = ServiceSettings {
        default_currency: config
            .default_currency()
            .context("API_DEFAULT_CURRENCY is not a supported currency")?,
        ..ServiceSettings::default()
    };
    let mut service =
        PaymentService::new(Arc::new(PostgresPaymentAdapter::new(pool))).with_settings(settings);

    if config.stripe_enabled() {
        let mut stripe = StripeConfig::new(
            config.stripe_secret_key.clone(),
            config.stripe_webhook_secret.clone(),
        );
        if let Some(base) = &config.stripe_api_base {
            stripe = stripe.api_base(base.clone());
        }
        let gateway = StripeGateway::new(stripe).context("could not build the Stripe client")?;
        service = service.with_gateway(Arc::new(gateway));
        tracing::info!("Stripe gateway enabled");
    } else {
        tracing::warn!("API_STRIPE_SECRET_KEY is unset; card payments will settle manually");
    }

    Ok(service)
}

/// Initializes the tracing subscriber for structured logging.
///
/// `RUST_LOG` wins over `log_level` when both are set.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
