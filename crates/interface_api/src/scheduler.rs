//! Background runner for the recurring payment batch
//!
//! One task per process. Running several API instances would spawn the same
//! successors more than once, so only one instance should enable it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use domain_payment::PaymentService;

/// Handle to a running scheduler
pub struct RecurringScheduler {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl RecurringScheduler {
    /// Starts the batch loop; the first run happens one `period` after start
    pub fn spawn(service: Arc<PaymentService>, period: Duration) -> Self {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(period_secs = period.as_secs(), "Recurring payment scheduler started");

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("Recurring payment scheduler shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = service.process_recurring_payments(Utc::now()).await {
                            error!(error = %e, "Recurring payment run failed");
                        }
                    }
                }
            }
        });

        Self { shutdown, handle }
    }

    /// Stops the loop and waits for an in-flight run to finish
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            error!(error = %e, "Recurring payment scheduler task panicked");
        }
    }
}
