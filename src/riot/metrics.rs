use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{Instrument, info_span};

/// Counts Riot API requests so the sustained rate can be compared with the
/// configured limiter budget.
#[derive(Debug)]
pub struct RequestMetrics {
    start: Instant,
    count: AtomicU64,
    name: &'static str,
}

impl RequestMetrics {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            start: Instant::now(),
            count: AtomicU64::new(0),
            name,
        })
    }

    pub fn inc(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Average requests per minute since creation.
    pub fn per_minute(&self) -> f64 {
        let elapsed_min = self.start.elapsed().as_secs_f64() / 60.0;
        if elapsed_min > 0.0 {
            self.total() as f64 / elapsed_min
        } else {
            0.0
        }
    }

    pub async fn log_loop(self: Arc<Self>, every: Duration) {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            async {
                tracing::info!(
                    total = self.total(),
                    "📊 {} requests executed (avg {:.2} req/min)",
                    self.total(),
                    self.per_minute()
                );
            }
            .instrument(info_span!("riot_metrics", client = self.name))
            .await
        }
    }
}
