use std::time::Duration;

use metrics::{counter, gauge};
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::session::SessionRegistry;

/// Background worker that closes sessions the UI abandoned without a DELETE.
#[derive(Clone)]
pub struct SessionSweeper {
    registry: SessionRegistry,
    ttl: chrono::Duration,
    interval: Duration,
}

impl SessionSweeper {
    pub fn new(registry: SessionRegistry, ttl: Duration, interval: Duration) -> Self {
        Self {
            registry,
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::weeks(52)),
            interval,
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run_loop().await;
        })
    }

    async fn run_loop(self) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    /// Runs one sweep and returns the number of sessions closed.
    pub async fn run_once(&self) -> usize {
        let evicted = self.registry.evict_idle(self.ttl).await;
        let open = self.registry.len().await;
        counter!("sessions_evicted_total").increment(evicted as u64);
        gauge!("sessions_open").set(open as f64);
        if evicted > 0 {
            info!(stage = "session", evicted, open, "idle sessions closed");
        }
        evicted
    }
}
