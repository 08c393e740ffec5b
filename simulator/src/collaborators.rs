//! In-process stand-ins for the community platform.

use anyhow::{anyhow, Result};
use mooncake_execution::{
    announce::NotificationSink,
    gate::{ActivityGate, Deadline},
    points::PointDistributor,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
};
use tracing::{debug, info};

struct Ledger {
    rng: StdRng,
    failure_rate: f64,
    balances: BTreeMap<String, u64>,
    failures: usize,
}

/// Credits points to an in-memory balance sheet, failing at a configured rate.
#[derive(Clone)]
pub struct SimulatedDistributor {
    ledger: Arc<Mutex<Ledger>>,
}

impl SimulatedDistributor {
    pub fn new(failure_rate: f64, seed: u64) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger {
                rng: StdRng::seed_from_u64(seed),
                failure_rate: failure_rate.clamp(0.0, 1.0),
                balances: BTreeMap::new(),
                failures: 0,
            })),
        }
    }

    #[cfg(test)]
    fn set_failure_rate(&self, failure_rate: f64) {
        self.ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .failure_rate = failure_rate.clamp(0.0, 1.0);
    }

    pub fn balances(&self) -> BTreeMap<String, u64> {
        self.ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .balances
            .clone()
    }

    pub fn total_paid(&self) -> u64 {
        self.ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .balances
            .values()
            .sum()
    }

    /// Rejected calls so far.
    pub fn failures(&self) -> usize {
        self.ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .failures
    }
}

impl PointDistributor for SimulatedDistributor {
    async fn distribute(&self, username: &str, points: u64, memo: &str) -> Result<()> {
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        let roll: f64 = ledger.rng.gen();
        if roll < ledger.failure_rate {
            ledger.failures += 1;
            return Err(anyhow!("platform rejected transfer to {username}"));
        }
        let balance = ledger.balances.entry(username.to_string()).or_default();
        *balance = balance.saturating_add(points);
        debug!(username, points, memo, "points credited");
        Ok(())
    }
}

/// Writes announcements to the log and counts them.
#[derive(Clone, Default)]
pub struct LogSink {
    sent: Arc<AtomicUsize>,
}

impl LogSink {
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

impl NotificationSink for LogSink {
    async fn send(&self, message: &str) -> Result<()> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        info!(text = %message, "announcement");
        Ok(())
    }
}

/// Activity window: open forever, or until a deadline.
#[derive(Clone, Copy, Debug)]
pub struct Window(Option<Deadline>);

impl Window {
    pub fn new(ends_at_ms: Option<u64>) -> Self {
        Self(ends_at_ms.map(Deadline::new))
    }
}

impl ActivityGate for Window {
    fn is_open(&self) -> bool {
        self.0.map_or(true, |deadline| deadline.is_open())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_distributor_credits_balances() {
        let distributor = SimulatedDistributor::new(0.0, 1);
        distributor.distribute("alice", 8, "memo").await.unwrap();
        distributor.distribute("alice", 16, "memo").await.unwrap();
        distributor.distribute("bob", 128, "memo").await.unwrap();
        assert_eq!(distributor.balances().get("alice"), Some(&24));
        assert_eq!(distributor.total_paid(), 152);
        assert_eq!(distributor.failures(), 0);
    }

    #[tokio::test]
    async fn test_distributor_failure_rate() {
        let distributor = SimulatedDistributor::new(1.0, 1);
        let err = distributor.distribute("alice", 8, "memo").await.unwrap_err();
        assert!(err.to_string().contains("alice"));
        assert_eq!(distributor.failures(), 1);
        assert_eq!(distributor.total_paid(), 0);

        distributor.set_failure_rate(0.0);
        distributor.distribute("alice", 8, "memo").await.unwrap();
        assert_eq!(distributor.total_paid(), 8);
    }

    #[tokio::test]
    async fn test_log_sink_counts() {
        let sink = LogSink::default();
        sink.send("hello").await.unwrap();
        sink.clone().send("again").await.unwrap();
        assert_eq!(sink.sent(), 2);
    }

    #[test]
    fn test_window() {
        assert!(Window::new(None).is_open());
        assert!(!Window::new(Some(0)).is_open());
        assert!(Window::new(Some(u64::MAX)).is_open());
    }
}
