//! Activity window.

use std::time::{SystemTime, UNIX_EPOCH};

/// Whether new plays are accepted.
pub trait ActivityGate: Send + Sync {
    fn is_open(&self) -> bool;
}

/// Never closes.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysOpen;

impl ActivityGate for AlwaysOpen {
    fn is_open(&self) -> bool {
        true
    }
}

/// Open until a wall-clock deadline, in milliseconds since the Unix epoch.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    pub ends_at_ms: u64,
}

impl Deadline {
    pub fn new(ends_at_ms: u64) -> Self {
        Self { ends_at_ms }
    }

    pub fn is_open_at(&self, now_ms: u64) -> bool {
        now_ms < self.ends_at_ms
    }
}

impl ActivityGate for Deadline {
    fn is_open(&self) -> bool {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        self.is_open_at(now_ms)
    }
}
