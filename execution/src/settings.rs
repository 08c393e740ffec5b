//! Activity settings.

use mooncake_types::PrizeLevel;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default tuning constants.
pub mod defaults {
    use mooncake_types::PrizeLevel;

    pub const BASE_PLAYS: u32 = 3;
    pub const MAX_PLAYS: u32 = 20;
    pub const DISTRIBUTE_TOP_TIER: bool = false;
    pub const ANNOUNCE_MIN_LEVEL: PrizeLevel = PrizeLevel::FourOfAKindNonFour;
    pub const DRY_RUN: bool = false;
    pub const HISTORY_LIMIT: usize = 20;
    pub const MEMO_PREFIX: &str = "Mooncake festival";
    pub const ACTIVITY_URL: &str = "";
    pub const ANNOUNCE_QUEUE: usize = 64;
    pub const THROTTLE_INTERVAL_MS: u64 = 200;
    pub const THROTTLE_BATCH_SIZE: usize = 10;
    pub const THROTTLE_BATCH_PAUSE_MS: u64 = 1_000;
}

fn default_base_plays() -> u32 {
    defaults::BASE_PLAYS
}

fn default_max_plays() -> u32 {
    defaults::MAX_PLAYS
}

fn default_distribute_top_tier() -> bool {
    defaults::DISTRIBUTE_TOP_TIER
}

fn default_announce_min_level() -> PrizeLevel {
    defaults::ANNOUNCE_MIN_LEVEL
}

fn default_dry_run() -> bool {
    defaults::DRY_RUN
}

fn default_history_limit() -> usize {
    defaults::HISTORY_LIMIT
}

fn default_memo_prefix() -> String {
    defaults::MEMO_PREFIX.to_string()
}

fn default_activity_url() -> String {
    defaults::ACTIVITY_URL.to_string()
}

fn default_announce_queue() -> usize {
    defaults::ANNOUNCE_QUEUE
}

fn default_interval_ms() -> u64 {
    defaults::THROTTLE_INTERVAL_MS
}

fn default_batch_size() -> usize {
    defaults::THROTTLE_BATCH_SIZE
}

fn default_batch_pause_ms() -> u64 {
    defaults::THROTTLE_BATCH_PAUSE_MS
}

/// Pacing of external calls made by batch jobs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleSettings {
    /// Minimum spacing between calls. Zero disables spacing.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Records between long pauses. Zero disables the pause.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            batch_size: default_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
        }
    }
}

impl ThrottleSettings {
    /// No pacing at all.
    pub fn unthrottled() -> Self {
        Self {
            interval_ms: 0,
            batch_size: 0,
            batch_pause_ms: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySettings {
    /// Plays every player gets.
    #[serde(default = "default_base_plays")]
    pub base_plays: u32,
    /// Hard cap on plays including bonus plays.
    #[serde(default = "default_max_plays")]
    pub max_plays: u32,
    /// Pay points automatically for top-tier grants.
    #[serde(default = "default_distribute_top_tier")]
    pub distribute_top_tier: bool,
    /// Lowest level that triggers a chat announcement.
    #[serde(default = "default_announce_min_level")]
    pub announce_min_level: PrizeLevel,
    /// Log external calls instead of making them.
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_memo_prefix")]
    pub memo_prefix: String,
    /// Link appended to announcements.
    #[serde(default = "default_activity_url")]
    pub activity_url: String,
    /// Capacity of the announcement queue.
    #[serde(default = "default_announce_queue")]
    pub announce_queue: usize,
    #[serde(default)]
    pub throttle: ThrottleSettings,
}

impl Default for ActivitySettings {
    fn default() -> Self {
        Self {
            base_plays: default_base_plays(),
            max_plays: default_max_plays(),
            distribute_top_tier: default_distribute_top_tier(),
            announce_min_level: default_announce_min_level(),
            dry_run: default_dry_run(),
            history_limit: default_history_limit(),
            memo_prefix: default_memo_prefix(),
            activity_url: default_activity_url(),
            announce_queue: default_announce_queue(),
            throttle: ThrottleSettings::default(),
        }
    }
}

impl ActivitySettings {
    /// Total plays allowed for a player with `bonus_plays` earned.
    pub fn allowed_plays(&self, bonus_plays: u32) -> u32 {
        self.base_plays
            .saturating_add(bonus_plays)
            .min(self.max_plays)
    }

    /// Whether a granted reward at `level` is paid out automatically.
    pub fn distributes(&self, level: PrizeLevel) -> bool {
        !level.is_top() || self.distribute_top_tier
    }

    pub fn announces(&self, level: PrizeLevel) -> bool {
        level >= self.announce_min_level
    }
}
