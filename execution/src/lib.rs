//! Mooncake activity execution core.
//!
//! Rolls six dice, classifies the roll into one of thirteen prize levels,
//! tracks each player's best top-tier result, allocates quota-limited rewards
//! and pays points through the external platform.
//!
//! ## Pipeline
//! [`Activity::play`] is the entrypoint for a single play:
//! 1. [`dice::DiceSource`] rolls, [`classify::evaluate`] classifies.
//! 2. [`best::resolve_best`] decides whether a top-tier result becomes the
//!    player's best, using [`compare::compare`].
//! 3. [`ledger::RewardLedger`] picks an award and decides the grant.
//! 4. [`store::RecordStore::commit_play`] persists the History row atomically.
//! 5. [`announce::Announcer`] and [`points::Payouts`] run after commit and
//!    never change the History row.
//!
//! ## Consistency
//! - A player has at most one `is_best` row, always their best top-tier play.
//! - Granted rows per reward never exceed the reward's amount. The count is
//!   derived from History, checked under a per-reward lock and re-checked by
//!   the store's conditional write.
//! - Points orders move `pending -> success | failed` and `failed -> pending`
//!   only.
//!
//! Fix-up jobs live in [`jobs`]: [`Activity::reissue_rewards`] and
//! [`Activity::retry_failed_orders`].
//!
//! ## Example
//! ```rust,ignore
//! use mooncake_execution::{
//!     dice::DiceRoller, gate::AlwaysOpen, memory::MemoryStore, settings::ActivitySettings,
//!     Activity,
//! };
//!
//! # async fn example(distributor: impl mooncake_execution::points::PointDistributor) -> anyhow::Result<()> {
//! let store = MemoryStore::new();
//! let activity = Activity::new(
//!     store,
//!     DiceRoller::from_entropy(),
//!     distributor,
//!     AlwaysOpen,
//!     ActivitySettings::default(),
//! );
//! let outcome = activity.play(&"alice".into()).await?;
//! println!("{} -> {}", outcome.dice, outcome.label);
//! # Ok(())
//! # }
//! ```

pub mod activity;
pub mod announce;
pub mod best;
pub mod classify;
pub mod compare;
pub mod dice;
pub mod error;
pub mod gate;
pub mod jobs;
pub mod ledger;
pub mod locks;
pub mod memory;
pub mod points;
pub mod settings;
pub mod store;
pub mod throttle;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

#[cfg(test)]
mod concurrency_tests;

pub use activity::{Activity, HistoryEntry, PlayOutcome};
pub use error::PlayError;
pub use jobs::{ReissueReport, RetryReport};
pub use ledger::RewardStanding;
