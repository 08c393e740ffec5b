//! Record store interface.
//!
//! The activity persists players, the award/reward catalog, play history and
//! points orders through [`RecordStore`]. Implementations must make
//! [`RecordStore::commit_play`] and [`RecordStore::grant_history`] atomic with
//! respect to each other: both re-check a reward's quota against the rows
//! already granted and only then write. Points orders change only through
//! [`RecordStore::transition_order`], a compare-and-swap on the stored status.

use anyhow::Result;
use mooncake_types::{
    Award, AwardId, History, HistoryDraft, HistoryId, OrderDraft, OrderId, OrderStatus, Player,
    PointsOrder, PrizeLevel, Reward, RewardId, UserId,
};
use std::future::Future;

/// Result of [`RecordStore::commit_play`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Committed {
    pub history: History,
    /// The draft claimed a reward unit but the quota was exhausted at write
    /// time; the row was stored with `got_reward = false`.
    pub quota_rejected: bool,
}

/// Result of [`RecordStore::grant_history`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grant {
    Granted,
    AlreadyGranted,
    QuotaExhausted,
    /// The row or its reward no longer exists.
    Missing,
}

/// Result of [`RecordStore::transition_order`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderWrite {
    Applied,
    /// Another writer moved the order first; carries the stored status.
    Conflict(OrderStatus),
    Missing,
}

pub trait RecordStore: Send + Sync {
    fn player(&self, id: &UserId) -> impl Future<Output = Result<Option<Player>>> + Send;
    fn upsert_player(&self, player: Player) -> impl Future<Output = Result<()>> + Send;

    fn award(&self, id: &AwardId) -> impl Future<Output = Result<Option<Award>>> + Send;
    fn awards_by_level(&self, level: PrizeLevel) -> impl Future<Output = Result<Vec<Award>>> + Send;
    fn upsert_award(&self, award: Award) -> impl Future<Output = Result<()>> + Send;

    fn reward(&self, id: &RewardId) -> impl Future<Output = Result<Option<Reward>>> + Send;
    fn rewards(&self) -> impl Future<Output = Result<Vec<Reward>>> + Send;
    fn upsert_reward(&self, reward: Reward) -> impl Future<Output = Result<()>> + Send;

    /// Number of History rows recorded for a player.
    fn count_plays(&self, user: &UserId) -> impl Future<Output = Result<u32>> + Send;

    /// Number of History rows holding a unit of `reward`.
    fn count_granted(&self, reward: &RewardId) -> impl Future<Output = Result<u32>> + Send;

    /// The player's row flagged `is_best`, if any.
    fn current_best(&self, user: &UserId) -> impl Future<Output = Result<Option<History>>> + Send;

    /// Insert a play atomically.
    ///
    /// When `demote` is set it must name the player's current best row, which
    /// loses the flag in the same write; otherwise the player must have no
    /// best row if the draft claims one. A draft with `got_reward` is
    /// downgraded when the reward's quota is already used up.
    fn commit_play(
        &self,
        draft: HistoryDraft,
        demote: Option<HistoryId>,
    ) -> impl Future<Output = Result<Committed>> + Send;

    fn history(&self, id: HistoryId) -> impl Future<Output = Result<Option<History>>> + Send;

    /// Newest first.
    fn recent_histories(
        &self,
        user: &UserId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<History>>> + Send;

    /// Rows that reference a reward but hold no unit of it, oldest first.
    fn ungranted_histories(&self) -> impl Future<Output = Result<Vec<History>>> + Send;

    /// Flip `got_reward` from false to true if the reward still has quota.
    fn grant_history(&self, id: HistoryId) -> impl Future<Output = Result<Grant>> + Send;

    fn insert_order(&self, draft: OrderDraft) -> impl Future<Output = Result<PointsOrder>> + Send;

    /// Replace a stored order only while its stored status is still `expected`.
    fn transition_order(
        &self,
        order: &PointsOrder,
        expected: OrderStatus,
    ) -> impl Future<Output = Result<OrderWrite>> + Send;

    fn order(&self, id: OrderId) -> impl Future<Output = Result<Option<PointsOrder>>> + Send;

    /// Oldest first.
    fn orders_by_status(
        &self,
        status: OrderStatus,
    ) -> impl Future<Output = Result<Vec<PointsOrder>>> + Send;
}
