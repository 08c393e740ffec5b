//! In-memory [`RecordStore`].
//!
//! All state sits behind one mutex, so every method is a serializable
//! transaction. Clones share the same state.

use crate::store::{Committed, Grant, OrderWrite, RecordStore};
use anyhow::{anyhow, bail, Result};
use mooncake_types::{
    Award, AwardId, History, HistoryDraft, HistoryId, OrderDraft, OrderId, OrderStatus, Player,
    PointsOrder, PrizeLevel, Reward, RewardId, UserId,
};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{SystemTime, UNIX_EPOCH},
};

#[derive(Default)]
struct Inner {
    players: BTreeMap<UserId, Player>,
    awards: BTreeMap<AwardId, Award>,
    rewards: BTreeMap<RewardId, Reward>,
    histories: BTreeMap<HistoryId, History>,
    orders: BTreeMap<OrderId, PointsOrder>,
    next_history: u64,
    next_order: u64,
    read_only: bool,
    orders_read_only: bool,
}

impl Inner {
    fn granted(&self, reward: &RewardId) -> u32 {
        let count = self
            .histories
            .values()
            .filter(|h| h.got_reward && h.reward.as_ref() == Some(reward))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    fn has_quota(&self, reward: &RewardId) -> bool {
        self.rewards
            .get(reward)
            .is_some_and(|r| self.granted(reward) < r.amount)
    }

    fn best_of(&self, user: &UserId) -> Option<&History> {
        self.histories
            .values()
            .rev()
            .find(|h| h.is_best && &h.user == user)
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            bail!("record store is read-only");
        }
        Ok(())
    }

    fn check_orders_writable(&self) -> Result<()> {
        self.check_writable()?;
        if self.orders_read_only {
            bail!("points orders are read-only");
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every write until cleared.
    pub fn set_read_only(&self, read_only: bool) {
        self.lock().read_only = read_only;
    }

    /// Reject order writes only, leaving plays and grants writable.
    pub fn set_orders_read_only(&self, read_only: bool) {
        self.lock().orders_read_only = read_only;
    }

    /// Every stored History row, oldest first.
    pub fn histories(&self) -> Vec<History> {
        self.lock().histories.values().cloned().collect()
    }

    /// Every stored points order, oldest first.
    pub fn orders(&self) -> Vec<PointsOrder> {
        self.lock().orders.values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordStore for MemoryStore {
    async fn player(&self, id: &UserId) -> Result<Option<Player>> {
        Ok(self.lock().players.get(id).cloned())
    }

    async fn upsert_player(&self, player: Player) -> Result<()> {
        let mut inner = self.lock();
        inner.check_writable()?;
        inner.players.insert(player.id.clone(), player);
        Ok(())
    }

    async fn award(&self, id: &AwardId) -> Result<Option<Award>> {
        Ok(self.lock().awards.get(id).cloned())
    }

    async fn awards_by_level(&self, level: PrizeLevel) -> Result<Vec<Award>> {
        Ok(self
            .lock()
            .awards
            .values()
            .filter(|a| a.level == level)
            .cloned()
            .collect())
    }

    async fn upsert_award(&self, award: Award) -> Result<()> {
        let mut inner = self.lock();
        inner.check_writable()?;
        inner.awards.insert(award.id.clone(), award);
        Ok(())
    }

    async fn reward(&self, id: &RewardId) -> Result<Option<Reward>> {
        Ok(self.lock().rewards.get(id).cloned())
    }

    async fn rewards(&self) -> Result<Vec<Reward>> {
        Ok(self.lock().rewards.values().cloned().collect())
    }

    async fn upsert_reward(&self, reward: Reward) -> Result<()> {
        let mut inner = self.lock();
        inner.check_writable()?;
        inner.rewards.insert(reward.id.clone(), reward);
        Ok(())
    }

    async fn count_plays(&self, user: &UserId) -> Result<u32> {
        let count = self
            .lock()
            .histories
            .values()
            .filter(|h| &h.user == user)
            .count();
        Ok(u32::try_from(count)?)
    }

    async fn count_granted(&self, reward: &RewardId) -> Result<u32> {
        Ok(self.lock().granted(reward))
    }

    async fn current_best(&self, user: &UserId) -> Result<Option<History>> {
        Ok(self.lock().best_of(user).cloned())
    }

    async fn commit_play(
        &self,
        mut draft: HistoryDraft,
        demote: Option<HistoryId>,
    ) -> Result<Committed> {
        let mut inner = self.lock();
        inner.check_writable()?;

        // Best flag: the demoted row must still be the holder.
        let holder = inner.best_of(&draft.user).map(|h| h.id);
        if draft.is_best && holder != demote {
            bail!(
                "best row for {} changed: expected {:?}, found {:?}",
                draft.user,
                demote,
                holder
            );
        }
        if !draft.is_best && demote.is_some() {
            bail!("cannot demote best row without replacing it");
        }

        let mut quota_rejected = false;
        if draft.got_reward {
            let reward = draft
                .reward
                .clone()
                .ok_or_else(|| anyhow!("granted play has no reward"))?;
            if !inner.has_quota(&reward) {
                draft.got_reward = false;
                quota_rejected = true;
            }
        }

        if let Some(id) = demote {
            if let Some(previous) = inner.histories.get_mut(&id) {
                previous.is_best = false;
            }
        }

        inner.next_history += 1;
        let id = HistoryId(inner.next_history);
        let history = draft.into_history(id, now_ms());
        inner.histories.insert(id, history.clone());
        Ok(Committed {
            history,
            quota_rejected,
        })
    }

    async fn history(&self, id: HistoryId) -> Result<Option<History>> {
        Ok(self.lock().histories.get(&id).cloned())
    }

    async fn recent_histories(&self, user: &UserId, limit: usize) -> Result<Vec<History>> {
        Ok(self
            .lock()
            .histories
            .values()
            .rev()
            .filter(|h| &h.user == user)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn ungranted_histories(&self) -> Result<Vec<History>> {
        Ok(self
            .lock()
            .histories
            .values()
            .filter(|h| !h.got_reward && h.reward.is_some())
            .cloned()
            .collect())
    }

    async fn grant_history(&self, id: HistoryId) -> Result<Grant> {
        let mut inner = self.lock();
        inner.check_writable()?;
        let Some(reward) = inner.histories.get(&id).map(|h| (h.got_reward, h.reward.clone()))
        else {
            return Ok(Grant::Missing);
        };
        let reward = match reward {
            (true, _) => return Ok(Grant::AlreadyGranted),
            (false, None) => return Ok(Grant::Missing),
            (false, Some(reward)) => reward,
        };
        if !inner.rewards.contains_key(&reward) {
            return Ok(Grant::Missing);
        }
        if !inner.has_quota(&reward) {
            return Ok(Grant::QuotaExhausted);
        }
        if let Some(history) = inner.histories.get_mut(&id) {
            history.got_reward = true;
        }
        Ok(Grant::Granted)
    }

    async fn insert_order(&self, draft: OrderDraft) -> Result<PointsOrder> {
        let mut inner = self.lock();
        inner.check_orders_writable()?;
        inner.next_order += 1;
        let id = OrderId(inner.next_order);
        let order = draft.into_order(id, now_ms());
        inner.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn transition_order(
        &self,
        order: &PointsOrder,
        expected: OrderStatus,
    ) -> Result<OrderWrite> {
        let mut inner = self.lock();
        inner.check_orders_writable()?;
        let Some(stored) = inner.orders.get_mut(&order.id) else {
            return Ok(OrderWrite::Missing);
        };
        if stored.status != expected {
            return Ok(OrderWrite::Conflict(stored.status));
        }
        *stored = order.clone();
        stored.updated_at_ms = now_ms();
        Ok(OrderWrite::Applied)
    }

    async fn order(&self, id: OrderId) -> Result<Option<PointsOrder>> {
        Ok(self.lock().orders.get(&id).cloned())
    }

    async fn orders_by_status(&self, status: OrderStatus) -> Result<Vec<PointsOrder>> {
        Ok(self
            .lock()
            .orders
            .values()
            .filter(|o| o.status == status)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mooncake_types::DiceSet;

    fn reward(amount: u32) -> Reward {
        Reward {
            id: RewardId::new("r1"),
            level: PrizeLevel::OneFour,
            name: "Small mooncake".to_string(),
            points: 8,
            amount,
        }
    }

    fn draft(user: &str, got_reward: bool, is_best: bool) -> HistoryDraft {
        HistoryDraft {
            user: UserId::new(user),
            times: 1,
            award: Some(AwardId::new("a1")),
            reward: Some(RewardId::new("r1")),
            is_top: is_best,
            is_best,
            got_reward,
            dice: DiceSet::new([4, 4, 4, 4, 2, 3]).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_commit_assigns_sequential_ids() {
        let store = MemoryStore::new();
        store.upsert_reward(reward(5)).await.unwrap();
        let a = store.commit_play(draft("u", true, false), None).await.unwrap();
        let b = store.commit_play(draft("u", true, false), None).await.unwrap();
        assert_eq!(a.history.id, HistoryId(1));
        assert_eq!(b.history.id, HistoryId(2));
        assert_eq!(store.count_plays(&UserId::new("u")).await.unwrap(), 2);
        assert_eq!(store.count_granted(&RewardId::new("r1")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_commit_downgrades_when_quota_used() {
        let store = MemoryStore::new();
        store.upsert_reward(reward(1)).await.unwrap();
        let first = store.commit_play(draft("a", true, false), None).await.unwrap();
        assert!(!first.quota_rejected);
        let second = store.commit_play(draft("b", true, false), None).await.unwrap();
        assert!(second.quota_rejected);
        assert!(!second.history.got_reward);
        assert_eq!(store.count_granted(&RewardId::new("r1")).await.unwrap(), 1);
        assert_eq!(store.ungranted_histories().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_moves_best_flag() {
        let store = MemoryStore::new();
        let user = UserId::new("u");
        let first = store.commit_play(draft("u", false, true), None).await.unwrap();
        assert_eq!(
            store.current_best(&user).await.unwrap().map(|h| h.id),
            Some(first.history.id)
        );

        // Claiming best without naming the holder is rejected.
        assert!(store.commit_play(draft("u", false, true), None).await.is_err());

        let second = store
            .commit_play(draft("u", false, true), Some(first.history.id))
            .await
            .unwrap();
        let best = store.current_best(&user).await.unwrap().unwrap();
        assert_eq!(best.id, second.history.id);
        assert!(!store.history(first.history.id).await.unwrap().unwrap().is_best);
        assert_eq!(store.histories().iter().filter(|h| h.is_best).count(), 1);
    }

    #[tokio::test]
    async fn test_grant_history_is_conditional() {
        let store = MemoryStore::new();
        store.upsert_reward(reward(1)).await.unwrap();
        let a = store.commit_play(draft("a", false, false), None).await.unwrap();
        let b = store.commit_play(draft("b", false, false), None).await.unwrap();

        assert_eq!(store.grant_history(a.history.id).await.unwrap(), Grant::Granted);
        assert_eq!(
            store.grant_history(a.history.id).await.unwrap(),
            Grant::AlreadyGranted
        );
        assert_eq!(
            store.grant_history(b.history.id).await.unwrap(),
            Grant::QuotaExhausted
        );
        assert_eq!(store.grant_history(HistoryId(99)).await.unwrap(), Grant::Missing);
    }

    #[tokio::test]
    async fn test_recent_histories_newest_first() {
        let store = MemoryStore::new();
        for _ in 0..5 {
            store.commit_play(draft("u", false, false), None).await.unwrap();
        }
        store.commit_play(draft("other", false, false), None).await.unwrap();
        let recent = store.recent_histories(&UserId::new("u"), 3).await.unwrap();
        let ids: Vec<_> = recent.iter().map(|h| h.id.0).collect();
        assert_eq!(ids, vec![5, 4, 3]);
    }

    #[tokio::test]
    async fn test_orders_round_trip() {
        let store = MemoryStore::new();
        let mut order = store
            .insert_order(OrderDraft {
                user: UserId::new("u"),
                history: None,
                points: 100,
                memo: "ranking".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(order.id, OrderId(1));
        order.fail("boom").unwrap();
        assert_eq!(
            store.transition_order(&order, OrderStatus::Pending).await.unwrap(),
            OrderWrite::Applied
        );
        let failed = store.orders_by_status(OrderStatus::Failed).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error.as_deref(), Some("boom"));
        assert!(store.orders_by_status(OrderStatus::Pending).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transition_order_checks_stored_status() {
        let store = MemoryStore::new();
        let inserted = store
            .insert_order(OrderDraft {
                user: UserId::new("u"),
                history: None,
                points: 5,
                memo: "m".to_string(),
            })
            .await
            .unwrap();

        // Two writers start from the same pending copy; only one lands.
        let mut paid = inserted.clone();
        paid.succeed().unwrap();
        let mut failed = inserted.clone();
        failed.fail("late").unwrap();
        assert_eq!(
            store.transition_order(&paid, OrderStatus::Pending).await.unwrap(),
            OrderWrite::Applied
        );
        assert_eq!(
            store.transition_order(&failed, OrderStatus::Pending).await.unwrap(),
            OrderWrite::Conflict(OrderStatus::Success)
        );
        let stored = store.order(inserted.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Success);

        let mut ghost = inserted;
        ghost.id = OrderId(42);
        assert_eq!(
            store.transition_order(&ghost, OrderStatus::Pending).await.unwrap(),
            OrderWrite::Missing
        );
    }

    #[tokio::test]
    async fn test_orders_read_only_keeps_plays_writable() {
        let store = MemoryStore::new();
        store.set_orders_read_only(true);
        assert!(store.commit_play(draft("u", false, false), None).await.is_ok());
        assert!(store
            .insert_order(OrderDraft {
                user: UserId::new("u"),
                history: None,
                points: 5,
                memo: "m".to_string(),
            })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_read_only_rejects_writes() {
        let store = MemoryStore::new();
        store.set_read_only(true);
        assert!(store.commit_play(draft("u", false, false), None).await.is_err());
        assert!(store.histories().is_empty());
        store.set_read_only(false);
        assert!(store.commit_play(draft("u", false, false), None).await.is_ok());
    }
}
