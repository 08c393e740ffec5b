//! Reward ledger.
//!
//! Maps a level to an award and its reward, and decides whether the play takes
//! one unit of the reward's quota. The number of units already issued is
//! always counted from granted History rows; there is no separate counter.
//!
//! Catalog problems (no award for a level, an award without a reward, a
//! dangling reward id) and failed counts never abort a play: the play is
//! recorded without a grant and a warning is logged.

use crate::{locks::KeyedLocks, store::RecordStore};
use anyhow::Result;
use mooncake_types::{Award, GameResult, PrizeLevel, Reward, RewardId, UserId};
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

/// Eligibility for one unit of a reward.
///
/// Top-tier levels additionally require the play to be the player's best.
pub fn eligible(level: PrizeLevel, is_best: bool, issued: u32, amount: u32) -> bool {
    if issued >= amount {
        return false;
    }
    !level.is_top() || is_best
}

/// Award and reward resolved for a level.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub award: Option<Award>,
    pub reward: Option<Reward>,
}

/// Outcome of [`RewardLedger::allocate`].
///
/// While alive it holds the reward's lock, so the caller can commit the play
/// before anyone else counts the reward.
#[derive(Debug)]
pub struct Allocation {
    pub award: Option<Award>,
    pub reward: Option<Reward>,
    pub granted: bool,
    /// Units issued before this play.
    pub issued: u32,
    _guard: Option<OwnedMutexGuard<()>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RewardStanding {
    pub reward: RewardId,
    pub level: PrizeLevel,
    pub name: String,
    pub points: u64,
    pub amount: u32,
    pub issued: u32,
    pub remaining: u32,
}

#[derive(Default)]
pub struct RewardLedger {
    locks: KeyedLocks<RewardId>,
}

impl RewardLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclusive access to a reward's quota.
    pub async fn lock(&self, reward: &RewardId) -> OwnedMutexGuard<()> {
        self.locks.lock(reward).await
    }

    /// Pick an award for `level` (uniformly among ties) and resolve its reward.
    pub async fn select<S: RecordStore>(
        &self,
        store: &S,
        level: PrizeLevel,
        pick: impl FnOnce(usize) -> usize,
    ) -> Selection {
        let mut awards = match store.awards_by_level(level).await {
            Ok(awards) => awards,
            Err(err) => {
                warn!(level = level.value(), ?err, "award lookup failed");
                return Selection::default();
            }
        };
        if awards.is_empty() {
            warn!(level = level.value(), "no award configured for level");
            return Selection::default();
        }
        awards.sort_by(|a, b| a.id.cmp(&b.id));
        let index = pick(awards.len()).min(awards.len() - 1);
        let award = awards.swap_remove(index);

        let Some(reward_id) = award.reward.clone() else {
            warn!(award = %award.id, "award has no reward");
            return Selection {
                award: Some(award),
                reward: None,
            };
        };
        let reward = match store.reward(&reward_id).await {
            Ok(Some(reward)) => Some(reward),
            Ok(None) => {
                warn!(award = %award.id, reward = %reward_id, "award references a missing reward");
                None
            }
            Err(err) => {
                warn!(reward = %reward_id, ?err, "reward lookup failed");
                None
            }
        };
        Selection {
            award: Some(award),
            reward,
        }
    }

    /// Resolve the award for a result and decide the grant.
    ///
    /// The returned [`Allocation`] holds the reward's lock; commit the play
    /// before dropping it.
    pub async fn allocate<S: RecordStore>(
        &self,
        store: &S,
        user: &UserId,
        result: &GameResult,
        is_best: bool,
        pick: impl FnOnce(usize) -> usize,
    ) -> Allocation {
        let Selection { award, reward } = self.select(store, result.level, pick).await;
        let Some(reward) = reward else {
            return Allocation {
                award,
                reward: None,
                granted: false,
                issued: 0,
                _guard: None,
            };
        };

        let guard = self.lock(&reward.id).await;
        let (issued, granted) = match store.count_granted(&reward.id).await {
            Ok(issued) => (
                issued,
                eligible(result.level, is_best, issued, reward.amount),
            ),
            Err(err) => {
                warn!(
                    reward = %reward.id,
                    ?err,
                    "failed to count issued rewards, not granting"
                );
                (0, false)
            }
        };
        debug!(
            user = %user,
            reward = %reward.id,
            level = result.level.value(),
            is_best,
            issued,
            amount = reward.amount,
            granted,
            "allocation decided"
        );
        Allocation {
            award,
            reward: Some(reward),
            granted,
            issued,
            _guard: Some(guard),
        }
    }

    /// Issued and remaining units for every reward.
    pub async fn standings<S: RecordStore>(&self, store: &S) -> Result<Vec<RewardStanding>> {
        let mut standings = Vec::new();
        for reward in store.rewards().await? {
            let issued = store.count_granted(&reward.id).await?;
            standings.push(RewardStanding {
                remaining: reward.amount.saturating_sub(issued),
                reward: reward.id,
                level: reward.level,
                name: reward.name,
                points: reward.points,
                amount: reward.amount,
                issued,
            });
        }
        standings.sort_by(|a, b| b.level.cmp(&a.level).then_with(|| a.reward.cmp(&b.reward)));
        Ok(standings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classify::evaluate,
        memory::MemoryStore,
        mocks::{award, reward, seed_catalog},
    };
    use mooncake_types::{AwardId, DiceSet, HistoryDraft};

    fn result(faces: [u8; 6]) -> GameResult {
        evaluate(DiceSet::new(faces).unwrap())
    }

    async fn grant_one(store: &MemoryStore, reward: &str) {
        store
            .commit_play(
                HistoryDraft {
                    user: UserId::new("earlier"),
                    times: 1,
                    award: None,
                    reward: Some(RewardId::new(reward)),
                    is_top: false,
                    is_best: false,
                    got_reward: true,
                    dice: DiceSet::new([4, 1, 2, 3, 5, 6]).unwrap(),
                },
                None,
            )
            .await
            .unwrap();
    }

    #[test]
    fn test_eligibility_rule() {
        assert!(eligible(PrizeLevel::OneFour, false, 0, 1));
        assert!(!eligible(PrizeLevel::OneFour, false, 1, 1));
        assert!(!eligible(PrizeLevel::FullSet, true, 5, 5));
        assert!(eligible(PrizeLevel::SixFours, true, 0, 1));
        assert!(!eligible(PrizeLevel::SixFours, false, 0, 1));
        assert!(!eligible(PrizeLevel::FourFoursTop, true, 3, 3));
        assert!(!eligible(PrizeLevel::None, false, 0, 0));
    }

    #[tokio::test]
    async fn test_common_tier_first_come_first_served() {
        let store = MemoryStore::new();
        store.upsert_reward(reward("r-one", PrizeLevel::OneFour, 8, 1)).await.unwrap();
        store
            .upsert_award(award("a-one", PrizeLevel::OneFour, Some("r-one")))
            .await
            .unwrap();
        let ledger = RewardLedger::new();
        let user = UserId::new("gus");

        let first = ledger
            .allocate(&store, &user, &result([4, 1, 2, 3, 5, 6]), false, |_| 0)
            .await;
        assert!(first.granted);
        assert_eq!(first.issued, 0);
        assert_eq!(first.award.as_ref().map(|a| a.id.clone()), Some(AwardId::new("a-one")));
        drop(first);

        grant_one(&store, "r-one").await;
        let second = ledger
            .allocate(&store, &user, &result([4, 1, 2, 3, 5, 6]), false, |_| 0)
            .await;
        assert!(!second.granted);
        assert_eq!(second.issued, 1);
    }

    #[tokio::test]
    async fn test_top_tier_needs_best() {
        let store = MemoryStore::new();
        seed_catalog(&store).await.unwrap();
        let ledger = RewardLedger::new();
        let user = UserId::new("hal");
        let top = result([4, 4, 4, 4, 4, 4]);

        let not_best = ledger.allocate(&store, &user, &top, false, |_| 0).await;
        assert!(not_best.reward.is_some());
        assert!(!not_best.granted);
        drop(not_best);

        let best = ledger.allocate(&store, &user, &top, true, |_| 0).await;
        assert!(best.granted);
    }

    #[tokio::test]
    async fn test_catalog_gaps_degrade_to_no_grant() {
        let store = MemoryStore::new();
        store
            .upsert_award(award("a-bare", PrizeLevel::TwoFours, None))
            .await
            .unwrap();
        store
            .upsert_award(award("a-dangling", PrizeLevel::ThreeFours, Some("gone")))
            .await
            .unwrap();
        let ledger = RewardLedger::new();
        let user = UserId::new("ivy");

        let missing = ledger
            .allocate(&store, &user, &result([1, 2, 3, 5, 6, 6]), false, |_| 0)
            .await;
        assert!(missing.award.is_none() && missing.reward.is_none() && !missing.granted);

        let bare = ledger
            .allocate(&store, &user, &result([4, 4, 1, 2, 3, 5]), false, |_| 0)
            .await;
        assert!(bare.award.is_some() && bare.reward.is_none() && !bare.granted);

        let dangling = ledger
            .allocate(&store, &user, &result([4, 4, 4, 1, 2, 3]), false, |_| 0)
            .await;
        assert!(dangling.award.is_some() && dangling.reward.is_none() && !dangling.granted);
    }

    #[tokio::test]
    async fn test_ties_pick_among_awards() {
        let store = MemoryStore::new();
        store.upsert_reward(reward("r-a", PrizeLevel::TwoFours, 4, 10)).await.unwrap();
        store.upsert_reward(reward("r-b", PrizeLevel::TwoFours, 6, 10)).await.unwrap();
        store
            .upsert_award(award("a-1", PrizeLevel::TwoFours, Some("r-a")))
            .await
            .unwrap();
        store
            .upsert_award(award("a-2", PrizeLevel::TwoFours, Some("r-b")))
            .await
            .unwrap();
        let ledger = RewardLedger::new();

        let mut seen_len = 0;
        let picked = ledger
            .select(&store, PrizeLevel::TwoFours, |len| {
                seen_len = len;
                1
            })
            .await;
        assert_eq!(seen_len, 2);
        assert_eq!(picked.award.unwrap().id, AwardId::new("a-2"));
        assert_eq!(picked.reward.unwrap().id, RewardId::new("r-b"));

        // Out-of-range picks are clamped.
        let clamped = ledger.select(&store, PrizeLevel::TwoFours, |_| 9).await;
        assert_eq!(clamped.award.unwrap().id, AwardId::new("a-2"));
    }

    #[tokio::test]
    async fn test_standings() {
        let store = MemoryStore::new();
        store.upsert_reward(reward("r-one", PrizeLevel::OneFour, 8, 3)).await.unwrap();
        store.upsert_reward(reward("r-top", PrizeLevel::SixFours, 888, 1)).await.unwrap();
        grant_one(&store, "r-one").await;

        let standings = RewardLedger::new().standings(&store).await.unwrap();
        assert_eq!(standings.len(), 2);
        assert_eq!(standings[0].reward, RewardId::new("r-top"));
        assert_eq!(standings[0].remaining, 1);
        assert_eq!(standings[1].issued, 1);
        assert_eq!(standings[1].remaining, 2);
    }
}
