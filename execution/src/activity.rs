//! The play pipeline.
//!
//! A play runs: gate check, allowance check, roll, classify, best tracking,
//! reward allocation, History commit, then (outside all locks) announcement
//! and point payout. Per-player work is serialized by the player's lock and
//! quota work by the reward's lock, always taken in that order.

use crate::{
    announce::{Announcement, Announcer},
    best::resolve_best,
    classify::evaluate,
    dice::DiceSource,
    error::{PlayError, Result},
    gate::ActivityGate,
    ledger::{RewardLedger, RewardStanding},
    locks::KeyedLocks,
    points::{Payouts, PointDistributor},
    settings::ActivitySettings,
    store::RecordStore,
};
use anyhow::Context as _;
use mooncake_types::{
    AwardId, DiceSet, HistoryDraft, HistoryId, OrderDraft, OrderId, OrderStatus, PointsOrder,
    PrizeLevel, RewardId, UserId,
};
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use tracing::{error, info, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AwardSummary {
    pub id: AwardId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RewardSummary {
    pub id: RewardId,
    pub name: String,
    pub points: u64,
}

/// What a player sees after a play.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlayOutcome {
    pub history: HistoryId,
    pub dice: DiceSet,
    pub level: PrizeLevel,
    pub label: String,
    /// 1-based play number.
    pub times: u32,
    /// Plays left after this one.
    pub remaining: u32,
    pub award: Option<AwardSummary>,
    pub reward: Option<RewardSummary>,
    pub is_best: bool,
    pub got_reward: bool,
    pub order: Option<OrderId>,
    pub order_status: Option<OrderStatus>,
}

/// A History row as shown in a player's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub id: HistoryId,
    pub times: u32,
    pub dice: DiceSet,
    pub level: PrizeLevel,
    pub label: String,
    pub award: Option<String>,
    pub reward: Option<String>,
    pub is_best: bool,
    pub got_reward: bool,
    pub created_at_ms: u64,
}

pub struct Activity<S, D, P, G> {
    pub(crate) store: S,
    dice: Mutex<D>,
    pub(crate) payouts: Payouts<P>,
    gate: G,
    pub(crate) settings: ActivitySettings,
    pub(crate) players: KeyedLocks<UserId>,
    pub(crate) ledger: RewardLedger,
    announcer: Option<Announcer>,
}

impl<S, D, P, G> Activity<S, D, P, G>
where
    S: RecordStore,
    D: DiceSource,
    P: PointDistributor,
    G: ActivityGate,
{
    pub fn new(store: S, dice: D, distributor: P, gate: G, settings: ActivitySettings) -> Self {
        Self {
            store,
            dice: Mutex::new(dice),
            payouts: Payouts::new(distributor, settings.dry_run),
            gate,
            settings,
            players: KeyedLocks::new(),
            ledger: RewardLedger::new(),
            announcer: None,
        }
    }

    /// Queue chat announcements for high-tier wins through `announcer`.
    pub fn with_announcer(mut self, announcer: Announcer) -> Self {
        self.announcer = Some(announcer);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &ActivitySettings {
        &self.settings
    }

    pub fn distributor(&self) -> &P {
        self.payouts.distributor()
    }

    fn roll(&self) -> DiceSet {
        self.dice
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .roll()
    }

    fn pick(&self, len: usize) -> usize {
        self.dice
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pick(len)
    }

    pub(crate) fn play_memo(&self, times: u32, award: &str, reward: &str) -> String {
        format!(
            "{} play #{times}: {award} ({reward})",
            self.settings.memo_prefix
        )
    }

    /// Plays left for a player.
    pub async fn remaining_plays(&self, user: &UserId) -> Result<u32> {
        let player = self
            .store
            .player(user)
            .await?
            .ok_or_else(|| PlayError::UnknownPlayer(user.clone()))?;
        let used = self.store.count_plays(user).await?;
        Ok(self
            .settings
            .allowed_plays(player.bonus_plays)
            .saturating_sub(used))
    }

    /// Roll once for `user` and record the result.
    pub async fn play(&self, user: &UserId) -> Result<PlayOutcome> {
        if !self.gate.is_open() {
            return Err(PlayError::ActivityClosed);
        }
        let player = self
            .store
            .player(user)
            .await?
            .ok_or_else(|| PlayError::UnknownPlayer(user.clone()))?;

        let player_guard = self.players.lock(user).await;
        let used = self.store.count_plays(user).await?;
        let allowed = self.settings.allowed_plays(player.bonus_plays);
        if used >= allowed {
            return Err(PlayError::PlaysExhausted { used, allowed });
        }
        let times = used + 1;

        let result = evaluate(self.roll());
        let current = if result.is_top() {
            self.store
                .current_best(user)
                .await
                .context("loading current best")?
        } else {
            None
        };
        let decision = resolve_best(&result, current.as_ref());

        let allocation = self
            .ledger
            .allocate(&self.store, user, &result, decision.is_best(), |len| {
                self.pick(len)
            })
            .await;
        let draft = HistoryDraft {
            user: user.clone(),
            times,
            award: allocation.award.as_ref().map(|a| a.id.clone()),
            reward: allocation.reward.as_ref().map(|r| r.id.clone()),
            is_top: result.is_top(),
            is_best: decision.is_best(),
            got_reward: allocation.granted,
            dice: result.dice,
        };
        let committed = match self.store.commit_play(draft, decision.demotes()).await {
            Ok(committed) => committed,
            Err(err) => {
                error!(user = %user, ?err, "failed to save play");
                return Err(PlayError::Store(err.context("saving play")));
            }
        };
        if committed.quota_rejected {
            info!(
                user = %user,
                history = %committed.history.id,
                "reward quota used up before commit, play recorded without reward"
            );
        }
        let award = allocation.award.clone();
        let reward = allocation.reward.clone();
        drop(allocation);
        drop(player_guard);

        let history = committed.history;
        let got_reward = history.got_reward;
        info!(
            user = %user,
            times,
            dice = %result.dice,
            level = result.level.value(),
            is_best = history.is_best,
            got_reward,
            "played"
        );

        if let Some(award) = award.as_ref().filter(|_| self.settings.announces(result.level)) {
            let announcement = Announcement {
                player: player.name.clone(),
                level: result.level,
                award: award.name.clone(),
                reward: reward.as_ref().map(|r| r.name.clone()),
                points: reward.as_ref().filter(|_| got_reward).map(|r| r.points),
            };
            match &self.announcer {
                Some(announcer) => announcer.announce(announcement),
                None => info!(
                    text = %announcement.render(&self.settings.activity_url),
                    "announcement"
                ),
            }
        }

        let mut order = None;
        if let (Some(award), Some(reward)) = (&award, &reward) {
            if got_reward && reward.points > 0 && self.settings.distributes(result.level) {
                let memo = self.play_memo(times, &award.name, &reward.name);
                order = self
                    .open_and_deliver(
                        &player.name,
                        OrderDraft {
                            user: user.clone(),
                            history: Some(history.id),
                            points: reward.points,
                            memo,
                        },
                    )
                    .await;
            }
        }

        Ok(PlayOutcome {
            history: history.id,
            dice: result.dice,
            level: result.level,
            label: result.label().to_string(),
            times,
            remaining: allowed - times,
            award: award.map(|a| AwardSummary {
                id: a.id,
                name: a.name,
            }),
            reward: reward.map(|r| RewardSummary {
                id: r.id,
                name: r.name,
                points: r.points,
            }),
            is_best: history.is_best,
            got_reward,
            order: order.as_ref().map(|o| o.id),
            order_status: order.as_ref().map(|o| o.status),
        })
    }

    /// Insert a pending order and attempt it once.
    ///
    /// Failures after the play has been committed are logged and never undo
    /// it. A distribution failure leaves the order `failed` for the retry
    /// job. An outcome that could not be saved leaves it `pending`, since the
    /// transfer may already have happened; the retry job does not touch it.
    async fn open_and_deliver(&self, recipient: &str, draft: OrderDraft) -> Option<PointsOrder> {
        let user = draft.user.clone();
        let mut order = match self.store.insert_order(draft).await {
            Ok(order) => order,
            Err(err) => {
                error!(user = %user, ?err, "failed to save points order");
                return None;
            }
        };
        if let Err(err) = self.payouts.deliver(&self.store, recipient, &mut order).await {
            error!(
                order = %order.id,
                ?err,
                "failed to record points order outcome"
            );
        }
        Some(order)
    }

    /// Most recent plays of a player, newest first.
    pub async fn player_history(&self, user: &UserId) -> Result<Vec<HistoryEntry>> {
        let rows = self
            .store
            .recent_histories(user, self.settings.history_limit)
            .await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let award = match &row.award {
                Some(id) => self.store.award(id).await?.map(|a| a.name),
                None => None,
            };
            let reward = match &row.reward {
                Some(id) => self.store.reward(id).await?.map(|r| r.name),
                None => None,
            };
            let level = evaluate(row.dice).level;
            entries.push(HistoryEntry {
                id: row.id,
                times: row.times,
                dice: row.dice,
                level,
                label: level.label().to_string(),
                award,
                reward,
                is_best: row.is_best,
                got_reward: row.got_reward,
                created_at_ms: row.created_at_ms,
            });
        }
        Ok(entries)
    }

    /// Issued and remaining units for every reward.
    pub async fn standings(&self) -> Result<Vec<RewardStanding>> {
        Ok(self.ledger.standings(&self.store).await?)
    }

    /// Pay points not tied to a single play, such as ranking rewards.
    pub async fn grant_bonus(&self, user: &UserId, points: u64, memo: &str) -> Result<PointsOrder> {
        let player = self
            .store
            .player(user)
            .await?
            .ok_or_else(|| PlayError::UnknownPlayer(user.clone()))?;
        let mut order = self
            .store
            .insert_order(OrderDraft {
                user: user.clone(),
                history: None,
                points,
                memo: format!("{} {memo}", self.settings.memo_prefix),
            })
            .await
            .context("saving bonus order")?;
        if let Err(err) = self.payouts.deliver(&self.store, &player.name, &mut order).await {
            warn!(
                order = %order.id,
                ?err,
                "failed to record bonus order outcome"
            );
        }
        Ok(order)
    }
}
