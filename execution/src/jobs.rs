//! Fix-up batch jobs.
//!
//! Both jobs are safe to re-run. Reissue only flips rows that still hold no
//! reward unit, under the same quota and best-result rules as live play.
//! Retry claims each `failed` order with a conditional write before paying
//! it, so concurrent runs never pay the same order twice. Retried payouts
//! never change any History row, so quota accounting is unaffected.

use crate::{
    activity::Activity,
    classify::evaluate,
    dice::DiceSource,
    gate::ActivityGate,
    points::PointDistributor,
    store::{Grant, OrderWrite, RecordStore},
    throttle::Throttle,
};
use anyhow::{anyhow, Context as _, Result};
use mooncake_types::{History, OrderDraft, OrderStatus, PointsOrder};
use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReissueReport {
    /// Ungranted rows examined.
    pub total: usize,
    pub granted: usize,
    pub skipped: usize,
    pub orders_succeeded: usize,
    pub orders_failed: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RetryReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Orders another process moved out of `failed` first.
    pub skipped: usize,
}

enum Reissue {
    Granted(History),
    Skipped,
}

impl<S, D, P, G> Activity<S, D, P, G>
where
    S: RecordStore,
    D: DiceSource,
    P: PointDistributor,
    G: ActivityGate,
{
    /// Grant reward units to recorded plays that missed one, oldest first.
    pub async fn reissue_rewards(&self) -> Result<ReissueReport> {
        let candidates = self
            .store
            .ungranted_histories()
            .await
            .context("loading ungranted plays")?;
        let mut report = ReissueReport {
            total: candidates.len(),
            ..Default::default()
        };
        info!(total = report.total, "reissue started");

        let mut throttle = Throttle::new(&self.settings.throttle);
        for row in candidates {
            let history = match self.reissue_one(&row).await? {
                Reissue::Granted(history) => history,
                Reissue::Skipped => {
                    report.skipped += 1;
                    continue;
                }
            };
            report.granted += 1;

            // The unit is granted; a payout problem must not stop the batch.
            match self.pay_reissued(&history, &mut throttle).await {
                Ok(Some(OrderStatus::Success)) => report.orders_succeeded += 1,
                Ok(Some(_)) => report.orders_failed += 1,
                Ok(None) => {}
                Err(err) => {
                    error!(
                        history = %history.id,
                        user = %history.user,
                        ?err,
                        "failed to pay reissued reward"
                    );
                    report.orders_failed += 1;
                }
            }
        }

        info!(
            total = report.total,
            granted = report.granted,
            skipped = report.skipped,
            orders_succeeded = report.orders_succeeded,
            orders_failed = report.orders_failed,
            "reissue finished"
        );
        Ok(report)
    }

    /// Open and attempt the points order for a freshly reissued row.
    ///
    /// Returns `None` when the grant carries no automatic payout. An order
    /// that was opened but never attempted is left `failed` for the retry job.
    async fn pay_reissued(
        &self,
        history: &History,
        throttle: &mut Throttle,
    ) -> Result<Option<OrderStatus>> {
        let Some(reward_id) = &history.reward else {
            return Ok(None);
        };
        let Some(reward) = self.store.reward(reward_id).await? else {
            return Ok(None);
        };
        let level = evaluate(history.dice).level;
        if reward.points == 0 || !self.settings.distributes(level) {
            return Ok(None);
        }

        let award_name = match &history.award {
            Some(id) => self.store.award(id).await?.map(|a| a.name),
            None => None,
        }
        .unwrap_or_else(|| level.label().to_string());
        let memo = format!(
            "[reissue] {}",
            self.play_memo(history.times, &award_name, &reward.name)
        );
        let mut order = self
            .store
            .insert_order(OrderDraft {
                user: history.user.clone(),
                history: Some(history.id),
                points: reward.points,
                memo,
            })
            .await
            .context("saving reissue order")?;

        let player = match self.store.player(&history.user).await {
            Ok(Some(player)) => player,
            Ok(None) => {
                warn!(
                    user = %history.user,
                    order = %order.id,
                    "player not found, order left failed"
                );
                self.abandon(&mut order, "player not found").await?;
                return Ok(Some(order.status));
            }
            Err(err) => {
                let reason = format!("{err:#}");
                self.abandon(&mut order, &reason).await?;
                return Err(err.context("loading player for reissue order"));
            }
        };
        throttle.ready().await;
        let status = self
            .payouts
            .deliver(&self.store, &player.name, &mut order)
            .await?;
        Ok(Some(status))
    }

    /// Mark a pending order that was never attempted as failed.
    async fn abandon(&self, order: &mut PointsOrder, reason: &str) -> Result<()> {
        order.fail(reason)?;
        match self
            .store
            .transition_order(order, OrderStatus::Pending)
            .await
            .with_context(|| format!("marking order {} failed", order.id))?
        {
            OrderWrite::Applied => Ok(()),
            write => Err(anyhow!("order {} not marked failed: {write:?}", order.id)),
        }
    }

    /// Re-check one row under the player and reward locks and grant it.
    async fn reissue_one(&self, row: &History) -> Result<Reissue> {
        let Some(reward_id) = &row.reward else {
            return Ok(Reissue::Skipped);
        };
        if self.store.reward(reward_id).await?.is_none() {
            warn!(history = %row.id, reward = %reward_id, "reward missing, skipping");
            return Ok(Reissue::Skipped);
        }

        let _player = self.players.lock(&row.user).await;
        let _reward = self.ledger.lock(reward_id).await;
        let Some(current) = self.store.history(row.id).await? else {
            return Ok(Reissue::Skipped);
        };
        if current.is_top && !current.is_best {
            return Ok(Reissue::Skipped);
        }
        match self.store.grant_history(current.id).await? {
            Grant::Granted => {
                info!(
                    history = %current.id,
                    user = %current.user,
                    reward = %reward_id,
                    "reward reissued"
                );
                Ok(Reissue::Granted(History {
                    got_reward: true,
                    ..current
                }))
            }
            Grant::QuotaExhausted => {
                info!(history = %current.id, reward = %reward_id, "quota exhausted, skipping");
                Ok(Reissue::Skipped)
            }
            Grant::AlreadyGranted | Grant::Missing => Ok(Reissue::Skipped),
        }
    }

    /// Re-attempt every failed points order, oldest first.
    pub async fn retry_failed_orders(&self) -> Result<RetryReport> {
        let failed = self
            .store
            .orders_by_status(OrderStatus::Failed)
            .await
            .context("loading failed orders")?;
        let mut report = RetryReport {
            total: failed.len(),
            ..Default::default()
        };
        info!(total = report.total, "retry started");

        let mut throttle = Throttle::new(&self.settings.throttle);
        for mut order in failed {
            let Some(player) = self.store.player(&order.user).await? else {
                warn!(
                    order = %order.id,
                    user = %order.user,
                    "player not found, leaving order failed"
                );
                report.failed += 1;
                continue;
            };

            order.retry()?;
            let claim = self
                .store
                .transition_order(&order, OrderStatus::Failed)
                .await
                .with_context(|| format!("resetting order {}", order.id))?;
            if claim != OrderWrite::Applied {
                info!(order = %order.id, ?claim, "order already taken, skipping");
                report.skipped += 1;
                continue;
            }

            throttle.ready().await;
            match self
                .payouts
                .deliver(&self.store, &player.name, &mut order)
                .await
            {
                Ok(OrderStatus::Success) => report.succeeded += 1,
                Ok(_) => report.failed += 1,
                Err(err) => {
                    error!(order = %order.id, ?err, "failed to record retry outcome");
                    report.failed += 1;
                }
            }
        }

        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "retry finished"
        );
        Ok(report)
    }
}
