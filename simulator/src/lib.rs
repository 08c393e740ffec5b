//! Local driver for a whole mooncake activity.
//!
//! Seeds an in-memory store from a [`ValidatedConfig`], lets every simulated
//! player roll concurrently, optionally runs the fix-up jobs and reports a
//! [`Summary`].

use anyhow::{Context as _, Result};
use futures::future::join_all;
use mooncake_execution::{
    announce::Announcer,
    classify::classify,
    dice::DiceRoller,
    memory::MemoryStore,
    store::RecordStore,
    Activity, PlayError, ReissueReport, RetryReport, RewardStanding,
};
use mooncake_types::{OrderStatus, Player, PrizeLevel, UserId};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{info, warn};

pub mod collaborators;
pub mod config;

pub use collaborators::{LogSink, SimulatedDistributor, Window};
pub use config::{Config, ConfigError, ValidatedConfig};

/// Salt separating the payout failure stream from the dice stream.
const DISTRIBUTOR_SALT: u64 = 0x6d6f_6f6e_6361_6b65;

type SimActivity = Activity<MemoryStore, DiceRoller, SimulatedDistributor, Window>;

/// Which fix-up jobs run after all players finish.
#[derive(Clone, Copy, Debug, Default)]
pub struct Jobs {
    pub reissue: bool,
    pub retry_failed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LevelTally {
    pub level: PrizeLevel,
    pub label: String,
    pub plays: usize,
    pub granted: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OrderTally {
    pub pending: usize,
    pub success: usize,
    pub failed: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct Summary {
    pub seed: u64,
    pub players: usize,
    pub plays: usize,
    /// Attempts refused because the player had no plays left.
    pub exhausted: usize,
    /// Attempts refused because the activity window closed.
    pub closed: usize,
    pub best_results: usize,
    pub levels: Vec<LevelTally>,
    pub standings: Vec<RewardStanding>,
    pub orders: OrderTally,
    pub points_paid: u64,
    pub payout_failures: usize,
    pub announcements: usize,
    pub reissue: Option<ReissueReport>,
    pub retry: Option<RetryReport>,
}

#[derive(Default)]
struct PlayerTally {
    plays: usize,
    exhausted: usize,
    closed: usize,
}

pub struct Simulator {
    config: ValidatedConfig,
}

impl Simulator {
    pub fn new(config: ValidatedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    /// Register the catalog and a roster of players with random bonus plays.
    async fn seed_store(&self, store: &MemoryStore, rng: &mut StdRng) -> Result<Vec<UserId>> {
        for reward in &self.config.rewards {
            store
                .upsert_reward(reward.clone())
                .await
                .with_context(|| format!("registering reward {}", reward.id))?;
        }
        for award in &self.config.awards {
            store
                .upsert_award(award.clone())
                .await
                .with_context(|| format!("registering award {}", award.id))?;
        }

        let mut users = Vec::with_capacity(self.config.players.get());
        for i in 0..self.config.players.get() {
            let id = UserId::new(format!("player-{i:04}"));
            let bonus_plays = rng.gen_range(0..=self.config.max_bonus_plays);
            store
                .upsert_player(Player {
                    id: id.clone(),
                    name: format!("Player {i}"),
                    bonus_plays,
                })
                .await
                .with_context(|| format!("registering {id}"))?;
            users.push(id);
        }
        Ok(users)
    }

    pub async fn run(&self, jobs: Jobs) -> Result<Summary> {
        let seed = self.config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        let store = MemoryStore::new();
        let users = self.seed_store(&store, &mut rng).await?;
        info!(
            seed,
            players = users.len(),
            rewards = self.config.rewards.len(),
            awards = self.config.awards.len(),
            "simulation started"
        );

        let settings = self.config.activity.clone();
        let distributor =
            SimulatedDistributor::new(self.config.failure_rate, seed ^ DISTRIBUTOR_SALT);
        let sink = LogSink::default();
        let (announcer, announcer_handle) = Announcer::spawn(
            sink.clone(),
            settings.announce_queue,
            settings.activity_url.clone(),
            settings.dry_run,
        );
        let activity: Arc<SimActivity> = Arc::new(
            Activity::new(
                store.clone(),
                DiceRoller::from_seed(seed),
                distributor.clone(),
                Window::new(self.config.ends_at_ms),
                settings,
            )
            .with_announcer(announcer),
        );

        let rounds = self.config.rounds.get();
        let handles = users.into_iter().map(|user| {
            let activity = activity.clone();
            tokio::spawn(async move { play_rounds(&activity, &user, rounds).await })
        });
        let mut tally = PlayerTally::default();
        for joined in join_all(handles).await {
            let player = joined.context("player task panicked")??;
            tally.plays += player.plays;
            tally.exhausted += player.exhausted;
            tally.closed += player.closed;
        }
        info!(plays = tally.plays, "all players finished");

        let retry = if jobs.retry_failed {
            Some(activity.retry_failed_orders().await?)
        } else {
            None
        };
        let reissue = if jobs.reissue {
            Some(activity.reissue_rewards().await?)
        } else {
            None
        };
        let standings = activity.standings().await?;

        // Closing the last announcer handle lets the delivery task drain and exit.
        drop(activity);
        if let Err(err) = announcer_handle.await {
            warn!(?err, "announcer task ended abnormally");
        }

        let histories = store.histories();
        let mut levels: BTreeMap<PrizeLevel, LevelTally> = BTreeMap::new();
        for history in &histories {
            let level = classify(&history.dice);
            let entry = levels.entry(level).or_insert_with(|| LevelTally {
                level,
                label: level.label().to_string(),
                plays: 0,
                granted: 0,
            });
            entry.plays += 1;
            if history.got_reward {
                entry.granted += 1;
            }
        }

        let mut orders = OrderTally::default();
        for order in store.orders() {
            match order.status {
                OrderStatus::Pending => orders.pending += 1,
                OrderStatus::Success => orders.success += 1,
                OrderStatus::Failed => orders.failed += 1,
            }
        }

        Ok(Summary {
            seed,
            players: self.config.players.get(),
            plays: tally.plays,
            exhausted: tally.exhausted,
            closed: tally.closed,
            best_results: histories.iter().filter(|h| h.is_best).count(),
            levels: levels.into_values().rev().collect(),
            standings,
            orders,
            points_paid: distributor.total_paid(),
            payout_failures: distributor.failures(),
            announcements: sink.sent(),
            reissue,
            retry,
        })
    }
}

async fn play_rounds(activity: &SimActivity, user: &UserId, rounds: u32) -> Result<PlayerTally> {
    let mut tally = PlayerTally::default();
    for _ in 0..rounds {
        match activity.play(user).await {
            Ok(_) => tally.plays += 1,
            Err(PlayError::PlaysExhausted { .. }) => tally.exhausted += 1,
            Err(PlayError::ActivityClosed) => {
                tally.closed += 1;
                break;
            }
            Err(err) => return Err(err).with_context(|| format!("playing as {user}")),
        }
    }
    Ok(tally)
}
