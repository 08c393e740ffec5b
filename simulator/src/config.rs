//! YAML configuration for a simulated activity.

use anyhow::Context as _;
use mooncake_execution::settings::ActivitySettings;
use mooncake_types::{Award, AwardId, PrizeLevel, Reward, RewardId};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    num::{NonZeroU32, NonZeroUsize},
    path::Path,
    str::FromStr,
};
use thiserror::Error;
use tracing::Level;

/// Default simulation sizes.
pub mod defaults {
    pub const PLAYERS: usize = 100;
    pub const ROUNDS: u32 = 3;
    pub const MAX_BONUS_PLAYS: u32 = 5;
    pub const FAILURE_RATE: f64 = 0.0;
    pub const LOG_LEVEL: &str = "info";
}

fn default_players() -> usize {
    defaults::PLAYERS
}

fn default_rounds() -> u32 {
    defaults::ROUNDS
}

fn default_max_bonus_plays() -> u32 {
    defaults::MAX_BONUS_PLAYS
}

fn default_failure_rate() -> f64 {
    defaults::FAILURE_RATE
}

fn default_log_level() -> String {
    defaults::LOG_LEVEL.to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RewardConfig {
    pub id: String,
    pub level: u8,
    pub name: String,
    pub points: u64,
    pub amount: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AwardConfig {
    pub id: String,
    pub level: u8,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reward: Option<String>,
}

/// Raw file contents, before validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub activity: ActivitySettings,

    #[serde(default = "default_players")]
    pub players: usize,
    /// Plays each simulated player attempts.
    #[serde(default = "default_rounds")]
    pub rounds: u32,
    /// Bonus plays are drawn uniformly from `0..=max_bonus_plays`.
    #[serde(default = "default_max_bonus_plays")]
    pub max_bonus_plays: u32,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Probability that a simulated payout fails.
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,
    /// Close the activity at this Unix time in milliseconds.
    #[serde(default)]
    pub ends_at_ms: Option<u64>,
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub rewards: Vec<RewardConfig>,
    #[serde(default)]
    pub awards: Vec<AwardConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: usize },
    #[error("max_plays ({max}) must be >= base_plays ({base})")]
    MaxBelowBase { base: u32, max: u32 },
    #[error("failure_rate must be within 0..=1 (got {value})")]
    InvalidFailureRate { value: f64 },
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{kind} {id} has unknown prize level {level}")]
    InvalidLevel {
        kind: &'static str,
        id: String,
        level: u8,
    },
    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },
    #[error("award {award} references unknown reward {reward}")]
    UnknownReward { award: String, reward: String },
}

/// Checked configuration ready to drive a [`crate::Simulator`].
#[derive(Clone, Debug)]
pub struct ValidatedConfig {
    pub activity: ActivitySettings,
    pub players: NonZeroUsize,
    pub rounds: NonZeroU32,
    pub max_bonus_plays: u32,
    pub seed: Option<u64>,
    pub failure_rate: f64,
    pub ends_at_ms: Option<u64>,
    pub log_level: Level,
    pub rewards: Vec<Reward>,
    pub awards: Vec<Award>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file {}", path.display()))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(contents).context("Could not parse config file")
    }

    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        let players = NonZeroUsize::new(self.players).ok_or(ConfigError::InvalidNonZero {
            field: "players",
            value: self.players,
        })?;
        let rounds = NonZeroU32::new(self.rounds).ok_or(ConfigError::InvalidNonZero {
            field: "rounds",
            value: 0,
        })?;
        if self.activity.max_plays == 0 {
            return Err(ConfigError::InvalidNonZero {
                field: "activity.max_plays",
                value: 0,
            });
        }
        if self.activity.max_plays < self.activity.base_plays {
            return Err(ConfigError::MaxBelowBase {
                base: self.activity.base_plays,
                max: self.activity.max_plays,
            });
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(ConfigError::InvalidFailureRate {
                value: self.failure_rate,
            });
        }
        let log_level =
            Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            })?;

        let mut reward_ids = HashSet::new();
        let mut rewards = Vec::with_capacity(self.rewards.len());
        for reward in self.rewards {
            if !reward_ids.insert(reward.id.clone()) {
                return Err(ConfigError::DuplicateId {
                    kind: "reward",
                    id: reward.id,
                });
            }
            let level = level_of("reward", &reward.id, reward.level)?;
            rewards.push(Reward {
                id: RewardId::new(reward.id),
                level,
                name: reward.name,
                points: reward.points,
                amount: reward.amount,
            });
        }

        let mut award_ids = HashSet::new();
        let mut awards = Vec::with_capacity(self.awards.len());
        for award in self.awards {
            if !award_ids.insert(award.id.clone()) {
                return Err(ConfigError::DuplicateId {
                    kind: "award",
                    id: award.id,
                });
            }
            let level = level_of("award", &award.id, award.level)?;
            if let Some(reward) = &award.reward {
                if !reward_ids.contains(reward) {
                    return Err(ConfigError::UnknownReward {
                        award: award.id,
                        reward: reward.clone(),
                    });
                }
            }
            awards.push(Award {
                id: AwardId::new(award.id),
                level,
                name: award.name,
                description: award.description,
                reward: award.reward.map(RewardId::new),
            });
        }

        Ok(ValidatedConfig {
            activity: self.activity,
            players,
            rounds,
            max_bonus_plays: self.max_bonus_plays,
            seed: self.seed,
            failure_rate: self.failure_rate,
            ends_at_ms: self.ends_at_ms,
            log_level,
            rewards,
            awards,
        })
    }
}

fn level_of(kind: &'static str, id: &str, level: u8) -> Result<PrizeLevel, ConfigError> {
    PrizeLevel::try_from(level).map_err(|_| ConfigError::InvalidLevel {
        kind,
        id: id.to_string(),
        level,
    })
}
