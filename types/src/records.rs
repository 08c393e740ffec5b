//! Catalog and play-log records.

use crate::{dice::DiceSet, prize::PrizeLevel};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Player account id.
    UserId
);
string_id!(
    /// Configured award id.
    AwardId
);
string_id!(
    /// Configured reward id.
    RewardId
);

/// Sequential id assigned by the record store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryId(pub u64);

impl fmt::Display for HistoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: UserId,
    pub name: String,
    /// Extra plays earned on top of the activity's base allowance.
    #[serde(default)]
    pub bonus_plays: u32,
}

/// Point-valued reward with a finite quota.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: RewardId,
    pub level: PrizeLevel,
    pub name: String,
    pub points: u64,
    pub amount: u32,
}

/// Named prize bucket for one level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Award {
    pub id: AwardId,
    pub level: PrizeLevel,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reward: Option<RewardId>,
}

/// One recorded play.
///
/// Only `is_best` and `got_reward` change after insertion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    pub id: HistoryId,
    pub user: UserId,
    /// 1-based play number for this user.
    pub times: u32,
    pub award: Option<AwardId>,
    pub reward: Option<RewardId>,
    pub is_top: bool,
    pub is_best: bool,
    pub got_reward: bool,
    pub dice: DiceSet,
    pub created_at_ms: u64,
}

/// A play about to be committed; the store assigns id and timestamp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryDraft {
    pub user: UserId,
    pub times: u32,
    pub award: Option<AwardId>,
    pub reward: Option<RewardId>,
    pub is_top: bool,
    pub is_best: bool,
    pub got_reward: bool,
    pub dice: DiceSet,
}

impl HistoryDraft {
    pub fn into_history(self, id: HistoryId, created_at_ms: u64) -> History {
        History {
            id,
            user: self.user,
            times: self.times,
            award: self.award,
            reward: self.reward,
            is_top: self.is_top,
            is_best: self.is_best,
            got_reward: self.got_reward,
            dice: self.dice,
            created_at_ms,
        }
    }
}
