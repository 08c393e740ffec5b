//! Mooncake activity data model.
//!
//! Shared by the execution core and the simulator:
//! - [`DiceSet`] and [`FaceCounts`]: six rolled faces and their histogram.
//! - [`PrizeLevel`] and [`GameResult`]: the thirteen ordered prize levels.
//! - [`Player`], [`Award`], [`Reward`], [`History`]: catalog and play log rows.
//! - [`PointsOrder`]: the pending/success/failed point-transfer ledger.

pub mod dice;
pub mod points;
pub mod prize;
pub mod records;

pub use dice::{DiceError, DiceSet, FaceCounts, DICE_COUNT, FACES};
pub use points::{OrderDraft, OrderId, OrderStatus, PointsOrder, TransitionError};
pub use prize::{GameResult, PrizeLevel, UnknownLevel};
pub use records::{
    Award, AwardId, History, HistoryDraft, HistoryId, Player, Reward, RewardId, UserId,
};
