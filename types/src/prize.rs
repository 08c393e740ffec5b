//! Prize levels.
//!
//! Levels are ordered: a higher discriminant is a rarer, better result.
//! Levels at or above [`PrizeLevel::FourFoursTop`] form the top tier
//! ("zhuangyuan"), where only a player's best result may claim a reward.

use crate::dice::DiceSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unknown prize level {0}")]
pub struct UnknownLevel(pub u8);

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PrizeLevel {
    None = 0,
    OneFour = 1,
    TwoFours = 2,
    FourOfAKindNonFour = 3,
    ThreeFours = 4,
    FullSet = 5,
    FourFoursTop = 6,
    FiveOfAKindNonFour = 7,
    FiveFours = 8,
    SixOfAKindNonOneNonFour = 9,
    SixOnes = 10,
    FourFoursPlusTwoOnes = 11,
    SixFours = 12,
}

impl PrizeLevel {
    /// Every level, lowest first.
    pub const ALL: [PrizeLevel; 13] = [
        PrizeLevel::None,
        PrizeLevel::OneFour,
        PrizeLevel::TwoFours,
        PrizeLevel::FourOfAKindNonFour,
        PrizeLevel::ThreeFours,
        PrizeLevel::FullSet,
        PrizeLevel::FourFoursTop,
        PrizeLevel::FiveOfAKindNonFour,
        PrizeLevel::FiveFours,
        PrizeLevel::SixOfAKindNonOneNonFour,
        PrizeLevel::SixOnes,
        PrizeLevel::FourFoursPlusTwoOnes,
        PrizeLevel::SixFours,
    ];

    /// Lowest top-tier level.
    pub const TOP_TIER: PrizeLevel = PrizeLevel::FourFoursTop;

    pub fn is_top(self) -> bool {
        self >= Self::TOP_TIER
    }

    pub fn value(self) -> u8 {
        self as u8
    }

    /// Traditional name shown to players.
    pub fn label(self) -> &'static str {
        match self {
            PrizeLevel::None => "无奖",
            PrizeLevel::OneFour => "一秀",
            PrizeLevel::TwoFours => "二举",
            PrizeLevel::FourOfAKindNonFour => "四进",
            PrizeLevel::ThreeFours => "三红",
            PrizeLevel::FullSet => "对堂",
            PrizeLevel::FourFoursTop => "状元四点红",
            PrizeLevel::FiveOfAKindNonFour => "状元五子登科",
            PrizeLevel::FiveFours => "状元五红",
            PrizeLevel::SixOfAKindNonOneNonFour => "状元黑六勃",
            PrizeLevel::SixOnes => "状元遍地锦",
            PrizeLevel::FourFoursPlusTwoOnes => "状元插金花",
            PrizeLevel::SixFours => "状元六勃红",
        }
    }
}

impl TryFrom<u8> for PrizeLevel {
    type Error = UnknownLevel;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(UnknownLevel(value))
    }
}

impl From<PrizeLevel> for u8 {
    fn from(value: PrizeLevel) -> Self {
        value as u8
    }
}

impl fmt::Display for PrizeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A classified roll.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub dice: DiceSet,
    pub level: PrizeLevel,
}

impl GameResult {
    pub fn label(&self) -> &'static str {
        self.level.label()
    }

    pub fn is_top(&self) -> bool {
        self.level.is_top()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_matches_discriminants() {
        for (i, level) in PrizeLevel::ALL.iter().enumerate() {
            assert_eq!(usize::from(level.value()), i);
            assert_eq!(PrizeLevel::try_from(i as u8), Ok(*level));
        }
        assert_eq!(PrizeLevel::try_from(13), Err(UnknownLevel(13)));
    }

    #[test]
    fn test_top_tier_threshold() {
        let top: Vec<_> = PrizeLevel::ALL.iter().filter(|l| l.is_top()).collect();
        assert_eq!(top.len(), 7);
        assert!(!PrizeLevel::FullSet.is_top());
        assert!(PrizeLevel::FourFoursTop.is_top());
        assert!(PrizeLevel::SixFours.is_top());
    }

    #[test]
    fn test_ordering() {
        assert!(PrizeLevel::SixFours > PrizeLevel::FourFoursPlusTwoOnes);
        assert!(PrizeLevel::FourOfAKindNonFour < PrizeLevel::ThreeFours);
        assert!(PrizeLevel::None < PrizeLevel::OneFour);
    }

    #[test]
    fn test_serde_as_number() {
        let json = serde_json::to_string(&PrizeLevel::SixOnes).unwrap();
        assert_eq!(json, "10");
        assert_eq!(
            serde_json::from_str::<PrizeLevel>("6").unwrap(),
            PrizeLevel::FourFoursTop
        );
        assert!(serde_json::from_str::<PrizeLevel>("42").is_err());
    }
}
