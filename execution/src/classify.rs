//! Prize classification.
//!
//! Rules are tested top to bottom and the first match wins. Several patterns
//! overlap on raw counts (four 4s plus two 1s also holds four 4s), so the
//! order of [`RULES`] decides the level.

use mooncake_types::{DiceSet, FaceCounts, GameResult, PrizeLevel};

/// A classification rule: the level awarded when the predicate holds.
pub type Rule = (PrizeLevel, fn(&FaceCounts) -> bool);

fn six_fours(c: &FaceCounts) -> bool {
    c.of(4) == 6
}

fn four_fours_two_ones(c: &FaceCounts) -> bool {
    c.of(4) == 4 && c.of(1) == 2
}

fn six_ones(c: &FaceCounts) -> bool {
    c.of(1) == 6
}

fn six_of_other(c: &FaceCounts) -> bool {
    c.face_with_except(6, &[1, 4]).is_some()
}

fn five_fours(c: &FaceCounts) -> bool {
    c.of(4) == 5
}

fn five_of_other(c: &FaceCounts) -> bool {
    c.face_with_except(5, &[4]).is_some()
}

fn four_fours(c: &FaceCounts) -> bool {
    c.of(4) == 4
}

fn full_set(c: &FaceCounts) -> bool {
    c.is_full_set()
}

fn three_fours(c: &FaceCounts) -> bool {
    c.of(4) == 3
}

fn four_of_other(c: &FaceCounts) -> bool {
    c.face_with_except(4, &[4]).is_some()
}

fn two_fours(c: &FaceCounts) -> bool {
    c.of(4) == 2
}

fn one_four(c: &FaceCounts) -> bool {
    c.of(4) == 1
}

/// Every rule, highest priority first. Anything unmatched is [`PrizeLevel::None`].
pub const RULES: [Rule; 12] = [
    (PrizeLevel::SixFours, six_fours),
    (PrizeLevel::FourFoursPlusTwoOnes, four_fours_two_ones),
    (PrizeLevel::SixOnes, six_ones),
    (PrizeLevel::SixOfAKindNonOneNonFour, six_of_other),
    (PrizeLevel::FiveFours, five_fours),
    (PrizeLevel::FiveOfAKindNonFour, five_of_other),
    (PrizeLevel::FourFoursTop, four_fours),
    (PrizeLevel::FullSet, full_set),
    (PrizeLevel::ThreeFours, three_fours),
    (PrizeLevel::FourOfAKindNonFour, four_of_other),
    (PrizeLevel::TwoFours, two_fours),
    (PrizeLevel::OneFour, one_four),
];

pub fn classify(dice: &DiceSet) -> PrizeLevel {
    let counts = dice.counts();
    RULES
        .iter()
        .find(|(_, matches)| matches(&counts))
        .map(|(level, _)| *level)
        .unwrap_or(PrizeLevel::None)
}

/// Classify a roll into a [`GameResult`].
pub fn evaluate(dice: DiceSet) -> GameResult {
    GameResult {
        level: classify(&dice),
        dice,
    }
}
