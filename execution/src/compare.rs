//! Ordering of classified results.
//!
//! Results compare by level first. Equal levels fall back to their extras,
//! the dice outside the level's defining pattern: a higher extras sum wins,
//! then the extras sorted descending are compared position by position.

use mooncake_types::{GameResult, PrizeLevel, FACES};
use std::cmp::Ordering;

/// Faces (value, count) that make up a level's defining pattern.
fn pattern(result: &GameResult) -> Vec<(u8, u8)> {
    let counts = result.dice.counts();
    match result.level {
        PrizeLevel::None => vec![],
        PrizeLevel::OneFour => vec![(4, 1)],
        PrizeLevel::TwoFours => vec![(4, 2)],
        PrizeLevel::FourOfAKindNonFour => counts
            .face_with_except(4, &[4])
            .map(|face| vec![(face, 4)])
            .unwrap_or_default(),
        PrizeLevel::ThreeFours => vec![(4, 3)],
        PrizeLevel::FullSet => (1..=FACES).map(|face| (face, 1)).collect(),
        PrizeLevel::FourFoursTop => vec![(4, 4)],
        PrizeLevel::FiveOfAKindNonFour => counts
            .face_with_except(5, &[4])
            .map(|face| vec![(face, 5)])
            .unwrap_or_default(),
        PrizeLevel::FiveFours => vec![(4, 5)],
        PrizeLevel::SixOfAKindNonOneNonFour => counts
            .face_with_except(6, &[1, 4])
            .map(|face| vec![(face, 6)])
            .unwrap_or_default(),
        PrizeLevel::SixOnes => vec![(1, 6)],
        PrizeLevel::FourFoursPlusTwoOnes => vec![(4, 4), (1, 2)],
        PrizeLevel::SixFours => vec![(4, 6)],
    }
}

/// Dice outside the level's pattern, highest first.
pub fn extras(result: &GameResult) -> Vec<u8> {
    let counts = result.dice.counts();
    let mut remaining = [0u8; FACES as usize];
    for face in 1..=FACES {
        remaining[usize::from(face - 1)] = counts.of(face);
    }
    for (face, n) in pattern(result) {
        let slot = &mut remaining[usize::from(face - 1)];
        *slot = slot.saturating_sub(n);
    }

    let mut out = Vec::new();
    for face in (1..=FACES).rev() {
        for _ in 0..remaining[usize::from(face - 1)] {
            out.push(face);
        }
    }
    out
}

/// Total order over results. `Greater` means `a` beats `b`.
pub fn compare(a: &GameResult, b: &GameResult) -> Ordering {
    a.level.cmp(&b.level).then_with(|| {
        let extras_a = extras(a);
        let extras_b = extras(b);
        let sum = |e: &[u8]| e.iter().map(|&f| u32::from(f)).sum::<u32>();
        sum(&extras_a)
            .cmp(&sum(&extras_b))
            .then_with(|| compare_sorted(&extras_a, &extras_b))
    })
}

/// Lexicographic comparison of descending extras; missing positions count as 0.
fn compare_sorted(a: &[u8], b: &[u8]) -> Ordering {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Best of a sequence. Ties keep the earliest.
pub fn best_of<'a, I>(results: I) -> Option<&'a GameResult>
where
    I: IntoIterator<Item = &'a GameResult>,
{
    results.into_iter().fold(None, |best, next| match best {
        Some(current) if compare(next, current) != Ordering::Greater => Some(current),
        _ => Some(next),
    })
}
