//! Per-player best top-tier result.
//!
//! Each player has at most one History row flagged `is_best`, and it is always
//! a top-tier row that no other top-tier row of theirs beats. A new top-tier
//! play takes the flag only by strictly beating the holder; ties keep the
//! earlier row. Callers must hold the player's lock across [`resolve_best`]
//! and the commit that applies it.

use crate::{classify::evaluate, compare::compare};
use mooncake_types::{GameResult, History, HistoryId};
use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BestDecision {
    /// Not top tier; never best.
    NotTop,
    /// First top-tier play for this player.
    First,
    /// Beats the current holder, which must be demoted.
    Replaces(HistoryId),
    /// Does not beat the current holder.
    Kept(HistoryId),
}

impl BestDecision {
    pub fn is_best(self) -> bool {
        matches!(self, BestDecision::First | BestDecision::Replaces(_))
    }

    /// Row to demote when this decision is committed.
    pub fn demotes(self) -> Option<HistoryId> {
        match self {
            BestDecision::Replaces(id) => Some(id),
            _ => None,
        }
    }
}

/// Decide whether `new` becomes the player's best, given the row currently
/// holding the flag.
pub fn resolve_best(new: &GameResult, current: Option<&History>) -> BestDecision {
    if !new.is_top() {
        return BestDecision::NotTop;
    }
    let Some(current) = current else {
        return BestDecision::First;
    };
    let held = evaluate(current.dice);
    match compare(new, &held) {
        Ordering::Greater => BestDecision::Replaces(current.id),
        Ordering::Equal | Ordering::Less => BestDecision::Kept(current.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::best_of;
    use mooncake_types::{DiceSet, HistoryDraft, UserId};
    use proptest::prelude::*;

    fn history(id: u64, faces: [u8; 6], is_best: bool) -> History {
        let dice = DiceSet::new(faces).unwrap();
        HistoryDraft {
            user: UserId::new("dora"),
            times: id as u32,
            award: None,
            reward: None,
            is_top: evaluate(dice).is_top(),
            is_best,
            got_reward: false,
            dice,
        }
        .into_history(HistoryId(id), id)
    }

    fn result(faces: [u8; 6]) -> GameResult {
        evaluate(DiceSet::new(faces).unwrap())
    }

    #[test]
    fn test_common_tier_is_never_best() {
        assert_eq!(resolve_best(&result([4, 4, 4, 1, 2, 3]), None), BestDecision::NotTop);
        assert!(!BestDecision::NotTop.is_best());
    }

    #[test]
    fn test_first_top_tier_is_best() {
        let decision = resolve_best(&result([4, 4, 4, 4, 4, 4]), None);
        assert_eq!(decision, BestDecision::First);
        assert!(decision.is_best());
        assert_eq!(decision.demotes(), None);
    }

    #[test]
    fn test_strictly_better_replaces() {
        let held = history(1, [4, 4, 4, 4, 1, 2], true);
        let decision = resolve_best(&result([4, 4, 4, 4, 2, 3]), Some(&held));
        assert_eq!(decision, BestDecision::Replaces(HistoryId(1)));
        assert_eq!(decision.demotes(), Some(HistoryId(1)));
    }

    #[test]
    fn test_tie_keeps_existing() {
        let held = history(1, [4, 4, 4, 4, 2, 3], true);
        let decision = resolve_best(&result([3, 2, 4, 4, 4, 4]), Some(&held));
        assert_eq!(decision, BestDecision::Kept(HistoryId(1)));
        assert!(!decision.is_best());
    }

    #[test]
    fn test_worse_keeps_existing() {
        let held = history(1, [4, 4, 4, 4, 4, 4], true);
        let decision = resolve_best(&result([1, 1, 1, 1, 1, 1]), Some(&held));
        assert_eq!(decision, BestDecision::Kept(HistoryId(1)));
    }

    fn top_tier_faces() -> impl Strategy<Value = [u8; 6]> {
        prop_oneof![
            // Four 4s plus two free dice covers levels 6, 8, 11 and 12.
            (1u8..=6, 1u8..=6).prop_map(|(a, b)| [4, 4, 4, 4, a, b]),
            (1u8..=6, 1u8..=6).prop_map(|(face, kicker)| [face, face, face, face, face, kicker]),
            (1u8..=6).prop_map(|face| [face; 6]),
        ]
    }

    proptest! {
        #[test]
        fn prop_single_best_tracks_maximum(plays in prop::collection::vec(top_tier_faces(), 1..24)) {
            let mut rows: Vec<History> = Vec::new();
            for (i, faces) in plays.iter().enumerate() {
                let new = result(*faces);
                prop_assume!(new.is_top());
                let current = rows.iter().find(|h| h.is_best).cloned();
                let decision = resolve_best(&new, current.as_ref());
                if let Some(id) = decision.demotes() {
                    rows.iter_mut().filter(|h| h.id == id).for_each(|h| h.is_best = false);
                }
                rows.push(history(i as u64 + 1, *faces, decision.is_best()));

                let flagged: Vec<_> = rows.iter().filter(|h| h.is_best).collect();
                prop_assert_eq!(flagged.len(), 1);

                let results: Vec<_> = rows.iter().map(|h| evaluate(h.dice)).collect();
                let max = best_of(results.iter()).unwrap();
                prop_assert_eq!(compare(&evaluate(flagged[0].dice), max), Ordering::Equal);
                // Ties keep the earliest row.
                let earliest = rows
                    .iter()
                    .find(|h| compare(&evaluate(h.dice), max) == Ordering::Equal)
                    .unwrap();
                prop_assert_eq!(flagged[0].id, earliest.id);
            }
        }
    }
}
