//! Dice rolling.

use mooncake_types::DiceSet;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Source of randomness for a play: the roll itself and the tie-break
/// among awards sharing a level.
pub trait DiceSource: Send {
    fn roll(&mut self) -> DiceSet;

    /// Uniform index in `0..len`. `len` is never zero.
    fn pick(&mut self, len: usize) -> usize;
}

/// Uniform roller backed by [`StdRng`].
pub struct DiceRoller {
    rng: StdRng,
}

impl DiceRoller {
    /// Reproducible roller for simulations and tests.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl DiceSource for DiceRoller {
    fn roll(&mut self) -> DiceSet {
        DiceSet::random(&mut self.rng)
    }

    fn pick(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.rng.gen_range(0..len)
    }
}
