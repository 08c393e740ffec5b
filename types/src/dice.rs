//! Six-dice rolls.
//!
//! A [`DiceSet`] is the ordered outcome of one play. The order is kept for
//! display only; classification and tie-breaking work on [`FaceCounts`].

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of dice thrown per play.
pub const DICE_COUNT: usize = 6;

/// Number of faces on each die.
pub const FACES: u8 = 6;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiceError {
    #[error("die {index} shows {value}, expected 1..=6")]
    FaceOutOfRange { index: usize, value: u8 },
    #[error("expected 6 dice, got {got}")]
    WrongCount { got: usize },
}

/// Six faces in [1, 6], immutable once rolled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct DiceSet([u8; DICE_COUNT]);

impl DiceSet {
    pub fn new(faces: [u8; DICE_COUNT]) -> Result<Self, DiceError> {
        for (index, &value) in faces.iter().enumerate() {
            if !(1..=FACES).contains(&value) {
                return Err(DiceError::FaceOutOfRange { index, value });
            }
        }
        Ok(Self(faces))
    }

    /// Roll six independent, uniform faces.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut faces = [0u8; DICE_COUNT];
        for face in faces.iter_mut() {
            *face = rng.gen_range(1..=FACES);
        }
        Self(faces)
    }

    pub fn faces(&self) -> &[u8; DICE_COUNT] {
        &self.0
    }

    pub fn sum(&self) -> u32 {
        self.0.iter().map(|&f| u32::from(f)).sum()
    }

    pub fn counts(&self) -> FaceCounts {
        let mut counts = [0u8; FACES as usize];
        for &face in &self.0 {
            counts[usize::from(face - 1)] += 1;
        }
        FaceCounts(counts)
    }
}

impl TryFrom<&[u8]> for DiceSet {
    type Error = DiceError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let faces: [u8; DICE_COUNT] = value
            .try_into()
            .map_err(|_| DiceError::WrongCount { got: value.len() })?;
        Self::new(faces)
    }
}

impl TryFrom<Vec<u8>> for DiceSet {
    type Error = DiceError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        Self::try_from(value.as_slice())
    }
}

impl From<DiceSet> for Vec<u8> {
    fn from(value: DiceSet) -> Self {
        value.0.to_vec()
    }
}

impl fmt::Display for DiceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, face) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{face}")?;
        }
        Ok(())
    }
}

/// Occurrences of each face value in a [`DiceSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceCounts([u8; FACES as usize]);

impl FaceCounts {
    /// How many dice show `face`. Faces outside 1..=6 count as zero.
    pub fn of(&self, face: u8) -> u8 {
        match face {
            1..=FACES => self.0[usize::from(face - 1)],
            _ => 0,
        }
    }

    /// Lowest face appearing exactly `n` times.
    pub fn face_with(&self, n: u8) -> Option<u8> {
        (1..=FACES).find(|&face| self.of(face) == n)
    }

    /// Lowest face other than `excluded` appearing exactly `n` times.
    pub fn face_with_except(&self, n: u8, excluded: &[u8]) -> Option<u8> {
        (1..=FACES).find(|face| !excluded.contains(face) && self.of(*face) == n)
    }

    /// True when every face appears exactly once.
    pub fn is_full_set(&self) -> bool {
        self.0.iter().all(|&c| c == 1)
    }
}
