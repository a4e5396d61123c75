//! Classifier slots
//!
//! The cascade uses ten classifiers: one for the mask state, one gender
//! classifier per mask state, and one age classifier per (mask, gender) pair.

use std::fmt;

use super::labels::{AgeMod10Bucket, GenderState, MaskState};

/// One of the ten classifier positions in the cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassifierSlot {
    Mask,
    Gender { mask: MaskState },
    Age { mask: MaskState, gender: GenderState },
}

impl ClassifierSlot {
    pub const COUNT: usize = 10;

    /// All slots in cascade order: mask, genders, then ages.
    pub fn all() -> [ClassifierSlot; Self::COUNT] {
        use GenderState::*;
        use MaskState::*;
        [
            ClassifierSlot::Mask,
            ClassifierSlot::Gender { mask: Worn },
            ClassifierSlot::Gender { mask: Incorrect },
            ClassifierSlot::Gender { mask: NotWorn },
            ClassifierSlot::Age { mask: Worn, gender: Male },
            ClassifierSlot::Age { mask: Worn, gender: Female },
            ClassifierSlot::Age { mask: Incorrect, gender: Male },
            ClassifierSlot::Age { mask: Incorrect, gender: Female },
            ClassifierSlot::Age { mask: NotWorn, gender: Male },
            ClassifierSlot::Age { mask: NotWorn, gender: Female },
        ]
    }

    /// Number of labels a classifier in this slot must produce
    pub fn num_classes(&self) -> usize {
        match self {
            ClassifierSlot::Mask => MaskState::ALL.len(),
            ClassifierSlot::Gender { .. } => GenderState::ALL.len(),
            ClassifierSlot::Age { .. } => AgeMod10Bucket::COUNT,
        }
    }

    /// Upper-case key used in model directory names, e.g. `MASK1_GENDER0_AGEMOD10`
    pub fn key(&self) -> String {
        match self {
            ClassifierSlot::Mask => "MASK".to_string(),
            ClassifierSlot::Gender { mask } => format!("MASK{}_GENDER", mask.index()),
            ClassifierSlot::Age { mask, gender } => {
                format!("MASK{}_GENDER{}_AGEMOD10", mask.index(), gender.index())
            }
        }
    }

    /// Position in [`ClassifierSlot::all`]
    pub fn ordinal(&self) -> usize {
        match self {
            ClassifierSlot::Mask => 0,
            ClassifierSlot::Gender { mask } => 1 + mask.index(),
            ClassifierSlot::Age { mask, gender } => 4 + mask.index() * 2 + gender.index(),
        }
    }
}

impl fmt::Display for ClassifierSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
