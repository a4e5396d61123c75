//! Label types produced by the cascade
//!
//! Each stage emits a small discrete state. The final prediction packs
//! mask, gender and age bracket into a single mixed-radix integer.

use std::fmt;

/// Mask-wearing category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskState {
    Worn,
    Incorrect,
    NotWorn,
}

impl MaskState {
    pub const ALL: [MaskState; 3] = [MaskState::Worn, MaskState::Incorrect, MaskState::NotWorn];

    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(MaskState::Worn),
            1 => Some(MaskState::Incorrect),
            2 => Some(MaskState::NotWorn),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MaskState::Worn => "worn",
            MaskState::Incorrect => "incorrect",
            MaskState::NotWorn => "not_worn",
        }
    }
}

/// Binary gender category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenderState {
    Male,
    Female,
}

impl GenderState {
    pub const ALL: [GenderState; 2] = [GenderState::Male, GenderState::Female];

    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(GenderState::Male),
            1 => Some(GenderState::Female),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenderState::Male => "male",
            GenderState::Female => "female",
        }
    }
}

/// Fine-grained age classifier output, collapsed into an [`AgeBracket`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgeMod10Bucket(u8);

impl AgeMod10Bucket {
    pub const COUNT: usize = 7;

    pub fn from_index(idx: usize) -> Option<Self> {
        (idx < Self::COUNT).then_some(AgeMod10Bucket(idx as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Collapse into a coarse bracket.
    ///
    /// Bucket 6 is the open-ended oldest bracket; 3..=5 are middle-aged.
    pub fn bracket(self) -> AgeBracket {
        if self.0 == 6 {
            AgeBracket::Old
        } else if self.0 >= 3 {
            AgeBracket::Middle
        } else {
            AgeBracket::Young
        }
    }
}

/// Coarse age category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgeBracket {
    Young,
    Middle,
    Old,
}

impl AgeBracket {
    pub const ALL: [AgeBracket; 3] = [AgeBracket::Young, AgeBracket::Middle, AgeBracket::Old];

    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(AgeBracket::Young),
            1 => Some(AgeBracket::Middle),
            2 => Some(AgeBracket::Old),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgeBracket::Young => "young",
            AgeBracket::Middle => "middle",
            AgeBracket::Old => "old",
        }
    }
}

/// Final prediction in `[0, 17]`: `mask * 6 + gender * 3 + age`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeLabel(u8);

impl CompositeLabel {
    pub const COUNT: usize = 18;

    pub fn encode(mask: MaskState, gender: GenderState, age: AgeBracket) -> Self {
        CompositeLabel((mask.index() * 6 + gender.index() * 3 + age.index()) as u8)
    }

    pub fn decode(self) -> (MaskState, GenderState, AgeBracket) {
        let value = self.0 as usize;
        // Every label built through `encode` or `from_index` is below 18,
        // so each digit is in range.
        let mask = MaskState::ALL[value / 6];
        let gender = GenderState::ALL[(value % 6) / 3];
        let age = AgeBracket::ALL[value % 3];
        (mask, gender, age)
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        (idx < Self::COUNT).then_some(CompositeLabel(idx as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for CompositeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
