//! Draw outcome: three numbers in 0..=9 and their derived category flags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sums at or above this are "big"
pub const BIG_MIN_SUM: u8 = 14;
/// Extreme band, upper tier
pub const EXTREME_BIG_MIN_SUM: u8 = 23;
/// Extreme band, lower tier
pub const EXTREME_SMALL_MAX_SUM: u8 = 4;
/// Highest digit a single draw can produce
pub const MAX_DRAW_NUMBER: u8 = 9;
/// Highest possible sum
pub const MAX_SUM: u8 = 27;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BigSmall {
    Big,
    Small,
}

impl BigSmall {
    pub fn as_str(&self) -> &'static str {
        match self {
            BigSmall::Big => "big",
            BigSmall::Small => "small",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OddEven {
    Odd,
    Even,
}

impl OddEven {
    pub fn as_str(&self) -> &'static str {
        match self {
            OddEven::Odd => "odd",
            OddEven::Even => "even",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtremeTier {
    ExtremeBig,
    ExtremeSmall,
    None,
}

impl ExtremeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtremeTier::ExtremeBig => "extreme-big",
            ExtremeTier::ExtremeSmall => "extreme-small",
            ExtremeTier::None => "none",
        }
    }
}

/// Official result of a drawn round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    numbers: [u8; 3],
    sum: u8,
}

impl Outcome {
    /// Build an outcome from the three drawn numbers, each 0..=9
    pub fn from_numbers(n1: u8, n2: u8, n3: u8) -> Result<Self, String> {
        for n in [n1, n2, n3] {
            if n > MAX_DRAW_NUMBER {
                return Err(format!("draw number {} out of range 0..={}", n, MAX_DRAW_NUMBER));
            }
        }
        Ok(Self {
            numbers: [n1, n2, n3],
            sum: n1 + n2 + n3,
        })
    }

    pub fn numbers(&self) -> [u8; 3] {
        self.numbers
    }

    pub fn sum(&self) -> u8 {
        self.sum
    }

    pub fn is_big(&self) -> bool {
        self.sum >= BIG_MIN_SUM
    }

    pub fn is_small(&self) -> bool {
        !self.is_big()
    }

    pub fn is_odd(&self) -> bool {
        self.sum % 2 == 1
    }

    pub fn is_even(&self) -> bool {
        !self.is_odd()
    }

    pub fn is_extreme_big(&self) -> bool {
        self.sum >= EXTREME_BIG_MIN_SUM
    }

    pub fn is_extreme_small(&self) -> bool {
        self.sum <= EXTREME_SMALL_MAX_SUM
    }

    pub fn big_small(&self) -> BigSmall {
        if self.is_big() {
            BigSmall::Big
        } else {
            BigSmall::Small
        }
    }

    pub fn odd_even(&self) -> OddEven {
        if self.is_odd() {
            OddEven::Odd
        } else {
            OddEven::Even
        }
    }

    pub fn extreme(&self) -> ExtremeTier {
        if self.is_extreme_big() {
            ExtremeTier::ExtremeBig
        } else if self.is_extreme_small() {
            ExtremeTier::ExtremeSmall
        } else {
            ExtremeTier::None
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.numbers;
        write!(f, "{}+{}+{}={}", a, b, c, self.sum)
    }
}
