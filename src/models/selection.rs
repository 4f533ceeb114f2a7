//! Wager targets and their canonical names.
//!
//! Canonical names are what the odds table and order line items store:
//! `"0"`..`"27"` for an exact sum, otherwise one of `big`, `small`, `odd`,
//! `even`, `extreme-big`, `extreme-small`.

use super::outcome::{Outcome, MAX_SUM};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selection {
    Sum(u8),
    Big,
    Small,
    Odd,
    Even,
    ExtremeBig,
    ExtremeSmall,
}

/// Short codes accepted from clients, mapped onto named categories
const SHORT_CODES: &[(&str, Selection)] = &[
    ("b", Selection::Big),
    ("s", Selection::Small),
    ("o", Selection::Odd),
    ("e", Selection::Even),
    ("xb", Selection::ExtremeBig),
    ("xs", Selection::ExtremeSmall),
    ("大", Selection::Big),
    ("小", Selection::Small),
    ("单", Selection::Odd),
    ("双", Selection::Even),
    ("极大", Selection::ExtremeBig),
    ("极小", Selection::ExtremeSmall),
];

const NAMED: &[Selection] = &[
    Selection::Big,
    Selection::Small,
    Selection::Odd,
    Selection::Even,
    Selection::ExtremeBig,
    Selection::ExtremeSmall,
];

impl Selection {
    /// Canonical name as stored in the odds table and on line items
    pub fn canonical_name(&self) -> String {
        match self {
            Selection::Sum(n) => n.to_string(),
            named => named.category_name().to_string(),
        }
    }

    fn category_name(&self) -> &'static str {
        match self {
            Selection::Sum(_) => "sum",
            Selection::Big => "big",
            Selection::Small => "small",
            Selection::Odd => "odd",
            Selection::Even => "even",
            Selection::ExtremeBig => "extreme-big",
            Selection::ExtremeSmall => "extreme-small",
        }
    }

    /// Parse a stored canonical name; no short codes
    pub fn from_canonical(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Some(sum) = parse_sum(name) {
            return Some(Selection::Sum(sum));
        }
        NAMED.iter().copied().find(|s| s.category_name() == name)
    }

    /// Normalize a client-supplied selection: exact sums, short codes, or canonical names
    pub fn normalize(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Some(sum) = parse_sum(raw) {
            return Some(Selection::Sum(sum));
        }
        let lowered = raw.to_lowercase();
        SHORT_CODES
            .iter()
            .find(|(code, _)| *code == lowered)
            .map(|(_, s)| *s)
            .or_else(|| Self::from_canonical(&lowered))
    }

    /// Whether this selection wins against the given outcome
    pub fn is_hit(&self, outcome: &Outcome) -> bool {
        match self {
            Selection::Sum(n) => *n == outcome.sum(),
            Selection::Big => outcome.is_big(),
            Selection::Small => outcome.is_small(),
            Selection::Odd => outcome.is_odd(),
            Selection::Even => outcome.is_even(),
            Selection::ExtremeBig => outcome.is_extreme_big(),
            Selection::ExtremeSmall => outcome.is_extreme_small(),
        }
    }
}

fn parse_sum(s: &str) -> Option<u8> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse::<u8>().ok().filter(|n| *n <= MAX_SUM)
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_name())
    }
}
