use serde::{Deserialize, Serialize};
use std::fmt;

/// An upper bound on pages or items, or the absence of one
///
/// In configuration files and summaries a limit is a signed integer where any
/// negative value stands for [`Limit::Unbounded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Limit {
    Unbounded,
    AtMost(u64),
}

impl Limit {
    /// Returns how much is left once `used` has been consumed
    ///
    /// `None` means there is no bound; an exhausted bound is `Some(0)`.
    pub fn remaining(&self, used: u64) -> Option<u64> {
        match self {
            Self::Unbounded => None,
            Self::AtMost(max) => Some(max.saturating_sub(used)),
        }
    }

    /// Returns true once `used` has reached the bound
    pub fn is_reached(&self, used: u64) -> bool {
        self.remaining(used) == Some(0)
    }
}

impl From<i64> for Limit {
    fn from(value: i64) -> Self {
        if value < 0 {
            Self::Unbounded
        } else {
            Self::AtMost(value as u64)
        }
    }
}

impl From<Limit> for i64 {
    fn from(limit: Limit) -> Self {
        match limit {
            Limit::Unbounded => -1,
            Limit::AtMost(max) => i64::try_from(max).unwrap_or(i64::MAX),
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => write!(f, "unbounded"),
            Self::AtMost(max) => write!(f, "{}", max),
        }
    }
}
