use serde::Serialize;
use std::fmt;

/// How a run walks each section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Fetch everything the pagination advertises, without consulting the store
    Full,
    /// Start at page 1 and stop once known territory is reached
    Latest,
    /// Resume deeper in the catalog from the stored cursor, a bounded window per run
    Backfill,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Latest => "latest",
            Self::Backfill => "backfill",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "full" => Some(Self::Full),
            "latest" => Some(Self::Latest),
            "backfill" => Some(Self::Backfill),
            _ => None,
        }
    }

    /// Parses a mode name, falling back to [`RunMode::Full`] with a warning
    pub fn parse_or_default(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            tracing::warn!("Unknown run mode '{}', falling back to 'full'", name.trim());
            Self::Full
        })
    }

    /// Returns true for the modes that consult the store and checkpoint progress
    pub fn is_incremental(&self) -> bool {
        matches!(self, Self::Latest | Self::Backfill)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
