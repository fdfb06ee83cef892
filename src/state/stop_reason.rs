use std::fmt;

/// Why a section stopped paginating
///
/// The string forms are what gets checkpointed and reported, so they are
/// stable across releases.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StopReason {
    // ===== Quota Stops =====
    /// The section scanned as many pages as `max-pages` allows
    MaxPages,

    /// Scheduled plus scraped items reached `max-items-per-section`
    MaxItemsPerSection,

    /// The whole run used up `backfill-max-new-items`
    BackfillBudgetExhausted,

    // ===== Pagination Stops =====
    /// The page just scanned is the last one the site advertises
    LastPageOnSite,

    /// A `full` run fetched every page it planned on page 1
    PlannedPagesDone,

    /// A `backfill` run reached the end of its page window
    BackfillWindowReached,

    /// A `latest` run walked into enough consecutive fully-known pages
    KnownPageStreak,

    // ===== Failure Stops =====
    /// A listing page yielded no entries (parse failure or end of catalog)
    NoListingEntries,

    /// A listing page could not be fetched
    ListingFetchFailed(String),

    /// The run was cancelled before the section finished
    Cancelled,

    /// The section task ended abnormally
    SectionAborted(String),
}

const LISTING_FETCH_FAILED_PREFIX: &str = "listing fetch failed: ";
const SECTION_ABORTED_PREFIX: &str = "section aborted: ";

impl StopReason {
    pub fn to_db_string(&self) -> String {
        match self {
            Self::MaxPages => "max pages reached".to_string(),
            Self::MaxItemsPerSection => "max items per section reached".to_string(),
            Self::BackfillBudgetExhausted => "backfill max new items reached".to_string(),
            Self::LastPageOnSite => "reached last page on site".to_string(),
            Self::PlannedPagesDone => "planned pages done".to_string(),
            Self::BackfillWindowReached => "configured backfill depth reached".to_string(),
            Self::KnownPageStreak => "known page streak reached".to_string(),
            Self::NoListingEntries => "no listing entries found".to_string(),
            Self::ListingFetchFailed(cause) => format!("{}{}", LISTING_FETCH_FAILED_PREFIX, cause),
            Self::Cancelled => "cancelled".to_string(),
            Self::SectionAborted(cause) => format!("{}{}", SECTION_ABORTED_PREFIX, cause),
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "max pages reached" => Some(Self::MaxPages),
            "max items per section reached" => Some(Self::MaxItemsPerSection),
            "backfill max new items reached" => Some(Self::BackfillBudgetExhausted),
            "reached last page on site" => Some(Self::LastPageOnSite),
            "planned pages done" => Some(Self::PlannedPagesDone),
            "configured backfill depth reached" => Some(Self::BackfillWindowReached),
            "known page streak reached" => Some(Self::KnownPageStreak),
            "no listing entries found" => Some(Self::NoListingEntries),
            "cancelled" => Some(Self::Cancelled),
            other => {
                if let Some(cause) = other.strip_prefix(LISTING_FETCH_FAILED_PREFIX) {
                    Some(Self::ListingFetchFailed(cause.to_string()))
                } else {
                    other
                        .strip_prefix(SECTION_ABORTED_PREFIX)
                        .map(|cause| Self::SectionAborted(cause.to_string()))
                }
            }
        }
    }

    /// Returns true if the section ended on an error rather than a rule
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::NoListingEntries
                | Self::ListingFetchFailed(_)
                | Self::Cancelled
                | Self::SectionAborted(_)
        )
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_strings_are_stable() {
        assert_eq!(
            StopReason::KnownPageStreak.to_db_string(),
            "known page streak reached"
        );
        assert_eq!(
            StopReason::BackfillBudgetExhausted.to_db_string(),
            "backfill max new items reached"
        );
        assert_eq!(
            StopReason::NoListingEntries.to_db_string(),
            "no listing entries found"
        );
    }

    #[test]
    fn test_fetch_failure_keeps_its_cause() {
        let reason = StopReason::ListingFetchFailed("HTTP 503".to_string());
        let stored = reason.to_db_string();
        assert_eq!(stored, "listing fetch failed: HTTP 503");
        assert_eq!(StopReason::from_db_string(&stored), Some(reason));
    }

    #[test]
    fn test_unknown_string() {
        assert_eq!(StopReason::from_db_string("tired"), None);
    }

    #[test]
    fn test_failures() {
        assert!(StopReason::NoListingEntries.is_failure());
        assert!(StopReason::Cancelled.is_failure());
        assert!(!StopReason::KnownPageStreak.is_failure());
        assert!(!StopReason::MaxPages.is_failure());
    }
}
