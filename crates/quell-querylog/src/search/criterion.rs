//! Search criteria
//!
//! A criterion is a closed set of variants, each evaluated by one arm of
//! [`SearchCriterion::matches`]. Adding a kind of criterion means adding a
//! variant; the compiler then points at every place that has to handle it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use quell_core::Reason;

use crate::entry::LogEntry;

/// A filtering status name that is not recognized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown filtering status {0:?}")]
pub struct UnknownStatus(pub String);

/// Coarse classification of filtering decisions for searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilteringStatus {
    /// Every record
    #[default]
    All,
    /// Blocked, allowlisted or rewritten
    Filtered,
    /// Blocked by a blocklist rule or a blocked service
    Blocked,
    /// Blocked as part of a blocked service
    BlockedServices,
    /// Blocked by safe browsing
    BlockedSafebrowsing,
    /// Blocked by parental control
    BlockedParental,
    /// Let through by an allowlist rule
    Whitelisted,
    /// Answered by a rewrite
    Rewritten,
    /// Rewritten by safe search
    SafeSearch,
    /// Neither blocked nor allowlisted
    Processed,
}

impl FilteringStatus {
    const ALL: [FilteringStatus; 10] = [
        FilteringStatus::All,
        FilteringStatus::Filtered,
        FilteringStatus::Blocked,
        FilteringStatus::BlockedServices,
        FilteringStatus::BlockedSafebrowsing,
        FilteringStatus::BlockedParental,
        FilteringStatus::Whitelisted,
        FilteringStatus::Rewritten,
        FilteringStatus::SafeSearch,
        FilteringStatus::Processed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilteringStatus::All => "all",
            FilteringStatus::Filtered => "filtered",
            FilteringStatus::Blocked => "blocked",
            FilteringStatus::BlockedServices => "blocked_services",
            FilteringStatus::BlockedSafebrowsing => "blocked_safebrowsing",
            FilteringStatus::BlockedParental => "blocked_parental",
            FilteringStatus::Whitelisted => "whitelisted",
            FilteringStatus::Rewritten => "rewritten",
            FilteringStatus::SafeSearch => "safe_search",
            FilteringStatus::Processed => "processed",
        }
    }

    /// Whether a record with this filtering outcome has the status
    pub fn matches(&self, entry: &LogEntry) -> bool {
        let res = &entry.result;
        match self {
            FilteringStatus::All => true,
            FilteringStatus::Filtered => {
                res.is_filtered
                    || res.reason.is_one_of(&[
                        Reason::NotFilteredAllowList,
                        Reason::Rewritten,
                        Reason::RewrittenAutoHosts,
                        Reason::RewrittenRule,
                    ])
            }
            FilteringStatus::Blocked => {
                res.is_filtered
                    && res
                        .reason
                        .is_one_of(&[Reason::FilteredBlockList, Reason::FilteredBlockedService])
            }
            FilteringStatus::BlockedServices => {
                res.is_filtered && res.reason == Reason::FilteredBlockedService
            }
            FilteringStatus::BlockedSafebrowsing => {
                res.is_filtered && res.reason == Reason::FilteredSafeBrowsing
            }
            FilteringStatus::BlockedParental => {
                res.is_filtered && res.reason == Reason::FilteredParental
            }
            FilteringStatus::Whitelisted => res.reason == Reason::NotFilteredAllowList,
            FilteringStatus::Rewritten => res.reason.is_rewrite(),
            FilteringStatus::SafeSearch => {
                res.is_filtered && res.reason == Reason::FilteredSafeSearch
            }
            FilteringStatus::Processed => !res.reason.is_one_of(&[
                Reason::FilteredBlockList,
                Reason::FilteredBlockedService,
                Reason::NotFilteredAllowList,
            ]),
        }
    }
}

impl fmt::Display for FilteringStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilteringStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilteringStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// One condition a record must satisfy to be returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriterion {
    /// Text matched against the host or the client address
    ///
    /// Strict terms must equal the field; others need only be contained in
    /// it. Both comparisons ignore ASCII case.
    Term { value: String, strict: bool },
    /// Filtering outcome of the query
    FilteringStatus(FilteringStatus),
}

impl SearchCriterion {
    /// Term criterion requiring the whole host or address to match
    pub fn strict(value: impl Into<String>) -> Self {
        SearchCriterion::Term {
            value: value.into(),
            strict: true,
        }
    }

    /// Term criterion matching any host or address containing `value`
    pub fn contains(value: impl Into<String>) -> Self {
        SearchCriterion::Term {
            value: value.into(),
            strict: false,
        }
    }

    pub fn status(status: FilteringStatus) -> Self {
        SearchCriterion::FilteringStatus(status)
    }

    /// Whether `entry` satisfies this criterion
    pub fn matches(&self, entry: &LogEntry) -> bool {
        match self {
            SearchCriterion::Term { value, strict } => {
                let ip = entry.client_ip.to_string();
                let fields = [entry.qhost.as_str(), ip.as_str()];
                if *strict {
                    fields.iter().any(|f| f.eq_ignore_ascii_case(value))
                } else {
                    fields.iter().any(|f| contains_ignore_ascii_case(f, value))
                }
            }
            SearchCriterion::FilteringStatus(status) => status.matches(entry),
        }
    }
}

fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    let (haystack, needle) = (haystack.as_bytes(), needle.as_bytes());
    if needle.is_empty() {
        return true;
    }
    haystack
        .windows(needle.len())
        .any(|w| w.eq_ignore_ascii_case(needle))
}
