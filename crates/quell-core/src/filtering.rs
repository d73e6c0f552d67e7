//! Filtering decision types
//!
//! These describe the outcome the filtering engine reached for one query.
//! The query log stores them as-is and only inspects them to answer
//! filtering-status searches.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Why a query was or was not filtered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// No rule matched the host
    #[default]
    NotFilteredNotFound,
    /// An allowlist rule matched the host
    NotFilteredAllowList,
    /// Filtering failed and the query was let through
    NotFilteredError,
    /// A blocklist rule matched the host
    FilteredBlockList,
    /// The safe-browsing service flagged the host
    FilteredSafeBrowsing,
    /// The parental-control service flagged the host
    FilteredParental,
    /// The query itself was invalid
    FilteredInvalid,
    /// Safe search rewrote the host
    FilteredSafeSearch,
    /// The host belongs to a blocked service
    FilteredBlockedService,
    /// A legacy DNS rewrite answered the query
    Rewritten,
    /// The hosts file answered the query
    RewrittenAutoHosts,
    /// A `$dnsrewrite` rule answered the query
    RewrittenRule,
}

impl Reason {
    const ALL: [Reason; 12] = [
        Reason::NotFilteredNotFound,
        Reason::NotFilteredAllowList,
        Reason::NotFilteredError,
        Reason::FilteredBlockList,
        Reason::FilteredSafeBrowsing,
        Reason::FilteredParental,
        Reason::FilteredInvalid,
        Reason::FilteredSafeSearch,
        Reason::FilteredBlockedService,
        Reason::Rewritten,
        Reason::RewrittenAutoHosts,
        Reason::RewrittenRule,
    ];

    /// Stable textual name of the reason
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::NotFilteredNotFound => "not_filtered_not_found",
            Reason::NotFilteredAllowList => "not_filtered_allow_list",
            Reason::NotFilteredError => "not_filtered_error",
            Reason::FilteredBlockList => "filtered_block_list",
            Reason::FilteredSafeBrowsing => "filtered_safe_browsing",
            Reason::FilteredParental => "filtered_parental",
            Reason::FilteredInvalid => "filtered_invalid",
            Reason::FilteredSafeSearch => "filtered_safe_search",
            Reason::FilteredBlockedService => "filtered_blocked_service",
            Reason::Rewritten => "rewritten",
            Reason::RewrittenAutoHosts => "rewritten_auto_hosts",
            Reason::RewrittenRule => "rewritten_rule",
        }
    }

    /// True for any of the rewrite reasons
    pub fn is_rewrite(&self) -> bool {
        matches!(
            self,
            Reason::Rewritten | Reason::RewrittenAutoHosts | Reason::RewrittenRule
        )
    }

    /// Check whether the reason is one of `reasons`
    pub fn is_one_of(&self, reasons: &[Reason]) -> bool {
        reasons.contains(self)
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reason {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reason::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| CoreError::UnknownReason(s.to_string()))
    }
}

/// A filtering rule that matched a query
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResultRule {
    /// Identifier of the filter list the rule came from
    pub filter_list_id: i64,
    /// Rule text as written in the list
    pub text: String,
}

impl ResultRule {
    /// Create a new matched rule
    pub fn new(filter_list_id: i64, text: impl Into<String>) -> Self {
        Self {
            filter_list_id,
            text: text.into(),
        }
    }
}

/// The filtering decision supplied with every logged query
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterResult {
    /// Whether the query was blocked or otherwise altered
    pub is_filtered: bool,
    /// Why the decision was made
    pub reason: Reason,
    /// Rules that matched
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ResultRule>,
    /// Blocked service name, for [`Reason::FilteredBlockedService`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    /// Canonical name a rewrite pointed at
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canon_name: Option<String>,
}

impl FilterResult {
    /// A result for a query no rule touched
    pub fn not_filtered() -> Self {
        Self::default()
    }

    /// A result for a query blocked with `reason`
    pub fn filtered(reason: Reason) -> Self {
        Self {
            is_filtered: true,
            reason,
            ..Self::default()
        }
    }

    /// Attach a matched rule
    pub fn with_rule(mut self, rule: ResultRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Attach a blocked service name
    pub fn with_service(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }
}
