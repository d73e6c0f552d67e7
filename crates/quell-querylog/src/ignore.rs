//! Ignored host filter
//!
//! Decides whether a query is recorded at all. The resolution pipeline calls
//! [`IgnoreFilter::should_log`] before building a record, so ignored traffic
//! never costs an encode or a buffer slot.

use std::collections::HashSet;

use hickory_proto::rr::{DNSClass, Name, RecordType};

use crate::config::ConfigError;

/// Set of host names excluded from the query log
///
/// Names are stored lower-cased without a trailing dot, and looked up the
/// same way, so matching is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreFilter {
    hosts: HashSet<String>,
}

impl IgnoreFilter {
    /// Build the filter from configured host names, rejecting bad entries
    pub fn from_hosts<S: AsRef<str>>(entries: &[S]) -> Result<Self, ConfigError> {
        let mut hosts = HashSet::with_capacity(entries.len());

        for (index, entry) in entries.iter().enumerate() {
            let raw = entry.as_ref();
            let host = normalize(raw);
            if host.is_empty() {
                return Err(ConfigError::EmptyIgnored { index });
            }

            validate_host(&host).map_err(|reason| ConfigError::MalformedIgnored {
                index,
                host: raw.to_string(),
                reason,
            })?;

            if !hosts.insert(host) {
                return Err(ConfigError::DuplicateIgnored {
                    index,
                    host: raw.to_string(),
                });
            }
        }

        Ok(Self { hosts })
    }

    /// Whether a query for `host` should be recorded
    ///
    /// Only the host takes part in the decision; type and class are accepted
    /// so the call site mirrors the question it is deciding about.
    pub fn should_log(&self, host: &str, _qtype: RecordType, _qclass: DNSClass) -> bool {
        if self.hosts.is_empty() {
            return true;
        }
        !self.hosts.contains(&normalize(host))
    }

    /// Whether the filter ignores nothing
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Number of ignored hosts
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Ignored hosts, sorted
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts: Vec<_> = self.hosts.iter().cloned().collect();
        hosts.sort();
        hosts
    }
}

/// Lower-case a host and drop its trailing dot
pub(crate) fn normalize(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn validate_host(host: &str) -> Result<(), String> {
    if let Some(c) = host
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(format!("invalid character {c:?}"));
    }

    if host.split('.').any(str::is_empty) {
        return Err("empty label".to_string());
    }

    Name::from_ascii(host).map_err(|e| e.to_string())?;
    Ok(())
}
