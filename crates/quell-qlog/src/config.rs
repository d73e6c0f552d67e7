//! Command line and configuration file handling

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use quell_logging::LogConfig;
use quell_querylog::search::{DEFAULT_LIMIT, DEFAULT_MAX_FILE_SCAN_ENTRIES};
use quell_querylog::{FilteringStatus, QueryLogSettings, SearchCriterion, SearchParams};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(name = "qlog", about = "Inspect a Quell query log directory")]
pub struct Cli {
    /// TOML file with a [querylog] table and an optional [log] table
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Query log directory, overriding querylog.dir
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search the log, newest first
    Search(SearchArgs),

    /// List segment files, oldest first
    Segments,

    /// Validate the configuration and print it with defaults filled in
    Check,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SearchArgs {
    /// Host name or client address to look for
    #[arg(long)]
    pub term: Option<String>,

    /// Match the term exactly instead of as a substring
    #[arg(long, requires = "term")]
    pub strict: bool,

    /// Filtering status: all, filtered, blocked, blocked_services,
    /// blocked_safebrowsing, blocked_parental, whitelisted, rewritten,
    /// safe_search or processed
    #[arg(long)]
    pub status: Option<FilteringStatus>,

    /// Matches to skip
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Matches to print
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,

    /// Records inspected per segment file, 0 for no cap
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SCAN_ENTRIES)]
    pub max_scan: usize,

    /// Only records older than this RFC 3339 timestamp
    #[arg(long)]
    pub older_than: Option<DateTime<Utc>>,

    /// Stop scanning after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Jsonl)]
    pub format: Format,
}

/// How search results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// One stored record per line, as JSON
    #[default]
    Jsonl,
    /// One aligned line per record
    Text,
}

impl SearchArgs {
    /// Build search parameters, starting the timeout now
    pub fn to_params(&self) -> SearchParams {
        let mut params = SearchParams::new()
            .with_offset(self.offset)
            .with_limit(self.limit)
            .with_max_file_scan_entries(self.max_scan);

        if let Some(term) = &self.term {
            params = params.with_criterion(if self.strict {
                SearchCriterion::strict(term.clone())
            } else {
                SearchCriterion::contains(term.clone())
            });
        }
        if let Some(status) = self.status {
            params = params.with_criterion(SearchCriterion::status(status));
        }
        if let Some(time) = self.older_than {
            params = params.with_older_than(time);
        }
        if let Some(ms) = self.timeout_ms {
            params =
                params.with_deadline(tokio::time::Instant::now() + Duration::from_millis(ms));
        }
        params
    }
}

/// Contents of the configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QlogConfig {
    pub querylog: QueryLogSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<LogConfig>,
}

impl QlogConfig {
    /// Read `path`, or use defaults when no file is given
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Settings for opening an existing directory without changing it
    ///
    /// Recording, and with it the background task, is switched off, and
    /// retention is lifted so opening never deletes segments.
    pub fn inspection_settings(&self, dir: Option<&Path>) -> QueryLogSettings {
        let mut settings = self.querylog.clone();
        if let Some(dir) = dir {
            settings.dir = dir.to_path_buf();
        }
        settings.enabled = false;
        settings.file_enabled = true;
        settings.max_rotated_files = None;
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_querylog_table() {
        let config = QlogConfig::parse(
            r#"
            [querylog]
            dir = "/var/lib/quell/querylog"
            interval_hours = 24
            size_memory = 200
            ignored = ["example.org", "tracker.example"]
            max_rotated_files = 7
            "#,
        )
        .unwrap();

        let q = &config.querylog;
        assert_eq!(q.dir, PathBuf::from("/var/lib/quell/querylog"));
        assert_eq!(q.interval_hours, 24);
        assert_eq!(q.size_memory, 200);
        assert_eq!(q.ignored.len(), 2);
        assert_eq!(q.max_rotated_files, Some(7));
        assert!(q.enabled);
        assert!(config.log.is_none());
    }

    #[test]
    fn test_parse_empty_uses_defaults() {
        let config = QlogConfig::parse("").unwrap();
        assert_eq!(config, QlogConfig::default());
    }

    #[test]
    fn test_parse_log_table() {
        let config = QlogConfig::parse(
            r#"
            [log]
            default_level = "debug"

            [log.targets]
            quell_querylog = "trace"
            "#,
        )
        .unwrap();

        let log = config.log.unwrap();
        assert_eq!(log.directives(), "debug,quell_querylog=trace");
    }

    #[test]
    fn test_wrong_field_type_is_rejected() {
        assert!(QlogConfig::parse("[querylog]\nsize_memory = \"lots\"").is_err());
    }

    #[test]
    fn test_inspection_settings() {
        let config = QlogConfig::parse(
            "[querylog]\nenabled = true\nfile_enabled = false\nmax_rotated_files = 3",
        )
        .unwrap();

        let settings = config.inspection_settings(Some(Path::new("/tmp/elsewhere")));
        assert!(!settings.enabled);
        assert!(settings.file_enabled);
        assert_eq!(settings.max_rotated_files, None);
        assert_eq!(settings.dir, PathBuf::from("/tmp/elsewhere"));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_search_args() {
        let cli = Cli::parse_from([
            "qlog",
            "search",
            "--term",
            "Example.COM",
            "--strict",
            "--status",
            "blocked",
            "--limit",
            "5",
            "--older-than",
            "2024-05-01T12:00:00Z",
        ]);
        let Command::Search(args) = cli.command else {
            panic!("expected search");
        };

        let params = args.to_params();
        assert_eq!(params.limit, 5);
        assert_eq!(params.offset, 0);
        assert_eq!(params.criteria.len(), 2);
        assert_eq!(params.criteria[0], SearchCriterion::strict("Example.COM"));
        assert_eq!(
            params.criteria[1],
            SearchCriterion::status(FilteringStatus::Blocked)
        );
        assert!(params.older_than.is_some());
        assert!(params.deadline.is_none());
    }

    #[test]
    fn test_strict_requires_term() {
        assert!(Cli::try_parse_from(["qlog", "search", "--strict"]).is_err());
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!(Cli::try_parse_from(["qlog", "search", "--status", "nope"]).is_err());
    }

    #[test]
    fn test_global_args_after_subcommand() {
        let cli = Cli::parse_from(["qlog", "segments", "--dir", "/data/q", "--log-level", "debug"]);
        assert_eq!(cli.dir, Some(PathBuf::from("/data/q")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Segments));
    }
}
