//! # Quell qlog
//!
//! Operator tool for query log directories. It opens a directory read-only
//! (recording off, retention lifted), then searches it or lists its
//! segments. Searches print one stored record per line as JSON, or an
//! aligned text line per record with `--format text`.
//!
//! ```text
//! qlog --config quell.toml search --term example.com --status blocked --limit 20
//! qlog --dir /var/lib/quell/querylog segments
//! qlog --config quell.toml check
//! ```

pub mod commands;
pub mod config;
pub mod output;

pub use config::{Cli, Command, Format, QlogConfig, SearchArgs};
