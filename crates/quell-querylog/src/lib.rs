//! # Quell Query Log
//!
//! Hybrid memory and disk query log for the Quell DNS filtering resolver.
//!
//! Every resolved query is recorded without slowing the resolution path:
//! records land in a bounded memory buffer, are flushed in batches to an
//! append-only segment file, and segments are rotated on a schedule. Searches
//! merge memory and disk into one newest-first, filtered, paginated view.
//!
//! ## Features
//!
//! - **IgnoreFilter**: Skips ignored hosts before a record is ever built
//! - **LogEntry**: Immutable record with the exact DNS wire bytes of its answers
//! - **MemoryBuffer**: Bounded buffer of the most recent records
//! - **Segments**: JSON-lines files, rotated by time, searched backwards
//! - **Search**: Term and filtering-status criteria with offset/limit paging
//!
//! ## Example
//!
//! ```rust,ignore
//! use quell_querylog::{QueryLog, QueryLogSettings, SearchCriterion, SearchParams};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = QueryLogSettings::default().validate()?;
//!     let log = QueryLog::open(config).await?;
//!
//!     // From the resolution pipeline
//!     if log.should_log(&host, qtype, qclass) {
//!         log.add(params);
//!     }
//!
//!     // From the admin layer
//!     let page = log
//!         .search(&SearchParams::new().with_criterion(SearchCriterion::contains("example")))
//!         .await?;
//!     println!("{} of {} matches", page.entries.len(), page.matched);
//!
//!     log.close().await?;
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod disk;
pub mod entry;
pub mod error;
pub mod ignore;
pub mod querylog;
pub mod search;
mod task;

// Re-exports
pub use config::{ConfigError, QueryLogConfig, QueryLogSettings};
pub use disk::{SegmentInfo, SegmentStatus};
pub use entry::{AddParams, LogEntry, anonymize_ip};
pub use error::{QueryLogError, QueryLogResult};
pub use ignore::IgnoreFilter;
pub use querylog::QueryLog;
pub use search::{FilteringStatus, SearchCriterion, SearchParams, SearchResult};
