//! Search over the memory buffer and the segment files
//!
//! A search walks one newest-first stream: the memory snapshot, then the
//! active segment's committed prefix, then closed segments from newest to
//! oldest. Each file is read backwards, so the stream never needs sorting.
//! Every record is offered to a [`Collector`] which applies the criteria,
//! counts matches and keeps only the requested page.

mod criterion;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::disk::{ReverseLineReader, ScanTarget};
use crate::entry::LogEntry;

pub use criterion::{FilteringStatus, SearchCriterion, UnknownStatus};

/// Default page size
pub const DEFAULT_LIMIT: usize = 500;

/// Default cap on records inspected per segment file
pub const DEFAULT_MAX_FILE_SCAN_ENTRIES: usize = 50_000;

/// What to look for and which page of it to return
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    /// Conditions a record must all satisfy
    pub criteria: Vec<SearchCriterion>,
    /// Matches to skip before the page starts
    pub offset: usize,
    /// Largest number of records to return
    pub limit: usize,
    /// Records inspected per segment file before moving on; 0 means no cap
    pub max_file_scan_entries: usize,
    /// Only consider records strictly older than this
    pub older_than: Option<DateTime<Utc>>,
    /// Give up scanning once this instant passes
    pub deadline: Option<Instant>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            criteria: Vec::new(),
            offset: 0,
            limit: DEFAULT_LIMIT,
            max_file_scan_entries: DEFAULT_MAX_FILE_SCAN_ENTRIES,
            older_than: None,
            deadline: None,
        }
    }
}

impl SearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_criterion(mut self, criterion: SearchCriterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_max_file_scan_entries(mut self, cap: usize) -> Self {
        self.max_file_scan_entries = cap;
        self
    }

    pub fn with_older_than(mut self, time: DateTime<Utc>) -> Self {
        self.older_than = Some(time);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// One page of matching records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResult {
    /// The page, newest first
    pub entries: Vec<LogEntry>,
    /// Records that matched before pagination
    pub matched: usize,
    /// Time of the oldest returned record, usable as the next `older_than`
    pub oldest: Option<DateTime<Utc>>,
    /// Persisted records that could not be decoded
    pub skipped: usize,
    /// The deadline passed before the scan finished
    pub truncated: bool,
}

/// Applies criteria and pagination to a newest-first stream
struct Collector<'a> {
    params: &'a SearchParams,
    page: Vec<LogEntry>,
    matched: usize,
    skipped: usize,
    truncated: bool,
}

impl<'a> Collector<'a> {
    fn new(params: &'a SearchParams) -> Self {
        Self {
            params,
            page: Vec::with_capacity(params.limit.min(DEFAULT_LIMIT)),
            matched: 0,
            skipped: 0,
            truncated: false,
        }
    }

    fn offer(&mut self, entry: &LogEntry) {
        if self.params.older_than.is_some_and(|t| entry.time >= t) {
            return;
        }
        if !self.params.criteria.iter().all(|c| c.matches(entry)) {
            return;
        }

        let index = self.matched;
        self.matched += 1;
        if index >= self.params.offset && index - self.params.offset < self.params.limit {
            self.page.push(entry.clone());
        }
    }

    fn out_of_time(&mut self) -> bool {
        if !self.truncated
            && let Some(deadline) = self.params.deadline
            && Instant::now() >= deadline
        {
            self.truncated = true;
        }
        self.truncated
    }

    fn finish(self) -> SearchResult {
        SearchResult {
            oldest: self.page.last().map(|e| e.time),
            entries: self.page,
            matched: self.matched,
            skipped: self.skipped,
            truncated: self.truncated,
        }
    }
}

/// Run a search over a memory snapshot and a scan plan, both newest first
pub(crate) async fn run(
    memory: &[Arc<LogEntry>],
    plan: &[ScanTarget],
    params: &SearchParams,
) -> SearchResult {
    let mut collector = Collector::new(params);

    for entry in memory {
        collector.offer(entry);
    }

    for target in plan {
        if collector.out_of_time() {
            break;
        }
        scan_segment(target, &mut collector).await;
    }

    collector.finish()
}

async fn scan_segment(target: &ScanTarget, collector: &mut Collector<'_>) {
    let path = &target.info.path;
    let mut reader = match ReverseLineReader::open(path, target.limit).await {
        Ok(reader) => reader,
        Err(e) => {
            // Pruned or cleared after the plan was taken
            warn!(path = %path.display(), error = %e, "Skipping unreadable segment");
            return;
        }
    };

    let cap = collector.params.max_file_scan_entries;
    let mut inspected = 0usize;

    while cap == 0 || inspected < cap {
        if collector.out_of_time() {
            return;
        }

        match reader.next_line().await {
            Ok(Some(line)) => {
                inspected += 1;
                match LogEntry::decode_line(&line) {
                    Ok(entry) => collector.offer(&entry),
                    Err(e) => {
                        collector.skipped += 1;
                        debug!(path = %path.display(), error = %e, "Skipping corrupt record");
                    }
                }
            }
            Ok(None) => break,
            Err(e) if e.is_recoverable() => {
                inspected += 1;
                collector.skipped += 1;
                debug!(path = %path.display(), error = %e, "Skipping unreadable record");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Aborting segment scan");
                break;
            }
        }
    }

    debug!(path = %path.display(), inspected, "Scanned segment");
}
