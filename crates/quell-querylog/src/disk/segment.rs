//! Segment naming and discovery

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, warn};

use crate::error::QueryLogResult;

/// File name prefix shared by all segments
pub const SEGMENT_PREFIX: &str = "querylog-";

/// File name suffix shared by all segments
pub const SEGMENT_SUFFIX: &str = ".jsonl";

const TIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Identity of one segment file
///
/// The sequence number orders segments by creation; the timestamp in the
/// name is informational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Creation order, starting at 1
    pub seq: u64,
    /// Creation time, to the second
    pub created: DateTime<Utc>,
    /// Full path of the file
    pub path: PathBuf,
}

impl SegmentInfo {
    /// Describe a new segment in `dir`
    pub fn new(dir: &Path, seq: u64, created: DateTime<Utc>) -> Self {
        let created = DateTime::from_timestamp(created.timestamp(), 0).unwrap_or(created);
        let path = dir.join(Self::file_name(seq, created));
        Self { seq, created, path }
    }

    /// File name for a segment
    pub fn file_name(seq: u64, created: DateTime<Utc>) -> String {
        format!(
            "{SEGMENT_PREFIX}{seq:08}-{}{SEGMENT_SUFFIX}",
            created.format(TIME_FORMAT)
        )
    }

    /// Recover a segment's identity from its path
    pub fn parse(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let stem = name.strip_prefix(SEGMENT_PREFIX)?.strip_suffix(SEGMENT_SUFFIX)?;
        let (seq, stamp) = stem.split_once('-')?;

        let seq = seq.parse().ok()?;
        let created = NaiveDateTime::parse_from_str(stamp, TIME_FORMAT).ok()?.and_utc();

        Some(Self {
            seq,
            created,
            path: path.to_path_buf(),
        })
    }
}

/// List the segments in `dir`, oldest first
///
/// A missing directory holds no segments. Files that look like segments but
/// do not parse are skipped with a warning.
pub async fn discover(dir: &Path) -> QueryLogResult<Vec<SegmentInfo>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut segments = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(SEGMENT_PREFIX) {
            continue;
        }

        match SegmentInfo::parse(&path) {
            Some(info) => segments.push(info),
            None => warn!(path = %path.display(), "Ignoring unrecognized segment file"),
        }
    }

    segments.sort_by_key(|s| s.seq);
    debug!(dir = %dir.display(), count = segments.len(), "Discovered segments");
    Ok(segments)
}
