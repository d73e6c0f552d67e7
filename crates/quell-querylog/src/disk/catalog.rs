//! Ordered index of segments
//!
//! The catalog is the shared, lock-protected view of the segment directory:
//! which segments are closed, which one is active and how many of its bytes
//! are committed. Searches plan their scan from it without touching the
//! writer.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::disk::segment::SegmentInfo;

#[derive(Debug, Clone)]
struct ActiveSegment {
    info: SegmentInfo,
    committed: u64,
}

/// One segment a search should read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    pub info: SegmentInfo,
    /// Byte limit for the active segment; closed segments are read whole
    pub limit: Option<u64>,
}

/// Public view of a segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentStatus {
    pub info: SegmentInfo,
    pub active: bool,
    /// Committed bytes, known only for the active segment
    pub committed: Option<u64>,
}

/// Closed segments oldest-first plus the active one
#[derive(Debug, Clone)]
pub struct SegmentCatalog {
    closed: Vec<SegmentInfo>,
    active: Option<ActiveSegment>,
    next_seq: u64,
}

impl SegmentCatalog {
    /// Build a catalog over segments found on disk, all treated as closed
    pub fn new(mut existing: Vec<SegmentInfo>) -> Self {
        existing.sort_by_key(|s| s.seq);
        let next_seq = existing.last().map_or(1, |s| s.seq + 1);
        Self {
            closed: existing,
            active: None,
            next_seq,
        }
    }

    /// Allocate the identity of the next segment
    pub fn allocate(&mut self, dir: &Path, now: DateTime<Utc>) -> SegmentInfo {
        let seq = self.next_seq;
        self.next_seq += 1;
        SegmentInfo::new(dir, seq, now)
    }

    /// Make `info` the active segment with nothing committed
    pub fn activate(&mut self, info: SegmentInfo) {
        debug_assert!(self.active.is_none(), "activating over an active segment");
        self.active = Some(ActiveSegment { info, committed: 0 });
    }

    /// Record the active segment's committed length
    pub fn commit(&mut self, len: u64) {
        if let Some(active) = self.active.as_mut() {
            active.committed = len;
        }
    }

    /// Move the active segment to the closed list
    pub fn close_active(&mut self) -> Option<SegmentInfo> {
        let active = self.active.take()?;
        self.closed.push(active.info.clone());
        Some(active.info)
    }

    /// Drop the oldest closed segments beyond `keep`, returning them
    pub fn prune(&mut self, keep: Option<usize>) -> Vec<SegmentInfo> {
        match keep {
            Some(keep) if self.closed.len() > keep => {
                let excess = self.closed.len() - keep;
                self.closed.drain(..excess).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Forget every segment, returning them for deletion
    pub fn take_all(&mut self) -> Vec<SegmentInfo> {
        let mut all = std::mem::take(&mut self.closed);
        if let Some(active) = self.active.take() {
            all.push(active.info);
        }
        all
    }

    /// Segments to scan, newest first
    pub fn scan_plan(&self) -> Vec<ScanTarget> {
        let active = self.active.iter().map(|a| ScanTarget {
            info: a.info.clone(),
            limit: Some(a.committed),
        });
        let closed = self.closed.iter().rev().map(|info| ScanTarget {
            info: info.clone(),
            limit: None,
        });
        active.chain(closed).collect()
    }

    /// All segments, oldest first
    pub fn statuses(&self) -> Vec<SegmentStatus> {
        let closed = self.closed.iter().map(|info| SegmentStatus {
            info: info.clone(),
            active: false,
            committed: None,
        });
        let active = self.active.iter().map(|a| SegmentStatus {
            info: a.info.clone(),
            active: true,
            committed: Some(a.committed),
        });
        closed.chain(active).collect()
    }

    pub fn has_active(&self) -> bool {
        self.active.is_some()
    }

    /// Number of closed segments
    pub fn closed_len(&self) -> usize {
        self.closed.len()
    }
}
