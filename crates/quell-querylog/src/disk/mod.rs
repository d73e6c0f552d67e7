//! Segment file storage
//!
//! The disk side of the query log is a directory of segment files, one per
//! rotation period. The newest segment is the active one and only ever grows
//! by whole lines; every other segment is closed and never written again.
//!
//! ## Storage Format
//!
//! Each segment holds newline-terminated JSON entries:
//! ```text
//! querylog-00000001-20240102T030405Z.jsonl
//!   {"t":"...","ip":"...","qh":"...",...}\n
//!   {"t":"...","ip":"...","qh":"...",...}\n
//! ```
//!
//! Readers scan segments backwards from a byte limit, so the active segment
//! can be searched while it is appended to: only its committed prefix is read.

mod catalog;
mod reader;
mod segment;
mod writer;

pub use catalog::{ScanTarget, SegmentCatalog, SegmentStatus};
pub use reader::{MAX_LINE_LEN, ReverseLineReader};
pub use segment::{SEGMENT_PREFIX, SEGMENT_SUFFIX, SegmentInfo, discover};
pub use writer::SegmentWriter;
