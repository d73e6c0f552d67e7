//! Printing search results and segment listings

use std::io::Write;

use quell_querylog::{LogEntry, SearchResult, SegmentStatus};

use crate::config::Format;

/// Print `entries` in `format`, one line each
pub fn write_entries<W: Write>(out: &mut W, entries: &[LogEntry], format: Format) -> anyhow::Result<()> {
    for entry in entries {
        match format {
            Format::Jsonl => {
                serde_json::to_writer(&mut *out, entry)?;
                out.write_all(b"\n")?;
            }
            Format::Text => writeln!(out, "{}", text_line(entry))?,
        }
    }
    Ok(())
}

fn text_line(entry: &LogEntry) -> String {
    let mut line = format!(
        "{}  {:<15} {:<5} {:<6} {} {}",
        entry.time.format("%Y-%m-%d %H:%M:%S%.3f"),
        entry.client_ip,
        entry.client_proto,
        entry.qtype,
        entry.qhost,
        entry.result.reason,
    );
    if entry.cached {
        line.push_str(" (cached)");
    }
    line
}

/// One line of totals for a finished search
pub fn write_summary<W: Write>(out: &mut W, result: &SearchResult) -> anyhow::Result<()> {
    write!(
        out,
        "returned={} matched={} skipped={}",
        result.entries.len(),
        result.matched,
        result.skipped
    )?;
    if let Some(oldest) = result.oldest {
        write!(out, " oldest={}", oldest.to_rfc3339())?;
    }
    if result.truncated {
        write!(out, " truncated")?;
    }
    writeln!(out)?;
    Ok(())
}

/// One line per segment, with its size on disk when known
pub fn write_segment<W: Write>(out: &mut W, status: &SegmentStatus, size: Option<u64>) -> anyhow::Result<()> {
    let size = size.map_or_else(|| "-".to_string(), |s| s.to_string());
    writeln!(
        out,
        "{:>8}  {}  {:>10}  {:<6}  {}",
        status.info.seq,
        status.info.created.format("%Y-%m-%dT%H:%M:%SZ"),
        size,
        if status.active { "active" } else { "closed" },
        status.info.path.display(),
    )?;
    Ok(())
}
