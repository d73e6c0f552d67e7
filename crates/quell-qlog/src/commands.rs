//! Subcommand implementations
//!
//! Each command writes its output to the writer it is given so the binary
//! can print to stdout and tests can capture it.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, bail};
use quell_querylog::{QueryLog, SearchResult};
use tracing::{debug, warn};

use crate::config::{QlogConfig, SearchArgs};
use crate::output;

/// Open the log directory named by `config` (or `dir`) for inspection
pub async fn open(config: &QlogConfig, dir: Option<&Path>) -> anyhow::Result<QueryLog> {
    let settings = config.inspection_settings(dir);
    if !settings.dir.is_dir() {
        bail!("No query log directory at {}", settings.dir.display());
    }

    let config = settings.validate().context("Invalid [querylog] settings")?;
    let log = QueryLog::open(config)
        .await
        .with_context(|| format!("Failed to open query log in {}", settings.dir.display()))?;
    debug!(segments = log.segments().len(), "Opened query log for inspection");
    Ok(log)
}

/// Run a search and print the page
pub async fn search<W: Write>(
    log: &QueryLog,
    args: &SearchArgs,
    out: &mut W,
) -> anyhow::Result<SearchResult> {
    let result = log.search(&args.to_params()).await.context("Search failed")?;
    if result.skipped > 0 {
        warn!(skipped = result.skipped, "Some records could not be decoded");
    }
    output::write_entries(out, &result.entries, args.format)?;
    Ok(result)
}

/// List segments oldest first; returns how many were listed
pub async fn segments<W: Write>(log: &QueryLog, out: &mut W) -> anyhow::Result<usize> {
    let segments = log.segments();
    for status in &segments {
        let size = match tokio::fs::metadata(&status.info.path).await {
            Ok(meta) => Some(meta.len()),
            Err(e) => {
                warn!(path = %status.info.path.display(), error = %e, "Cannot stat segment");
                None
            }
        };
        output::write_segment(out, status, size)?;
    }
    Ok(segments.len())
}

/// Validate the configuration and print it with defaults filled in
pub fn check<W: Write>(config: &QlogConfig, dir: Option<&Path>, out: &mut W) -> anyhow::Result<()> {
    let mut config = config.clone();
    if let Some(dir) = dir {
        config.querylog.dir = dir.to_path_buf();
    }
    config
        .querylog
        .validate()
        .context("Invalid [querylog] settings")?;

    let text = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    out.write_all(text.as_bytes())?;
    Ok(())
}
