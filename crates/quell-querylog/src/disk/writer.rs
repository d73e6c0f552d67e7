//! Active segment writer

use std::io::SeekFrom;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::disk::segment::SegmentInfo;
use crate::error::QueryLogResult;

/// Owner of the active segment's file handle
///
/// Writes land as whole batches: a batch that fails half-way is cut off
/// again, so the file only ever holds complete lines.
#[derive(Debug)]
pub struct SegmentWriter {
    info: SegmentInfo,
    file: File,
    len: u64,
    sync_on_write: bool,
}

impl SegmentWriter {
    /// Create the file for a new segment
    pub async fn create(info: SegmentInfo, sync_on_write: bool) -> QueryLogResult<Self> {
        if let Some(parent) = info.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&info.path)
            .await?;

        info!(path = %info.path.display(), seq = info.seq, "Opened query log segment");

        Ok(Self {
            info,
            file,
            len: 0,
            sync_on_write,
        })
    }

    /// Append a batch of encoded lines, returning the new committed length
    pub async fn append(&mut self, batch: &[u8]) -> QueryLogResult<u64> {
        if let Err(e) = self.write_through(batch).await {
            self.rollback().await;
            return Err(e.into());
        }

        self.len += batch.len() as u64;
        debug!(seq = self.info.seq, bytes = batch.len(), len = self.len, "Appended batch");
        Ok(self.len)
    }

    async fn write_through(&mut self, batch: &[u8]) -> std::io::Result<()> {
        self.file.write_all(batch).await?;
        self.file.flush().await?;
        if self.sync_on_write {
            self.file.sync_data().await?;
        }
        Ok(())
    }

    /// Cut the file back to its last committed length
    async fn rollback(&mut self) {
        if let Err(e) = self.file.set_len(self.len).await {
            warn!(path = %self.info.path.display(), error = %e, "Failed to truncate partial batch");
        }
        if let Err(e) = self.file.seek(SeekFrom::Start(self.len)).await {
            warn!(path = %self.info.path.display(), error = %e, "Failed to rewind segment");
        }
    }

    /// Sync and release the file
    pub async fn close(mut self) -> QueryLogResult<SegmentInfo> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        info!(path = %self.info.path.display(), len = self.len, "Closed query log segment");
        Ok(self.info)
    }

    pub fn info(&self) -> &SegmentInfo {
        &self.info
    }

    /// Bytes committed so far
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
