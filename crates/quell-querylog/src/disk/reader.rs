//! Backward line reader for segment files

use std::io::SeekFrom;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::{QueryLogError, QueryLogResult};

const CHUNK_SIZE: u64 = 64 * 1024;

/// Longest line the reader will assemble
pub const MAX_LINE_LEN: usize = 1024 * 1024;

/// Reads a file's lines from last to first
///
/// Only the first `limit` bytes of the file are considered, which lets a
/// reader ignore whatever a concurrent writer appended after the limit was
/// taken. Lines are returned without their terminator; empty lines are
/// skipped.
#[derive(Debug)]
pub struct ReverseLineReader {
    file: File,
    /// Start of the region already pulled into `tail`
    pos: u64,
    /// Bytes read but not yet returned
    tail: Vec<u8>,
    /// Still inside a line already reported as oversized
    discarding: bool,
}

impl ReverseLineReader {
    /// Open `path`, reading at most its first `limit` bytes
    pub async fn open(path: &Path, limit: Option<u64>) -> QueryLogResult<Self> {
        let file = File::open(path).await?;
        let len = file.metadata().await?.len();
        let pos = limit.map_or(len, |l| l.min(len));

        Ok(Self {
            file,
            pos,
            tail: Vec::new(),
            discarding: false,
        })
    }

    /// Next line walking backwards, or `None` at the start of the file
    ///
    /// A line longer than [`MAX_LINE_LEN`] yields one decode error; the
    /// reader stays usable and resumes with the line before it.
    pub async fn next_line(&mut self) -> QueryLogResult<Option<Vec<u8>>> {
        loop {
            if self.discarding {
                match self.tail.iter().rposition(|&b| b == b'\n') {
                    Some(i) => {
                        self.tail.truncate(i);
                        self.discarding = false;
                    }
                    None => {
                        self.tail.clear();
                        if self.pos == 0 {
                            self.discarding = false;
                            return Ok(None);
                        }
                        self.read_previous_chunk().await?;
                        continue;
                    }
                }
            }

            if let Some(i) = self.tail.iter().rposition(|&b| b == b'\n') {
                let line = self.tail.split_off(i + 1);
                self.tail.truncate(i);
                if line.is_empty() {
                    continue;
                }
                return Ok(Some(line));
            }

            if self.tail.len() > MAX_LINE_LEN {
                let len = self.tail.len();
                self.tail.clear();
                self.discarding = true;
                return Err(QueryLogError::decode(format!(
                    "line exceeds {MAX_LINE_LEN} bytes ({len} read so far)"
                )));
            }

            if self.pos == 0 {
                if self.tail.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(std::mem::take(&mut self.tail)));
            }

            self.read_previous_chunk().await?;
        }
    }

    async fn read_previous_chunk(&mut self) -> QueryLogResult<()> {
        let chunk = CHUNK_SIZE.min(self.pos);
        let start = self.pos - chunk;

        self.file.seek(SeekFrom::Start(start)).await?;
        let mut buf = vec![0u8; chunk as usize + self.tail.len()];
        self.file.read_exact(&mut buf[..chunk as usize]).await?;
        buf[chunk as usize..].copy_from_slice(&self.tail);

        self.tail = buf;
        self.pos = start;
        Ok(())
    }
}
