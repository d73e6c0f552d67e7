//! The query log engine
//!
//! [`QueryLog`] owns the memory buffer, the segment catalog, the active
//! segment writer and the background maintenance task. It is constructed
//! explicitly with [`QueryLog::open`] and handed to whoever needs it; there
//! is no global instance.
//!
//! ## Locking
//!
//! - `state` (a `parking_lot` mutex) guards the buffer and the catalog. It is
//!   held only for in-memory work, never across an await.
//! - `writer` (a `tokio` mutex) owns the active segment file and serializes
//!   flush, rotate, clear and close.
//!
//! A flush copies the pending batch out under `state`, writes it holding
//! only `writer`, then commits under `state` again: the flushed records leave
//! the buffer in the same step that extends the active segment's committed
//! length. A search therefore sees every record exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::Utc;
use hickory_proto::rr::{DNSClass, RecordType};
use parking_lot::Mutex;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::buffer::MemoryBuffer;
use crate::config::QueryLogConfig;
use crate::disk::{SegmentCatalog, SegmentInfo, SegmentStatus, SegmentWriter, discover};
use crate::entry::{AddParams, LogEntry};
use crate::error::{QueryLogError, QueryLogResult};
use crate::search::{self, SearchParams, SearchResult};
use crate::task::MaintenanceTask;

struct State {
    buffer: MemoryBuffer,
    catalog: SegmentCatalog,
    /// Set by `close` before its final flush; `add` checks it under this lock
    closed: bool,
}

/// Shared between the engine handle and its maintenance task
pub(crate) struct Inner {
    config: QueryLogConfig,
    state: Mutex<State>,
    writer: tokio::sync::Mutex<Option<SegmentWriter>>,
    flush_wanted: Notify,
    encode_failures: AtomicU64,
    failed_flushes: AtomicU64,
}

impl Inner {
    pub(crate) fn config(&self) -> &QueryLogConfig {
        &self.config
    }

    /// Resolves once `add` asks for a flush
    pub(crate) async fn flush_requested(&self) {
        self.flush_wanted.notified().await;
    }

    /// Write buffered records to the active segment
    ///
    /// Without `force` nothing happens unless the buffer reached capacity.
    /// Returns the number of records written.
    #[instrument(level = "debug", skip(self))]
    pub(crate) async fn flush(&self, force: bool) -> QueryLogResult<usize> {
        if !self.config.file_enabled {
            return Ok(0);
        }
        let mut writer = self.writer.lock().await;
        self.flush_locked(&mut writer, force).await
    }

    async fn flush_locked(
        &self,
        writer: &mut Option<SegmentWriter>,
        force: bool,
    ) -> QueryLogResult<usize> {
        let batch = {
            let mut state = self.state.lock();
            if !force && !state.buffer.flush_pending() {
                return Ok(0);
            }
            state.buffer.pending()
        };
        if batch.entries.is_empty() {
            return Ok(0);
        }

        let mut bytes = Vec::with_capacity(batch.entries.len() * 256);
        for entry in &batch.entries {
            match entry.encode_line() {
                Ok(line) => bytes.extend_from_slice(&line),
                Err(e) => {
                    self.encode_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(host = %entry.qhost, error = %e, "Dropping unencodable record");
                }
            }
        }
        if bytes.is_empty() {
            self.state.lock().buffer.commit();
            return Ok(0);
        }

        let len = match self.write_batch(writer, &bytes).await {
            Ok(len) => len,
            Err(e) => {
                self.state.lock().buffer.abort();
                self.failed_flushes.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        {
            let mut state = self.state.lock();
            state.buffer.commit();
            state.catalog.commit(len);
        }

        debug!(records = batch.entries.len(), len, "Flushed query log buffer");
        Ok(batch.entries.len())
    }

    async fn write_batch(
        &self,
        writer: &mut Option<SegmentWriter>,
        bytes: &[u8],
    ) -> QueryLogResult<u64> {
        if writer.is_none() {
            *writer = Some(self.open_segment().await?);
        }
        let Some(active) = writer.as_mut() else {
            return Err(QueryLogError::io("no active segment"));
        };
        active.append(bytes).await
    }

    async fn open_segment(&self) -> QueryLogResult<SegmentWriter> {
        let info = self
            .state
            .lock()
            .catalog
            .allocate(&self.config.base_dir, Utc::now());
        let writer = SegmentWriter::create(info.clone(), false).await?;
        self.state.lock().catalog.activate(info);
        Ok(writer)
    }

    /// Flush, then close the active segment and apply retention
    ///
    /// The next segment is created by the next flush that has records to
    /// write. If the flush fails the active segment stays open.
    #[instrument(level = "debug", skip(self))]
    pub(crate) async fn rotate(&self) -> QueryLogResult<()> {
        if !self.config.file_enabled {
            return Ok(());
        }
        let mut writer = self.writer.lock().await;
        self.flush_locked(&mut writer, true).await?;

        let Some(active) = writer.take() else {
            debug!("Nothing written since last rotation");
            return Ok(());
        };
        let seq = active.info().seq;
        let closed = active.close().await;

        let pruned = {
            let mut state = self.state.lock();
            state.catalog.close_active();
            state.catalog.prune(self.config.max_rotated_files)
        };
        remove_segments(&pruned).await;

        info!(seq, pruned = pruned.len(), "Rotated query log segment");
        closed.map(|_| ())
    }
}

/// Hybrid memory and disk query log
pub struct QueryLog {
    inner: Arc<Inner>,
    closed: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for QueryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryLog")
            .field("config", &self.inner.config)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl QueryLog {
    /// Open the query log described by `config`
    ///
    /// Existing segments in the base directory are picked up as closed
    /// segments and stay searchable; new records always go to a new segment.
    #[instrument(skip(config), fields(dir = %config.base_dir().display()))]
    pub async fn open(config: QueryLogConfig) -> QueryLogResult<Self> {
        let existing = if config.file_enabled {
            discover(&config.base_dir).await?
        } else {
            Vec::new()
        };
        let found = existing.len();

        let mut catalog = SegmentCatalog::new(existing);
        let pruned = catalog.prune(config.max_rotated_files);
        remove_segments(&pruned).await;

        let spawn_task = config.enabled && config.file_enabled;
        let rotation_interval = config.rotation_interval;

        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                buffer: MemoryBuffer::new(config.mem_size, config.file_enabled),
                catalog,
                closed: false,
            }),
            writer: tokio::sync::Mutex::new(None),
            flush_wanted: Notify::new(),
            encode_failures: AtomicU64::new(0),
            failed_flushes: AtomicU64::new(0),
            config,
        });

        let (shutdown_tx, _) = broadcast::channel(1);
        let task = spawn_task.then(|| {
            MaintenanceTask::spawn(inner.clone(), rotation_interval, shutdown_tx.subscribe())
        });

        info!(
            segments = found,
            pruned = pruned.len(),
            file_enabled = inner.config.file_enabled,
            "Query log opened"
        );

        Ok(Self {
            inner,
            closed: AtomicBool::new(false),
            shutdown_tx,
            task: Mutex::new(task),
        })
    }

    /// Whether a query for `host` should be recorded
    pub fn should_log(&self, host: &str, qtype: RecordType, qclass: DNSClass) -> bool {
        self.inner.config.ignored.should_log(host, qtype, qclass)
    }

    /// Record a resolved query
    ///
    /// Never fails and never waits on disk. Records are dropped while the
    /// log is disabled or closed, or if they cannot be encoded.
    pub fn add(&self, params: AddParams) {
        if !self.inner.config.enabled || self.closed.load(Ordering::Acquire) {
            return;
        }

        let entry = match LogEntry::from_params(params, self.inner.config.anonymize_client_ip) {
            Ok(entry) => entry,
            Err(e) => {
                self.inner.encode_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Dropping query log record");
                return;
            }
        };

        let outcome = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.buffer.append(Arc::new(entry))
        };
        if outcome.evicted > 0 && self.inner.config.file_enabled {
            debug!(evicted = outcome.evicted, "Buffer overflowed while flush pending");
        }
        if outcome.flush_wanted {
            self.inner.flush_wanted.notify_one();
        }
    }

    /// Write buffered records to the active segment
    ///
    /// `force` writes whatever is buffered; otherwise records are written only
    /// once the buffer has reached capacity. A no-op without file
    /// persistence. Returns the number of records written.
    pub async fn flush(&self, force: bool) -> QueryLogResult<usize> {
        self.ensure_open()?;
        self.inner.flush(force).await
    }

    /// Close the active segment so the next flush starts a new one
    pub async fn rotate(&self) -> QueryLogResult<()> {
        self.ensure_open()?;
        self.inner.rotate().await
    }

    /// Find records matching `params`, newest first
    pub async fn search(&self, params: &SearchParams) -> QueryLogResult<SearchResult> {
        self.ensure_open()?;

        let (memory, plan) = {
            let state = self.inner.state.lock();
            let plan = if self.inner.config.file_enabled {
                state.catalog.scan_plan()
            } else {
                Vec::new()
            };
            (state.buffer.snapshot(), plan)
        };

        let result = search::run(&memory, &plan, params).await;
        debug!(
            matched = result.matched,
            returned = result.entries.len(),
            skipped = result.skipped,
            truncated = result.truncated,
            "Search finished"
        );
        Ok(result)
    }

    /// Drop every buffered record and delete every segment
    #[instrument(skip(self))]
    pub async fn clear(&self) -> QueryLogResult<()> {
        self.ensure_open()?;

        let mut writer = self.inner.writer.lock().await;
        writer.take();

        let removed = {
            let mut state = self.inner.state.lock();
            state.buffer.clear();
            state.catalog.take_all()
        };

        let mut first_error = None;
        for info in &removed {
            if let Err(e) = remove_segment(info).await {
                first_error.get_or_insert(e);
            }
        }

        info!(segments = removed.len(), "Query log cleared");
        first_error.map_or(Ok(()), Err)
    }

    /// Stop maintenance, flush what is buffered and release the active file
    ///
    /// File handles are released even when the final flush fails; the
    /// failure is still returned. Closing twice is a no-op.
    #[instrument(skip(self))]
    pub async fn close(&self) -> QueryLogResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        // Adds still in flight give up under the state lock from here on
        self.inner.state.lock().closed = true;

        let _ = self.shutdown_tx.send(());
        let task = self.task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            warn!(error = %e, "Maintenance task ended abnormally");
        }

        let mut writer = self.inner.writer.lock().await;
        let flushed = if self.inner.config.file_enabled {
            self.inner.flush_locked(&mut writer, true).await.map(|_| ())
        } else {
            Ok(())
        };
        let released = match writer.take() {
            Some(active) => active.close().await.map(|_| ()),
            None => Ok(()),
        };
        self.inner.state.lock().catalog.close_active();

        if let Err(e) = &flushed {
            warn!(
                error = %e,
                lost = self.buffered(),
                "Final flush failed, buffered records were not persisted"
            );
        }

        info!("Query log closed");
        flushed.and(released)
    }

    /// Segments on disk, oldest first
    pub fn segments(&self) -> Vec<SegmentStatus> {
        self.inner.state.lock().catalog.statuses()
    }

    /// Records currently held in memory
    pub fn buffered(&self) -> usize {
        self.inner.state.lock().buffer.len()
    }

    /// Records dropped without being persisted
    pub fn dropped(&self) -> u64 {
        let evicted = if self.inner.config.file_enabled {
            self.inner.state.lock().buffer.dropped()
        } else {
            0
        };
        evicted + self.inner.encode_failures.load(Ordering::Relaxed)
    }

    /// Flushes that failed to write, including retries
    pub fn failed_flushes(&self) -> u64 {
        self.inner.failed_flushes.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &QueryLogConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> QueryLogResult<()> {
        if self.is_closed() {
            return Err(QueryLogError::Closed);
        }
        Ok(())
    }
}

impl Drop for QueryLog {
    fn drop(&mut self) {
        if !self.is_closed() {
            let _ = self.shutdown_tx.send(());
            warn!("Query log dropped without close, buffered records are lost");
        }
    }
}

async fn remove_segments(segments: &[SegmentInfo]) {
    for info in segments {
        if let Err(e) = remove_segment(info).await {
            warn!(path = %info.path.display(), error = %e, "Failed to delete segment");
        }
    }
}

async fn remove_segment(info: &SegmentInfo) -> QueryLogResult<()> {
    match tokio::fs::remove_file(&info.path).await {
        Ok(()) => {
            debug!(path = %info.path.display(), "Deleted segment");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
