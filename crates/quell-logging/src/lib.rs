//! Structured JSONL logging for the Quell DNS filtering resolver
//!
//! Every Quell crate logs through `tracing` macros with structured fields.
//! This crate installs the process-wide subscriber that turns those events
//! into output.
//!
//! # Features
//!
//! - **JSONL Output**: One JSON object per event, for log aggregation (default)
//! - **Pretty Output**: Human-readable console output for development
//! - **File Output**: Daily, hourly or single-file output via tracing-appender
//! - **Filtering**: `RUST_LOG` or configured per-target levels
//!
//! # Quick Start
//!
//! ```ignore
//! use quell_logging::{LogConfig, QuellSubscriberBuilder};
//!
//! // JSONL to console
//! let _guard = QuellSubscriberBuilder::new().init()?;
//!
//! // Pretty console output while developing
//! let _guard = QuellSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init()?;
//! ```
//!
//! Keep the returned guard alive for as long as file output should be
//! written; dropping it flushes and stops the background writer.

pub mod config;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};

use std::io;

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The log directory could not be created
    #[error("Log directory error: {0}")]
    Io(#[from] io::Error),

    /// The rolling file appender could not be created
    #[error("Log file error: {0}")]
    Appender(String),

    /// A filter directive did not parse
    #[error("Invalid log filter: {0}")]
    Filter(String),

    /// Another global subscriber is already installed
    #[error("Global subscriber already set: {0}")]
    AlreadySet(String),
}

/// Builder for configuring and initializing the Quell logging subscriber
///
/// By default, console output uses JSONL format. Use
/// [`LogConfig::development()`] for human-readable output.
pub struct QuellSubscriberBuilder {
    config: LogConfig,
}

impl QuellSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Set the level for one target
    pub fn with_target(mut self, target: impl Into<String>, level: impl Into<String>) -> Self {
        self.config.targets.insert(target.into(), level.into());
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Send console output to stderr, keeping stdout for program output
    pub fn with_stderr(mut self, stderr: bool) -> Self {
        self.config.console.stderr = stderr;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Install the subscriber as the global default
    ///
    /// Returns the file writer's guard when file output is configured.
    pub fn init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let filter = self.filter()?;

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            layers.push(self.console_layer());
        }

        if let Some(file) = &self.config.file {
            let (writer, file_guard) = file_writer(file)?;
            layers.push(jsonl_layer(&self.config.jsonl, writer));
            guard = Some(file_guard);
        }

        tracing_subscriber::registry()
            .with(layers)
            .with(filter)
            .try_init()
            .map_err(|e| LoggingError::AlreadySet(e.to_string()))?;

        Ok(guard)
    }

    /// `RUST_LOG` if set, the configured directives otherwise
    fn filter(&self) -> Result<EnvFilter, LoggingError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(self.config.directives())
                .map_err(|e| LoggingError::Filter(e.to_string())),
        }
    }

    fn console_layer(&self) -> BoxedLayer {
        let console = &self.config.console;
        match (console.pretty, console.stderr) {
            (true, false) => tracing_subscriber::fmt::layer()
                .with_ansi(console.ansi)
                .with_target(true)
                .boxed(),
            (true, true) => tracing_subscriber::fmt::layer()
                .with_ansi(console.ansi)
                .with_target(true)
                .with_writer(io::stderr)
                .boxed(),
            (false, false) => jsonl_layer(&self.config.jsonl, io::stdout),
            (false, true) => jsonl_layer(&self.config.jsonl, io::stderr),
        }
    }
}

impl Default for QuellSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn jsonl_layer<W>(jsonl: &JsonlConfig, writer: W) -> BoxedLayer
where
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(jsonl.include_spans)
        .flatten_event(jsonl.flatten_events)
        .with_file(jsonl.include_location)
        .with_line_number(jsonl.include_location)
        .with_writer(writer)
        .boxed()
}

fn file_writer(file: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    std::fs::create_dir_all(&file.directory)?;

    let rotation = match file.rotation {
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
        RotationStrategy::Never => Rotation::NEVER,
    };
    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&file.prefix)
        .filename_suffix("log")
        .build(&file.directory)
        .map_err(|e| LoggingError::Appender(e.to_string()))?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging with default settings (JSONL to console)
pub fn init_default() -> Result<(), LoggingError> {
    QuellSubscriberBuilder::new().init().map(|_| ())
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() -> Result<(), LoggingError> {
    QuellSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
        .map(|_| ())
}

/// Initialize logging for tests; a no-op if a subscriber is already set
pub fn init_testing() {
    let _ = QuellSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .init();
}
