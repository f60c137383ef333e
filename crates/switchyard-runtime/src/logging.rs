//! Subscriber installation for Switchyard.
//!
//! The library crates only emit `tracing` events. Their targets are the crate
//! names, so per-layer verbosity is a directive away:
//!
//! | target                | what it logs                                       |
//! |-----------------------|----------------------------------------------------|
//! | `switchyard_core`     | mapping registration and duplicate patterns        |
//! | `switchyard_dispatch` | the `dispatch` span, chain steps, lifecycle passes |
//! | `switchyard_runtime`  | startup, shutdown and request failures             |
//!
//! Setting `trace_dispatch = true` under `[logging]` turns on debug output for
//! `switchyard_dispatch` and logs each `dispatch` span when it closes, so every
//! request gets one line with its path and timing.
//!
//! ```rust,ignore
//! use switchyard_runtime::logging::LoggingBuilder;
//!
//! LoggingBuilder::new()
//!     .trace_dispatch()
//!     .directive("switchyard_core=warn")
//!     .try_init()?;
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LogOutput, LoggingConfig, SpanEventConfig};

/// Target of the dispatch span and chain events.
pub const DISPATCH_TARGET: &str = "switchyard_dispatch";

const DEFAULT_LOG_FILE: &str = "switchyard.log";

/// Installs a global subscriber described by `config`.
///
/// Returns `false` if a subscriber was already installed, which is not an
/// error: tests and embedding applications often install their own.
pub fn init_from_config(config: &LoggingConfig) -> bool {
    LoggingBuilder::from_config(config).try_init().is_ok()
}

/// Converts configured span events into the `fmt` layer's flags.
pub fn span_events(config: &SpanEventConfig) -> FmtSpan {
    [
        (config.new, FmtSpan::NEW),
        (config.enter, FmtSpan::ENTER),
        (config.exit, FmtSpan::EXIT),
        (config.close, FmtSpan::CLOSE),
    ]
    .into_iter()
    .filter(|(enabled, _)| *enabled)
    .fold(FmtSpan::NONE, |acc, (_, flag)| acc | flag)
}

/// Builds and installs the `fmt` subscriber.
#[derive(Debug)]
pub struct LoggingBuilder {
    level: Level,
    directives: Vec<String>,
    span_events: FmtSpan,
    format: LogFormat,
    output: LogOutput,
    file_path: Option<PathBuf>,
    thread_ids: bool,
    file_location: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            directives: Vec::new(),
            span_events: FmtSpan::NONE,
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            thread_ids: false,
            file_location: false,
        }
    }
}

impl LoggingBuilder {
    /// Compact output on stdout at `info`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirrors a `[logging]` section.
    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut builder = Self {
            level: config.level.to_tracing_level(),
            span_events: span_events(&config.span_events),
            format: config.format,
            output: config.output,
            file_path: config.file_path.clone(),
            thread_ids: config.thread_ids,
            file_location: config.file_location,
            ..Self::default()
        };

        if config.trace_dispatch {
            builder = builder.trace_dispatch();
        }

        let mut targets: Vec<_> = config.filters.iter().collect();
        targets.sort_by(|a, b| a.0.cmp(b.0));
        for (target, level) in targets {
            builder.directives.push(format!("{target}={level}"));
        }

        builder
    }

    /// Base level for targets without a directive.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Adds an `EnvFilter` directive such as `switchyard_core=warn`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Logs dispatcher events at `debug` and one line per closed `dispatch` span.
    pub fn trace_dispatch(mut self) -> Self {
        self.directives.push(format!("{DISPATCH_TARGET}=debug"));
        self.span_events |= FmtSpan::CLOSE;
        self
    }

    /// Replaces the span events that are logged.
    pub fn span_events(mut self, events: FmtSpan) -> Self {
        self.span_events = events;
        self
    }

    /// Sets the line layout.
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Writes to `path` instead of stdout.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = LogOutput::File;
        self.file_path = Some(path.into());
        self
    }

    fn build_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.to_string().to_lowercase()));

        for directive in &self.directives {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }

        filter
    }

    fn make_writer(&self) -> BoxMakeWriter {
        match self.output {
            LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
            LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
            LogOutput::File => {
                let path = self
                    .file_path
                    .as_deref()
                    .unwrap_or_else(|| Path::new(DEFAULT_LOG_FILE));
                let dir = path
                    .parent()
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                let name = path
                    .file_name()
                    .unwrap_or_else(|| OsStr::new(DEFAULT_LOG_FILE));
                BoxMakeWriter::new(tracing_appender::rolling::never(dir, name))
            }
        }
    }

    /// Installs the subscriber, failing if one is already set.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.build_filter();
        let layer = fmt::layer()
            .with_writer(self.make_writer())
            .with_span_events(self.span_events.clone())
            .with_thread_ids(self.thread_ids)
            .with_file(self.file_location)
            .with_line_number(self.file_location);

        let layer = match self.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Full => layer.boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
        };

        tracing_subscriber::registry()
            .with(layer)
            .with(filter)
            .try_init()
    }
}
