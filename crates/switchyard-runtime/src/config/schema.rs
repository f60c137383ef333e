//! Configuration schema definitions.
//!
//! A complete `switchyard.toml`:
//!
//! ```toml
//! default_handler = "static"
//!
//! [logging]
//! level = "debug"
//! format = "pretty"
//! trace_dispatch = true
//!
//! [logging.filters]
//! switchyard_dispatch = "trace"
//!
//! [dispatch]
//! warm_up = true
//! fail_on_unknown_filter = true
//!
//! [[mappings]]
//! pattern = "/api/*"
//! handler = "api"
//!
//! [[mappings]]
//! pattern = "*.jsp"
//! handler = "pages"
//!
//! [[filter_mappings]]
//! filter = "auth"
//! url_patterns = ["/api/*"]
//! handler_names = ["admin"]
//!
//! [handlers.api]
//! load_on_startup = 1
//! init_params = { pool_size = "8" }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use switchyard_core::MappingRecord;
use switchyard_dispatch::FilterAssociation;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchyardConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Dispatcher behavior.
    #[serde(default)]
    pub dispatch: DispatchSettings,

    /// URL pattern to handler mappings, in declaration order.
    #[serde(default)]
    pub mappings: Vec<MappingRecord>,

    /// Handler used when no mapping matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_handler: Option<String>,

    /// Filter associations, in declaration order.
    #[serde(default)]
    pub filter_mappings: Vec<FilterMappingConfig>,

    /// Per-handler overrides, keyed by handler name.
    #[serde(default)]
    pub handlers: HashMap<String, HandlerSettings>,

    /// Per-filter overrides, keyed by filter name.
    #[serde(default)]
    pub filters: HashMap<String, FilterSettings>,
}

/// A `[[filter_mappings]]` entry.
pub type FilterMappingConfig = FilterAssociation;

// =============================================================================
// Dispatch
// =============================================================================

/// Dispatcher behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Construct filters and startup handlers before serving.
    #[serde(default = "default_warm_up")]
    pub warm_up: bool,

    /// Refuse to start when a filter mapping names an unregistered filter.
    #[serde(default)]
    pub fail_on_unknown_filter: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            warm_up: default_warm_up(),
            fail_on_unknown_filter: false,
        }
    }
}

fn default_warm_up() -> bool {
    true
}

/// Configuration overrides applied to a handler at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerSettings {
    /// Warm-up order; overrides the programmatic value when set.
    #[serde(default)]
    pub load_on_startup: Option<i32>,

    /// Extra initialization parameters, merged over the programmatic ones.
    #[serde(default)]
    pub init_params: HashMap<String, String>,
}

/// Configuration overrides applied to a filter at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSettings {
    /// Extra initialization parameters, merged over the programmatic ones.
    #[serde(default)]
    pub init_params: HashMap<String, String>,
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the level name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level for every target.
    #[serde(default)]
    pub level: LogLevel,

    /// Line layout.
    #[serde(default)]
    pub format: LogFormat,

    /// Destination.
    #[serde(default)]
    pub output: LogOutput,

    /// Span events to log, e.g. the per-request `dispatch` span.
    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Log dispatcher events at debug with one line per closed `dispatch` span.
    #[serde(default)]
    pub trace_dispatch: bool,

    /// Include thread ids.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line.
    #[serde(default)]
    pub file_location: bool,

    /// Log file, required when `output = "file"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    /// Per-target level overrides, e.g. `switchyard_dispatch = "trace"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Figment;
    use figment::providers::{Format, Serialized, Toml};

    #[test]
    fn test_defaults() {
        let config = SwitchyardConfig::default();
        assert!(config.dispatch.warm_up);
        assert!(!config.dispatch.fail_on_unknown_filter);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.mappings.is_empty());
        assert!(config.default_handler.is_none());
    }

    #[test]
    fn test_parse_full_document() {
        let toml = r#"
            default_handler = "static"

            [logging]
            level = "debug"
            format = "pretty"
            output = "stderr"
            trace_dispatch = true

            [logging.filters]
            switchyard_dispatch = "trace"

            [dispatch]
            warm_up = false

            [[mappings]]
            pattern = "/api/*"
            handler = "api"

            [[filter_mappings]]
            filter = "auth"
            url_patterns = ["/api/*"]

            [handlers.api]
            load_on_startup = 2
            init_params = { pool_size = "8" }

            [filters.auth]
            init_params = { realm = "admin" }
        "#;

        let config: SwitchyardConfig =
            Figment::from(Serialized::defaults(SwitchyardConfig::default()))
                .merge(Toml::string(toml))
                .extract()
                .unwrap();

        assert_eq!(config.default_handler.as_deref(), Some("static"));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.output, LogOutput::Stderr);
        assert!(config.logging.trace_dispatch);
        assert_eq!(
            config.logging.filters.get("switchyard_dispatch"),
            Some(&LogLevel::Trace)
        );
        assert!(!config.dispatch.warm_up);
        assert_eq!(config.mappings, vec![MappingRecord::new("/api/*", "api")]);
        assert_eq!(config.filter_mappings[0].filter_name, "auth");
        assert!(config.filter_mappings[0].handler_names.is_empty());
        assert_eq!(config.handlers["api"].load_on_startup, Some(2));
        assert_eq!(config.handlers["api"].init_params["pool_size"], "8");
        assert_eq!(config.filters["auth"].init_params["realm"], "admin");
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
        assert_eq!(LogLevel::Trace.to_string(), "trace");
    }
}
