//! Setup, serving and shutdown orchestration.
//!
//! The runtime has two types for its two phases. [`SwitchyardRuntime`]
//! collects handlers, filters and mappings; [`SwitchyardRuntime::start`]
//! applies the configured mappings, warms components up and freezes
//! everything into a [`RunningRuntime`] that only serves.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use switchyard_runtime::SwitchyardRuntime;
//!
//! // Auto-loads switchyard.toml from the current directory
//! let mut runtime = SwitchyardRuntime::new();
//! runtime
//!     .handler(HandlerConfig::from_instance("api", ApiHandler))?
//!     .filter(FilterConfig::from_instance("auth", AuthFilter))?;
//!
//! let running = runtime.start()?;
//! let response = running.handle(Exchange::new("/api/users")).await;
//!
//! running.run_until_signal().await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal;
use tracing::{debug, error, info, warn};

use switchyard_core::{DispatchResult, Exchange, MappingRecord, status};
use switchyard_dispatch::{
    Chain, Dispatcher, FilterAssociation, FilterConfig, HandlerConfig, LifecycleReport,
};

use crate::config::{ConfigLoader, ConfigResult, SwitchyardConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// The setup phase of the runtime.
///
/// Registration methods return `&mut Self` so calls can be chained with `?`.
pub struct SwitchyardRuntime {
    config: SwitchyardConfig,
    dispatcher: Dispatcher,
}

impl SwitchyardRuntime {
    /// Creates a runtime with automatic configuration loading.
    ///
    /// Searches the current directory for `switchyard.toml` and falls back
    /// to defaults when loading fails.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                SwitchyardConfig::default()
            });

        Self::from_config(&config)
    }

    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from configuration and initializes logging.
    pub fn from_config(config: &SwitchyardConfig) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            mappings = config.mappings.len(),
            filter_mappings = config.filter_mappings.len(),
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
            dispatcher: Dispatcher::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SwitchyardConfig {
        &self.config
    }

    /// Registers a handler, applying any `[handlers.<name>]` overrides.
    pub fn handler(&mut self, handler: HandlerConfig) -> RuntimeResult<&mut Self> {
        let mut handler = handler;
        if let Some(settings) = self.config.handlers.get(handler.name()) {
            debug!(handler = %handler.name(), "Applying configured handler settings");
            for (key, value) in &settings.init_params {
                handler = handler.init_param(key.clone(), value.clone());
            }
            if let Some(order) = settings.load_on_startup {
                handler = handler.load_on_startup(order);
            }
        }

        self.dispatcher.register_handler(handler)?;
        Ok(self)
    }

    /// Registers a filter, applying any `[filters.<name>]` overrides.
    pub fn filter(&mut self, filter: FilterConfig) -> RuntimeResult<&mut Self> {
        let mut filter = filter;
        if let Some(settings) = self.config.filters.get(filter.name()) {
            debug!(filter = %filter.name(), "Applying configured filter settings");
            for (key, value) in &settings.init_params {
                filter = filter.init_param(key.clone(), value.clone());
            }
        }

        self.dispatcher.register_filter(filter)?;
        Ok(self)
    }

    /// Maps a pattern to a registered handler.
    pub fn mapping(&mut self, pattern: &str, handler_name: &str) -> RuntimeResult<&mut Self> {
        self.dispatcher.add_mapping(pattern, handler_name)?;
        Ok(self)
    }

    /// Sets the handler used when nothing else matches.
    pub fn default_handler(&mut self, handler_name: &str) -> RuntimeResult<&mut Self> {
        self.dispatcher.set_default_handler(handler_name)?;
        Ok(self)
    }

    /// Attaches a filter to URL patterns and handler names.
    pub fn filter_mapping(&mut self, association: FilterAssociation) -> RuntimeResult<&mut Self> {
        self.dispatcher.add_filter_association(&association)?;
        Ok(self)
    }

    /// Finishes setup and starts serving.
    ///
    /// Configured mappings are applied after the programmatic ones. Any
    /// invalid mapping aborts startup; a failing component during warm-up
    /// does not.
    pub fn start(mut self) -> RuntimeResult<RunningRuntime> {
        validate_config(&self.config)?;

        let config = std::mem::take(&mut self.config);
        for record in config.mappings {
            let MappingRecord {
                pattern,
                handler_name,
            } = record;
            self.dispatcher.add_mapping(&pattern, &handler_name)?;
        }
        if let Some(handler_name) = &config.default_handler {
            self.dispatcher.set_default_handler(handler_name)?;
        }
        for association in &config.filter_mappings {
            self.dispatcher.add_filter_association(association)?;
        }

        let unknown: Vec<String> = self
            .dispatcher
            .unknown_filters()
            .into_iter()
            .map(str::to_string)
            .collect();
        if !unknown.is_empty() {
            if config.dispatch.fail_on_unknown_filter {
                return Err(RuntimeError::UnknownFilters(unknown));
            }
            warn!(filters = ?unknown, "Filter mappings reference unregistered filters");
        }

        let warm_up = config.dispatch.warm_up.then(|| self.dispatcher.warm_up());

        info!(
            handlers = self.dispatcher.handler_count(),
            filters = self.dispatcher.filter_count(),
            mappings = self.dispatcher.mapping_count(),
            "Runtime started"
        );

        Ok(RunningRuntime {
            dispatcher: Arc::new(self.dispatcher),
            warm_up,
            shut_down: AtomicBool::new(false),
        })
    }
}

impl Default for SwitchyardRuntime {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// RunningRuntime
// =============================================================================

/// The serving phase of the runtime.
///
/// Shared by reference (or behind an `Arc`) between transport tasks.
pub struct RunningRuntime {
    dispatcher: Arc<Dispatcher>,
    warm_up: Option<LifecycleReport>,
    shut_down: AtomicBool,
}

impl RunningRuntime {
    /// The frozen dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// The warm-up outcome, if warm-up was enabled.
    pub fn warm_up_report(&self) -> Option<&LifecycleReport> {
        self.warm_up.as_ref()
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Builds the execution chain for `path`.
    pub fn dispatch(&self, path: &str) -> DispatchResult<Chain> {
        self.dispatcher.dispatch(path)
    }

    /// Serves one exchange, converting every outcome into a response.
    ///
    /// - no route: 404 from the not-found chain
    /// - unknown or failed component: 500
    /// - error raised by a filter or handler: 500
    /// - after shutdown: 503
    pub async fn handle(&self, exchange: Exchange) -> Exchange {
        if self.is_shut_down() {
            return error_response(exchange.path(), status::SERVICE_UNAVAILABLE);
        }

        let path = exchange.path().to_string();
        let chain = match self.dispatcher.dispatch(&path) {
            Ok(chain) => chain,
            Err(e) => {
                error!(path = %path, error = %e, "Failed to build chain");
                return error_response(&path, status::INTERNAL_SERVER_ERROR);
            }
        };

        match chain.invoke(exchange).await {
            Ok(exchange) => exchange,
            Err(e) => {
                error!(path = %path, error = %e, "Request processing failed");
                error_response(&path, status::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// Serves a bare path.
    pub async fn serve(&self, path: &str) -> Exchange {
        self.handle(Exchange::new(path)).await
    }

    /// Destroys every constructed component.
    ///
    /// Returns `None` if the runtime was already shut down.
    pub fn shutdown(&self) -> Option<LifecycleReport> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            debug!("Shutdown already performed");
            return None;
        }

        info!("Shutting down Switchyard runtime");
        Some(self.dispatcher.shutdown())
    }

    /// Waits for `shutdown` to complete, then shuts down.
    pub async fn run_until<F>(&self, shutdown: F) -> Option<LifecycleReport>
    where
        F: Future<Output = ()>,
    {
        shutdown.await;
        self.shutdown()
    }

    /// Waits for Ctrl+C (or SIGTERM on Unix), then shuts down.
    pub async fn run_until_signal(&self) -> RuntimeResult<Option<LifecycleReport>> {
        info!("Switchyard runtime is now running. Press Ctrl+C to stop.");
        wait_for_signal().await?;
        Ok(self.shutdown())
    }
}

impl std::fmt::Debug for RunningRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningRuntime")
            .field("dispatcher", &self.dispatcher)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

fn error_response(path: &str, code: u16) -> Exchange {
    let mut exchange = Exchange::new(path);
    exchange.set_status(code);
    exchange
}

async fn wait_for_signal() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a [`SwitchyardRuntime`] with custom configuration.
///
/// ```rust,ignore
/// let runtime = SwitchyardRuntime::builder()
///     .config_file("deploy/switchyard.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder searching the current directory.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Enables loading environment variables (enabled by default).
    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: SwitchyardConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Loads and validates configuration, then builds the runtime.
    pub fn build(self) -> ConfigResult<SwitchyardRuntime> {
        let config = self.config_loader.load()?;
        validate_config(&config)?;
        Ok(SwitchyardRuntime::from_config(&config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
