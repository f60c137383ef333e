//! The dispatch facade.
//!
//! [`Dispatcher`] owns the pattern index and both registries and is the one
//! entry point a transport talks to. It has two phases:
//!
//! 1. **Setup** - handlers, filters, mappings and associations are
//!    registered through `&mut self` methods.
//! 2. **Serving** - the dispatcher is shared (typically behind an `Arc`) and
//!    only [`dispatch`](Dispatcher::dispatch) and the lifecycle passes are
//!    called. Nothing can be added once it is shared.
//!
//! ```rust,ignore
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.register_handler(HandlerConfig::from_instance("users", UsersHandler))?;
//! dispatcher.add_mapping("/users/*", "users")?;
//! dispatcher.register_filter(FilterConfig::from_instance("auth", AuthFilter))?;
//! dispatcher.add_filter_association(&FilterAssociation::new("auth").url_pattern("/*"))?;
//!
//! let dispatcher = Arc::new(dispatcher);
//! dispatcher.warm_up();
//!
//! let chain = dispatcher.dispatch("/users/42")?;
//! let exchange = chain.invoke(Exchange::new("/users/42")).await?;
//! ```

use tracing::{Level, debug, info, span, warn};

use switchyard_core::{
    DispatchResult, MappingError, MappingRecord, MappingResult, PatternIndex, RegistrationResult,
};

use crate::chain::{Chain, ChainBuilder};
use crate::filter::{FilterAssociation, FilterConfig, FilterRegistry};
use crate::handler::{HandlerConfig, HandlerRegistry};
use crate::lifecycle::LifecycleReport;

/// Routes request paths to execution chains.
///
/// # Thread Safety
///
/// `Dispatcher` is `Send + Sync`. Resolution reads an immutable index;
/// lazily constructed instances are guarded per entry.
#[derive(Debug, Default)]
pub struct Dispatcher {
    index: PatternIndex,
    handlers: HandlerRegistry,
    filters: FilterRegistry,
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Setup
    // =========================================================================

    /// Registers a handler.
    pub fn register_handler(&mut self, config: HandlerConfig) -> RegistrationResult<()> {
        self.handlers.register(config)
    }

    /// Maps `pattern` to a registered handler.
    ///
    /// Fails if the pattern is malformed or the handler is unknown.
    pub fn add_mapping(&mut self, pattern: &str, handler_name: &str) -> MappingResult<()> {
        self.add_mapping_record(MappingRecord::new(pattern, handler_name))
    }

    /// Adds a mapping record, e.g. one read from configuration.
    pub fn add_mapping_record(&mut self, record: MappingRecord) -> MappingResult<()> {
        if !record.handler_name.is_empty() && !self.handlers.contains(&record.handler_name) {
            return Err(MappingError::UnknownHandler {
                pattern: record.pattern,
                handler: record.handler_name,
            });
        }
        self.index.add(record)
    }

    /// Installs the handler used when nothing else matches.
    pub fn set_default_handler(&mut self, handler_name: &str) -> MappingResult<()> {
        if !handler_name.is_empty() && !self.handlers.contains(handler_name) {
            return Err(MappingError::UnknownHandler {
                pattern: "/".to_string(),
                handler: handler_name.to_string(),
            });
        }
        self.index.set_default(handler_name)
    }

    /// Registers a filter.
    pub fn register_filter(&mut self, config: FilterConfig) -> RegistrationResult<()> {
        self.filters.register(config)
    }

    /// Attaches a filter to URL patterns and handler names.
    pub fn add_filter_association(
        &mut self,
        association: &FilterAssociation,
    ) -> RegistrationResult<()> {
        self.filters.add_association(association)
    }

    // =========================================================================
    // Serving
    // =========================================================================

    /// Returns the handler name `path` resolves to, without building a chain.
    pub fn resolve(&self, path: &str) -> Option<&str> {
        self.index.resolve(path)
    }

    /// Builds the execution chain for `path`.
    ///
    /// A path that matches nothing yields [`Chain::not_found`], not an error.
    /// Errors are reserved for components that are unknown or fail to
    /// construct.
    pub fn dispatch(&self, path: &str) -> DispatchResult<Chain> {
        let span = span!(Level::DEBUG, "dispatch", path = %path);
        let _enter = span.enter();

        let route = self.index.resolve_route(path);
        ChainBuilder::new(&self.filters, &self.handlers).build(route, path)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Constructs every filter, then every handler with a startup order.
    ///
    /// Failures are logged and reported; they never stop the pass.
    pub fn warm_up(&self) -> LifecycleReport {
        let mut report = self.filters.init_all();
        report.merge(self.handlers.init_on_startup());

        for failure in &report.failures {
            debug!(%failure, "Component unavailable after warm-up");
        }
        info!(%report, "Warm-up complete");
        report
    }

    /// Destroys every constructed filter, then every constructed handler.
    ///
    /// Calling it again destroys nothing.
    pub fn shutdown(&self) -> LifecycleReport {
        let mut report = self.filters.destroy_all();
        report.merge(self.handlers.destroy_all());

        if report.is_clean() {
            info!(%report, "Shutdown complete");
        } else {
            warn!(%report, "Shutdown complete with failures");
        }
        report
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// The pattern index.
    pub fn index(&self) -> &PatternIndex {
        &self.index
    }

    /// The handler registry.
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// The filter registry.
    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Number of registered filters.
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Number of stored mappings, the default included.
    pub fn mapping_count(&self) -> usize {
        self.index.len()
    }

    /// Patterns declared for `handler_name`, in declaration order.
    pub fn patterns_for(&self, handler_name: &str) -> &[String] {
        self.index.patterns_for(handler_name)
    }

    /// Filter names that are associated but never registered.
    pub fn unknown_filters(&self) -> Vec<&str> {
        self.filters.unknown_associations()
    }
}
