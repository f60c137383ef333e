//! Handler definitions and their registry.
//!
//! A [`HandlerConfig`] describes how to build a handler; the
//! [`HandlerRegistry`] keeps one config per name together with a lazily
//! created instance. The instance is built on first use (or at warm-up for
//! handlers with a startup order) and shared by every chain afterwards.
//!
//! ```rust,ignore
//! let mut handlers = HandlerRegistry::new();
//! handlers.register(
//!     HandlerConfig::new("report", |config| {
//!         let title = config.get_init_param("title").unwrap_or("Report");
//!         Ok(Arc::new(ReportHandler::new(title)))
//!     })
//!     .init_param("title", "Daily")
//!     .load_on_startup(1),
//! )?;
//!
//! let handler = handlers.get_or_create_instance("report")?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use switchyard_core::{
    BoxError, ComponentKind, DispatchError, DispatchResult, Handler, RegistrationError,
    RegistrationResult,
};

use crate::instance::{InstanceCell, InstanceStatus};
use crate::lifecycle::{LifecycleReport, destroy_isolated};
use crate::named::NamedMap;

/// Builds a handler instance from its configuration.
pub type HandlerFactory =
    Arc<dyn Fn(&HandlerConfig) -> Result<Arc<dyn Handler>, BoxError> + Send + Sync>;

// =============================================================================
// HandlerConfig
// =============================================================================

/// Declarative description of a handler.
#[derive(Clone)]
pub struct HandlerConfig {
    name: String,
    factory: HandlerFactory,
    init_params: HashMap<String, String>,
    load_on_startup: Option<i32>,
}

impl HandlerConfig {
    /// Creates a config whose instance is produced by `factory`.
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&HandlerConfig) -> Result<Arc<dyn Handler>, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
            init_params: HashMap::new(),
            load_on_startup: None,
        }
    }

    /// Creates a config around an already constructed handler.
    pub fn from_instance<H: Handler>(name: impl Into<String>, handler: H) -> Self {
        let instance: Arc<dyn Handler> = Arc::new(handler);
        Self::new(name, move |_| Ok(Arc::clone(&instance)))
    }

    /// Adds an initialization parameter (builder pattern).
    pub fn init_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.init_params.insert(key.into(), value.into());
        self
    }

    /// Marks the handler for construction at warm-up. Lower orders start first.
    pub fn load_on_startup(mut self, order: i32) -> Self {
        self.load_on_startup = Some(order);
        self
    }

    /// The registration name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up an initialization parameter.
    pub fn get_init_param(&self, key: &str) -> Option<&str> {
        self.init_params.get(key).map(String::as_str)
    }

    /// All initialization parameters.
    pub fn init_params(&self) -> &HashMap<String, String> {
        &self.init_params
    }

    /// The warm-up order, if any.
    pub fn startup_order(&self) -> Option<i32> {
        self.load_on_startup
    }

    fn build(&self) -> Result<Arc<dyn Handler>, BoxError> {
        (self.factory)(self)
    }
}

impl fmt::Debug for HandlerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerConfig")
            .field("name", &self.name)
            .field("init_params", &self.init_params)
            .field("load_on_startup", &self.load_on_startup)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// HandlerRegistry
// =============================================================================

struct HandlerEntry {
    config: HandlerConfig,
    instance: InstanceCell<dyn Handler>,
}

/// Handlers by name, in registration order.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: NamedMap<HandlerEntry>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler, replacing any previous registration of the same
    /// name.
    pub fn register(&mut self, config: HandlerConfig) -> RegistrationResult<()> {
        if config.name.is_empty() {
            return Err(RegistrationError::MissingName {
                kind: ComponentKind::Handler,
            });
        }

        let name = config.name.clone();
        let entry = HandlerEntry {
            config,
            instance: InstanceCell::new(),
        };
        if self.entries.insert(name.clone(), entry).is_some() {
            warn!(handler = %name, "Handler re-registered, replacing previous definition");
        } else {
            debug!(handler = %name, "Registered handler");
        }
        Ok(())
    }

    /// Returns the config registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<&HandlerConfig> {
        self.entries.get(name).map(|entry| &entry.config)
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name)
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.len() == 0
    }

    /// Instance state of the named handler.
    pub fn status(&self, name: &str) -> Option<InstanceStatus> {
        self.entries.get(name).map(|entry| entry.instance.status())
    }

    /// Returns the shared instance, constructing it on first use.
    pub fn get_or_create_instance(&self, name: &str) -> DispatchResult<Arc<dyn Handler>> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| DispatchError::UnknownHandler {
                name: name.to_string(),
            })?;

        entry
            .instance
            .get_or_try_init(|| {
                debug!(handler = %name, "Constructing handler");
                entry.config.build()
            })
            .map_err(|reason| DispatchError::construction(ComponentKind::Handler, name, reason))
    }

    /// Constructs every handler that has a startup order.
    ///
    /// Handlers start in ascending order; equal orders keep registration
    /// order. Failures are logged and recorded, and the pass continues.
    pub fn init_on_startup(&self) -> LifecycleReport {
        let mut startup: Vec<(i32, &str)> = self
            .entries
            .iter()
            .filter_map(|(name, entry)| entry.config.load_on_startup.map(|order| (order, name)))
            .collect();
        // Stable sort keeps registration order among equal orders.
        startup.sort_by_key(|(order, _)| *order);

        let mut report = LifecycleReport::default();
        for (order, name) in startup {
            match self.get_or_create_instance(name) {
                Ok(_) => {
                    debug!(handler = %name, order, "Handler started");
                    report.record_success(ComponentKind::Handler, name);
                }
                Err(e) => {
                    warn!(handler = %name, error = %e, "Handler failed to start, continuing");
                    report.record_failure(ComponentKind::Handler, name, e.to_string());
                }
            }
        }

        if report.completed_count() > 0 || !report.is_clean() {
            info!(%report, "Handler warm-up finished");
        }
        report
    }

    /// Destroys every constructed handler, returning each entry to the
    /// uninitialized state.
    pub fn destroy_all(&self) -> LifecycleReport {
        let mut report = LifecycleReport::default();
        for (name, entry) in self.entries.iter() {
            if let Some(instance) = entry.instance.take() {
                destroy_isolated(ComponentKind::Handler, name, || instance.destroy(), &mut report);
            }
        }
        report
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use switchyard_core::{Exchange, handler_fn};

    fn ok_handler() -> impl Handler {
        handler_fn(|exchange: &mut Exchange| {
            exchange.set_body("ok");
            Ok(())
        })
    }

    struct Tracked {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_destroy: bool,
    }

    #[async_trait::async_trait]
    impl Handler for Tracked {
        async fn handle(&self, _exchange: &mut Exchange) -> Result<(), BoxError> {
            Ok(())
        }

        fn destroy(&self) -> Result<(), BoxError> {
            self.log.lock().unwrap().push(self.name.to_string());
            if self.fail_destroy {
                Err("cannot release".into())
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = HandlerRegistry::new();
        registry
            .register(HandlerConfig::from_instance("a", ok_handler()).init_param("k", "v"))
            .unwrap();

        let config = registry.lookup("a").unwrap();
        assert_eq!(config.name(), "a");
        assert_eq!(config.get_init_param("k"), Some("v"));
        assert!(registry.contains("a"));
        assert!(registry.lookup("b").is_none());
        assert_eq!(registry.status("a"), Some(InstanceStatus::Uninitialized));
    }

    #[test]
    fn test_register_rejects_empty_name() {
        let mut registry = HandlerRegistry::new();
        let err = registry
            .register(HandlerConfig::from_instance("", ok_handler()))
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::MissingName {
                kind: ComponentKind::Handler
            }
        );
    }

    #[test]
    fn test_reregister_keeps_position() {
        let mut registry = HandlerRegistry::new();
        registry.register(HandlerConfig::from_instance("a", ok_handler())).unwrap();
        registry.register(HandlerConfig::from_instance("b", ok_handler())).unwrap();
        registry
            .register(HandlerConfig::from_instance("a", ok_handler()).init_param("v", "2"))
            .unwrap();

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(registry.lookup("a").unwrap().get_init_param("v"), Some("2"));
    }

    #[test]
    fn test_factory_sees_init_params() {
        let mut registry = HandlerRegistry::new();
        registry
            .register(
                HandlerConfig::new("greet", |config| {
                    let greeting = config.get_init_param("greeting").unwrap_or("hi").to_string();
                    Ok(Arc::new(handler_fn(move |exchange: &mut Exchange| {
                        exchange.set_body(greeting.clone());
                        Ok(())
                    })))
                })
                .init_param("greeting", "hello"),
            )
            .unwrap();

        let handler = registry.get_or_create_instance("greet").unwrap();
        let mut exchange = Exchange::new("/");
        tokio_test::block_on(handler.handle(&mut exchange)).unwrap();
        assert_eq!(exchange.body(), "hello");
    }

    #[test]
    fn test_unknown_handler() {
        let registry = HandlerRegistry::new();
        let err = registry.get_or_create_instance("ghost").err().unwrap();
        assert_eq!(
            err,
            DispatchError::UnknownHandler {
                name: "ghost".to_string()
            }
        );
    }

    #[test]
    fn test_construction_failure_is_sticky() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut registry = HandlerRegistry::new();
        registry
            .register(HandlerConfig::new("broken", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("no database".into())
            }))
            .unwrap();

        for _ in 0..3 {
            let err = registry.get_or_create_instance("broken").err().unwrap();
            assert_eq!(
                err,
                DispatchError::construction(ComponentKind::Handler, "broken", "no database")
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.status("broken"), Some(InstanceStatus::Failed));
    }

    #[test]
    fn test_init_on_startup_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new();

        let startups = [
            ("late", Some(5)),
            ("lazy", None),
            ("first", Some(1)),
            ("tie", Some(5)),
        ];
        for (name, startup) in startups {
            let order = Arc::clone(&order);
            let mut config = HandlerConfig::new(name, move |config| {
                order.lock().unwrap().push(config.name().to_string());
                Ok(Arc::new(ok_handler()))
            });
            if let Some(startup) = startup {
                config = config.load_on_startup(startup);
            }
            registry.register(config).unwrap();
        }

        let report = registry.init_on_startup();
        assert!(report.is_clean());
        assert_eq!(report.completed_count(), 3);
        assert_eq!(*order.lock().unwrap(), vec!["first", "late", "tie"]);
        assert_eq!(registry.status("lazy"), Some(InstanceStatus::Uninitialized));
    }

    #[test]
    fn test_init_on_startup_continues_past_failure() {
        let mut registry = HandlerRegistry::new();
        registry
            .register(HandlerConfig::new("bad", |_| Err("boom".into())).load_on_startup(0))
            .unwrap();
        registry
            .register(HandlerConfig::from_instance("good", ok_handler()).load_on_startup(1))
            .unwrap();

        let report = registry.init_on_startup();
        assert!(report.failed(ComponentKind::Handler, "bad"));
        assert!(report.completed(ComponentKind::Handler, "good"));
    }

    #[test]
    fn test_destroy_all_isolates_failures() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new();
        for (name, fail_destroy) in [("a", true), ("b", false), ("never", false)] {
            registry
                .register(HandlerConfig::from_instance(
                    name,
                    Tracked {
                        name,
                        log: Arc::clone(&log),
                        fail_destroy,
                    },
                ))
                .unwrap();
        }
        registry.get_or_create_instance("a").unwrap();
        registry.get_or_create_instance("b").unwrap();

        let report = registry.destroy_all();
        assert!(report.failed(ComponentKind::Handler, "a"));
        assert!(report.completed(ComponentKind::Handler, "b"));
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);

        let again = registry.destroy_all();
        assert_eq!(again, LifecycleReport::default());
        assert_eq!(log.lock().unwrap().len(), 2);
    }
}
