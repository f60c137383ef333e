//! Filter definitions, associations and the filter registry.
//!
//! Filters are declared by name and attached to requests through
//! associations: a set of URL patterns and a set of handler names. A filter
//! applies to a request when any of its URL patterns matches the path or
//! when the resolved handler is one of its handler names.
//!
//! # Ordering
//!
//! Chains list filters in declaration order, each at most once. Names that
//! are associated but never registered come after every registered filter,
//! in the order they were first associated, and fail the chain build with
//! [`DispatchError::UnknownFilter`].
//!
//! ```rust,ignore
//! let mut filters = FilterRegistry::new();
//! filters.register(FilterConfig::from_instance("auth", AuthFilter))?;
//! filters.associate("auth", ["/admin/*", "*.do"], ["reports"])?;
//!
//! let names = filters.matching_filters("/admin/users", "users");
//! assert_eq!(names, vec!["auth"]);
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use switchyard_core::{
    BoxError, ComponentKind, DispatchError, DispatchResult, Filter, RegistrationError,
    RegistrationResult, UrlPattern,
};

use crate::instance::{InstanceCell, InstanceStatus};
use crate::lifecycle::{LifecycleReport, destroy_isolated};
use crate::named::NamedMap;

/// Builds a filter instance from its configuration.
pub type FilterFactory =
    Arc<dyn Fn(&FilterConfig) -> Result<Arc<dyn Filter>, BoxError> + Send + Sync>;

// =============================================================================
// FilterConfig
// =============================================================================

/// Declarative description of a filter.
#[derive(Clone)]
pub struct FilterConfig {
    name: String,
    factory: FilterFactory,
    init_params: HashMap<String, String>,
}

impl FilterConfig {
    /// Creates a config whose instance is produced by `factory`.
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&FilterConfig) -> Result<Arc<dyn Filter>, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
            init_params: HashMap::new(),
        }
    }

    /// Creates a config around an already constructed filter.
    pub fn from_instance<F: Filter>(name: impl Into<String>, filter: F) -> Self {
        let instance: Arc<dyn Filter> = Arc::new(filter);
        Self::new(name, move |_| Ok(Arc::clone(&instance)))
    }

    /// Adds an initialization parameter (builder pattern).
    pub fn init_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.init_params.insert(key.into(), value.into());
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

    fn build(&self) -> Result<Arc<dyn Filter>, BoxError> {
        (self.factory)(self)
    }
}

impl fmt::Debug for FilterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterConfig")
            .field("name", &self.name)
            .field("init_params", &self.init_params)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// FilterAssociation
// =============================================================================

/// Attaches a filter to URL patterns and handler names.
///
/// Deserializes from configuration:
///
/// ```toml
/// [[filter_mappings]]
/// filter = "auth"
/// url_patterns = ["/admin/*"]
/// handler_names = ["reports"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterAssociation {
    /// The filter being attached.
    #[serde(rename = "filter")]
    pub filter_name: String,
    /// URL patterns selecting requests by path.
    #[serde(default)]
    pub url_patterns: Vec<String>,
    /// Handler names selecting requests by route.
    #[serde(default)]
    pub handler_names: Vec<String>,
}

impl FilterAssociation {
    /// Creates an empty association for `filter_name`.
    pub fn new(filter_name: impl Into<String>) -> Self {
        Self {
            filter_name: filter_name.into(),
            ..Default::default()
        }
    }

    /// Adds a URL pattern (builder pattern).
    pub fn url_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.url_patterns.push(pattern.into());
        self
    }

    /// Adds a handler name (builder pattern).
    pub fn handler_name(mut self, name: impl Into<String>) -> Self {
        self.handler_names.push(name.into());
        self
    }
}

// =============================================================================
// FilterRegistry
// =============================================================================

struct FilterEntry {
    config: FilterConfig,
    instance: InstanceCell<dyn Filter>,
}

#[derive(Default)]
struct Associations {
    /// First-insertion order, no duplicates.
    url_patterns: Vec<UrlPattern>,
    handler_names: HashSet<String>,
}

impl Associations {
    fn applies_to(&self, path: &str, handler_name: &str) -> bool {
        self.handler_names.contains(handler_name)
            || self.url_patterns.iter().any(|pattern| pattern.matches(path))
    }
}

/// Filters by name plus their URL-pattern and handler-name associations.
#[derive(Default)]
pub struct FilterRegistry {
    filters: NamedMap<FilterEntry>,
    associations: NamedMap<Associations>,
}

impl FilterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a filter, replacing any previous registration of the same
    /// name. A replacement keeps the original declaration position.
    pub fn register(&mut self, config: FilterConfig) -> RegistrationResult<()> {
        if config.name.is_empty() {
            return Err(RegistrationError::MissingName {
                kind: ComponentKind::Filter,
            });
        }

        let name = config.name.clone();
        let entry = FilterEntry {
            config,
            instance: InstanceCell::new(),
        };
        if self.filters.insert(name.clone(), entry).is_some() {
            warn!(filter = %name, "Filter re-registered, replacing previous definition");
        } else {
            debug!(filter = %name, "Registered filter");
        }
        Ok(())
    }

    /// Returns the config registered under `name`.
    pub fn get(&self, name: &str) -> Option<&FilterConfig> {
        self.filters.get(name).map(|entry| &entry.config)
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains(name)
    }

    /// Registered names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(|(name, _)| name)
    }

    /// Number of registered filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.filters.len() == 0
    }

    /// Instance state of the named filter.
    pub fn status(&self, name: &str) -> Option<InstanceStatus> {
        self.filters.get(name).map(|entry| entry.instance.status())
    }

    /// Unions URL patterns and handler names into the filter's associations.
    ///
    /// All patterns are parsed before anything is stored, so a malformed
    /// pattern leaves the registry unchanged. The filter does not need to be
    /// registered yet.
    pub fn associate<P, H>(
        &mut self,
        filter_name: &str,
        url_patterns: P,
        handler_names: H,
    ) -> RegistrationResult<()>
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        H: IntoIterator,
        H::Item: Into<String>,
    {
        if filter_name.is_empty() {
            return Err(RegistrationError::MissingName {
                kind: ComponentKind::Filter,
            });
        }

        let parsed = url_patterns
            .into_iter()
            .map(|p| UrlPattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let assoc = self.associations.get_or_default(filter_name);
        for pattern in parsed {
            if !assoc.url_patterns.contains(&pattern) {
                assoc.url_patterns.push(pattern);
            }
        }
        assoc.handler_names.extend(handler_names.into_iter().map(Into::into));

        debug!(filter = %filter_name, "Updated filter associations");
        Ok(())
    }

    /// Applies a declarative association.
    pub fn add_association(&mut self, association: &FilterAssociation) -> RegistrationResult<()> {
        self.associate(
            &association.filter_name,
            &association.url_patterns,
            association.handler_names.iter().cloned(),
        )
    }

    /// URL patterns associated with `filter_name`, in first-insertion order.
    pub fn url_patterns(&self, filter_name: &str) -> Vec<&str> {
        self.associations
            .get(filter_name)
            .map(|assoc| assoc.url_patterns.iter().map(UrlPattern::as_str).collect())
            .unwrap_or_default()
    }

    /// Handler names associated with `filter_name`.
    pub fn handler_names(&self, filter_name: &str) -> HashSet<&str> {
        self.associations
            .get(filter_name)
            .map(|assoc| assoc.handler_names.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Associated names that have no registration.
    pub fn unknown_associations(&self) -> Vec<&str> {
        self.associations
            .iter()
            .map(|(name, _)| name)
            .filter(|name| !self.filters.contains(name))
            .collect()
    }

    /// Names of the filters that apply to a request, in chain order.
    pub fn matching_filters(&self, path: &str, handler_name: &str) -> Vec<&str> {
        let applies = |name: &str| {
            self.associations
                .get(name)
                .is_some_and(|assoc| assoc.applies_to(path, handler_name))
        };

        let registered = self.names().filter(|name| applies(*name));
        let dangling = self
            .associations
            .iter()
            .filter(|(name, assoc)| {
                !self.filters.contains(name) && assoc.applies_to(path, handler_name)
            })
            .map(|(name, _)| name);

        registered.chain(dangling).collect()
    }

    /// Returns the shared instance, constructing it on first use.
    ///
    /// Construction is serialized per filter: concurrent first callers wait
    /// for one factory call and all observe its outcome.
    pub fn get_instance(&self, name: &str) -> DispatchResult<Arc<dyn Filter>> {
        let entry = self
            .filters
            .get(name)
            .ok_or_else(|| DispatchError::UnknownFilter {
                name: name.to_string(),
            })?;

        entry
            .instance
            .get_or_try_init(|| {
                debug!(filter = %name, "Constructing filter");
                entry.config.build()
            })
            .map_err(|reason| DispatchError::construction(ComponentKind::Filter, name, reason))
    }

    /// Constructs every registered filter, in declaration order.
    ///
    /// Failures are logged and recorded; the pass never stops early.
    pub fn init_all(&self) -> LifecycleReport {
        let mut report = LifecycleReport::default();
        for name in self.names() {
            match self.get_instance(name) {
                Ok(_) => report.record_success(ComponentKind::Filter, name),
                Err(e) => {
                    warn!(filter = %name, error = %e, "Filter failed to initialize, continuing");
                    report.record_failure(ComponentKind::Filter, name, e.to_string());
                }
            }
        }

        if self.len() > 0 {
            info!(%report, "Filter warm-up finished");
        }
        report
    }

    /// Destroys every constructed filter, returning each entry to the
    /// uninitialized state.
    pub fn destroy_all(&self) -> LifecycleReport {
        let mut report = LifecycleReport::default();
        for (name, entry) in self.filters.iter() {
            if let Some(instance) = entry.instance.take() {
                destroy_isolated(ComponentKind::Filter, name, || instance.destroy(), &mut report);
            }
        }
        report
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.names().collect::<Vec<_>>())
            .field("associations", &self.associations.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use switchyard_core::{Exchange, FilterFlow, MappingError, filter_fn};

    fn pass() -> impl Filter {
        filter_fn(|_: &mut Exchange| Ok(FilterFlow::Continue))
    }

    fn registry_with(names: &[&str]) -> FilterRegistry {
        let mut registry = FilterRegistry::new();
        for name in names {
            registry.register(FilterConfig::from_instance(*name, pass())).unwrap();
        }
        registry
    }

    #[test]
    fn test_register_rejects_empty_name() {
        let mut registry = FilterRegistry::new();
        assert_eq!(
            registry.register(FilterConfig::from_instance("", pass())),
            Err(RegistrationError::MissingName {
                kind: ComponentKind::Filter
            })
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_association_union() {
        let mut registry = registry_with(&["auth"]);
        registry.associate("auth", ["/admin/*"], ["users"]).unwrap();
        registry.associate("auth", ["/admin/*", "*.do"], ["reports"]).unwrap();

        assert_eq!(registry.url_patterns("auth"), vec!["/admin/*", "*.do"]);
        assert_eq!(
            registry.handler_names("auth"),
            HashSet::from(["users", "reports"])
        );
        assert!(registry.url_patterns("missing").is_empty());
    }

    #[test]
    fn test_associate_rejects_bad_pattern_atomically() {
        let mut registry = registry_with(&["auth"]);
        let err = registry
            .associate("auth", ["/ok/*", "/bad*"], Vec::<String>::new())
            .unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::Mapping(MappingError::InvalidPattern { .. })
        ));
        assert!(registry.url_patterns("auth").is_empty());
    }

    #[test]
    fn test_matching_by_url_and_handler() {
        let mut registry = registry_with(&["a", "b", "c"]);
        registry.associate("c", ["/x/*"], Vec::<String>::new()).unwrap();
        registry.associate("a", Vec::<&str>::new(), ["h"]).unwrap();
        registry.associate("b", ["*.do"], Vec::<String>::new()).unwrap();

        assert_eq!(registry.matching_filters("/x/y", "h"), vec!["a", "c"]);
        assert_eq!(registry.matching_filters("/x/run.do", "other"), vec!["b", "c"]);
        assert!(registry.matching_filters("/elsewhere", "other").is_empty());
    }

    #[test]
    fn test_matching_deduplicates() {
        let mut registry = registry_with(&["f"]);
        registry.associate("f", ["/x/*"], ["h"]).unwrap();
        assert_eq!(registry.matching_filters("/x/y", "h"), vec!["f"]);
    }

    #[test]
    fn test_default_pattern_matches_everything() {
        let mut registry = registry_with(&["log"]);
        registry.associate("log", ["/"], Vec::<String>::new()).unwrap();
        assert_eq!(registry.matching_filters("/any/thing", "h"), vec!["log"]);
    }

    #[test]
    fn test_unknown_filter_ordered_last() {
        let mut registry = registry_with(&["known"]);
        registry.associate("ghost", ["/*"], Vec::<String>::new()).unwrap();
        registry.associate("known", ["/*"], Vec::<String>::new()).unwrap();

        assert_eq!(registry.matching_filters("/p", "h"), vec!["known", "ghost"]);
        assert_eq!(registry.unknown_associations(), vec!["ghost"]);
        assert_eq!(
            registry.get_instance("ghost").err(),
            Some(DispatchError::UnknownFilter {
                name: "ghost".to_string()
            })
        );
    }

    #[test]
    fn test_add_association_from_config() {
        let association: FilterAssociation = serde_json::from_value(serde_json::json!({
            "filter": "auth",
            "url_patterns": ["/admin/*"],
        }))
        .unwrap();
        assert!(association.handler_names.is_empty());

        let mut registry = registry_with(&["auth"]);
        registry
            .add_association(&association.clone().handler_name("reports"))
            .unwrap();
        assert_eq!(registry.matching_filters("/admin", "x"), vec!["auth"]);
        assert_eq!(registry.matching_filters("/r", "reports"), vec!["auth"]);
    }

    #[test]
    fn test_get_instance_shares_and_sticks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = FilterRegistry::new();
        registry
            .register(FilterConfig::new("once", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(pass()))
            }))
            .unwrap();
        registry
            .register(FilterConfig::new("broken", |_| Err("bad config".into())))
            .unwrap();

        let first = registry.get_instance("once").unwrap();
        let second = registry.get_instance("once").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        for _ in 0..2 {
            assert_eq!(
                registry.get_instance("broken").err(),
                Some(DispatchError::construction(
                    ComponentKind::Filter,
                    "broken",
                    "bad config"
                ))
            );
        }
        assert_eq!(registry.status("broken"), Some(InstanceStatus::Failed));
    }

    #[test]
    fn test_concurrent_get_instance() {
        const THREADS: usize = 16;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = FilterRegistry::new();
        registry
            .register(FilterConfig::new("slow", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(25));
                Ok(Arc::new(pass()))
            }))
            .unwrap();

        let registry = Arc::new(registry);
        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.get_instance("slow").unwrap()
                })
            })
            .collect();
        let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
    }

    #[test]
    fn test_init_all_and_destroy_all() {
        let destroyed = Arc::new(AtomicUsize::new(0));

        struct Counted(Arc<AtomicUsize>);

        #[async_trait::async_trait]
        impl Filter for Counted {
            async fn before(&self, _: &mut Exchange) -> Result<FilterFlow, BoxError> {
                Ok(FilterFlow::Continue)
            }

            fn destroy(&self) -> Result<(), BoxError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                panic!("destroy blew up");
            }
        }

        let mut registry = FilterRegistry::new();
        registry
            .register(FilterConfig::from_instance("counted", Counted(Arc::clone(&destroyed))))
            .unwrap();
        registry
            .register(FilterConfig::new("broken", |_| Err("nope".into())))
            .unwrap();
        registry.register(FilterConfig::from_instance("fine", pass())).unwrap();

        let warm = registry.init_all();
        assert!(warm.completed(ComponentKind::Filter, "counted"));
        assert!(warm.failed(ComponentKind::Filter, "broken"));
        assert!(warm.completed(ComponentKind::Filter, "fine"));

        let down = registry.destroy_all();
        assert!(down.failed(ComponentKind::Filter, "counted"));
        assert!(down.completed(ComponentKind::Filter, "fine"));
        assert!(!down.completed(ComponentKind::Filter, "broken"));
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);

        assert!(registry.destroy_all().completed.is_empty());
        assert_eq!(registry.status("counted"), Some(InstanceStatus::Uninitialized));
    }
}
