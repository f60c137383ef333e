//! The pattern index that maps request paths to handler names.
//!
//! [`PatternIndex`] keeps one table per [`PatternKind`] and consults them in
//! [`PatternKind::PRECEDENCE`] order, returning on the first hit:
//!
//! 1. **Exact** - the path is looked up verbatim.
//! 2. **Prefix** - prefix patterns sorted by length, longest first; the first
//!    one that matches wins.
//! 3. **Extension** - extension patterns in declaration order.
//! 4. **Default** - the `/` handler, if any.
//!
//! ```rust,ignore
//! let mut index = PatternIndex::new();
//! index.add(MappingRecord::new("/a/*", "a"))?;
//! index.add(MappingRecord::new("/a/b/*", "ab"))?;
//!
//! assert_eq!(index.resolve("/a/b/c"), Some("ab"));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MappingError, MappingResult};
use crate::pattern::{PatternKind, UrlPattern};

/// One declared `(pattern, handler)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    /// The URL pattern.
    pub pattern: String,
    /// The name of the handler serving the pattern.
    #[serde(rename = "handler")]
    pub handler_name: String,
}

impl MappingRecord {
    /// Creates a new mapping record.
    pub fn new(pattern: impl Into<String>, handler_name: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            handler_name: handler_name.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct Mapping {
    pattern: UrlPattern,
    handler: Arc<str>,
}

/// The outcome of a successful resolution.
#[derive(Debug, Clone, Copy)]
pub struct RouteMatch<'a> {
    pattern: &'a UrlPattern,
    handler: &'a str,
}

impl<'a> RouteMatch<'a> {
    /// The handler selected for the path.
    pub fn handler(&self) -> &'a str {
        self.handler
    }

    /// The pattern that matched.
    pub fn pattern(&self) -> &'a str {
        self.pattern.as_str()
    }

    /// The rule that produced the match.
    pub fn rule(&self) -> PatternKind {
        self.pattern.kind()
    }

    /// Splits `path` into servlet path and path info.
    ///
    /// For a prefix match the servlet path is the matched prefix and the rest
    /// is path info; every other rule consumes the whole path.
    pub fn split<'p>(&self, path: &'p str) -> (&'p str, Option<&'p str>) {
        match self.pattern.prefix() {
            Some(prefix) if path.starts_with(prefix) => {
                let (servlet_path, rest) = path.split_at(prefix.len());
                (servlet_path, (!rest.is_empty()).then_some(rest))
            }
            _ => (path, None),
        }
    }
}

/// Lookup structure answering "which handler serves this path".
///
/// The index is built during setup and only read while serving, so
/// [`resolve`](Self::resolve) takes `&self` and needs no locking.
#[derive(Debug, Default, Clone)]
pub struct PatternIndex {
    exact: HashMap<String, Mapping>,
    /// Sorted by prefix length, longest first; ties keep declaration order.
    prefix: Vec<Mapping>,
    /// Declaration order.
    extension: Vec<Mapping>,
    default: Option<Mapping>,
    /// Handler name -> patterns, in declaration order.
    by_handler: HashMap<Arc<str>, Vec<String>>,
}

impl PatternIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a mapping.
    ///
    /// Registering a pattern that is already present replaces its handler in
    /// place; the last registration wins.
    ///
    /// # Errors
    ///
    /// [`MappingError::MissingHandlerName`] for an empty handler name,
    /// [`MappingError::InvalidPattern`] for a malformed pattern.
    pub fn add(&mut self, record: MappingRecord) -> MappingResult<()> {
        if record.handler_name.is_empty() {
            return Err(MappingError::MissingHandlerName {
                pattern: record.pattern,
            });
        }
        let pattern = UrlPattern::parse(&record.pattern)?;
        self.insert(pattern, Arc::from(record.handler_name));
        Ok(())
    }

    /// Installs the default handler without a `/` mapping record.
    pub fn set_default(&mut self, handler_name: impl Into<String>) -> MappingResult<()> {
        let handler_name = handler_name.into();
        if handler_name.is_empty() {
            return Err(MappingError::MissingHandlerName {
                pattern: "/".to_string(),
            });
        }
        self.insert(UrlPattern::default_pattern(), Arc::from(handler_name));
        Ok(())
    }

    fn insert(&mut self, pattern: UrlPattern, handler: Arc<str>) {
        let raw = pattern.as_str().to_string();
        let kind = pattern.kind();
        let mapping = Mapping {
            pattern,
            handler: Arc::clone(&handler),
        };

        let previous = match kind {
            PatternKind::Exact => self.exact.insert(raw.clone(), mapping).map(|m| m.handler),
            PatternKind::Prefix => Self::upsert_prefix(&mut self.prefix, mapping),
            PatternKind::Extension => Self::upsert_extension(&mut self.extension, mapping),
            PatternKind::Default => self.default.replace(mapping).map(|m| m.handler),
        };

        if let Some(previous) = previous {
            warn!(
                pattern = %raw,
                previous = %previous,
                handler = %handler,
                "Pattern mapped twice, last registration wins"
            );
            if previous != handler
                && let Some(patterns) = self.by_handler.get_mut(&previous)
            {
                patterns.retain(|p| *p != raw);
            }
        }

        let patterns = self.by_handler.entry(Arc::clone(&handler)).or_default();
        if !patterns.contains(&raw) {
            patterns.push(raw.clone());
        }

        debug!(pattern = %raw, handler = %handler, rule = %kind, "Mapping registered");
    }

    /// Inserts keeping the longest-first order, returning the replaced handler.
    fn upsert_prefix(prefixes: &mut Vec<Mapping>, mapping: Mapping) -> Option<Arc<str>> {
        if let Some(existing) = prefixes.iter_mut().find(|m| m.pattern == mapping.pattern) {
            return Some(std::mem::replace(&mut existing.handler, mapping.handler));
        }
        let len = prefix_len(&mapping.pattern);
        let pos = prefixes.partition_point(|m| prefix_len(&m.pattern) >= len);
        prefixes.insert(pos, mapping);
        None
    }

    /// Appends keeping declaration order, returning the replaced handler.
    fn upsert_extension(extensions: &mut Vec<Mapping>, mapping: Mapping) -> Option<Arc<str>> {
        if let Some(existing) = extensions.iter_mut().find(|m| m.pattern == mapping.pattern) {
            return Some(std::mem::replace(&mut existing.handler, mapping.handler));
        }
        extensions.push(mapping);
        None
    }

    /// Returns the handler name for `path`, or `None` when nothing matches and
    /// no default is registered.
    pub fn resolve(&self, path: &str) -> Option<&str> {
        self.resolve_route(path).map(|route| route.handler())
    }

    /// Like [`resolve`](Self::resolve), also reporting which rule and pattern
    /// matched.
    pub fn resolve_route(&self, path: &str) -> Option<RouteMatch<'_>> {
        PatternKind::PRECEDENCE
            .iter()
            .find_map(|&kind| self.lookup(kind, path))
    }

    fn lookup(&self, kind: PatternKind, path: &str) -> Option<RouteMatch<'_>> {
        let mapping = match kind {
            PatternKind::Exact => self.exact.get(path),
            PatternKind::Prefix => self.prefix.iter().find(|m| m.pattern.matches(path)),
            PatternKind::Extension => self.extension.iter().find(|m| m.pattern.matches(path)),
            PatternKind::Default => self.default.as_ref(),
        }?;

        Some(RouteMatch {
            pattern: &mapping.pattern,
            handler: &mapping.handler,
        })
    }

    /// Returns the handler mapped to the literal `pattern`.
    pub fn mapping(&self, pattern: &str) -> Option<&str> {
        let found = self
            .exact
            .get(pattern)
            .or_else(|| self.prefix.iter().find(|m| m.pattern.as_str() == pattern))
            .or_else(|| self.extension.iter().find(|m| m.pattern.as_str() == pattern))
            .or_else(|| self.default.as_ref().filter(|_| pattern == "/"))?;
        Some(&*found.handler)
    }

    /// Returns the patterns declared for `handler_name`, in declaration order.
    pub fn patterns_for(&self, handler_name: &str) -> &[String] {
        self.by_handler
            .get(handler_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns the default handler name, if one is installed.
    pub fn default_handler(&self) -> Option<&str> {
        self.default.as_ref().map(|m| &*m.handler)
    }

    /// Returns the number of distinct patterns registered.
    pub fn len(&self) -> usize {
        self.exact.len() + self.prefix.len() + self.extension.len() + self.default.iter().count()
    }

    /// Returns `true` if no pattern is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn prefix_len(pattern: &UrlPattern) -> usize {
    pattern.prefix().map_or(0, str::len)
}
