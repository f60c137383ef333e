//! Execution chains.
//!
//! A [`Chain`] is the data describing one request's processing: the filters
//! that apply, in order, and a terminal step. The terminal is either the
//! routed handler or a bare status for requests nothing matched.
//!
//! Chains are built fresh per request by [`ChainBuilder`] and never change
//! after construction, so their contents can be inspected without running
//! anything:
//!
//! ```rust,ignore
//! let chain = dispatcher.dispatch("/admin/users")?;
//! assert_eq!(chain.filter_names(), vec!["auth", "audit"]);
//! assert_eq!(chain.handler_name(), Some("users"));
//!
//! let exchange = chain.invoke(Exchange::new("/admin/users")).await?;
//! ```
//!
//! # Invocation
//!
//! Filters run their `before` hooks in order. A filter returning
//! [`FilterFlow::Halt`] stops the walk and the handler is skipped. Afterwards
//! every filter whose `before` ran gets its `after` hook, last to first. An
//! error from any step aborts the chain and is returned as is.

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tower::Service;
use tracing::{debug, trace};

use switchyard_core::{
    BoxError, DispatchResult, Exchange, Filter, FilterFlow, Handler, RouteMatch, status,
};

use crate::filter::FilterRegistry;
use crate::handler::HandlerRegistry;

#[derive(Clone)]
struct FilterStep {
    name: String,
    filter: Arc<dyn Filter>,
}

#[derive(Clone)]
enum Terminal {
    Handler {
        name: String,
        handler: Arc<dyn Handler>,
        servlet_path: String,
        path_info: Option<String>,
    },
    Status(u16),
}

/// The ordered filters and terminal step for one request.
#[derive(Clone)]
pub struct Chain {
    filters: Vec<FilterStep>,
    terminal: Terminal,
}

impl Chain {
    /// A chain for a request that matched nothing. Invoking it sets status 404.
    pub fn not_found() -> Self {
        Self {
            filters: Vec::new(),
            terminal: Terminal::Status(status::NOT_FOUND),
        }
    }

    /// Filter names in execution order.
    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|step| step.name.as_str()).collect()
    }

    /// The terminal handler, if the request was routed.
    pub fn handler_name(&self) -> Option<&str> {
        match &self.terminal {
            Terminal::Handler { name, .. } => Some(name.as_str()),
            Terminal::Status(_) => None,
        }
    }

    /// The terminal status, for chains that end without a handler.
    pub fn status(&self) -> Option<u16> {
        match self.terminal {
            Terminal::Status(code) => Some(code),
            Terminal::Handler { .. } => None,
        }
    }

    /// Returns `true` for the not-found chain.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(status::NOT_FOUND)
    }

    /// The part of the path consumed by the mapping.
    pub fn servlet_path(&self) -> Option<&str> {
        match &self.terminal {
            Terminal::Handler { servlet_path, .. } => Some(servlet_path.as_str()),
            Terminal::Status(_) => None,
        }
    }

    /// The remainder of the path after the servlet path.
    pub fn path_info(&self) -> Option<&str> {
        match &self.terminal {
            Terminal::Handler { path_info, .. } => path_info.as_deref(),
            Terminal::Status(_) => None,
        }
    }

    /// Runs the chain against `exchange` and returns it once every step is done.
    pub async fn invoke(&self, mut exchange: Exchange) -> Result<Exchange, BoxError> {
        let (name, handler) = match &self.terminal {
            Terminal::Status(code) => {
                exchange.set_status(*code);
                return Ok(exchange);
            }
            Terminal::Handler {
                name,
                handler,
                servlet_path,
                path_info,
            } => {
                exchange.set_route(name.as_str(), servlet_path.as_str(), path_info.clone());
                (name, handler)
            }
        };

        let mut entered = 0;
        let mut halted = false;
        for step in &self.filters {
            trace!(filter = %step.name, "Entering filter");
            entered += 1;
            if step.filter.before(&mut exchange).await? == FilterFlow::Halt {
                debug!(filter = %step.name, handler = %name, "Filter halted chain");
                halted = true;
                break;
            }
        }

        if !halted {
            trace!(handler = %name, "Invoking handler");
            handler.handle(&mut exchange).await?;
        }

        for step in self.filters[..entered].iter().rev() {
            trace!(filter = %step.name, "Leaving filter");
            step.filter.after(&mut exchange).await?;
        }

        Ok(exchange)
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Chain");
        s.field("filters", &self.filter_names());
        match &self.terminal {
            Terminal::Handler {
                name,
                servlet_path,
                path_info,
                ..
            } => s
                .field("handler", name)
                .field("servlet_path", servlet_path)
                .field("path_info", path_info),
            Terminal::Status(code) => s.field("status", code),
        };
        s.finish()
    }
}

impl Service<Exchange> for Chain {
    type Response = Exchange;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Exchange, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, exchange: Exchange) -> Self::Future {
        let chain = self.clone();
        Box::pin(async move { chain.invoke(exchange).await })
    }
}

// =============================================================================
// ChainBuilder
// =============================================================================

/// Assembles chains from a resolved route and the two registries.
#[derive(Debug, Clone, Copy)]
pub struct ChainBuilder<'a> {
    filters: &'a FilterRegistry,
    handlers: &'a HandlerRegistry,
}

impl<'a> ChainBuilder<'a> {
    /// Creates a builder over the given registries.
    pub fn new(filters: &'a FilterRegistry, handlers: &'a HandlerRegistry) -> Self {
        Self { filters, handlers }
    }

    /// Builds the chain for `path`.
    ///
    /// With no route the result is [`Chain::not_found`]. Otherwise every
    /// applicable filter and the handler are instantiated; the first failure
    /// aborts the build and no partial chain is returned.
    pub fn build(&self, route: Option<RouteMatch<'_>>, path: &str) -> DispatchResult<Chain> {
        let Some(route) = route else {
            debug!(path = %path, "No route matched");
            return Ok(Chain::not_found());
        };

        let handler_name = route.handler();
        let filters = self
            .filters
            .matching_filters(path, handler_name)
            .into_iter()
            .map(|name| {
                self.filters.get_instance(name).map(|filter| FilterStep {
                    name: name.to_string(),
                    filter,
                })
            })
            .collect::<DispatchResult<Vec<_>>>()?;

        let handler = self.handlers.get_or_create_instance(handler_name)?;
        let (servlet_path, path_info) = route.split(path);

        debug!(
            path = %path,
            handler = %handler_name,
            pattern = %route.pattern(),
            rule = %route.rule(),
            filters = filters.len(),
            "Built chain"
        );

        Ok(Chain {
            filters,
            terminal: Terminal::Handler {
                name: handler_name.to_string(),
                handler,
                servlet_path: servlet_path.to_string(),
                path_info: path_info.map(str::to_string),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use switchyard_core::{DispatchError, PatternIndex, handler_fn};
    use tower::ServiceExt;

    use crate::filter::FilterConfig;
    use crate::handler::HandlerConfig;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recording {
        name: &'static str,
        log: Log,
        flow: FilterFlow,
    }

    #[async_trait]
    impl Filter for Recording {
        async fn before(&self, _: &mut Exchange) -> Result<FilterFlow, BoxError> {
            self.log.lock().unwrap().push(format!("{}:before", self.name));
            Ok(self.flow)
        }

        async fn after(&self, _: &mut Exchange) -> Result<(), BoxError> {
            self.log.lock().unwrap().push(format!("{}:after", self.name));
            Ok(())
        }
    }

    struct Fixture {
        index: PatternIndex,
        filters: FilterRegistry,
        handlers: HandlerRegistry,
        log: Log,
    }

    impl Fixture {
        fn new() -> Self {
            let log: Log = Arc::new(Mutex::new(Vec::new()));
            let mut handlers = HandlerRegistry::new();
            let handler_log = Arc::clone(&log);
            handlers
                .register(HandlerConfig::from_instance(
                    "app",
                    handler_fn(move |exchange: &mut Exchange| {
                        handler_log.lock().unwrap().push("app".to_string());
                        exchange.set_body("done");
                        Ok(())
                    }),
                ))
                .unwrap();

            let mut index = PatternIndex::new();
            index
                .add(switchyard_core::MappingRecord::new("/app/*", "app"))
                .unwrap();

            Self {
                index,
                filters: FilterRegistry::new(),
                handlers,
                log,
            }
        }

        fn filter(&mut self, name: &'static str, flow: FilterFlow, url: &str) {
            self.filters
                .register(FilterConfig::from_instance(
                    name,
                    Recording {
                        name,
                        log: Arc::clone(&self.log),
                        flow,
                    },
                ))
                .unwrap();
            self.filters.associate(name, [url], Vec::<String>::new()).unwrap();
        }

        fn build(&self, path: &str) -> DispatchResult<Chain> {
            ChainBuilder::new(&self.filters, &self.handlers)
                .build(self.index.resolve_route(path), path)
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[test]
    fn test_not_found_chain() {
        let fixture = Fixture::new();
        let chain = fixture.build("/elsewhere").unwrap();
        assert!(chain.is_not_found());
        assert_eq!(chain.handler_name(), None);
        assert!(chain.filter_names().is_empty());

        let exchange = tokio_test::block_on(chain.invoke(Exchange::new("/elsewhere"))).unwrap();
        assert_eq!(exchange.status(), status::NOT_FOUND);
        assert!(fixture.log().is_empty());
    }

    #[test]
    fn test_chain_contents() {
        let mut fixture = Fixture::new();
        fixture.filter("outer", FilterFlow::Continue, "/*");
        fixture.filter("other", FilterFlow::Continue, "*.css");
        fixture.filter("inner", FilterFlow::Continue, "/app/*");

        let chain = fixture.build("/app/users/7").unwrap();
        assert_eq!(chain.filter_names(), vec!["outer", "inner"]);
        assert_eq!(chain.handler_name(), Some("app"));
        assert_eq!(chain.servlet_path(), Some("/app"));
        assert_eq!(chain.path_info(), Some("/users/7"));
        assert_eq!(chain.status(), None);
    }

    #[tokio::test]
    async fn test_invoke_order() {
        let mut fixture = Fixture::new();
        fixture.filter("a", FilterFlow::Continue, "/*");
        fixture.filter("b", FilterFlow::Continue, "/*");

        let chain = fixture.build("/app/x").unwrap();
        let exchange = chain.invoke(Exchange::new("/app/x")).await.unwrap();

        assert_eq!(exchange.body(), "done");
        assert_eq!(exchange.handler_name(), Some("app"));
        assert_eq!(exchange.servlet_path(), "/app");
        assert_eq!(exchange.path_info(), Some("/x"));
        assert_eq!(
            fixture.log(),
            vec!["a:before", "b:before", "app", "b:after", "a:after"]
        );
    }

    #[tokio::test]
    async fn test_halt_skips_handler() {
        let mut fixture = Fixture::new();
        fixture.filter("a", FilterFlow::Continue, "/*");
        fixture.filter("gate", FilterFlow::Halt, "/*");
        fixture.filter("c", FilterFlow::Continue, "/*");

        let chain = fixture.build("/app").unwrap();
        let exchange = chain.invoke(Exchange::new("/app")).await.unwrap();

        assert_eq!(exchange.body(), "");
        assert_eq!(
            fixture.log(),
            vec!["a:before", "gate:before", "gate:after", "a:after"]
        );
    }

    #[tokio::test]
    async fn test_handler_error_propagates() {
        let mut handlers = HandlerRegistry::new();
        handlers
            .register(HandlerConfig::from_instance(
                "fail",
                handler_fn(|_: &mut Exchange| Err("handler exploded".into())),
            ))
            .unwrap();
        let mut index = PatternIndex::new();
        index
            .add(switchyard_core::MappingRecord::new("/fail", "fail"))
            .unwrap();
        let filters = FilterRegistry::new();

        let chain = ChainBuilder::new(&filters, &handlers)
            .build(index.resolve_route("/fail"), "/fail")
            .unwrap();
        let err = chain.invoke(Exchange::new("/fail")).await.unwrap_err();
        assert_eq!(err.to_string(), "handler exploded");
    }

    #[test]
    fn test_build_aborts_on_filter_failure() {
        let mut fixture = Fixture::new();
        fixture.filter("ok", FilterFlow::Continue, "/*");
        fixture
            .filters
            .register(FilterConfig::new("broken", |_| Err("bad".into())))
            .unwrap();
        fixture
            .filters
            .associate("broken", ["/app/*"], Vec::<String>::new())
            .unwrap();

        let err = fixture.build("/app/x").err().unwrap();
        assert!(matches!(err, DispatchError::Construction { ref name, .. } if name == "broken"));
        assert!(fixture.build("/other").unwrap().is_not_found());
    }

    #[test]
    fn test_build_unknown_handler() {
        let mut fixture = Fixture::new();
        fixture
            .index
            .add(switchyard_core::MappingRecord::new("*.txt", "missing"))
            .unwrap();
        let err = fixture.build("/notes/a.txt").err().unwrap();
        assert_eq!(
            err,
            DispatchError::UnknownHandler {
                name: "missing".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_chain_as_tower_service() {
        let mut fixture = Fixture::new();
        fixture.filter("a", FilterFlow::Continue, "/*");
        let chain = fixture.build("/app").unwrap();

        let exchange = chain.oneshot(Exchange::new("/app")).await.unwrap();
        assert_eq!(exchange.body(), "done");
        assert_eq!(fixture.log(), vec!["a:before", "app", "a:after"]);
    }
}
