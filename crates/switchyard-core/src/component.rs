//! Traits implemented by request handlers and filters.
//!
//! Both traits are object safe; registries store `Arc<dyn Handler>` and
//! `Arc<dyn Filter>`. For simple synchronous logic, [`handler_fn`] and
//! [`filter_fn`] wrap a closure.

use std::error::Error as StdError;

use async_trait::async_trait;

use crate::exchange::Exchange;

/// Boxed error returned by user components.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// What a filter wants to happen after its `before` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterFlow {
    /// Run the rest of the chain.
    Continue,
    /// Skip the remaining filters and the handler.
    Halt,
}

/// The unit of request-processing logic selected by a route.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Produces the response for `exchange`.
    async fn handle(&self, exchange: &mut Exchange) -> Result<(), BoxError>;

    /// Releases resources at shutdown. Called at most once per instance.
    fn destroy(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// An interceptor wrapping handler invocation.
#[async_trait]
pub trait Filter: Send + Sync + 'static {
    /// Runs before the handler, in chain order.
    async fn before(&self, exchange: &mut Exchange) -> Result<FilterFlow, BoxError>;

    /// Runs after the handler, in reverse chain order. Only called when
    /// `before` ran for this filter.
    async fn after(&self, _exchange: &mut Exchange) -> Result<(), BoxError> {
        Ok(())
    }

    /// Releases resources at shutdown. Called at most once per instance.
    fn destroy(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A [`Handler`] backed by a synchronous closure.
pub struct HandlerFn<F> {
    f: F,
}

/// Wraps a closure as a [`Handler`].
///
/// ```rust,ignore
/// let hello = handler_fn(|exchange: &mut Exchange| {
///     exchange.set_body("hello");
///     Ok(())
/// });
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&mut Exchange) -> Result<(), BoxError> + Send + Sync + 'static,
{
    HandlerFn { f }
}

#[async_trait]
impl<F> Handler for HandlerFn<F>
where
    F: Fn(&mut Exchange) -> Result<(), BoxError> + Send + Sync + 'static,
{
    async fn handle(&self, exchange: &mut Exchange) -> Result<(), BoxError> {
        (self.f)(exchange)
    }
}

/// A [`Filter`] whose `before` hook is a synchronous closure.
pub struct FilterFn<F> {
    f: F,
}

/// Wraps a closure as a [`Filter`].
pub fn filter_fn<F>(f: F) -> FilterFn<F>
where
    F: Fn(&mut Exchange) -> Result<FilterFlow, BoxError> + Send + Sync + 'static,
{
    FilterFn { f }
}

#[async_trait]
impl<F> Filter for FilterFn<F>
where
    F: Fn(&mut Exchange) -> Result<FilterFlow, BoxError> + Send + Sync + 'static,
{
    async fn before(&self, exchange: &mut Exchange) -> Result<FilterFlow, BoxError> {
        (self.f)(exchange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_fn() {
        let handler = handler_fn(|exchange: &mut Exchange| {
            exchange.set_body(format!("served {}", exchange.path()));
            Ok(())
        });
        let mut exchange = Exchange::new("/x");
        tokio_test::block_on(handler.handle(&mut exchange)).unwrap();
        assert_eq!(exchange.body(), "served /x");
        assert!(handler.destroy().is_ok());
    }

    #[test]
    fn test_filter_fn_defaults() {
        let filter = filter_fn(|exchange: &mut Exchange| {
            if exchange.path().starts_with("/private") {
                Ok(FilterFlow::Halt)
            } else {
                Ok(FilterFlow::Continue)
            }
        });

        let mut open = Exchange::new("/public");
        let mut closed = Exchange::new("/private/x");
        assert_eq!(
            tokio_test::block_on(filter.before(&mut open)).unwrap(),
            FilterFlow::Continue
        );
        assert_eq!(
            tokio_test::block_on(filter.before(&mut closed)).unwrap(),
            FilterFlow::Halt
        );
        assert!(tokio_test::block_on(filter.after(&mut open)).is_ok());
    }
}
