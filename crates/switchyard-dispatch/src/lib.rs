//! # Switchyard Dispatch
//!
//! Registries, chain assembly and the dispatcher for the Switchyard engine.
//!
//! This crate provides:
//! - [`HandlerRegistry`] and [`FilterRegistry`], holding component
//!   definitions and their lazily constructed instances
//! - [`FilterAssociation`] for attaching filters to URL patterns and handlers
//! - [`ChainBuilder`] and [`Chain`], the per-request execution plan
//! - [`Dispatcher`], the facade combining resolution and chain assembly
//! - [`LifecycleReport`], the outcome of warm-up and shutdown passes

pub mod chain;
pub mod dispatcher;
pub mod filter;
pub mod handler;
pub mod lifecycle;

mod instance;
mod named;

pub use chain::{Chain, ChainBuilder};
pub use dispatcher::Dispatcher;
pub use filter::{FilterAssociation, FilterConfig, FilterFactory, FilterRegistry};
pub use handler::{HandlerConfig, HandlerFactory, HandlerRegistry};
pub use instance::InstanceStatus;
pub use lifecycle::{LifecycleFailure, LifecycleReport};
