//! # Switchyard Core
//!
//! The leaf layer of the Switchyard dispatch engine.
//!
//! This crate provides:
//! - URL pattern parsing and the four matching rules ([`UrlPattern`], [`PatternKind`])
//! - The path-to-handler lookup structure ([`PatternIndex`])
//! - The [`Handler`] and [`Filter`] traits implemented by user components
//! - The [`Exchange`] carried through a chain
//! - Error types shared by every layer
//!
//! Registries, chain assembly and the dispatcher live in `switchyard-dispatch`.

pub mod component;
pub mod error;
pub mod exchange;
pub mod index;
pub mod pattern;

pub use component::{
    BoxError, Filter, FilterFlow, FilterFn, Handler, HandlerFn, filter_fn, handler_fn,
};
pub use error::{
    ComponentKind, DispatchError, DispatchResult, MappingError, MappingResult, RegistrationError,
    RegistrationResult,
};
pub use exchange::{Exchange, status};
pub use index::{MappingRecord, PatternIndex, RouteMatch};
pub use pattern::{PatternKind, UrlPattern};
