//! # Switchyard
//!
//! A servlet-style request-dispatch engine for Rust.
//!
//! ## Overview
//!
//! Given a request path, Switchyard picks exactly one handler and the ordered
//! filters that wrap it. Matching follows a fixed precedence:
//!
//! ```text
//! exact  >  longest prefix (/api/*)  >  extension (*.jsp)  >  default (/)
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  path   ┌────────────┐  route  ┌──────────────┐
//! │ Transport  │────────▶│ Dispatcher │────────▶│ ChainBuilder │
//! └────────────┘         └────────────┘         └──────────────┘
//!        ▲                 │ PatternIndex              │
//!        │                 │ HandlerRegistry           ▼
//!        │                 │ FilterRegistry    ┌──────────────────────────┐
//!        └─────────────────────────────────────│ filter.. ▶ handler ▶ ..  │
//!                       Exchange               └──────────────────────────┘
//! ```
//!
//! - **Core**: patterns, the pattern index, the `Handler`/`Filter` traits
//! - **Dispatch**: registries with lazy at-most-once construction, chains
//! - **Runtime**: configuration, logging, warm-up and shutdown
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use switchyard::prelude::*;
//!
//! struct Hello;
//!
//! #[async_trait]
//! impl Handler for Hello {
//!     async fn handle(&self, exchange: &mut Exchange) -> Result<(), BoxError> {
//!         exchange.set_body("hello");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut runtime = SwitchyardRuntime::new();
//!     runtime
//!         .handler(HandlerConfig::from_instance("hello", Hello))?
//!         .mapping("/hello/*", "hello")?;
//!
//!     let running = runtime.start()?;
//!     let response = running.serve("/hello/world").await;
//!     assert_eq!(response.body(), "hello");
//!
//!     running.run_until_signal().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: Load `switchyard.toml` (default)
//! - `yaml-config`: Load `switchyard.yaml`
//! - `json-log`: JSON log output

pub use switchyard_core as core;
pub use switchyard_dispatch as dispatch;
pub use switchyard_runtime as runtime;

pub use async_trait::async_trait;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use switchyard::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use switchyard_runtime::{RunningRuntime, SwitchyardConfig, SwitchyardRuntime};

    // Components - what users implement
    pub use switchyard_core::{
        BoxError, Exchange, Filter, FilterFlow, Handler, filter_fn, handler_fn, status,
    };

    // Registration
    pub use switchyard_dispatch::{
        Chain, Dispatcher, FilterAssociation, FilterConfig, HandlerConfig,
    };

    // Errors
    pub use switchyard_core::{DispatchError, MappingError, RegistrationError};
    pub use switchyard_runtime::{ConfigError, RuntimeError};

    pub use async_trait::async_trait;
}
