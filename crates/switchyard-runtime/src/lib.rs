//! Switchyard Runtime - Orchestration layer for the Switchyard dispatch engine.
//!
//! This crate provides:
//! - Layered configuration loading (`ConfigLoader`, `SwitchyardConfig`)
//! - Logging setup (`LoggingBuilder`, `init_from_config`)
//! - The setup and serving phases (`SwitchyardRuntime`, `RunningRuntime`)
//!
//! # Configuration Sources
//!
//! Configuration is merged from, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. Values merged programmatically with [`RuntimeBuilder::merge`]
//! 3. `switchyard.<profile>.toml` and `switchyard.toml` from the search paths
//! 4. `SWITCHYARD_*` environment variables (`__` separates nested keys)
//!
//! ```ignore
//! use switchyard_runtime::SwitchyardRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut runtime = SwitchyardRuntime::builder()
//!         .profile("production")
//!         .build()?;
//!
//!     runtime.handler(HandlerConfig::from_instance("api", ApiHandler))?;
//!
//!     let running = runtime.start()?;
//!     running.run_until_signal().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{
    ConfigError, ConfigLoader, ConfigResult, DispatchSettings, Profile, SwitchyardConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, init_from_config};
pub use runtime::{RunningRuntime, RuntimeBuilder, SwitchyardRuntime};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, span, trace, warn};
}
