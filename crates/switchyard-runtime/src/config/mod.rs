//! Configuration module for the Switchyard runtime.
//!
//! This module provides layered configuration loading (defaults, files,
//! environment) and validation for logging, dispatch behavior, mappings and
//! filter associations.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    DispatchSettings, FilterMappingConfig, FilterSettings, HandlerSettings, LogFormat, LogLevel,
    LogOutput, LoggingConfig, SpanEventConfig, SwitchyardConfig,
};
pub use validation::validate_config;
