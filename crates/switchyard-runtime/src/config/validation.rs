//! Configuration validation utilities.
//!
//! Validation runs before anything is registered, so a bad pattern in a
//! config file is reported with its location instead of surfacing later as a
//! registration failure.

use switchyard_core::{MappingRecord, UrlPattern};

use super::error::{ConfigError, ConfigResult};
use super::schema::{FilterMappingConfig, LogOutput, LoggingConfig, SwitchyardConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &SwitchyardConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_mappings(&config.mappings)?;
    validate_filter_mappings(&config.filter_mappings)?;

    if let Some(handler) = &config.default_handler
        && handler.is_empty()
    {
        return Err(ConfigError::validation("default_handler cannot be empty"));
    }

    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if let Some(target) = logging.filters.keys().find(|target| target.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid logging filter target: {target:?}"
        )));
    }

    Ok(())
}

/// Validates handler mappings.
fn validate_mappings(mappings: &[MappingRecord]) -> ConfigResult<()> {
    for (i, mapping) in mappings.iter().enumerate() {
        if mapping.handler_name.is_empty() {
            return Err(ConfigError::missing_field(format!("mappings[{i}].handler")));
        }

        UrlPattern::parse(&mapping.pattern)
            .map_err(|e| ConfigError::invalid_pattern(format!("mappings[{i}]"), e))?;
    }

    Ok(())
}

/// Validates filter associations.
fn validate_filter_mappings(filter_mappings: &[FilterMappingConfig]) -> ConfigResult<()> {
    for (i, mapping) in filter_mappings.iter().enumerate() {
        if mapping.filter_name.is_empty() {
            return Err(ConfigError::missing_field(format!("filter_mappings[{i}].filter")));
        }

        if mapping.url_patterns.is_empty() && mapping.handler_names.is_empty() {
            return Err(ConfigError::validation(format!(
                "Filter mapping for '{}' needs at least one url pattern or handler name",
                mapping.filter_name
            )));
        }

        for pattern in &mapping.url_patterns {
            UrlPattern::parse(pattern).map_err(|e| {
                ConfigError::invalid_pattern(format!("filter_mappings[{i}].url_patterns"), e)
            })?;
        }

        if mapping.handler_names.iter().any(String::is_empty) {
            return Err(ConfigError::validation(format!(
                "Filter mapping for '{}' has an empty handler name",
                mapping.filter_name
            )));
        }
    }

    Ok(())
}
