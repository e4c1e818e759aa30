use super::{types::Config, ConfigError, PageSizeRange};

/// Validate configuration
/// Currently validates:
/// - At least one catalog category is crawled
/// - Page-size ranges are non-empty and never request zero items
/// - Timeouts are non-zero
/// - An enabled mirror has a host and credentials
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.catalog.categories.is_empty() {
        return Err(ConfigError::ValidationError(
            "catalog.categories cannot be empty".to_string(),
        ));
    }

    check_range("catalog.full_page_size", config.catalog.full_page_size)?;
    check_range(
        "catalog.incremental_page_size",
        config.catalog.incremental_page_size,
    )?;

    if config.http.connect_timeout_secs == 0 || config.http.read_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "http timeouts cannot be 0".to_string(),
        ));
    }

    if config.mirror.enabled {
        if config.mirror.host.is_empty() {
            return Err(ConfigError::ValidationError(
                "mirror.host is required when the mirror is enabled".to_string(),
            ));
        }
        if config.mirror.username.is_empty() {
            return Err(ConfigError::ValidationError(
                "mirror.username is required when the mirror is enabled".to_string(),
            ));
        }
    }

    if config.schedule.full_sweep_every == 0 {
        return Err(ConfigError::ValidationError(
            "schedule.full_sweep_every cannot be 0".to_string(),
        ));
    }

    Ok(())
}

fn check_range(name: &str, range: PageSizeRange) -> Result<(), ConfigError> {
    if range.min == 0 || range.min > range.max {
        return Err(ConfigError::ValidationError(format!(
            "{} must satisfy 0 < min <= max (got {}..={})",
            name, range.min, range.max
        )));
    }
    Ok(())
}
