use crate::config::types::{ClassifierConfig, Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use crate::crawler::AssetCategory;
use crate::ConfigError;
use regex::RegexBuilder;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_classifier_config(&config.classifier)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.default_max_pages < 1 {
        return Err(ConfigError::Validation(
            "default_max_pages must be >= 1, got 0".to_string(),
        ));
    }

    if config.page_timeout_secs < 1 || config.asset_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeouts must be >= 1s, got page={}s asset={}s",
            config.page_timeout_secs, config.asset_timeout_secs
        )));
    }

    // Assets are usually larger than the pages that embed them
    if config.asset_timeout_secs < config.page_timeout_secs {
        return Err(ConfigError::Validation(format!(
            "asset_timeout_secs ({}) must be >= page_timeout_secs ({})",
            config.asset_timeout_secs, config.page_timeout_secs
        )));
    }

    if config.page_delay_ms < config.asset_delay_ms {
        return Err(ConfigError::Validation(format!(
            "page_delay_ms ({}) must be >= asset_delay_ms ({})",
            config.page_delay_ms, config.asset_delay_ms
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.value.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user agent cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_dir.is_empty() {
        return Err(ConfigError::Validation(
            "data_dir cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates classifier rules: known categories, compilable patterns
fn validate_classifier_config(config: &ClassifierConfig) -> Result<(), ConfigError> {
    for rule in &config.rules {
        if rule.category != "any" && AssetCategory::from_config_str(&rule.category).is_none() {
            return Err(ConfigError::InvalidPattern(format!(
                "unknown rule category '{}'",
                rule.category
            )));
        }

        RegexBuilder::new(&rule.pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                ConfigError::InvalidPattern(format!("'{}': {}", rule.pattern, e))
            })?;
    }
    Ok(())
}
