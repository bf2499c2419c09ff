// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Collects every problem instead of failing on the first one.

use crate::diagnostic::ConfigError;
use crate::model::AtendenteConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &AtendenteConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.agent.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "agent.log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.agent.log_level
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.gemini.max_retries == 0 {
        errors.push(ConfigError::validation(
            "gemini.max_retries must be at least 1",
        ));
    }

    if config.gemini.timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "gemini.timeout_secs must be at least 1",
        ));
    }

    let bridge = config.transport.bridge_url.as_str();
    if !(bridge.starts_with("ws://") || bridge.starts_with("wss://")) {
        errors.push(ConfigError::validation(format!(
            "transport.bridge_url must start with ws:// or wss://, got `{bridge}`"
        )));
    }

    if config.transport.event_buffer == 0 {
        errors.push(ConfigError::validation(
            "transport.event_buffer must be at least 1",
        ));
    }

    if config.automation.history_limit == 0 {
        errors.push(ConfigError::validation(
            "automation.history_limit must be at least 1",
        ));
    }

    if let Some(hours) = &config.automation.business_hours
        && let Err(message) = hours.to_business_hours()
    {
        errors.push(ConfigError::validation(format!(
            "automation.business_hours.{message}"
        )));
    }

    if config.delivery.max_segment_length == 0 {
        errors.push(ConfigError::validation(
            "delivery.max_segment_length must be at least 1",
        ));
    }

    let knowledge = &config.knowledge;
    if knowledge.chunk_size == 0 {
        errors.push(ConfigError::validation(
            "knowledge.chunk_size must be at least 1",
        ));
    } else if knowledge.chunk_overlap >= knowledge.chunk_size {
        errors.push(ConfigError::validation(format!(
            "knowledge.chunk_overlap ({}) must be smaller than knowledge.chunk_size ({})",
            knowledge.chunk_overlap, knowledge.chunk_size
        )));
    }

    if !(1..=5).contains(&knowledge.top_k) {
        errors.push(ConfigError::validation(format!(
            "knowledge.top_k must be between 1 and 5, got {}",
            knowledge.top_k
        )));
    }

    if config.gateway.enabled && config.gateway.host.trim().is_empty() {
        errors.push(ConfigError::validation("gateway.host must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
