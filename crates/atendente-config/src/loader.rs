// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `/etc/atendente/atendente.toml`, then
//! `~/.config/atendente/atendente.toml`, then `./atendente.toml`, with
//! `ATENDENTE_` environment variables applied last.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::AtendenteConfig;

/// Config sections addressable from the environment.
const ENV_SECTIONS: &[&str] = &[
    "agent",
    "storage",
    "gemini",
    "transport",
    "automation",
    "delivery",
    "knowledge",
    "gateway",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
pub fn load_config() -> Result<AtendenteConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<AtendenteConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AtendenteConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<AtendenteConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AtendenteConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment used for standard config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(AtendenteConfig::default()))
        .merge(Toml::file("/etc/atendente/atendente.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("atendente/atendente.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("atendente.toml"))
        .merge(env_provider())
}

/// Maps `ATENDENTE_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `ATENDENTE_GEMINI_API_KEY` maps to `gemini.api_key`.
pub fn env_provider() -> Env {
    Env::prefixed("ATENDENTE_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_section_prefix_to_dotted_key() {
        assert_eq!(map_env_key("gemini_api_key"), "gemini.api_key");
        assert_eq!(
            map_env_key("transport_reconnect_delay_secs"),
            "transport.reconnect_delay_secs"
        );
        assert_eq!(map_env_key("agent_log_level"), "agent.log_level");
    }

    #[test]
    fn unknown_section_is_left_alone() {
        assert_eq!(map_env_key("whatever_key"), "whatever_key");
    }
}
