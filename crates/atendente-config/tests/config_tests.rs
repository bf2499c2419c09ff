// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the configuration system.

use atendente_config::diagnostic::ConfigError;
use atendente_config::{load_and_validate_str, load_config_from_path, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[agent]
name = "loja"
log_level = "debug"

[storage]
database_path = "/tmp/atendente-test.db"
wal_mode = false

[gemini]
api_key = "AIza-test"
model = "gemini-2.0-flash"
max_retries = 5

[transport]
bridge_url = "ws://bridge:3010"
reconnect_delay_secs = 5

[automation]
welcome_message = "Olá! Seja bem-vindo."
out_of_hours_message = "Estamos fechados agora."
faq = "Horário: seg a sex, 9h às 18h."
history_limit = 10

[automation.business_hours]
utc_offset_minutes = -180

[[automation.business_hours.windows]]
days = ["mon", "tue", "wed", "thu", "fri"]
open = "09:00"
close = "18:00"

[delivery]
max_segment_length = 500

[knowledge]
top_k = 5

[gateway]
port = 8080
bearer_token = "secret"
"#;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.agent.name, "loja");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.gemini.api_key.as_deref(), Some("AIza-test"));
    assert_eq!(config.gemini.max_retries, 5);
    assert_eq!(config.transport.reconnect_delay_secs, 5);
    assert_eq!(
        config.automation.welcome_message.as_deref(),
        Some("Olá! Seja bem-vindo.")
    );
    assert_eq!(config.automation.history_limit, 10);
    let hours = config
        .automation
        .business_hours
        .expect("business hours")
        .to_business_hours()
        .expect("parses");
    assert_eq!(hours.utc_offset_minutes, -180);
    assert_eq!(hours.windows.len(), 5);
    assert_eq!(config.delivery.max_segment_length, 500);
    assert_eq!(config.knowledge.top_k, 5);
    assert_eq!(config.gateway.port, 8080);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("defaults");
    assert_eq!(config.agent.name, "atendente");
    assert_eq!(config.agent.log_level, "info");
    assert_eq!(config.storage.database_path, "atendente.db");
    assert!(config.gemini.api_key.is_none());
    assert_eq!(config.gemini.max_retries, 3);
    assert_eq!(config.transport.reconnect_delay_secs, 3);
    assert!(config.transport.restore_on_startup);
    assert_eq!(config.automation.pause_window_secs, 600);
    assert!(config.automation.welcome_message.is_none());
    assert!(config.automation.business_hours.is_none());
    assert_eq!(config.delivery.max_typing_delay_ms, 2000);
    assert_eq!(config.knowledge.chunk_size, 1000);
    assert_eq!(config.knowledge.chunk_overlap, 200);
    assert_eq!(config.knowledge.top_k, 3);
}

#[test]
fn unknown_key_is_reported_with_suggestion() {
    let toml = "[delivery]\nmax_segment_lenght = 300\n";
    let errors = load_and_validate_str(toml).expect_err("unknown key");
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "max_segment_lenght");
            assert_eq!(suggestion.as_deref(), Some("max_segment_length"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn invalid_type_is_reported() {
    let toml = "[gemini]\nmax_retries = \"three\"\n";
    let errors = load_and_validate_str(toml).expect_err("bad type");
    assert!(
        matches!(errors[0], ConfigError::InvalidType { .. }),
        "got {:?}",
        errors[0]
    );
}

#[test]
fn malformed_business_hours_fail_validation() {
    let toml = r#"
[automation.business_hours]
[[automation.business_hours.windows]]
days = ["funday"]
open = "9am"
close = "18:00"
"#;
    let errors = load_and_validate_str(toml).expect_err("bad schedule");
    assert!(errors[0].to_string().contains("business_hours"));
}

#[test]
fn env_var_overrides_file_value() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "atendente.toml",
            "[gemini]\nmodel = \"from-file\"\n[delivery]\nsegment_gap_ms = 100\n",
        )?;
        jail.set_env("ATENDENTE_GEMINI_MODEL", "from-env");
        jail.set_env("ATENDENTE_DELIVERY_SEGMENT_GAP_MS", "250");

        let config = load_config_from_path(std::path::Path::new("atendente.toml"))
            .expect("config loads");
        assert_eq!(config.gemini.model, "from-env");
        assert_eq!(config.delivery.segment_gap_ms, 250);
        Ok(())
    });
}
