// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use std::str::FromStr;

use atendente_core::traits::settings::{BusinessHours, OpeningWindow};
use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Top-level configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AtendenteConfig {
    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Messaging transport (bridge) settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Conversation automation behavior.
    #[serde(default)]
    pub automation: AutomationConfig,

    /// Outbound pacing.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Knowledge-base chunking and retrieval.
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Service identity and logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "atendente".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable SQLite WAL journal mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    "atendente.db".to_string()
}

fn default_true() -> bool {
    true
}

/// Google Gemini API settings (generation, embeddings, media).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeminiConfig {
    /// API key. `None` falls back to the `GEMINI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_gemini_api_base")]
    pub api_base: String,

    #[serde(default = "default_gemini_model")]
    pub model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Maximum number of attempts for a generation call, retries included.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request HTTP timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_gemini_api_base(),
            model: default_gemini_model(),
            embedding_model: default_embedding_model(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_temperature() -> f32 {
    0.7
}

/// Messaging bridge connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// WebSocket base URL of the messaging bridge.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// Bearer token sent to the bridge on connect.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Delay before reconnecting after a non-logout close.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Start every session with stored credentials at boot.
    #[serde(default = "default_true")]
    pub restore_on_startup: bool,

    /// Capacity of each socket's event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            auth_token: None,
            reconnect_delay_secs: default_reconnect_delay_secs(),
            restore_on_startup: true,
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_bridge_url() -> String {
    "ws://127.0.0.1:3010".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    3
}

fn default_event_buffer() -> usize {
    256
}

/// Conversation automation behavior shared by all tenants.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AutomationConfig {
    /// Persona instructions placed at the top of the system prompt.
    #[serde(default = "default_persona_prompt")]
    pub persona_prompt: String,

    /// Sent instead of a generated reply on the first message of a conversation.
    #[serde(default)]
    pub welcome_message: Option<String>,

    /// Sent instead of a generated reply outside business hours.
    #[serde(default)]
    pub out_of_hours_message: Option<String>,

    /// FAQ text injected into the system prompt.
    #[serde(default)]
    pub faq: Option<String>,

    /// Number of most recent messages included as history.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// How long a manual pause lasts before automation resumes.
    #[serde(default = "default_pause_window_secs")]
    pub pause_window_secs: u64,

    /// Default appointment length when the model does not give one.
    #[serde(default = "default_appointment_minutes")]
    pub appointment_minutes: u32,

    /// `None` means always open.
    #[serde(default)]
    pub business_hours: Option<BusinessHoursConfig>,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            persona_prompt: default_persona_prompt(),
            welcome_message: None,
            out_of_hours_message: None,
            faq: None,
            history_limit: default_history_limit(),
            pause_window_secs: default_pause_window_secs(),
            appointment_minutes: default_appointment_minutes(),
            business_hours: None,
        }
    }
}

fn default_persona_prompt() -> String {
    "Você é um assistente de atendimento ao cliente cordial e objetivo. \
     Responda em português do Brasil, em mensagens curtas, sem inventar informações."
        .to_string()
}

fn default_history_limit() -> usize {
    20
}

fn default_pause_window_secs() -> u64 {
    600
}

fn default_appointment_minutes() -> u32 {
    60
}

/// Weekly opening schedule.
///
/// ```toml
/// [automation.business_hours]
/// utc_offset_minutes = -180
///
/// [[automation.business_hours.windows]]
/// days = ["mon", "tue", "wed", "thu", "fri"]
/// open = "09:00"
/// close = "18:00"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BusinessHoursConfig {
    #[serde(default)]
    pub utc_offset_minutes: i32,

    #[serde(default)]
    pub windows: Vec<OpeningWindowConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpeningWindowConfig {
    /// Weekday names (`mon`, `tuesday`, ...).
    pub days: Vec<String>,
    /// Local opening time, `HH:MM`.
    pub open: String,
    /// Local closing time, `HH:MM`, exclusive.
    pub close: String,
}

impl BusinessHoursConfig {
    /// Parses the textual schedule into the core representation.
    pub fn to_business_hours(&self) -> Result<BusinessHours, String> {
        let mut windows = Vec::new();
        for (i, w) in self.windows.iter().enumerate() {
            let open = parse_time(&w.open)
                .ok_or_else(|| format!("windows[{i}].open `{}` is not HH:MM", w.open))?;
            let close = parse_time(&w.close)
                .ok_or_else(|| format!("windows[{i}].close `{}` is not HH:MM", w.close))?;
            if w.days.is_empty() {
                return Err(format!("windows[{i}].days must not be empty"));
            }
            for day in &w.days {
                let weekday = Weekday::from_str(day)
                    .map_err(|_| format!("windows[{i}].days: `{day}` is not a weekday"))?;
                windows.push(OpeningWindow {
                    weekday,
                    open,
                    close,
                });
            }
        }
        Ok(BusinessHours {
            utc_offset_minutes: self.utc_offset_minutes,
            windows,
        })
    }
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

/// Outbound delivery pacing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Longest segment sent as a single message, in characters.
    #[serde(default = "default_max_segment_length")]
    pub max_segment_length: usize,

    /// Simulated typing time per character.
    #[serde(default = "default_typing_ms_per_char")]
    pub typing_ms_per_char: u64,

    /// Upper bound for the simulated typing delay.
    #[serde(default = "default_max_typing_delay_ms")]
    pub max_typing_delay_ms: u64,

    /// Pause between consecutive segments.
    #[serde(default = "default_segment_gap_ms")]
    pub segment_gap_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_segment_length: default_max_segment_length(),
            typing_ms_per_char: default_typing_ms_per_char(),
            max_typing_delay_ms: default_max_typing_delay_ms(),
            segment_gap_ms: default_segment_gap_ms(),
        }
    }
}

fn default_max_segment_length() -> usize {
    1000
}

fn default_typing_ms_per_char() -> u64 {
    40
}

fn default_max_typing_delay_ms() -> u64 {
    2000
}

fn default_segment_gap_ms() -> u64 {
    600
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KnowledgeConfig {
    /// Target chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters of the previous chunk's tail carried into the next one.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Number of chunks injected into the prompt.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_top_k() -> usize {
    3
}

/// HTTP control gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Required `Authorization: Bearer` token. `None` disables auth.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}
