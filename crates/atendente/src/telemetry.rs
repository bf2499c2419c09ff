// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logging and metrics setup for the `serve` command.

use atendente_core::AtendenteError;
use metrics::{describe_counter, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

const SERVICE_TARGETS: &[&str] = &[
    "atendente",
    "atendente_agent",
    "atendente_session",
    "atendente_bridge",
    "atendente_knowledge",
    "atendente_llm",
    "atendente_gemini",
    "atendente_storage",
];

fn default_directive(log_level: &str) -> String {
    let mut directives: Vec<String> = SERVICE_TARGETS
        .iter()
        .map(|target| format!("{target}={log_level}"))
        .collect();
    directives.push("warn".to_string());
    directives.join(",")
}

/// Installs the process-wide Prometheus recorder and describes the counters.
///
/// Only one recorder may be installed per process.
pub fn install_metrics() -> Result<PrometheusHandle, AtendenteError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| AtendenteError::Internal(format!("failed to install Prometheus recorder: {e}")))?;

    describe_counter!(
        "atendente_messages_received_total",
        Unit::Count,
        "Transport messages received"
    );
    describe_counter!(
        "atendente_messages_sent_total",
        Unit::Count,
        "Text messages sent through a session"
    );
    describe_counter!(
        "atendente_llm_retries_total",
        Unit::Count,
        "Provider calls retried after a transient failure"
    );
    describe_counter!(
        "atendente_responses_suppressed_total",
        Unit::Count,
        "Inbound messages left unanswered because of an error"
    );
    describe_counter!(
        "atendente_reconnects_total",
        Unit::Count,
        "Session reconnect attempts"
    );
    describe_counter!(
        "atendente_documents_ingested_total",
        Unit::Count,
        "Knowledge documents ingested"
    );
    describe_counter!(
        "atendente_ingestion_failures_total",
        Unit::Count,
        "Knowledge documents that failed ingestion"
    );

    tracing::info!("prometheus metrics recorder installed");
    Ok(handle)
}
