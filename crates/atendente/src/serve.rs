// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `atendente serve` command implementation.
//!
//! Wires storage, the session registry, the message router, the automation
//! service and the gateway together, then runs until SIGINT or SIGTERM.

use std::sync::Arc;
use std::time::{Duration, Instant};

use atendente_agent::{
    AutoResumeScheduler, AutomationService, ConfigAgentSettings, ConversationEngine,
    OutboundPacer, ScheduleAppointmentTool, SearchKnowledgeTool, ToolRegistry,
    install_signal_handler,
};
use atendente_bridge::BridgeTransport;
use atendente_bus::EventBus;
use atendente_config::model::AtendenteConfig;
use atendente_core::{AtendenteError, EmbeddingAdapter};
use atendente_gemini::{GeminiEmbedder, GeminiMedia, GeminiProvider};
use atendente_knowledge::{Ingestor, KnowledgeStore, Retriever};
use atendente_llm::{LlmClient, RetryPolicy};
use atendente_session::{MessageRouter, RegistryConfig, SessionRegistry};
use atendente_storage::SqliteStorage;
use tracing::{error, info, warn};

use crate::calendar::UnlinkedCalendar;
use crate::gateway::{self, GatewayState};
use crate::pairing::PairingCodePrinter;
use crate::telemetry;

pub async fn run_serve(config: AtendenteConfig) -> Result<(), AtendenteError> {
    telemetry::init_tracing(&config.agent.log_level);
    info!(name = %config.agent.name, "starting atendente serve");

    let metrics = match telemetry::install_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "metrics disabled");
            None
        }
    };

    let storage = Arc::new(SqliteStorage::open(&config.storage).await?);

    // Model collaborators.
    let gemini = atendente_gemini::client_from_config(&config.gemini)?;
    let provider = Arc::new(GeminiProvider::new(gemini.clone(), &config.gemini));
    let embedder: Arc<dyn EmbeddingAdapter> =
        Arc::new(GeminiEmbedder::new(gemini.clone(), &config.gemini));
    let media = Arc::new(GeminiMedia::new(gemini, &config.gemini));
    let llm = LlmClient::new(provider, RetryPolicy::new(config.gemini.max_retries));

    let knowledge = KnowledgeStore::new(storage.database().clone());
    let ingestor = Ingestor::new(knowledge.clone(), embedder.clone(), &config.knowledge);
    let retriever = Retriever::new(knowledge, embedder, config.knowledge.top_k);

    // Sessions. The router must see raw messages before anything else.
    let bus = Arc::new(EventBus::new());
    let registry = SessionRegistry::new(
        Arc::new(BridgeTransport::from_config(&config.transport)),
        storage.clone(),
        bus.clone(),
        RegistryConfig::from(&config.transport),
    );
    bus.subscribe(Arc::new(MessageRouter::new(registry.sent_ledger())));
    bus.subscribe(Arc::new(PairingCodePrinter));

    // Automation.
    let outbound = Arc::new(registry.clone());
    let resume = AutoResumeScheduler::new(
        storage.clone(),
        Duration::from_secs(config.automation.pause_window_secs),
    );
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(ScheduleAppointmentTool::new(
        Arc::new(UnlinkedCalendar),
        config.automation.appointment_minutes,
    )));
    tools.register(Arc::new(SearchKnowledgeTool::new(retriever.clone())));

    let engine = ConversationEngine::new(
        storage.clone(),
        Arc::new(ConfigAgentSettings::new(&config.automation)?),
        llm,
        outbound.clone(),
        resume,
    )
    .with_retriever(retriever)
    .with_media(media)
    .with_tools(tools)
    .with_history_limit(config.automation.history_limit);

    let pacer = OutboundPacer::new(outbound, storage.clone(), config.delivery.clone());
    let automation = Arc::new(AutomationService::new(
        Arc::new(engine),
        pacer,
        storage.clone(),
    ));
    bus.subscribe(automation.clone());
    info!(subscribers = bus.subscriber_count(), "event bus ready");

    if config.transport.restore_on_startup
        && let Err(e) = registry.restore().await
    {
        error!(error = %e, "failed to list stored sessions, none restored");
    }

    let cancel = install_signal_handler();

    let gateway_task = if config.gateway.enabled {
        let state = GatewayState {
            registry: registry.clone(),
            ingestor,
            metrics,
            start_time: Instant::now(),
        };
        let gateway_config = config.gateway.clone();
        let gateway_cancel = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = gateway::serve(&gateway_config, state, gateway_cancel.clone()).await {
                error!(error = %e, "gateway failed");
                gateway_cancel.cancel();
            }
        }))
    } else {
        info!("gateway disabled");
        None
    };

    cancel.cancelled().await;
    info!("shutdown requested");

    if let Some(task) = gateway_task
        && let Err(e) = task.await
    {
        warn!(error = %e, "gateway task ended abnormally");
    }
    automation.shutdown().await;
    registry.shutdown().await;

    info!("atendente serve shutdown complete");
    Ok(())
}
