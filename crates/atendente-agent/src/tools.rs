// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tools the model may call while answering a customer.
//!
//! A tool either hands structured data back to the model for one more
//! generation turn ([`ToolOutcome::FollowUp`]), or short-circuits the turn
//! with a fixed customer-facing text ([`ToolOutcome::Final`]). Tool failures
//! never surface as errors to the engine: they become apologetic texts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use atendente_core::SchedulingAdapter;
use atendente_core::types::{NewEvent, ToolCall, ToolDefinition};
use atendente_knowledge::{Retriever, format_context};
use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::texts;

/// Who the tool is acting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolContext {
    pub tenant_id: String,
    pub counterpart: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// Data for the model to phrase into a reply.
    FollowUp(Value),
    /// Text sent to the customer as is, without another model turn.
    Final(String),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the arguments.
    fn parameters_schema(&self) -> Value;

    async fn invoke(&self, call: &ToolCall, ctx: &ToolContext) -> ToolOutcome;
}

/// Tools available to the engine, indexed by name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Definitions for the provider request, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

pub const SCHEDULE_APPOINTMENT: &str = "schedule_appointment";
pub const SEARCH_KNOWLEDGE: &str = "search_knowledge";

const MAX_APPOINTMENT_MINUTES: i64 = 24 * 60;

/// Books a slot on the tenant's default calendar.
pub struct ScheduleAppointmentTool {
    scheduler: Arc<dyn SchedulingAdapter>,
    default_duration: Duration,
}

impl ScheduleAppointmentTool {
    pub fn new(scheduler: Arc<dyn SchedulingAdapter>, default_minutes: u32) -> Self {
        Self {
            scheduler,
            default_duration: Duration::minutes(i64::from(default_minutes.max(1))),
        }
    }

    fn slot(&self, call: &ToolCall) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = DateTime::parse_from_rfc3339(call.str_arg("start")?)
            .ok()?
            .with_timezone(&Utc);
        let duration = call
            .args
            .get("duration_minutes")
            .and_then(Value::as_i64)
            .filter(|m| (1..=MAX_APPOINTMENT_MINUTES).contains(m))
            .map_or(self.default_duration, Duration::minutes);
        Some((start, start + duration))
    }
}

#[async_trait]
impl Tool for ScheduleAppointmentTool {
    fn name(&self) -> &str {
        SCHEDULE_APPOINTMENT
    }

    fn description(&self) -> &str {
        "Agenda um horário para o cliente na agenda da empresa. \
         Use somente depois que o cliente confirmar data e hora."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "start": {
                    "type": "string",
                    "description": "Início do horário em RFC 3339, com fuso. Ex.: 2026-03-02T14:00:00-03:00"
                },
                "duration_minutes": {
                    "type": "integer",
                    "description": "Duração em minutos"
                },
                "summary": {
                    "type": "string",
                    "description": "Motivo do agendamento"
                }
            },
            "required": ["start"]
        })
    }

    async fn invoke(&self, call: &ToolCall, ctx: &ToolContext) -> ToolOutcome {
        let Some((start, end)) = self.slot(call) else {
            warn!(tenant_id = %ctx.tenant_id, args = %serde_json::Value::Object(call.args.clone()), "appointment without a valid start");
            return ToolOutcome::Final(texts::INVALID_SLOT.to_string());
        };

        let calendar = match self.scheduler.default_calendar(&ctx.tenant_id).await {
            Ok(Some(calendar)) => calendar,
            Ok(None) => return ToolOutcome::Final(texts::NO_CALENDAR.to_string()),
            Err(e) => {
                warn!(tenant_id = %ctx.tenant_id, error = %e, "default calendar lookup failed");
                return ToolOutcome::Final(texts::SCHEDULING_FAILED.to_string());
            }
        };

        match self.scheduler.check_availability(&calendar, start, end).await {
            Ok(true) => {}
            Ok(false) => return ToolOutcome::Final(texts::SLOT_UNAVAILABLE.to_string()),
            Err(e) => {
                warn!(tenant_id = %ctx.tenant_id, error = %e, "availability check failed");
                return ToolOutcome::Final(texts::SCHEDULING_FAILED.to_string());
            }
        }

        let who = ctx.display_name.as_deref().unwrap_or(&ctx.counterpart);
        let summary = call
            .str_arg("summary")
            .map(str::to_string)
            .unwrap_or_else(|| format!("Atendimento: {who}"));
        let event = NewEvent {
            summary,
            description: Some(format!("Agendado pelo atendimento automático para {who}.")),
            start,
            end,
            attendee: Some(ctx.counterpart.clone()),
        };

        match self.scheduler.create_event(&calendar, &event).await {
            Ok(created) => {
                info!(tenant_id = %ctx.tenant_id, event_id = %created.id, %start, "appointment created");
                ToolOutcome::FollowUp(json!({
                    "status": "scheduled",
                    "event_id": created.id,
                    "link": created.link,
                    "start": start.to_rfc3339(),
                    "end": end.to_rfc3339(),
                    "summary": event.summary,
                }))
            }
            Err(e) => {
                warn!(tenant_id = %ctx.tenant_id, error = %e, "event creation failed");
                ToolOutcome::Final(texts::SCHEDULING_FAILED.to_string())
            }
        }
    }
}

/// Runs an extra knowledge-base query chosen by the model.
pub struct SearchKnowledgeTool {
    retriever: Retriever,
}

impl SearchKnowledgeTool {
    pub fn new(retriever: Retriever) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Tool for SearchKnowledgeTool {
    fn name(&self) -> &str {
        SEARCH_KNOWLEDGE
    }

    fn description(&self) -> &str {
        "Busca trechos relevantes na base de conhecimento da empresa."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "O que procurar"}
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, call: &ToolCall, ctx: &ToolContext) -> ToolOutcome {
        let query = call.str_arg("query").unwrap_or_default();
        match self.retriever.search(&ctx.tenant_id, query).await {
            Ok(results) => ToolOutcome::FollowUp(json!({
                "query": query,
                "matches": results.len(),
                "context": format_context(&results),
            })),
            Err(e) => {
                warn!(tenant_id = %ctx.tenant_id, error = %e, "knowledge search tool failed");
                ToolOutcome::Final(texts::TOOL_FAILED.to_string())
            }
        }
    }
}
