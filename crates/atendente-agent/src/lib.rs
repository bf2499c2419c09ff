// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation automation for Atendente.
//!
//! The [`AutomationService`] subscribes to routed messages on the bus and,
//! for every customer message:
//! - persists it
//! - asks the [`ConversationEngine`] whether and what to reply
//! - hands the reply to the [`OutboundPacer`] for typed-out delivery
//!
//! Messages sent by a human operator pause automation for the conversation
//! through the [`AutoResumeScheduler`], which turns it back on after a fixed
//! window.

pub mod auto_resume;
pub mod engine;
pub mod pacer;
pub mod service;
pub mod settings;
pub mod shutdown;
pub mod texts;
pub mod tools;

pub use auto_resume::AutoResumeScheduler;
pub use engine::{ConversationEngine, InboundContext, Reply, ReplyKind};
pub use pacer::{OutboundPacer, split_message};
pub use service::AutomationService;
pub use settings::ConfigAgentSettings;
pub use shutdown::install_signal_handler;
pub use tools::{
    ScheduleAppointmentTool, SearchKnowledgeTool, Tool, ToolContext, ToolOutcome, ToolRegistry,
};
