// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Atendente messaging automation service.
//!
//! This crate provides the error taxonomy, the domain types, and the trait
//! definitions for every external collaborator: transports, generative and
//! embedding providers, media understanding, scheduling, persistence and
//! agent settings.

pub mod error;
pub mod traits;
pub mod types;

pub use error::AtendenteError;
pub use types::{
    AdapterType, ContentKind, Conversation, ConversationId, Direction, DomainMessage,
    HealthStatus, Originator, SessionId, SessionStatus,
};

pub use traits::{
    AgentSettings, ConversationStore, CredentialStore, EmbeddingAdapter, MediaAdapter,
    OutboundSender, PluginAdapter, ProviderAdapter, SchedulingAdapter, TransportAdapter,
    TransportHandle,
};
