// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator and adapter trait definitions.
//!
//! Adapters that talk to external systems extend [`PluginAdapter`] and use
//! `#[async_trait]` for dynamic dispatch compatibility. Persistence and
//! configuration collaborators are plain `Send + Sync` traits.

pub mod adapter;
pub mod embedding;
pub mod media;
pub mod outbound;
pub mod provider;
pub mod scheduling;
pub mod settings;
pub mod storage;
pub mod transport;

pub use adapter::PluginAdapter;
pub use embedding::EmbeddingAdapter;
pub use media::MediaAdapter;
pub use outbound::OutboundSender;
pub use provider::ProviderAdapter;
pub use scheduling::SchedulingAdapter;
pub use settings::{AgentProfile, AgentSettings, BusinessHours, OpeningWindow};
pub use storage::{ConversationStore, CredentialScope, CredentialStore};
pub use transport::{TransportAdapter, TransportConnection, TransportHandle};
