// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Atendente.
//!
//! Provides mock collaborators and in-memory stores for fast,
//! deterministic tests without a transport, provider or database.
//!
//! # Components
//!
//! - [`MockProvider`] - Generative provider with a queue of scripted replies
//! - [`MockEmbedder`] - Deterministic bag-of-words embeddings
//! - [`MockMedia`] - Fixed transcriptions and image descriptions
//! - [`MockTransport`] - Transport whose sockets accept injected events
//! - [`MockSender`] - Outbound sender that records every call in order
//! - [`MemoryConversationStore`] / [`MemoryCredentialStore`] - In-memory persistence
//! - [`MockScheduler`] - Calendar with configurable availability
//! - [`StaticSettings`] - Fixed agent profile

pub mod memory_store;
pub mod mock_media;
pub mod mock_provider;
pub mod mock_scheduler;
pub mod mock_sender;
pub mod mock_transport;
pub mod settings;

pub use memory_store::{MemoryConversationStore, MemoryCredentialStore};
pub use mock_media::MockMedia;
pub use mock_provider::{MockEmbedder, MockProvider, MockReply};
pub use mock_scheduler::MockScheduler;
pub use mock_sender::{MockSender, SenderCall};
pub use mock_transport::{MockTransport, MockTransportHandle};
pub use settings::StaticSettings;
