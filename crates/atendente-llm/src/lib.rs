// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM client for Atendente.
//!
//! [`LlmClient`] sits between the conversation engine and a
//! [`ProviderAdapter`](atendente_core::traits::ProviderAdapter): it retries
//! rate-limit and server errors with bounded exponential backoff and turns
//! safety-filtered output into a neutral fallback text.

pub mod client;
pub mod retry;

pub use client::{LlmClient, SAFETY_FALLBACK_TEXT};
pub use retry::RetryPolicy;
