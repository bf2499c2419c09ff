// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generative provider adapter trait.

use async_trait::async_trait;

use crate::error::AtendenteError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{GenerateRequest, ProviderResponse};

/// Adapter for a generative-text provider.
///
/// Implementations issue exactly one provider call per `generate`. Retry
/// policy lives above this trait. Errors must carry the HTTP status when
/// there was one so callers can classify them.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    async fn generate(&self, request: GenerateRequest)
    -> Result<ProviderResponse, AtendenteError>;
}
