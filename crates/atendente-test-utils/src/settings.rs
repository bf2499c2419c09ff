// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent settings that return the same profile for every tenant.

use std::sync::Mutex;

use async_trait::async_trait;

use atendente_core::AtendenteError;
use atendente_core::traits::{AgentProfile, AgentSettings};

pub struct StaticSettings {
    profile: Mutex<AgentProfile>,
}

impl StaticSettings {
    pub fn new(profile: AgentProfile) -> Self {
        Self {
            profile: Mutex::new(profile),
        }
    }

    /// Persona only: no welcome, always open, no FAQ.
    pub fn persona(prompt: &str) -> Self {
        Self::new(AgentProfile {
            persona_prompt: prompt.to_string(),
            ..AgentProfile::default()
        })
    }

    pub fn update(&self, edit: impl FnOnce(&mut AgentProfile)) {
        edit(&mut self.profile.lock().unwrap());
    }
}

#[async_trait]
impl AgentSettings for StaticSettings {
    async fn profile(&self, _tenant_id: &str) -> Result<AgentProfile, AtendenteError> {
        Ok(self.profile.lock().unwrap().clone())
    }
}
