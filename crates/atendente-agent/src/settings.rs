// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent settings backed by the `[automation]` config section.

use async_trait::async_trait;
use atendente_config::model::AutomationConfig;
use atendente_core::AtendenteError;
use atendente_core::traits::{AgentProfile, AgentSettings};

/// Serves one profile, built from configuration, to every tenant.
#[derive(Debug, Clone)]
pub struct ConfigAgentSettings {
    profile: AgentProfile,
}

impl ConfigAgentSettings {
    pub fn new(config: &AutomationConfig) -> Result<Self, AtendenteError> {
        let business_hours = config
            .business_hours
            .as_ref()
            .map(|hours| hours.to_business_hours())
            .transpose()
            .map_err(|e| AtendenteError::Config(format!("automation.business_hours: {e}")))?;

        Ok(Self {
            profile: AgentProfile {
                persona_prompt: config.persona_prompt.clone(),
                welcome_message: non_blank(&config.welcome_message),
                out_of_hours_message: non_blank(&config.out_of_hours_message),
                faq: non_blank(&config.faq),
                business_hours,
            },
        })
    }
}

fn non_blank(text: &Option<String>) -> Option<String> {
    text.as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl AgentSettings for ConfigAgentSettings {
    async fn profile(&self, _tenant_id: &str) -> Result<AgentProfile, AtendenteError> {
        Ok(self.profile.clone())
    }
}

#[cfg(test)]
mod tests {
    use atendente_config::model::{BusinessHoursConfig, OpeningWindowConfig};

    use super::*;

    #[tokio::test]
    async fn blank_texts_are_treated_as_unset() {
        let config = AutomationConfig {
            welcome_message: Some("  ".into()),
            faq: Some("Horário: 9h às 18h".into()),
            ..AutomationConfig::default()
        };
        let profile = ConfigAgentSettings::new(&config)
            .unwrap()
            .profile("any")
            .await
            .unwrap();
        assert_eq!(profile.welcome_message, None);
        assert_eq!(profile.faq.as_deref(), Some("Horário: 9h às 18h"));
        assert!(profile.business_hours.is_none());
    }

    #[test]
    fn malformed_hours_are_a_config_error() {
        let config = AutomationConfig {
            business_hours: Some(BusinessHoursConfig {
                utc_offset_minutes: -180,
                windows: vec![OpeningWindowConfig {
                    days: vec!["mon".into()],
                    open: "9h".into(),
                    close: "18:00".into(),
                }],
            }),
            ..AutomationConfig::default()
        };
        let err = ConfigAgentSettings::new(&config).unwrap_err();
        assert!(matches!(err, AtendenteError::Config(_)));
    }
}
