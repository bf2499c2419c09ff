// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent configuration collaborator: business hours, canned texts, FAQ.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};

use crate::error::AtendenteError;

/// Per-tenant automation profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentProfile {
    /// Base instructions describing the assistant's persona.
    pub persona_prompt: String,
    pub welcome_message: Option<String>,
    pub out_of_hours_message: Option<String>,
    /// Free-form FAQ text injected into the system prompt.
    pub faq: Option<String>,
    /// `None` means always open.
    pub business_hours: Option<BusinessHours>,
}

impl AgentProfile {
    pub fn is_within_business_hours(&self, now: DateTime<Utc>) -> bool {
        self.business_hours
            .as_ref()
            .is_none_or(|hours| hours.is_open(now))
    }
}

/// Weekly opening schedule in a fixed UTC offset.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessHours {
    pub utc_offset_minutes: i32,
    pub windows: Vec<OpeningWindow>,
}

/// One opening interval on a weekday, `[open, close)` in local time.
///
/// When `close <= open` the window wraps past midnight.
#[derive(Debug, Clone, PartialEq)]
pub struct OpeningWindow {
    pub weekday: Weekday,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl BusinessHours {
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let local = now.naive_utc() + Duration::minutes(i64::from(self.utc_offset_minutes));
        let day = local.weekday();
        let time = local.time();

        self.windows.iter().any(|w| {
            if w.open < w.close {
                w.weekday == day && time >= w.open && time < w.close
            } else {
                (w.weekday == day && time >= w.open)
                    || (w.weekday.succ() == day && time < w.close)
            }
        })
    }
}

/// Exposes the automation profile for a tenant.
#[async_trait]
pub trait AgentSettings: Send + Sync {
    async fn profile(&self, tenant_id: &str) -> Result<AgentProfile, AtendenteError>;
}
