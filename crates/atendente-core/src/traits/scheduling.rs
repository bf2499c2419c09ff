// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduling collaborator used by the appointment tool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AtendenteError;
use crate::types::{CalendarRef, EventRef, NewEvent};

#[async_trait]
pub trait SchedulingAdapter: Send + Sync {
    /// Resolves the tenant's default calendar, if one is linked.
    async fn default_calendar(
        &self,
        tenant_id: &str,
    ) -> Result<Option<CalendarRef>, AtendenteError>;

    /// Returns true when the slot `[start, end)` is free.
    async fn check_availability(
        &self,
        calendar: &CalendarRef,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, AtendenteError>;

    async fn create_event(
        &self,
        calendar: &CalendarRef,
        event: &NewEvent,
    ) -> Result<EventRef, AtendenteError>;
}
