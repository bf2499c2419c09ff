// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduling collaborator for deployments without a calendar integration.
//!
//! Calendar linking and event creation live in an external service. Until
//! one is wired in, every tenant reports no default calendar and the
//! appointment tool answers with its "no calendar linked" text.

use async_trait::async_trait;
use atendente_core::types::{CalendarRef, EventRef, NewEvent};
use atendente_core::{AtendenteError, SchedulingAdapter};
use chrono::{DateTime, Utc};
use tracing::debug;

pub struct UnlinkedCalendar;

#[async_trait]
impl SchedulingAdapter for UnlinkedCalendar {
    async fn default_calendar(
        &self,
        tenant_id: &str,
    ) -> Result<Option<CalendarRef>, AtendenteError> {
        debug!(tenant_id, "no calendar integration configured");
        Ok(None)
    }

    async fn check_availability(
        &self,
        _calendar: &CalendarRef,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<bool, AtendenteError> {
        Ok(false)
    }

    async fn create_event(
        &self,
        calendar: &CalendarRef,
        _event: &NewEvent,
    ) -> Result<EventRef, AtendenteError> {
        Err(AtendenteError::Tool {
            tool: "schedule_appointment".into(),
            message: format!("calendar {} is not linked", calendar.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_no_calendar() {
        assert_eq!(UnlinkedCalendar.default_calendar("t1").await.unwrap(), None);
    }
}
