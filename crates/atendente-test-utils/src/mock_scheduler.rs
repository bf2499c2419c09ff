// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduling collaborator with scripted availability.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use atendente_core::AtendenteError;
use atendente_core::traits::SchedulingAdapter;
use atendente_core::types::{CalendarRef, EventRef, NewEvent};

pub struct MockScheduler {
    calendar: Option<CalendarRef>,
    available: AtomicBool,
    created: Mutex<Vec<NewEvent>>,
}

impl MockScheduler {
    /// A tenant with a linked calendar that is free by default.
    pub fn new() -> Self {
        Self {
            calendar: Some(CalendarRef("primary".into())),
            available: AtomicBool::new(true),
            created: Mutex::new(Vec::new()),
        }
    }

    /// A tenant with no calendar linked.
    pub fn without_calendar() -> Self {
        Self {
            calendar: None,
            ..Self::new()
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn created_events(&self) -> Vec<NewEvent> {
        self.created.lock().unwrap().clone()
    }
}

impl Default for MockScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchedulingAdapter for MockScheduler {
    async fn default_calendar(
        &self,
        _tenant_id: &str,
    ) -> Result<Option<CalendarRef>, AtendenteError> {
        Ok(self.calendar.clone())
    }

    async fn check_availability(
        &self,
        _calendar: &CalendarRef,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<bool, AtendenteError> {
        Ok(self.available.load(Ordering::SeqCst))
    }

    async fn create_event(
        &self,
        _calendar: &CalendarRef,
        event: &NewEvent,
    ) -> Result<EventRef, AtendenteError> {
        let mut created = self.created.lock().unwrap();
        created.push(event.clone());
        Ok(EventRef {
            id: format!("evt-{}", created.len()),
            link: Some(format!("https://calendar.example/evt-{}", created.len())),
        })
    }
}
