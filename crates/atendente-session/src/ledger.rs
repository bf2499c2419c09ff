// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded memory of message ids the automation itself sent.
//!
//! The transport echoes our own sends back with the own-message flag set,
//! exactly like a human operator typing on the phone. Ids recorded here
//! let the router tell the two apart.
//!
//! The echo can reach the router before the send that caused it has
//! returned its id, so sends also leave an in-flight marker per chat for
//! the router to wait on.

use std::collections::{HashMap, HashSet, VecDeque};
use std::pin::pin;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;

const DEFAULT_CAPACITY: usize = 2048;

pub struct SentLedger {
    capacity: usize,
    inner: Mutex<LedgerState>,
    settled: Notify,
}

#[derive(Default)]
struct LedgerState {
    order: VecDeque<String>,
    ids: HashSet<String>,
    in_flight: HashMap<String, usize>,
}

fn flight_key(session_id: &str, chat: &str) -> String {
    format!("{session_id}\u{1f}{chat}")
}

/// In-flight marker for one send. Dropping it clears the marker.
pub struct PendingSend<'a> {
    ledger: &'a SentLedger,
    key: String,
}

impl Drop for PendingSend<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.ledger.lock();
            if let Some(count) = state.in_flight.get_mut(&self.key) {
                *count -= 1;
                if *count == 0 {
                    state.in_flight.remove(&self.key);
                }
            }
        }
        self.ledger.settled.notify_waiters();
    }
}

impl SentLedger {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(LedgerState::default()),
            settled: Notify::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Remembers an id, evicting the oldest once full.
    pub fn record(&self, message_id: &str) {
        let mut state = self.lock();
        if !state.ids.insert(message_id.to_string()) {
            return;
        }
        state.order.push_back(message_id.to_string());
        while state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.ids.remove(&oldest);
            }
        }
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.lock().ids.contains(message_id)
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    /// Marks a send to `chat` as in flight until the guard is dropped.
    /// Record the returned id before dropping it.
    pub fn begin_send(&self, session_id: &str, chat: &str) -> PendingSend<'_> {
        let key = flight_key(session_id, chat);
        *self.lock().in_flight.entry(key.clone()).or_default() += 1;
        PendingSend { ledger: self, key }
    }

    pub fn has_pending(&self, session_id: &str, chat: &str) -> bool {
        self.lock()
            .in_flight
            .contains_key(&flight_key(session_id, chat))
    }

    /// Waits until no send to `chat` is in flight. Returns false if
    /// `timeout` elapsed first.
    pub async fn wait_settled(&self, session_id: &str, chat: &str, timeout: Duration) -> bool {
        let settled = async {
            loop {
                let mut notified = pin!(self.settled.notified());
                notified.as_mut().enable();
                if !self.has_pending(session_id, chat) {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, settled).await.is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SentLedger {
    fn default() -> Self {
        Self::new()
    }
}
