// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation timers that re-enable automation after a manual pause.
//!
//! Each conversation has at most one armed timer. Every pause or resume
//! cancels the existing timer before doing anything else, so timers are
//! replaced, never leaked.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use atendente_core::types::ConversationId;
use atendente_core::{AtendenteError, ConversationStore};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

struct TimerSlot {
    token: u64,
    task: AbortHandle,
}

struct Inner {
    store: Arc<dyn ConversationStore>,
    window: Duration,
    timers: Mutex<HashMap<ConversationId, TimerSlot>>,
    tokens: AtomicU64,
}

impl Inner {
    fn timers(&self) -> MutexGuard<'_, HashMap<ConversationId, TimerSlot>> {
        self.timers.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn cancel(&self, id: &ConversationId) -> bool {
        match self.timers().remove(id) {
            Some(slot) => {
                slot.task.abort();
                true
            }
            None => false,
        }
    }

    /// Clears the slot only if it still belongs to the timer holding `token`.
    fn release(&self, id: &ConversationId, token: u64) {
        let mut timers = self.timers();
        if timers.get(id).is_some_and(|slot| slot.token == token) {
            timers.remove(id);
        }
    }
}

/// Owns the auto-resume timers. Cheap to clone.
#[derive(Clone)]
pub struct AutoResumeScheduler {
    inner: Arc<Inner>,
}

impl AutoResumeScheduler {
    pub fn new(store: Arc<dyn ConversationStore>, window: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                window,
                timers: Mutex::new(HashMap::new()),
                tokens: AtomicU64::new(1),
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    /// Pauses automation and arms a fresh resume timer.
    pub async fn pause(&self, id: &ConversationId) -> Result<(), AtendenteError> {
        self.inner.cancel(id);
        self.inner.store.set_paused(id, true).await?;

        let token = self.inner.tokens.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let conversation_id = id.clone();
        // The slot is inserted under the same lock the timer uses to release
        // it, so a zero-length window cannot race past the insert.
        {
            let mut timers = self.inner.timers();
            let task = tokio::spawn(async move {
                tokio::time::sleep(inner.window).await;
                match inner.store.set_paused(&conversation_id, false).await {
                    Ok(()) => info!(conversation_id = %conversation_id, "automation resumed after pause window"),
                    Err(e) => warn!(
                        conversation_id = %conversation_id,
                        error = %e,
                        "auto-resume failed to persist, conversation stays paused"
                    ),
                }
                inner.release(&conversation_id, token);
            })
            .abort_handle();
            timers.insert(id.clone(), TimerSlot { token, task });
        }

        debug!(conversation_id = %id, window_secs = self.inner.window.as_secs(), "automation paused");
        Ok(())
    }

    /// Cancels any pending timer and resumes automation now.
    pub async fn resume(&self, id: &ConversationId) -> Result<(), AtendenteError> {
        let cancelled = self.inner.cancel(id);
        self.inner.store.set_paused(id, false).await?;
        debug!(conversation_id = %id, cancelled, "automation resumed");
        Ok(())
    }

    /// Whether a resume timer is armed for `id`.
    pub fn is_pending(&self, id: &ConversationId) -> bool {
        self.inner.timers().contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.timers().len()
    }

    /// Aborts every armed timer. Paused conversations stay paused.
    pub fn shutdown(&self) {
        let mut timers = self.inner.timers();
        let count = timers.len();
        for (_, slot) in timers.drain() {
            slot.task.abort();
        }
        if count > 0 {
            debug!(count, "auto-resume timers aborted");
        }
    }
}
