// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Internal typed event bus.
//!
//! Subscribers are kept in registration order and awaited one after the
//! other for every published event. The bus is an owned instance shared
//! through `Arc`, never a global.

pub mod events;

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::trace;

pub use events::{BusEvent, RoutedMessage};

/// Receives every event published on the bus.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn on_event(&self, bus: &EventBus, event: &BusEvent);
}

#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a subscriber. It will see events after all earlier subscribers.
    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        let mut subs = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subs.push(subscriber);
    }

    pub fn subscriber_count(&self) -> usize {
        self.snapshot().len()
    }

    /// Delivers `event` to every subscriber in order.
    ///
    /// Subscribers may publish follow-up events from inside `on_event`;
    /// those are delivered before this call returns.
    pub async fn publish(&self, event: BusEvent) {
        let subscribers = self.snapshot();
        trace!(
            event = event.kind(),
            session_id = %event.session_id(),
            subscribers = subscribers.len(),
            "publishing event"
        );
        for subscriber in subscribers {
            subscriber.on_event(self, &event).await;
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn EventSubscriber>> {
        self.subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
