use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::CrawlEvent;

/// Envelope wrapping an event with the time it was emitted
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: CrawlEvent,
}

/// Receiver of crawl notifications.
///
/// Implementations must not block for long and must not fail the caller;
/// the return value is never consumed.
pub trait EventSubscriber: Send + Sync {
    fn notify(&self, event: &CrawlEvent);
}

/// Fan-out point for crawl events.
///
/// Cheaply cloneable; every clone shares the same subscriber list.
#[derive(Clone, Default)]
pub struct EventHub {
    subscribers: Vec<Arc<dyn EventSubscriber>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber (builder style).
    pub fn with_subscriber(mut self, subscriber: Arc<dyn EventSubscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver an event to every subscriber in registration order.
    pub fn emit(&self, event: CrawlEvent) {
        for subscriber in &self.subscribers {
            subscriber.notify(&event);
        }
    }
}

/// Subscriber that mirrors events into the tracing log.
#[derive(Debug, Default)]
pub struct LogSubscriber;

impl EventSubscriber for LogSubscriber {
    fn notify(&self, event: &CrawlEvent) {
        match event {
            CrawlEvent::RunFailed { run_id, error } => {
                warn!(run_id = %run_id, "Run failed: {}", error)
            }
            CrawlEvent::FileExcluded { url, reason } => {
                warn!(url = %url, "File excluded: {}", reason)
            }
            CrawlEvent::ManifestParseError { url, error } => {
                warn!(url = %url, "Manifest parse error: {}", error)
            }
            CrawlEvent::ModUpdated { .. }
            | CrawlEvent::ModDeleted { .. }
            | CrawlEvent::MirrorUploaded { .. }
            | CrawlEvent::MirrorDeleted { .. } => {
                debug!(event = event.event_type(), "{:?}", event)
            }
            _ => info!(event = event.event_type(), "{:?}", event),
        }
    }
}

/// Subscriber forwarding envelopes into a channel.
///
/// Sending never waits: if the channel is full or closed the event is
/// dropped and the failure logged.
pub struct ChannelSubscriber {
    tx: mpsc::Sender<EventEnvelope>,
}

impl ChannelSubscriber {
    pub fn new(tx: mpsc::Sender<EventEnvelope>) -> Self {
        Self { tx }
    }
}

impl EventSubscriber for ChannelSubscriber {
    fn notify(&self, event: &CrawlEvent) {
        let envelope = EventEnvelope {
            timestamp: Utc::now(),
            event: event.clone(),
        };
        if let Err(e) = self.tx.try_send(envelope) {
            tracing::error!("Failed to forward crawl event: {}", e);
        }
    }
}

/// Subscriber keeping every event in memory, for tests and diagnostics.
#[derive(Debug, Default)]
pub struct RecordingSubscriber {
    events: Mutex<Vec<CrawlEvent>>,
}

impl RecordingSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CrawlEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Count recorded events of one type (see [`CrawlEvent::event_type`]).
    pub fn count(&self, event_type: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }
}

impl EventSubscriber for RecordingSubscriber {
    fn notify(&self, event: &CrawlEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
