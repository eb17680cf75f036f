//! Change events pushed by the remote store
//!
//! The remote store emits one event per mutation of a record matching a
//! subscription's predicate. Events travel as raw JSON payloads and are decoded
//! on delivery, so a malformed payload surfaces as a [`DeliveryError`] for that
//! one event instead of breaking the stream.
//!
//! # Architecture
//!
//! ```text
//! store mutation ──▶ EventBus::publish() ──▶ broadcast channel ──▶ per-subscription forwarder
//!                                                                     │ decode + predicate
//!                                                                     ▼
//!                                                                 EventStream ──▶ pump ──▶ cache
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let bus = EventBus::new(1024);
//! let mut rx = bus.subscribe();
//!
//! bus.publish(ChangeEvent::create(record).to_payload());
//!
//! if let Ok(envelope) = rx.recv().await {
//!     let event = ChangeEvent::from_payload(envelope.payload)?;
//! }
//! ```

use crate::core::error::DeliveryError;
use crate::core::record::JobRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::sync::broadcast;
use uuid::Uuid;

/// The kind of mutation an event reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Create,
    Update,
    Delete,
    /// Any action name this client does not know; ignored on application
    #[serde(other)]
    Unknown,
}

impl EventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::Create => "create",
            EventAction::Update => "update",
            EventAction::Delete => "delete",
            EventAction::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded change event: `{"action": "...", "record": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub action: EventAction,
    pub record: JobRecord,
}

impl ChangeEvent {
    pub fn new(action: EventAction, record: JobRecord) -> Self {
        Self { action, record }
    }

    pub fn create(record: JobRecord) -> Self {
        Self::new(EventAction::Create, record)
    }

    pub fn update(record: JobRecord) -> Self {
        Self::new(EventAction::Update, record)
    }

    pub fn delete(record: JobRecord) -> Self {
        Self::new(EventAction::Delete, record)
    }

    /// Id of the record this event is about
    pub fn record_id(&self) -> &str {
        &self.record.id
    }

    /// Decode a raw payload as delivered by the remote push channel
    pub fn from_payload(payload: Value) -> Result<Self, DeliveryError> {
        serde_json::from_value(payload).map_err(|e| DeliveryError::Malformed {
            message: e.to_string(),
        })
    }

    /// Encode into the raw payload shape
    pub fn to_payload(&self) -> Value {
        // JobRecord has no map keys or fallible fields, so this cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Envelope wrapping a raw event payload with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event was published
    pub timestamp: DateTime<Utc>,
    /// Undecoded `{action, record}` payload
    pub payload: Value,
}

impl EventEnvelope {
    pub fn new(payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Broadcast-based bus carrying raw change payloads to every forwarder
///
/// Cheap to clone (Arc internally) and shareable across tasks.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a bus buffering at most `capacity` events per lagging receiver
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a payload to all current receivers
    ///
    /// Never fails; with no receivers the payload is dropped. Returns the
    /// number of receivers that will see it.
    pub fn publish(&self, payload: Value) -> usize {
        self.sender.send(EventEnvelope::new(payload)).unwrap_or(0)
    }

    /// Receive every payload published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
