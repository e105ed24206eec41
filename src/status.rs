//! Broadcast status channel
//!
//! Push mechanism delivering entity state transitions to every subscriber of
//! the channel. Watchers subscribe on creation and filter by entity id;
//! publishing is fire-and-forget. The channel is an injected capability, not
//! a module-level singleton: clone the handle into whatever needs it.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusEntity {
    Recording,
    Note,
}

/// One state transition for a recording or note.
///
/// `id` is the recording id for recording events and the appointment id for
/// note events. `payload` carries event-specific JSON (a completed transcript,
/// a draft suggestion, a failure reason).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub entity: StatusEntity,
    pub id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl StatusEvent {
    pub fn recording(
        id: impl Into<String>,
        status: impl Into<String>,
        payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            entity: StatusEntity::Recording,
            id: id.into(),
            status: status.into(),
            payload,
        }
    }

    pub fn note(
        appointment_id: impl Into<String>,
        status: impl Into<String>,
        payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            entity: StatusEntity::Note,
            id: appointment_id.into(),
            status: status.into(),
            payload,
        }
    }
}

/// Cloneable handle to the broadcast channel
#[derive(Clone)]
pub struct StatusChannel {
    tx: broadcast::Sender<StatusEvent>,
}

impl StatusChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current subscribers. Having no subscribers is
    /// not an error; the event is simply dropped.
    pub fn publish(&self, event: StatusEvent) {
        debug!(
            entity = ?event.entity,
            id = %event.id,
            status = %event.status,
            "publishing status event"
        );
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }
}

impl Default for StatusChannel {
    fn default() -> Self {
        Self::new(256)
    }
}
