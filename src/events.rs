//! Picture lifecycle notifications.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events so consumers that subscribe late can catch up.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use picforge_common::{PictureId, PictureReference};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

/// What happened to which picture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PicturePayload {
    PictureInserted {
        picture_id: PictureId,
        reference: PictureReference,
        object_id: String,
    },
    PictureUpdated {
        picture_id: PictureId,
    },
    PictureDeleted {
        picture_id: PictureId,
    },
    /// Administrative flush of every cached rendition.
    ThumbsCleared {
        removed: usize,
    },
}

/// A timestamped event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PictureEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: PicturePayload,
}

impl PictureEvent {
    pub fn new(payload: PicturePayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<PictureEvent>,
    recent: RwLock<VecDeque<PictureEvent>>,
}

impl EventBus {
    /// `capacity` sizes the broadcast channel, not the ring buffer.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PictureEvent> {
        self.tx.subscribe()
    }

    /// Publish to all current subscribers and remember the event.
    pub fn publish(&self, payload: PicturePayload) {
        let event = PictureEvent::new(payload);

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }

    /// The `n` most recent events, newest first.
    pub fn recent_events(&self, n: usize) -> Vec<PictureEvent> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
