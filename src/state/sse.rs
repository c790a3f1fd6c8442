use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::{dto::sse::ServerEvent, state::session::RoomCode};

/// Per-room broadcast hubs, created on first subscription.
pub struct RoomHubs {
    hubs: DashMap<RoomCode, SseHub>,
    capacity: usize,
}

impl RoomHubs {
    /// Build an empty registry whose hubs buffer `capacity` events each.
    pub fn new(capacity: usize) -> Self {
        Self {
            hubs: DashMap::new(),
            capacity,
        }
    }

    /// Subscribe to the hub of `code`, creating it when needed.
    pub fn subscribe(&self, code: &str) -> broadcast::Receiver<ServerEvent> {
        self.hubs
            .entry(code.to_string())
            .or_insert_with(|| SseHub::new(self.capacity))
            .subscribe()
    }

    /// Publish to the subscribers of `code`; rooms nobody watches are skipped.
    ///
    /// Versioned events older than or equal to the last one sent on the room
    /// are dropped. The check and the send happen under the room's entry lock
    /// so concurrent commits cannot reach subscribers out of order.
    pub fn publish(&self, code: &str, event: ServerEvent) {
        let Some(mut hub) = self.hubs.get_mut(code) else {
            return;
        };
        if let Some(version) = event.version {
            if hub.last_version.is_some_and(|last| last >= version) {
                return;
            }
            hub.last_version = Some(version);
        }
        hub.broadcast(event);
    }

    /// Publish the same event to every room.
    pub fn publish_all(&self, event: ServerEvent) {
        for hub in self.hubs.iter() {
            hub.broadcast(event.clone());
        }
    }

    /// Drop the hub of `code` once its last subscriber is gone.
    pub fn release(&self, code: &str) {
        self.hubs.remove_if(code, |_, hub| hub.receiver_count() == 0);
    }

    /// Drop the hub of `code`, closing every open stream.
    pub fn close(&self, code: &str) {
        self.hubs.remove(code);
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
    last_version: Option<u64>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self {
            sender,
            last_version: None,
        }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
