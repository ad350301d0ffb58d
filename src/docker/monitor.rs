//! Container state watching and event bus.
//!
//! Tracks which containers the supervisor is attached to and broadcasts
//! state-change events to interested subscribers (watchdogs, API layer).

use crate::docker::ContainerState;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A container state change observed by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStateEvent {
    /// Container name
    pub name: String,
    /// Classified state at observation time
    pub state: ContainerState,
    /// Daemon container ID
    pub container_id: String,
    /// Unix timestamp of the observation
    pub timestamp: i64,
}

/// Watch registry plus broadcast bus for container state events.
pub struct DockerMonitor {
    watched: DashMap<String, String>,
    events: broadcast::Sender<ContainerStateEvent>,
}

impl Default for DockerMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerMonitor {
    /// Create a monitor with an empty watch list.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            watched: DashMap::new(),
            events,
        }
    }

    /// Start watching a container by name and daemon ID.
    pub fn watch(&self, name: &str, container_id: &str) {
        debug!("Watching container {} ({})", name, container_id);
        self.watched
            .insert(name.to_string(), container_id.to_string());
    }

    /// Stop watching a container.
    pub fn unwatch(&self, name: &str) {
        self.watched.remove(name);
    }

    /// True when the container is currently watched.
    pub fn is_watched(&self, name: &str) -> bool {
        self.watched.contains_key(name)
    }

    /// Subscribe to state-change events.
    pub fn subscribe(&self) -> broadcast::Receiver<ContainerStateEvent> {
        self.events.subscribe()
    }

    /// Publish a state-change event. Events without subscribers are dropped.
    pub fn fire(&self, event: ContainerStateEvent) {
        debug!(
            "Container {} is now {} ({})",
            event.name, event.state, event.container_id
        );
        let _ = self.events.send(event);
    }
}
