use serde::Serialize;
use uuid::Uuid;

/// Lifecycle events, published strictly after the backing store has
/// committed. Consumers (audit log, cache invalidation, mail triggers)
/// subscribe externally and never see events for rolled-back changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UserEvent {
    Created { user_id: Uuid },
    Updated { user_id: Uuid },
    StatusChanged { user_id: Uuid, active: bool },
    Deleted { user_id: Uuid },
    Restored { user_id: Uuid },
    Destroyed { user_id: Uuid },
}

impl UserEvent {
    pub fn user_id(&self) -> Uuid {
        match self {
            UserEvent::Created { user_id }
            | UserEvent::Updated { user_id }
            | UserEvent::StatusChanged { user_id, .. }
            | UserEvent::Deleted { user_id }
            | UserEvent::Restored { user_id }
            | UserEvent::Destroyed { user_id } => *user_id,
        }
    }
}

/// Sink for lifecycle events. Publishing is fire-and-forget: the service has
/// already committed by the time this is called, so a sink failure must not
/// fail the operation.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: UserEvent);
}

/// Sink that discards all events
#[derive(Debug, Default, Clone)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn publish(&self, _event: UserEvent) {}
}

/// Channel-backed sink; events are dropped if the receiver is gone.
impl EventSink for tokio::sync::mpsc::UnboundedSender<UserEvent> {
    fn publish(&self, event: UserEvent) {
        if let Err(err) = self.send(event) {
            tracing::warn!(event = ?err.0, "Event receiver dropped, discarding user event");
        }
    }
}
