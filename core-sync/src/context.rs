//! Call-scoped context.
//!
//! Every engine operation receives a [`SyncContext`]. It identifies the call
//! in logs and optionally carries the event bus progress is reported on.
//! Without a bus, emission is a no-op and operations behave identically.

use core_runtime::events::{EventBus, SyncEvent};
use tracing::trace;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SyncContext {
    id: Uuid,
    events: Option<EventBus>,
}

impl SyncContext {
    /// Context without an event channel.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            events: None,
        }
    }

    /// Context reporting progress on `events`.
    pub fn with_events(events: EventBus) -> Self {
        Self {
            id: Uuid::new_v4(),
            events: Some(events),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn events(&self) -> Option<&EventBus> {
        self.events.as_ref()
    }

    pub(crate) fn emit(&self, event: SyncEvent) {
        let Some(bus) = &self.events else {
            return;
        };

        if bus.emit(event).is_err() {
            trace!(context = %self.id, "No subscribers for sync event");
        }
    }
}

impl Default for SyncContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{Item, ItemKind};

    fn pulled() -> SyncEvent {
        SyncEvent::Pulled {
            kind: ItemKind::Sites,
            item: Item::new("home"),
        }
    }

    #[test]
    fn test_emit_without_bus_is_noop() {
        let ctx = SyncContext::new();
        assert!(ctx.events().is_none());
        ctx.emit(pulled());
    }

    #[tokio::test]
    async fn test_emit_reaches_subscribers() {
        let bus = EventBus::new(8);
        let mut stream = bus.subscribe();
        let ctx = SyncContext::with_events(bus);

        ctx.emit(pulled());

        assert_eq!(stream.recv().await.unwrap().name(), "pulled");
    }

    #[test]
    fn test_clones_share_identity() {
        let ctx = SyncContext::new();
        assert_eq!(ctx.clone().id(), ctx.id());
        assert_ne!(SyncContext::new().id(), ctx.id());
    }
}
