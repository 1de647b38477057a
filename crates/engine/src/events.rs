//! Change notifications.
//!
//! After every committed balance-affecting write the engine publishes a
//! coarse [`LedgerEvent::ReloadAll`] so dependent views (operation lists,
//! history charts, balance displays) re-fetch. The bus is an explicit
//! broadcast channel owned by the engine, not a global emitter, so tests can
//! subscribe in isolation and assert ordering.

use tokio::sync::broadcast;

/// Events published by the engine. Deliberately coarse: subscribers re-fetch
/// rather than patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerEvent {
    ReloadAll,
}

const CHANNEL_CAPACITY: usize = 16;

/// Fire-and-forget broadcast of [`LedgerEvent`]s.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<LedgerEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Registers a new subscriber. Slow subscribers may observe `Lagged` and
    /// should simply reload.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. Send failures (no subscribers) are ignored.
    pub(crate) fn publish(&self, event: LedgerEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_reaches_every_subscriber() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(LedgerEvent::ReloadAll);

        assert_eq!(first.try_recv().unwrap(), LedgerEvent::ReloadAll);
        assert_eq!(second.try_recv().unwrap(), LedgerEvent::ReloadAll);
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.publish(LedgerEvent::ReloadAll);
    }
}
