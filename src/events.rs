//! Typed event channel between the tracker and the presentation layer.
//!
//! The tracker publishes plain immutable events; whatever renders them (a
//! desktop shell, a TUI, a log sink) subscribes and owns its own reactivity.

use tokio::sync::broadcast;

use crate::ledger::FarmedBlock;

/// Buffered events per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 64;

/// Events published while the tracker is active.
///
/// For a block farmed locally, `Farmed` is always sent before the `NewBlock`
/// carrying the same height.
#[derive(Debug, Clone)]
pub enum FarmEvent {
    /// A new block was observed at the chain head.
    NewBlock { height: u64 },
    /// A block produced by the configured reward address was detected.
    Farmed(FarmedBlock),
}

/// Multi-consumer event bus backed by a bounded broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FarmEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Subscribe to events emitted from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<FarmEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Silently a no-op when nobody is listening.
    pub fn emit(&self, event: FarmEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
