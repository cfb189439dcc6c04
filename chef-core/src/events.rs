// chef-core/src/events.rs
use chef_common::ChefEvent;
use tokio::sync::broadcast;

const EVENT_CHANNEL_SIZE: usize = 256;

/// Fan-out of [`ChefEvent`]s to presentation layers. Emitting never blocks and
/// never fails when nobody listens.
#[derive(Debug, Clone)]
pub struct Events {
    tx: broadcast::Sender<ChefEvent>,
}

impl Events {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChefEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ChefEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for Events {
    fn default() -> Self {
        Self::new()
    }
}
