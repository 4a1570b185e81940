//! Shutdown coordination.

use tokio::sync::broadcast;

/// Fans one stop request out to the server and any background tasks.
///
/// Cloning shares the channel; any clone may trigger.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver that resolves once [`trigger`](Self::trigger) is called.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Ask every subscriber to stop. Returns how many were listening.
    pub fn trigger(&self) -> usize {
        match self.tx.send(()) {
            Ok(listeners) => listeners,
            Err(_) => {
                tracing::debug!("Shutdown triggered with no listeners");
                0
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
