//! Networking: the TCP line server and per-player outboxes.

mod server;

pub use server::Server;

use log::debug;
use tokio::sync::mpsc;

/// Where a player's rendered lines go. Detached outboxes (tests, players
/// not yet bound to a connection) silently discard.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    tx: Option<mpsc::UnboundedSender<String>>,
}

impl Outbox {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn detached() -> Self {
        Self { tx: None }
    }

    /// Best-effort delivery; a closed connection is not an error
    pub fn send(&self, line: String) {
        if let Some(tx) = &self.tx {
            if tx.send(line).is_err() {
                debug!("Dropping line for closed connection");
            }
        }
    }
}
