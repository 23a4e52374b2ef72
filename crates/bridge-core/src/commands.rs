//! Ordered host command queue
//!
//! The state machine pushes commands while it still holds the per-call lock, so
//! commands for one call come out in transition order. The host drains the
//! receiving half and executes them; the core never calls the host directly.

use tokio::sync::mpsc;
use tracing::warn;

use crate::session::types::HostCommand;

/// Destination for commands emitted by state transitions
pub trait CommandSink: Send + Sync {
    fn emit(&self, command: HostCommand);
}

/// Create a connected sender/receiver pair
pub fn command_queue() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandSender { tx }, CommandReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<HostCommand>,
}

impl CommandSink for CommandSender {
    fn emit(&self, command: HostCommand) {
        if let Err(e) = self.tx.send(command) {
            warn!(call_id = %e.0.call_id(), command = e.0.name(), "Host command queue closed; dropping command");
        }
    }
}

/// Consuming side handed to the host surface
#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::UnboundedReceiver<HostCommand>,
}

impl CommandReceiver {
    /// Wait for the next command; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<HostCommand> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<HostCommand> {
        self.rx.try_recv().ok()
    }

    /// Everything queued right now, in order
    pub fn drain(&mut self) -> Vec<HostCommand> {
        let mut commands = Vec::new();
        while let Ok(command) = self.rx.try_recv() {
            commands.push(command);
        }
        commands
    }
}
