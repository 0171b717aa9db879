//! Link commands
//! Control-plane requests from the application, serialized onto the link
//! queue together with central events.

use log::{debug, warn};
use tokio::sync::mpsc;

use crate::core::bluetooth::central::CentralEvent;
use crate::core::gatt::{GattError, Result, ValueManager, WriteRequest};

/// Requests the application can make of the link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCommand {
    StartScan,
    StopScan,
    Connect,
    Disconnect,
    Write(WriteRequest),
}

/// Everything the link event loop consumes
#[derive(Debug)]
pub enum LinkMessage {
    Central(CentralEvent),
    Command(LinkCommand),
}

/// A clonable handle that sends commands to the link event loop.
///
/// It is also the value manager bound to every service: writes requested by
/// modifiable attributes travel through the same queue as everything else.
#[derive(Clone)]
pub struct LinkHandle {
    tx: mpsc::UnboundedSender<LinkMessage>,
}

impl LinkHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<LinkMessage>) -> Self {
        Self { tx }
    }

    pub fn start_scan(&self) {
        self.send_command(LinkCommand::StartScan);
    }

    pub fn stop_scan(&self) {
        self.send_command(LinkCommand::StopScan);
    }

    pub fn connect(&self) {
        self.send_command(LinkCommand::Connect);
    }

    pub fn disconnect(&self) {
        self.send_command(LinkCommand::Disconnect);
    }

    fn send_command(&self, command: LinkCommand) {
        debug!("Queueing link command {:?}", command);
        if let Err(e) = self.tx.send(LinkMessage::Command(command)) {
            warn!("Failed to send command to the link: {:?}", e.0);
        }
    }
}

impl ValueManager for LinkHandle {
    fn update_value(&self, request: WriteRequest) -> Result<()> {
        self.tx
            .send(LinkMessage::Command(LinkCommand::Write(request)))
            .map_err(|_| GattError::LinkClosed)
    }
}

/// A clonable sender used by platform tasks to report central events.
#[derive(Clone)]
pub struct CentralEventSender {
    tx: mpsc::UnboundedSender<LinkMessage>,
}

impl CentralEventSender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<LinkMessage>) -> Self {
        Self { tx }
    }

    /// Returns `false` once the link has shut down.
    pub fn send(&self, event: CentralEvent) -> bool {
        match self.tx.send(LinkMessage::Central(event)) {
            Ok(()) => true,
            Err(e) => {
                debug!("Link is gone, dropping central event {:?}", e.0);
                false
            }
        }
    }
}
