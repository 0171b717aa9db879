//! The link event loop
//! Central events and application commands share one single-consumer queue,
//! so the discovery controller and the connection manager are only ever
//! mutated from here.

use log::{debug, error, info};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::commands::{CentralEventSender, LinkCommand, LinkHandle, LinkMessage};
use crate::core::bluetooth::discovery::PeripheralDiscoveryController;
use crate::core::gatt::Result;

/// Receiving end of the link queue, consumed by [`Link::new`].
pub struct LinkReceiver {
    rx: mpsc::UnboundedReceiver<LinkMessage>,
}

/// Creates the link queue: a command handle for the application, an event
/// sender for the platform central and the receiver for the [`Link`].
pub fn channel() -> (LinkHandle, CentralEventSender, LinkReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        LinkHandle::new(tx.clone()),
        CentralEventSender::new(tx),
        LinkReceiver { rx },
    )
}

pub struct Link {
    controller: PeripheralDiscoveryController,
    rx: mpsc::UnboundedReceiver<LinkMessage>,
}

impl Link {
    pub fn new(controller: PeripheralDiscoveryController, receiver: LinkReceiver) -> Self {
        Self {
            controller,
            rx: receiver.rx,
        }
    }

    pub fn controller(&self) -> &PeripheralDiscoveryController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PeripheralDiscoveryController {
        &mut self.controller
    }

    /// Applies one message to the state machines.
    pub fn handle(&mut self, message: LinkMessage) -> Result<()> {
        match message {
            LinkMessage::Central(event) => self.controller.handle_event(event),
            LinkMessage::Command(command) => {
                debug!("Link command {:?}", command);
                match command {
                    LinkCommand::StartScan => self.controller.start_scan(),
                    LinkCommand::StopScan => self.controller.stop_scan(),
                    LinkCommand::Connect => self.controller.connect_to_peripheral(),
                    LinkCommand::Disconnect => self.controller.disconnect_from_peripheral(),
                    LinkCommand::Write(request) => return self.controller.update_value(request),
                }
                Ok(())
            }
        }
    }

    /// Handles every message already queued and returns how many there were.
    pub fn process_pending(&mut self) -> Result<usize> {
        let mut count = 0;
        while let Ok(message) = self.rx.try_recv() {
            self.handle(message)?;
            count += 1;
        }
        Ok(count)
    }

    /// Runs until `shutdown` is cancelled or every sender is gone. A
    /// configuration error stops the loop and is returned.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        info!("Link event loop started.");
        loop {
            tokio::select! {
                message = self.rx.recv() => {
                    let Some(message) = message else {
                        info!("All link senders dropped.");
                        break;
                    };
                    if let Err(e) = self.handle(message) {
                        error!("Configuration error, stopping the link: {}", e);
                        return Err(e);
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Link shutdown requested.");
                    break;
                }
            }
        }
        self.controller.disconnect_from_peripheral();
        Ok(())
    }
}
