//! Notification handling for the boiler controller
//! One task per subscribed characteristic forwards every notified value to
//! the link as a value update.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use bluest::Characteristic;
use futures_util::StreamExt;
use log::{debug, error, info};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::central::CentralEvent;
use crate::core::bluetooth::commands::CentralEventSender;
use crate::core::bluetooth::types::PeripheralId;

type SubscriptionKey = (PeripheralId, Uuid, Uuid);

/// Notification tasks, keyed by peripheral, service and characteristic
#[derive(Default)]
pub struct NotificationHandler {
    subscriptions: Mutex<HashMap<SubscriptionKey, CancellationToken>>,
}

impl NotificationHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts forwarding notifications of `characteristic`. Subscribing twice
    /// replaces the previous task.
    pub fn subscribe(
        &self,
        peripheral: PeripheralId,
        service: Uuid,
        characteristic: Characteristic,
        events: CentralEventSender,
    ) {
        let key = (peripheral.clone(), service, characteristic.uuid());
        let cancel_token = CancellationToken::new();
        if let Some(previous) = self.lock().insert(key, cancel_token.clone()) {
            previous.cancel();
        }

        info!("Subscribing to notifications of {}", characteristic.uuid());
        tokio::spawn(async move {
            Self::process_notifications(peripheral, service, characteristic, events, cancel_token)
                .await;
        });
    }

    pub fn unsubscribe(&self, peripheral: &PeripheralId, service: Uuid, characteristic: Uuid) {
        let key = (peripheral.clone(), service, characteristic);
        if let Some(token) = self.lock().remove(&key) {
            info!("Unsubscribing from notifications of {}", characteristic);
            token.cancel();
        }
    }

    /// Stops every notification task of `peripheral`.
    pub fn stop_notifications(&self, peripheral: &PeripheralId) {
        let mut subscriptions = self.lock();
        subscriptions.retain(|(owner, _, _), token| {
            if owner == peripheral {
                token.cancel();
                false
            } else {
                true
            }
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriptionKey, CancellationToken>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn process_notifications(
        peripheral: PeripheralId,
        service: Uuid,
        characteristic: Characteristic,
        events: CentralEventSender,
        cancel_token: CancellationToken,
    ) {
        let uuid = characteristic.uuid();
        let mut notification_stream = match characteristic.notify().await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to subscribe to notifications of {}: {}", uuid, e);
                events.send(CentralEvent::ValueUpdated {
                    peripheral,
                    service,
                    characteristic: uuid,
                    result: Err(e.to_string()),
                });
                return;
            }
        };

        loop {
            tokio::select! {
                result = notification_stream.next() => {
                    let Some(result) = result else {
                        break;
                    };
                    let failed = result.is_err();
                    if let Ok(value) = &result {
                        debug!("Notification from {}: {:?}", uuid, value);
                    }
                    let sent = events.send(CentralEvent::ValueUpdated {
                        peripheral: peripheral.clone(),
                        service,
                        characteristic: uuid,
                        result: result.map_err(|e| e.to_string()),
                    });
                    if failed || !sent {
                        break;
                    }
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }

        info!("Notification stream of {} ended", uuid);
    }
}
