use async_trait::async_trait;
use log::{info, warn};
use loyalty_common::notification::Notification;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification channel is closed")]
    Closed,

    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Sink for user-facing notifications.
/// Delivery is best effort: failures are logged by the caller and never undo
/// the ledger write that produced the notification.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Forwards notifications to a channel consumed by the delivery worker
pub struct ChannelNotifier {
    sender: mpsc::Sender<Notification>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sender
            .send(notification.clone())
            .await
            .map_err(|_| NotifyError::Closed)
    }
}

// Writes notifications to the log, used by the binary
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(notification)
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        info!("notify {}: {}", notification.recipient(), payload);
        Ok(())
    }
}

// Deliver every notification, a failure only produces a warning
pub async fn dispatch(notifier: &dyn Notifier, notifications: Vec<Notification>) {
    for notification in notifications {
        if let Err(e) = notifier.notify(&notification).await {
            warn!(
                "Failed to deliver {} notification to {}: {}",
                notification.kind(),
                notification.recipient(),
                e
            );
        }
    }
}
