//! Transient operator notifications.
//!
//! Each emitted notification is displayed for a fixed window and then removed
//! on its own schedule. Emission never blocks the caller.

use crate::timebase::unix_us;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub const DEFAULT_DISPLAY_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Danger,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    pub created_at_unix_us: u64,
}

struct Inner {
    active: Mutex<Vec<Notification>>,
    next_id: AtomicU64,
    window: Duration,
    events: broadcast::Sender<Notification>,
}

impl Inner {
    fn active(&self) -> MutexGuard<'_, Vec<Notification>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Holds one notification on display; dropping it takes the notification
/// down, so removal happens even if the timer task is cancelled.
struct DisplayLease {
    id: u64,
    inner: Arc<Inner>,
}

impl Drop for DisplayLease {
    fn drop(&mut self) {
        self.inner.active().retain(|n| n.id != self.id);
    }
}

#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Inner>,
}

impl NotificationCenter {
    pub fn new(window: Duration) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                active: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                window,
                events,
            }),
        }
    }

    /// Display `message` for the configured window. Must be called from
    /// within a tokio runtime.
    pub fn emit(&self, message: impl Into<String>, severity: Severity) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let notification = Notification {
            id,
            message: message.into(),
            severity,
            created_at_unix_us: unix_us(),
        };

        match severity {
            Severity::Info | Severity::Success => {
                info!(
                    id,
                    severity = severity.as_str(),
                    text = %notification.message,
                    "Notification"
                )
            }
            Severity::Warning | Severity::Danger => {
                warn!(
                    id,
                    severity = severity.as_str(),
                    text = %notification.message,
                    "Notification"
                )
            }
        }

        self.inner.active().push(notification.clone());
        // No subscribers is fine.
        let _ = self.inner.events.send(notification);

        let lease = DisplayLease {
            id,
            inner: Arc::clone(&self.inner),
        };
        let window = self.inner.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            drop(lease);
        });

        id
    }

    /// Notifications currently on display, oldest first.
    pub fn active(&self) -> Vec<Notification> {
        self.inner.active().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.inner.events.subscribe()
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn notification_expires_after_window() {
        let center = NotificationCenter::new(Duration::from_secs(5));
        center.emit("Thruster started successfully!", Severity::Success);
        assert_eq!(center.active().len(), 1);

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(center.active().len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(center.active().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn removal_is_independent_per_notification() {
        let center = NotificationCenter::new(Duration::from_secs(5));
        let first = center.emit("first", Severity::Info);
        tokio::time::sleep(Duration::from_secs(3)).await;
        let second = center.emit("second", Severity::Warning);

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        let ids: Vec<u64> = center.active().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![second]);
        assert_ne!(first, second);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(center.active().is_empty());
    }

    #[tokio::test]
    async fn subscribers_receive_emitted_notifications() {
        let center = NotificationCenter::default();
        let mut rx = center.subscribe();
        center.emit("Test already running!", Severity::Warning);
        let received = rx.recv().await.unwrap();
        assert_eq!(received.message, "Test already running!");
        assert_eq!(received.severity, Severity::Warning);
    }
}
