use chrono::{DateTime, Duration, Utc};
use log::{error, info};
use serde::Serialize;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            created_at: Utc::now(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, message)
    }
}

/// Transient user-facing messages.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

type ToastSink = Box<dyn Fn(&Notification) + Send + Sync>;

/// Keeps at most one visible toast. A new notification replaces the one on
/// screen.
pub struct ToastCenter {
    slot: Mutex<Option<Notification>>,
    sink: Option<ToastSink>,
}

impl ToastCenter {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            sink: None,
        }
    }

    /// Calls `sink` for every toast that becomes visible, e.g. to print it.
    pub fn with_sink(sink: impl Fn(&Notification) + Send + Sync + 'static) -> Self {
        Self {
            slot: Mutex::new(None),
            sink: Some(Box::new(sink)),
        }
    }

    pub fn visible(&self) -> Option<Notification> {
        self.lock().clone()
    }

    /// Clears the visible toast once it has been up for `lifetime`.
    pub fn dismiss_expired(&self, lifetime: Duration, now: DateTime<Utc>) -> Option<Notification> {
        let mut slot = self.lock();
        let expired = slot
            .as_ref()
            .is_some_and(|toast| now - toast.created_at >= lifetime);
        if expired {
            slot.take()
        } else {
            None
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Notification>> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for ToastCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ToastCenter {
    fn notify(&self, notification: Notification) {
        log_notification(&notification);
        *self.lock() = Some(notification.clone());
        if let Some(sink) = &self.sink {
            sink(&notification);
        }
    }
}

fn log_notification(notification: &Notification) {
    match notification.kind {
        NotificationKind::Success | NotificationKind::Info => info!("{}", notification.message),
        NotificationKind::Error => error!("{}", notification.message),
    }
}
