//! Operator-facing notifications for pipeline outcomes.

use tracing::{error, info};

/// Severity of an operator notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Success,
    Error,
}

/// One operator-facing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyEvent {
    pub kind: NotifyKind,
    pub title: String,
    pub description: String,
}

impl NotifyEvent {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: NotifyKind::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: NotifyKind::Error,
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Delivery seam for operator notifications. Delivery is fire-and-forget
/// and must never affect pipeline control flow.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &NotifyEvent);
}

/// Emits notifications into the structured log stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &NotifyEvent) {
        match event.kind {
            NotifyKind::Success => {
                info!(title = %event.title, description = %event.description, "notification");
            }
            NotifyKind::Error => {
                error!(title = %event.title, description = %event.description, "notification");
            }
        }
    }
}
