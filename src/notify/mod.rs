//! User-facing notification seam.
//!
//! The toast UI itself lives in the host application; this crate only guarantees
//! that every classified error and every mutation outcome produces exactly one
//! `notify` call.

use std::sync::Arc;

/// Visual category of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

/// Sink for user-facing notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: ToastKind, title: &str, message: &str);
}

/// Shared handle to the configured notifier.
pub type SharedNotifier = Arc<dyn Notifier>;

/// Notifier that forwards toasts to the tracing log. Useful as a default when
/// no host UI is attached (tests, headless tools).
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: ToastKind, title: &str, message: &str) {
        match kind {
            ToastKind::Success | ToastKind::Info => {
                tracing::info!(?kind, title, message, "toast")
            }
            ToastKind::Error => tracing::warn!(?kind, title, message, "toast"),
        }
    }
}
