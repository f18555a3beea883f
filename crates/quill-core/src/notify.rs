//! Notification collaborator.

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Fire-and-forget user-facing notices.
///
/// Surfaces implement this to show sync summaries, import results, and
/// failures; the core never waits on or inspects the outcome.
pub trait Notifier: Send + Sync {
    /// Surface a message to the user.
    fn notify(&self, message: &str, kind: NoticeKind);
}

impl<T: Notifier + ?Sized> Notifier for std::sync::Arc<T> {
    fn notify(&self, message: &str, kind: NoticeKind) {
        (**self).notify(message, kind);
    }
}

/// Notifier that drops every message, for embedding without a surface.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _message: &str, _kind: NoticeKind) {}
}
