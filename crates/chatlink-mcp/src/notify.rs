//! Progress notifications.
//!
//! Components report human-readable progress ("Connecting to ...",
//! "Calling getWeather...") through a [`Notifier`] handed to them at
//! construction. Notifications are advisory; nothing depends on delivery.

use std::sync::Arc;

/// Receiver of progress messages.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

impl<F> Notifier for F
where
    F: Fn(&str) + Send + Sync,
{
    fn notify(&self, message: &str) {
        self(message)
    }
}

/// Notifier that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _message: &str) {}
}

/// Shared no-op notifier.
pub fn noop() -> Arc<dyn Notifier> {
    Arc::new(NoopNotifier)
}
