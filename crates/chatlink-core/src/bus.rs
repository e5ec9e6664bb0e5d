//! Progress bus for user-facing status messages.
//!
//! The progress bus fans progress notifications out to whoever is
//! listening. Components hold it as a [`Notifier`]; front ends subscribe
//! for the duration of an operation and drop the receiver afterwards.
//!
//! # Example
//!
//! ```ignore
//! let bus = ProgressBus::new();
//!
//! let mut rx = bus.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(message) = rx.recv().await {
//!         eprintln!("{message}");
//!     }
//! });
//!
//! bus.publish("Connecting to weather.example.com...");
//! ```

use chatlink_mcp::Notifier;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Default channel capacity.
const DEFAULT_CAPACITY: usize = 256;

/// Broadcast channel of progress messages.
#[derive(Clone)]
pub struct ProgressBus {
    inner: Arc<broadcast::Sender<String>>,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(tx),
        }
    }

    /// Publish a message. Dropped when nobody is subscribed.
    pub fn publish(&self, message: impl Into<String>) {
        let _ = self.inner.send(message.into());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.inner.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.receiver_count()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ProgressBus {
    fn notify(&self, message: &str) {
        tracing::debug!(message, "progress");
        self.publish(message);
    }
}
