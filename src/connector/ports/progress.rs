//! Channel for streaming partial tool results.

use serde_json::Value;
use tokio::sync::mpsc;

/// Sender half used by a connector to surface partial results.
///
/// Reports never block. Once the tracker stops listening, for example after
/// a timeout or cancellation, reports are discarded.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    sender: mpsc::UnboundedSender<Value>,
}

impl ProgressSink {
    /// Creates a sink and the receiver that observes it.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Creates a sink whose reports go nowhere.
    #[must_use]
    pub fn detached() -> Self {
        Self::channel().0
    }

    /// Reports a partial result. Returns whether anyone was listening.
    #[must_use = "a closed sink means later reports are discarded"]
    pub fn report(&self, update: Value) -> bool {
        self.sender.send(update).is_ok()
    }

    /// Returns whether the listening side has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
