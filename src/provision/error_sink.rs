//! Non-blocking collector for errors raised by concurrent tasks.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::{AggregateError, ProvisionerError, Result};

/// Unordered, unbounded error queue.
///
/// Producers hold an [`ErrorSender`]; the owner drains everything once with
/// [`ErrorSink::flush`] after all producers have finished.
#[derive(Debug)]
pub struct ErrorSink {
    sender: UnboundedSender<ProvisionerError>,
    receiver: UnboundedReceiver<ProvisionerError>,
}

/// Producer handle for an [`ErrorSink`].
#[derive(Debug, Clone)]
pub struct ErrorSender {
    sender: UnboundedSender<ProvisionerError>,
}

impl ErrorSender {
    /// Queues an error. Never blocks.
    pub fn enqueue(&self, error: impl Into<ProvisionerError>) {
        // The receiver lives as long as the sink, which outlives every producer.
        let _ = self.sender.send(error.into());
    }
}

impl Default for ErrorSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self { sender, receiver }
    }

    /// Returns a producer handle.
    #[must_use]
    pub fn sender(&self) -> ErrorSender {
        ErrorSender {
            sender: self.sender.clone(),
        }
    }

    /// Queues an error directly on the sink.
    pub fn enqueue(&self, error: impl Into<ProvisionerError>) {
        let _ = self.sender.send(error.into());
    }

    /// Drains every queued error.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionerError::Aggregate`] holding every queued error, in
    /// arrival order, if any were queued.
    pub fn flush(self) -> Result<()> {
        let Self {
            sender,
            mut receiver,
        } = self;
        drop(sender);

        let mut errors = Vec::new();
        while let Ok(error) = receiver.try_recv() {
            errors.push(error);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AggregateError { errors }.into())
        }
    }
}
