//! Outbound update channel shared by a connection's producers and writer.
//!
//! The channel holds a single update. A producer that emits faster than the
//! writer flushes blocks on its next send; nothing is dropped or coalesced.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::Update;
use crate::service::StreamError;

/// Capacity of the outbound channel.
pub const OUTBOUND_CAPACITY: usize = 1;

/// Result of [`UpdateSink::send_or_cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The update was queued for the writer.
    Sent,
    /// The subscription was cancelled before the update could be queued.
    Cancelled,
}

/// Sending half of a connection's outbound channel.
#[derive(Debug, Clone)]
pub struct UpdateSink {
    tx: mpsc::Sender<Update>,
}

impl UpdateSink {
    /// Creates a sink and the receiver the writer drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::Receiver<Update>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        (Self { tx }, rx)
    }

    /// Queues an update, waiting while the channel is full.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::ConnectionClosed`] if the writer is gone.
    pub async fn send(&self, update: Update) -> Result<(), StreamError> {
        self.tx
            .send(update)
            .await
            .map_err(|_| StreamError::ConnectionClosed)
    }

    /// Queues an update unless `cancel` fires first.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::ConnectionClosed`] if the writer is gone.
    pub async fn send_or_cancel(
        &self,
        cancel: &CancellationToken,
        update: Update,
    ) -> Result<Delivery, StreamError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(Delivery::Cancelled),
            sent = self.send(update) => sent.map(|()| Delivery::Sent),
        }
    }

    /// Returns `true` once the writer has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test]
    async fn second_send_waits_for_flush() {
        let (sink, mut rx) = UpdateSink::channel();

        let first = sink.send(Update::replace_content("#n", "1")).await;
        assert!(first.is_ok());

        let mut second = task::spawn(sink.send(Update::replace_content("#n", "2")));
        assert_pending!(second.poll());

        let Some(flushed) = rx.recv().await else {
            panic!("expected first update");
        };
        assert_eq!(flushed.html.first().map(|h| h.content.as_str()), Some("1"));

        assert!(second.is_woken());
        assert!(assert_ready!(second.poll()).is_ok());

        let Some(next) = rx.recv().await else {
            panic!("expected second update");
        };
        assert_eq!(next.html.first().map(|h| h.content.as_str()), Some("2"));
    }

    #[tokio::test]
    async fn send_fails_once_writer_is_gone() {
        let (sink, rx) = UpdateSink::channel();
        drop(rx);
        assert!(sink.is_closed());
        assert!(matches!(
            sink.send(Update::new()).await,
            Err(StreamError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn cancelled_send_returns_promptly() {
        let (sink, _rx) = UpdateSink::channel();
        let cancel = CancellationToken::new();

        let filled = sink.send_or_cancel(&cancel, Update::new()).await;
        assert!(matches!(filled, Ok(Delivery::Sent)));

        cancel.cancel();
        let blocked = sink.send_or_cancel(&cancel, Update::new()).await;
        assert!(matches!(blocked, Ok(Delivery::Cancelled)));
    }
}
