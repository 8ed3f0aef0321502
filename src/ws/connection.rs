//! Stream multiplexer for a single WebSocket connection.
//!
//! Three units run per connection:
//!
//! - the reader forwards text frames to an inbound channel,
//! - the router turns each frame into a subscription, cancelling the
//!   previous producer before starting the next one,
//! - the writer drains the capacity-1 outbound channel into the socket.
//!
//! A connection-scoped [`CancellationToken`] is the single stop signal.
//! Each subscription runs under a child token, so cancelling the connection
//! also stops the live producer. The connection is closed only after the
//! reader, the writer and every producer it spawned have exited.

use std::fmt::Display;
use std::sync::{Arc, OnceLock};

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, close_code};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::messages::SubscriptionMessage;
use super::sink::UpdateSink;
use crate::domain::{Registry, Update};
use crate::service::StreamError;

const INBOUND_CAPACITY: usize = 1;

/// Connection-wide stop signal plus the first recorded failure.
#[derive(Debug)]
struct ConnectionControl {
    token: CancellationToken,
    failure: OnceLock<String>,
}

impl ConnectionControl {
    fn new(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            failure: OnceLock::new(),
        }
    }

    /// Starts draining without error.
    fn close(&self) {
        self.token.cancel();
    }

    /// Starts draining and marks the closure abnormal. Failures reported
    /// after draining has begun are only logged.
    fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.token.is_cancelled() {
            tracing::debug!(%reason, "failure after close ignored");
            return;
        }
        tracing::warn!(%reason, "closing stream connection");
        let _ = self.failure.set(reason);
        self.token.cancel();
    }

    fn close_frame(&self) -> CloseFrame {
        match self.failure.get() {
            None => CloseFrame {
                code: close_code::NORMAL,
                reason: Utf8Bytes::from_static("done"),
            },
            Some(_) => CloseFrame {
                code: close_code::ERROR,
                reason: Utf8Bytes::from_static("internal error"),
            },
        }
    }
}

/// Runs the multiplexer over the two halves of an accepted socket until
/// the client leaves, a failure occurs, or `parent` is cancelled.
pub async fn run_connection<W, R, E>(
    sink: W,
    stream: R,
    registry: Arc<Registry>,
    parent: CancellationToken,
) where
    W: Sink<Message> + Unpin + Send + 'static,
    W::Error: Display,
    R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    let control = Arc::new(ConnectionControl::new(&parent));
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
    let (updates, outbound_rx) = UpdateSink::channel();

    tracing::debug!("stream connection active");

    let reader = tokio::spawn(
        read_loop(stream, inbound_tx, Arc::clone(&control)).in_current_span(),
    );
    let writer = tokio::spawn(
        write_loop(sink, outbound_rx, Arc::clone(&control)).in_current_span(),
    );

    route(inbound_rx, updates, &registry, &control).await;

    if let Err(err) = reader.await {
        tracing::error!(error = %err, "stream reader task failed");
    }
    if let Err(err) = writer.await {
        tracing::error!(error = %err, "stream writer task failed");
    }

    match control.failure.get() {
        Some(reason) => tracing::info!(%reason, "stream connection closed with error"),
        None => tracing::debug!("stream connection closed"),
    }
}

/// Forwards text frames to the router. Ping and pong frames are ignored.
async fn read_loop<R, E>(
    mut stream: R,
    inbound: mpsc::Sender<Utf8Bytes>,
    control: Arc<ConnectionControl>,
) where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        let frame = tokio::select! {
            biased;
            () = control.token.cancelled() => break,
            frame = stream.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                tokio::select! {
                    biased;
                    () = control.token.cancelled() => break,
                    sent = inbound.send(text) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) | None => {
                tracing::debug!("client closed the stream");
                control.close();
                break;
            }
            Some(Ok(Message::Binary(_))) => {
                control.fail("unexpected binary frame");
                break;
            }
            Some(Err(err)) => {
                control.fail(format!("read failed: {err}"));
                break;
            }
        }
    }
    tracing::trace!("stream reader exited");
}

/// Writes each queued update as one text frame, then attempts a single
/// close handshake once the connection is cancelled.
async fn write_loop<W>(
    mut sink: W,
    mut outbound: mpsc::Receiver<Update>,
    control: Arc<ConnectionControl>,
) where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    loop {
        let update = tokio::select! {
            biased;
            () = control.token.cancelled() => break,
            update = outbound.recv() => update,
        };
        let Some(update) = update else {
            break;
        };

        let text = match serde_json::to_string(&update) {
            Ok(text) => text,
            Err(err) => {
                control.fail(format!("encoding update failed: {err}"));
                break;
            }
        };
        if let Err(err) = sink.send(Message::text(text)).await {
            control.fail(format!("write failed: {err}"));
            break;
        }
    }

    // Releases producers blocked on a full channel.
    drop(outbound);

    let frame = control.close_frame();
    if let Err(err) = sink.send(Message::Close(Some(frame))).await {
        tracing::debug!(error = %err, "close handshake failed");
    }
    tracing::trace!("stream writer exited");
}

/// Consumes subscription frames until the reader stops, then waits for
/// every producer it started.
async fn route(
    mut inbound: mpsc::Receiver<Utf8Bytes>,
    updates: UpdateSink,
    registry: &Registry,
    control: &Arc<ConnectionControl>,
) {
    let mut producers = JoinSet::new();
    let mut previous: Option<CancellationToken> = None;

    loop {
        let frame = tokio::select! {
            biased;
            () = control.token.cancelled() => break,
            frame = inbound.recv() => frame,
        };
        let Some(frame) = frame else {
            break;
        };

        if let Some(token) = previous.take() {
            token.cancel();
        }
        reap(&mut producers, control);

        let message = match SubscriptionMessage::decode(frame.as_str()) {
            Ok(message) => message,
            Err(err) => {
                control.fail(format!("invalid subscription frame: {err}"));
                break;
            }
        };
        let Some(producer) = registry.stream(&message.name) else {
            control.fail(format!("stream {:?} is not defined", message.name));
            break;
        };

        tracing::debug!(stream = %message.name, "subscription started");
        let token = control.token.child_token();
        previous = Some(token.clone());

        let producer = Arc::clone(producer);
        let sink = updates.clone();
        let control = Arc::clone(control);
        let SubscriptionMessage { name, args } = message;
        producers.spawn(
            async move {
                let result = producer.produce(token.clone(), args, sink).await;
                match result {
                    Ok(()) => tracing::debug!(stream = %name, "producer finished"),
                    Err(err) if token.is_cancelled() => {
                        tracing::debug!(stream = %name, error = %err, "producer exited after cancel");
                    }
                    Err(StreamError::ConnectionClosed) => {
                        tracing::debug!(stream = %name, "producer outlived writer");
                    }
                    Err(err) => control.fail(format!("stream {name} failed: {err}")),
                }
            }
            .in_current_span(),
        );
    }

    drop(updates);
    while let Some(joined) = producers.join_next().await {
        check_join(joined, control);
    }
    tracing::trace!("stream router exited");
}

fn reap(producers: &mut JoinSet<()>, control: &ConnectionControl) {
    while let Some(joined) = producers.try_join_next() {
        check_join(joined, control);
    }
}

fn check_join(joined: Result<(), tokio::task::JoinError>, control: &ConnectionControl) {
    if let Err(err) = joined {
        control.fail(format!("producer task failed: {err}"));
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use futures::channel::mpsc as fmpsc;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::domain::RegistryBuilder;
    use crate::service::stream_fn;
    use crate::ws::sink::Delivery;

    const WAIT: Duration = Duration::from_secs(5);

    struct Harness {
        frames: fmpsc::UnboundedSender<Result<Message, String>>,
        written: fmpsc::UnboundedReceiver<Message>,
        done: JoinHandle<()>,
    }

    impl Harness {
        fn start(register: impl FnOnce(&mut RegistryBuilder)) -> Self {
            Self::start_with_parent(register, CancellationToken::new())
        }

        fn start_with_parent(
            register: impl FnOnce(&mut RegistryBuilder),
            parent: CancellationToken,
        ) -> Self {
            let mut builder = Registry::builder();
            register(&mut builder);
            let Ok(registry) = builder.build() else {
                panic!("valid registry");
            };
            let (frames, frames_rx) = fmpsc::unbounded();
            let (written_tx, written) = fmpsc::unbounded();
            let done = tokio::spawn(run_connection(
                written_tx,
                frames_rx,
                Arc::new(registry),
                parent,
            ));
            Self {
                frames,
                written,
                done,
            }
        }

        fn subscribe(&self, frame: &'static str) {
            if self.frames.unbounded_send(Ok(Message::text(frame))).is_err() {
                panic!("connection reader is gone");
            }
        }

        async fn next_written(&mut self) -> Message {
            match tokio::time::timeout(WAIT, self.written.next()).await {
                Ok(Some(message)) => message,
                Ok(None) => panic!("writer closed without a frame"),
                Err(_) => panic!("timed out waiting for a frame"),
            }
        }

        async fn next_update(&mut self) -> Update {
            let Message::Text(text) = self.next_written().await else {
                panic!("expected a text frame");
            };
            let Ok(update) = serde_json::from_str(text.as_str()) else {
                panic!("frame is not an update: {}", text.as_str());
            };
            update
        }

        async fn expect_close(mut self, code: u16) {
            let Message::Close(Some(frame)) = self.next_written().await else {
                panic!("expected a close frame");
            };
            assert_eq!(frame.code, code);
            assert!(
                tokio::time::timeout(WAIT, self.done).await.is_ok(),
                "connection did not reach closed"
            );
        }
    }

    fn content(update: &Update) -> Option<&str> {
        update.html.first().map(|h| h.content.as_str())
    }

    fn parked_stream(label: &'static str) -> impl crate::service::StreamProducer {
        stream_fn(move |cancel: CancellationToken, _args, sink: UpdateSink| async move {
            let update = Update::replace_content("#out", label);
            if sink.send_or_cancel(&cancel, update).await? == Delivery::Sent {
                cancel.cancelled().await;
            }
            Ok(())
        })
    }

    #[tokio::test]
    async fn previous_subscription_is_cancelled_before_replacement_starts() {
        let slot: Arc<Mutex<Option<CancellationToken>>> = Arc::default();
        let first_slot = Arc::clone(&slot);
        let second_slot = Arc::clone(&slot);

        let mut conn = Harness::start(move |b| {
            b.stream(
                "First",
                stream_fn(move |cancel: CancellationToken, _args, sink: UpdateSink| {
                    let slot = Arc::clone(&first_slot);
                    async move {
                        if let Ok(mut guard) = slot.lock() {
                            *guard = Some(cancel.clone());
                        }
                        sink.send(Update::replace_content("#out", "first")).await?;
                        cancel.cancelled().await;
                        Ok(())
                    }
                }),
            )
            .stream(
                "Second",
                stream_fn(move |cancel: CancellationToken, _args, sink: UpdateSink| {
                    let slot = Arc::clone(&second_slot);
                    async move {
                        let cancelled = slot
                            .lock()
                            .ok()
                            .and_then(|guard| guard.as_ref().map(CancellationToken::is_cancelled))
                            .unwrap_or(false);
                        let label = if cancelled { "first cancelled" } else { "first live" };
                        sink.send(Update::replace_content("#out", label)).await?;
                        cancel.cancelled().await;
                        Ok(())
                    }
                }),
            );
        });

        conn.subscribe(r#"{"name":"First"}"#);
        assert_eq!(content(&conn.next_update().await), Some("first"));

        conn.subscribe(r#"{"name":"Second","args":{}}"#);
        assert_eq!(content(&conn.next_update().await), Some("first cancelled"));

        conn.frames.close_channel();
        conn.expect_close(close_code::NORMAL).await;
    }

    #[tokio::test]
    async fn updates_are_written_in_order() {
        let mut conn = Harness::start(|b| {
            b.stream(
                "Count",
                stream_fn(|cancel: CancellationToken, _args, sink: UpdateSink| async move {
                    for n in 1..=3 {
                        let update = Update::replace_content("#count", n.to_string());
                        if sink.send_or_cancel(&cancel, update).await? == Delivery::Cancelled {
                            return Ok(());
                        }
                    }
                    cancel.cancelled().await;
                    Ok(())
                }),
            );
        });

        conn.subscribe(r#"{"name":"Count"}"#);
        for expected in ["1", "2", "3"] {
            assert_eq!(content(&conn.next_update().await), Some(expected));
        }

        if conn.frames.unbounded_send(Ok(Message::Close(None))).is_err() {
            panic!("connection reader is gone");
        }
        conn.expect_close(close_code::NORMAL).await;
    }

    #[tokio::test]
    async fn ping_frames_are_ignored() {
        let mut conn = Harness::start(|b| {
            b.stream("Live", parked_stream("live"));
        });
        if conn
            .frames
            .unbounded_send(Ok(Message::Ping(Default::default())))
            .is_err()
        {
            panic!("connection reader is gone");
        }
        conn.subscribe(r#"{"name":"Live"}"#);
        assert_eq!(content(&conn.next_update().await), Some("live"));
        conn.frames.close_channel();
        conn.expect_close(close_code::NORMAL).await;
    }

    #[tokio::test]
    async fn unknown_stream_tears_down_connection() {
        let conn = Harness::start(|b| {
            b.stream("Live", parked_stream("live"));
        });
        conn.subscribe(r#"{"name":"Missing"}"#);
        conn.expect_close(close_code::ERROR).await;
    }

    #[tokio::test]
    async fn malformed_frame_tears_down_live_subscription() {
        let mut conn = Harness::start(|b| {
            b.stream("Live", parked_stream("live"));
        });
        conn.subscribe(r#"{"name":"Live"}"#);
        assert_eq!(content(&conn.next_update().await), Some("live"));

        conn.subscribe("{not json");
        conn.expect_close(close_code::ERROR).await;
    }

    #[tokio::test]
    async fn binary_and_read_errors_are_fatal() {
        let conn = Harness::start(|_| {});
        if conn
            .frames
            .unbounded_send(Ok(Message::Binary(Default::default())))
            .is_err()
        {
            panic!("connection reader is gone");
        }
        conn.expect_close(close_code::ERROR).await;

        let conn = Harness::start(|_| {});
        if conn.frames.unbounded_send(Err("reset".to_string())).is_err() {
            panic!("connection reader is gone");
        }
        conn.expect_close(close_code::ERROR).await;
    }

    #[tokio::test]
    async fn producer_failure_closes_with_error() {
        let conn = Harness::start(|b| {
            b.stream(
                "Broken",
                stream_fn(|_cancel, _args, _sink| async move {
                    Err(StreamError::Failed("backend unavailable".into()))
                }),
            );
        });
        conn.subscribe(r#"{"name":"Broken"}"#);
        conn.expect_close(close_code::ERROR).await;
    }

    #[tokio::test]
    async fn parent_cancellation_closes_normally() {
        let parent = CancellationToken::new();
        let mut conn = Harness::start_with_parent(
            |b| {
                b.stream("Live", parked_stream("live"));
            },
            parent.clone(),
        );
        conn.subscribe(r#"{"name":"Live"}"#);
        assert_eq!(content(&conn.next_update().await), Some("live"));

        parent.cancel();
        conn.expect_close(close_code::NORMAL).await;
    }
}
