//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code};
use axum::response::IntoResponse;
use futures_util::StreamExt;
use tracing::Instrument;
use uuid::Uuid;

use super::SUBPROTOCOL;
use super::connection::run_connection;
use crate::app_state::AppState;

/// `GET /guiapi/ws`: Upgrade to the update stream.
///
/// Only the `guiapi` sub-protocol is offered. A client that did not
/// negotiate it gets a protocol-error close frame and nothing else.
#[utoipa::path(
    get,
    path = "/guiapi/ws",
    tag = "Stream",
    responses(
        (status = 101, description = "Switching to the update stream"),
        (status = 400, description = "Not a WebSocket upgrade request")
    )
)]
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let registry = Arc::clone(&state.registry);
    let shutdown = state.shutdown.clone();

    ws.protocols([SUBPROTOCOL])
        .on_upgrade(move |socket| serve_socket(socket, registry, shutdown))
}

async fn serve_socket(
    mut socket: WebSocket,
    registry: Arc<crate::domain::Registry>,
    shutdown: tokio_util::sync::CancellationToken,
) {
    let span = tracing::info_span!("stream", conn_id = %Uuid::new_v4());

    let negotiated = socket
        .protocol()
        .and_then(|p| p.to_str().ok())
        .is_some_and(|p| p == SUBPROTOCOL);
    if !negotiated {
        span.in_scope(|| tracing::warn!("client did not negotiate the guiapi sub-protocol"));
        let frame = CloseFrame {
            code: close_code::PROTOCOL,
            reason: Utf8Bytes::from_static("unsupported sub-protocol"),
        };
        if let Err(err) = socket.send(Message::Close(Some(frame))).await {
            span.in_scope(|| tracing::debug!(error = %err, "close handshake failed"));
        }
        return;
    }

    let (sink, stream) = socket.split();
    run_connection(sink, stream, registry, shutdown)
        .instrument(span)
        .await;
}
