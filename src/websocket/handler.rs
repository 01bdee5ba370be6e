//! Bridges one axum `WebSocket` to the connection runtime.
//!
//! A reader task feeds inbound text frames to `connection::run`, and
//! `connection::run`'s single outbound channel is drained by a writer task
//! here, so the socket itself only ever has one writer.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::connection;
use crate::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<serde_json::Value>();

    let deps = state.connection_deps();
    let runtime = tokio::spawn(connection::run(deps, in_rx, out_tx));

    let writer = tokio::spawn(async move {
        while let Some(value) = out_rx.recv().await {
            let text = match serde_json::to_string(&value) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize outbound frame");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if in_tx.send(text).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Binary(_)) => {}
            Err(e) => {
                tracing::debug!(error = %e, "websocket receive error");
                break;
            }
        }
    }

    // Dropping `in_tx` tells `connection::run` the client is gone; it
    // drains in-flight work, cancels every feed, and returns, which closes
    // `out_tx` and lets the writer task finish.
    drop(in_tx);
    let _ = runtime.await;
    let _ = writer.await;
}
