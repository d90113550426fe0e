//! Live snapshot stream over WebSocket.
//!
//! On connect the current snapshot is sent immediately, then every snapshot
//! the hub fans out. The client only needs to answer pings.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::{Extensions, HeaderMap, header::ORIGIN},
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tracing::debug;

use crate::api::error::ApiError;
use crate::api::server::AppState;
use crate::hub::{BroadcastHub, Frame, SubscriberState, Subscription, encode_snapshot_frame};
use crate::snapshot::SnapshotReader;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(live_ws))
}

/// Admission happens before the upgrade so a full hub answers with a plain
/// 503 instead of an accepted-then-closed socket.
async fn live_ws(
    State(state): State<AppState>,
    headers: HeaderMap,
    extensions: Extensions,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let (hub, reader) = match (&state.hub, &state.snapshot) {
        (Some(hub), Some(reader)) => (hub.clone(), reader.clone()),
        _ => {
            return ApiError::service_unavailable("Live updates are not available").into_response();
        }
    };

    let origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok());
    if !hub.origin_allowed(origin) {
        debug!(origin = ?origin, "Rejected live connection from disallowed origin");
        return ApiError::forbidden("Origin not allowed").into_response();
    }

    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string());
    let subscription = match hub.register(peer) {
        Ok(subscription) => subscription,
        Err(e) => return ApiError::from(e).into_response(),
    };

    match ws {
        Ok(ws) => ws
            .on_upgrade(move |socket| handle_socket(socket, subscription, reader, hub))
            .into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

type WsSender = SplitSink<WebSocket, Message>;

async fn send_frame(sender: &mut WsSender, frame: &Frame, write_timeout: Duration) -> bool {
    let message = Message::Text(frame.as_str().into());
    matches!(
        tokio::time::timeout(write_timeout, sender.send(message)).await,
        Ok(Ok(()))
    )
}

async fn handle_socket(
    socket: WebSocket,
    mut subscription: Subscription,
    reader: SnapshotReader,
    hub: Arc<BroadcastHub>,
) {
    let config = hub.config().clone();
    let (mut sender, mut receiver) = socket.split();

    // 1. Current snapshot first
    let current = reader.current();
    let initial = match encode_snapshot_frame(&current) {
        Ok(frame) => frame,
        Err(e) => {
            debug!("Failed to encode initial snapshot: {}", e);
            return;
        }
    };
    if !send_frame(&mut sender, &initial, config.write_timeout).await {
        debug!("Failed to send initial snapshot, client disconnected");
        subscription.close(SubscriberState::WriteFailed);
        return;
    }
    subscription.activate();
    // Frames queued during the handshake may repeat the initial snapshot
    let mut last_sequence = current.sequence;

    // 2. Stream hub frames with a heartbeat
    let start = tokio::time::Instant::now() + config.ping_interval;
    let mut heartbeat_interval = tokio::time::interval_at(start, config.ping_interval);
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        subscription.close(SubscriberState::Closing);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        subscription.touch();
                        if sender.send(Message::Pong(data)).await.is_err() {
                            subscription.close(SubscriberState::WriteFailed);
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        awaiting_pong = false;
                        subscription.touch();
                    }
                    Some(Ok(_)) => subscription.touch(),
                    Some(Err(e)) => {
                        debug!("WebSocket read error: {}", e);
                        subscription.close(SubscriberState::Closing);
                        break;
                    }
                }
            }

            frame = subscription.recv_after(last_sequence) => {
                match frame {
                    Some(frame) => {
                        if !send_frame(&mut sender, &frame, config.write_timeout).await {
                            debug!(
                                subscriber = subscription.id(),
                                "Write failed, dropping subscriber"
                            );
                            subscription.close(SubscriberState::WriteFailed);
                            break;
                        }
                        last_sequence = frame.sequence();
                    }
                    // Removed by the hub (idle reaper or failed fan-out)
                    None => break,
                }
            }

            _ = heartbeat_interval.tick() => {
                if awaiting_pong {
                    debug!(
                        subscriber = subscription.id(),
                        "Client failed to respond to Ping, closing connection"
                    );
                    subscription.close(SubscriberState::TimedOut);
                    break;
                }
                if sender.send(Message::Ping(Bytes::new())).await.is_ok() {
                    awaiting_pong = true;
                } else {
                    subscription.close(SubscriberState::WriteFailed);
                    break;
                }
            }
        }
    }

    let _ = sender.close().await;
}
