//! WebSocket event feed.
//!
//! On connect the client receives a `STATUS` snapshot, then every
//! [`BroadcastEvent`](crate::events::BroadcastEvent) as JSON text. A client
//! that falls behind the broadcast buffer gets a `LAGGED` notice and keeps
//! receiving from the oldest retained event.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::api::AppState;
use crate::services::PlayerStatus;

/// Client requests.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum WsIncoming {
    GetStatus,
}

/// Feed messages that are not domain events.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum WsOutgoing {
    Status { payload: PlayerStatus },
    Lagged { skipped: u64 },
    Error { message: String },
}

impl WsOutgoing {
    fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Message::Text(json.into())),
            Err(e) => {
                log::warn!("[WS] Failed to serialize outgoing message: {}", e);
                None
            }
        }
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = BroadcastStream::new(state.event_bridge.subscribe());

    let conn_guard = state.ws_manager.register();
    let cancel_token = conn_guard.cancel_token().clone();

    let initial = WsOutgoing::Status {
        payload: state.handle.status(),
    };
    if let Some(msg) = initial.to_message() {
        if sender.send(msg).await.is_err() {
            log::debug!("[WS] {} left before initial status", conn_guard.id());
            return;
        }
    }

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log::info!("[WS] Connection closed by server: {}", conn_guard.id());
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<WsIncoming>(&text) {
                            Ok(WsIncoming::GetStatus) => WsOutgoing::Status {
                                payload: state.handle.status(),
                            },
                            Err(e) => WsOutgoing::Error {
                                message: format!("Unrecognised message: {}", e),
                            },
                        };
                        if let Some(msg) = reply.to_message() {
                            if sender.send(msg).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            event = events.next() => {
                match event {
                    Some(Ok(event)) => {
                        match serde_json::to_string(&event) {
                            Ok(json) => {
                                if sender.send(Message::Text(json.into())).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => log::warn!("[WS] Failed to serialize event: {}", e),
                        }
                    }
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        log::warn!("[WS] {} lagged by {} event(s)", conn_guard.id(), skipped);
                        if let Some(msg) = (WsOutgoing::Lagged { skipped }).to_message() {
                            if sender.send(msg).await.is_err() {
                                break;
                            }
                        }
                    }
                    None => break,
                }
            }
        }
    }
}
