//! Gateway: the WebSocket transport behind the presence registry.
//!
//! A session announces itself on connect, receives pushes through an
//! unbounded channel drained by the write pump, and may send chat messages
//! as client frames.  When either half of the socket ends, the session is
//! forgotten by connection id.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use marginalia_shared::{ClientFrame, ServerEvent};

use crate::api::AppState;
use crate::auth::AuthedUser;
use crate::presence::SessionHandle;

pub async fn gateway_upgrade(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid) {
    let (mut sink, mut stream) = socket.split();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = SessionHandle::new(tx);
    let conn_id = handle.conn_id();

    // Kept for surfacing rejected frames back on this same session.
    let reply = handle.clone();

    state.presence.announce(user_id, handle).await;
    info!(user = %user_id, conn = %conn_id, "gateway session opened");

    if send_event(&mut sink, &ServerEvent::Ready { user_id })
        .await
        .is_err()
    {
        state.presence.forget(conn_id).await;
        return;
    }

    // Write pump: queued pushes -> socket.
    let mut write_pump = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if send_event(&mut sink, &event).await.is_err() {
                break;
            }
        }
    });

    // Read loop: client frames -> delivery router.
    let router = state.router.clone();
    let mut read_pump = tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    debug!(user = %user_id, error = %e, "gateway socket error");
                    break;
                }
            };

            match frame {
                WsMessage::Text(text) => match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(ClientFrame::SendMessage { receiver, text }) => {
                        if let Err(err) = router.send_message(user_id, receiver, &text).await {
                            warn!(user = %user_id, error = %err, "message rejected");
                            let _ = reply.push(ServerEvent::Error {
                                message: err.to_string(),
                            });
                        }
                    }
                    Err(e) => {
                        debug!(user = %user_id, error = %e, "unparseable client frame");
                        let _ = reply.push(ServerEvent::Error {
                            message: "unrecognized frame".into(),
                        });
                    }
                },
                WsMessage::Close(_) => break,
                // Ping/pong are answered by axum itself.
                _ => {}
            }
        }
    });

    // Whichever half finishes first tears down the other.
    tokio::select! {
        _ = &mut write_pump => read_pump.abort(),
        _ = &mut read_pump => write_pump.abort(),
    }

    state.presence.forget(conn_id).await;
    info!(user = %user_id, conn = %conn_id, "gateway session closed");
}

async fn send_event(
    sink: &mut SplitSink<WebSocket, WsMessage>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "failed to serialize gateway event");
            return Ok(());
        }
    };
    sink.send(WsMessage::Text(text.into())).await
}
