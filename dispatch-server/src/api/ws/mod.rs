//! Dispatch WebSocket endpoint
//!
//! GET /api/dispatch/ws?token=<JWT>
//! Auth: JWT in the query string (browser WebSocket cannot set headers)
//!
//! Protocol (JSON text frames, see [`shared::message`]):
//! - Server → client: `ready`, `registered`, `event`, `error`
//! - Client → server: `register-rider`
//!
//! Every session receives status changes. Assignment events reach only the
//! session registered for the rider.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::{Router, routing::get};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::message::{ClientMessage, DispatchEvent, ServerMessage};
use shared::order::Role;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use crate::auth::CurrentUser;
use crate::auth::extractor::resolve;
use crate::core::ServerState;
use crate::live::{DispatchHub, RIDER_QUEUE_CAPACITY};
use crate::security_log;

const WS_PATH: &str = "/api/dispatch/ws";

pub fn router() -> Router<ServerState> {
    Router::new().route(WS_PATH, get(handle_dispatch_ws))
}

#[derive(Deserialize)]
pub struct WsAuthQuery {
    token: String,
}

/// GET /api/dispatch/ws?token=<JWT>
pub async fn handle_dispatch_ws(
    State(state): State<ServerState>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    // Log the bare path; the query carries the token
    let user = resolve(state.jwt_service(), &query.token, &http::Uri::from_static(WS_PATH))?;
    Ok(ws.on_upgrade(move |socket| dispatch_ws_session(socket, state, user)))
}

type WsSink = futures::stream::SplitSink<WebSocket, Message>;

async fn send_message(sink: &mut WsSink, msg: &ServerMessage) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|e| {
        tracing::error!("Failed to serialize server message: {e}");
    })?;
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}

async fn send_error(sink: &mut WsSink, code: ErrorCode, message: impl Into<String>) -> Result<(), ()> {
    send_message(
        sink,
        &ServerMessage::Error {
            code,
            message: message.into(),
        },
    )
    .await
}

/// Whether `user` may receive assignment events for `rider_id`
fn may_register(user: &CurrentUser, rider_id: &str) -> bool {
    match user.role {
        Role::Rider => user.id == rider_id,
        Role::Admin => true,
        Role::Customer => false,
    }
}

/// The rider id one session receives assignment events for
///
/// Re-registering under a different id releases the previous one, and
/// dropping the registration (session end) releases the current one.
struct SessionRegistration {
    hub: DispatchHub,
    connection_id: u64,
    tx: mpsc::Sender<DispatchEvent>,
    rider_id: Option<String>,
}

impl SessionRegistration {
    fn new(hub: DispatchHub, connection_id: u64, tx: mpsc::Sender<DispatchEvent>) -> Self {
        Self {
            hub,
            connection_id,
            tx,
            rider_id: None,
        }
    }

    fn register(&mut self, rider_id: &str) {
        if let Some(previous) = self.rider_id.take()
            && previous != rider_id
        {
            self.hub.unregister(&previous, self.connection_id);
        }
        self.hub.register_rider(rider_id, self.connection_id, self.tx.clone());
        self.rider_id = Some(rider_id.to_string());
    }
}

impl Drop for SessionRegistration {
    fn drop(&mut self) {
        if let Some(rider_id) = self.rider_id.take() {
            self.hub.unregister(&rider_id, self.connection_id);
        }
    }
}

async fn dispatch_ws_session(socket: WebSocket, state: ServerState, user: CurrentUser) {
    let hub = state.hub().clone();
    let connection_id = hub.next_connection_id();
    let (mut sink, mut stream) = socket.split();

    tracing::info!(
        connection_id,
        user_id = %user.id,
        role = ?user.role,
        "Dispatch WS connected"
    );

    let mut status_rx = hub.subscribe();
    let (rider_tx, mut rider_rx) = mpsc::channel::<DispatchEvent>(RIDER_QUEUE_CAPACITY);
    let mut registration = SessionRegistration::new(hub.clone(), connection_id, rider_tx);

    if send_message(&mut sink, &ServerMessage::Ready { connection_id })
        .await
        .is_err()
    {
        return;
    }

    let idle_timeout = state.config().ws_idle_timeout();
    let mut ping_interval = tokio::time::interval(state.config().ws_ping_interval());
    ping_interval.tick().await; // skip immediate
    let mut last_inbound = Instant::now();
    let shutdown = state.shutdown.clone();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }

            _ = ping_interval.tick() => {
                if last_inbound.elapsed() > idle_timeout {
                    tracing::info!(connection_id, "Dispatch WS idle, closing");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                if sink.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }

            event = status_rx.recv() => {
                match event {
                    Ok(event) => {
                        if send_message(&mut sink, &ServerMessage::Event { event }).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // No backfill; the client re-fetches
                        tracing::warn!(connection_id, lagged = n, "Dispatch WS subscriber lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            Some(event) = rider_rx.recv() => {
                if send_message(&mut sink, &ServerMessage::Event { event }).await.is_err() {
                    break;
                }
            }

            msg = stream.next() => {
                last_inbound = Instant::now();
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let outcome = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::RegisterRider { rider_id }) => {
                                if may_register(&user, &rider_id) {
                                    registration.register(&rider_id);
                                    send_message(&mut sink, &ServerMessage::Registered { rider_id }).await
                                } else {
                                    security_log!(
                                        "WARN",
                                        "ws_register_denied",
                                        user_id = user.id.as_str(),
                                        rider_id = rider_id.as_str()
                                    );
                                    send_error(
                                        &mut sink,
                                        ErrorCode::PermissionDenied,
                                        "Riders may only register their own id",
                                    )
                                    .await
                                }
                            }
                            Err(e) => {
                                tracing::debug!(connection_id, "Unparseable client frame: {e}");
                                send_error(&mut sink, ErrorCode::InvalidFormat, "Unrecognized message").await
                            }
                        };
                        if outcome.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::warn!(connection_id, "Dispatch WS error: {e}");
                        break;
                    }
                    _ => {} // Binary, Pong
                }
            }
        }
    }

    drop(registration);
    tracing::info!(connection_id, user_id = %user.id, "Dispatch WS disconnected");
}
