//! Connection handlers for the Parley server.
//!
//! This module handles the WebSocket connection lifecycle and dispatches
//! decoded client events into the hub.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use parley_core::{Hub, HubConfig};
use parley_protocol::{codec, ClientEvent, ServerEvent};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The chat hub.
    pub hub: Hub,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let hub_config = HubConfig {
            history_capacity: config.limits.history_capacity,
        };

        Self {
            hub: Hub::with_config(hub_config),
            config,
        }
    }
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    // Build router
    let app = Router::new()
        .route(&config.transport.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .route("/api/rooms", get(rooms_handler))
        .route("/api/users", get(users_handler))
        .with_state(state);

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Parley server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Room list handler.
async fn rooms_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.hub.room_summaries())
}

/// Presence list handler.
async fn users_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.hub.presence_snapshot())
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    // Record connection metrics
    let _metrics_guard = ConnectionMetricsGuard::new();

    // Generate connection ID
    let connection_id = format!(
        "conn_{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    );

    debug!(connection = %connection_id, "WebSocket connected");

    // Split the WebSocket
    let (mut sender, mut receiver) = socket.split();

    // Register the outbound queue; the hub replies with the connected
    // handshake through it
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ServerEvent>();
    state.hub.connect(&connection_id, event_tx);

    // Read buffer for partial frames
    let mut read_buffer = BytesMut::with_capacity(4096);

    // Event processing loop
    'session: loop {
        tokio::select! {
            biased;

            // Deliver events fanned out to this connection
            Some(event) = event_rx.recv() => {
                match codec::encode(&event) {
                    Ok(data) => {
                        metrics::record_frame(data.len(), "outbound");
                        if sender.send(Message::Binary(data.to_vec())).await.is_err() {
                            break 'session;
                        }
                    }
                    Err(e) => {
                        error!(connection = %connection_id, error = %e, "Failed to encode event");
                    }
                }
            }

            // Receive from WebSocket
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Binary(data))) => {
                        read_buffer.extend_from_slice(&data);

                        // Decode as many complete frames as the buffer holds
                        loop {
                            match codec::decode_from::<ClientEvent>(&mut read_buffer) {
                                Ok(Some(event)) => {
                                    metrics::record_frame(data.len(), "inbound");
                                    dispatch(&event, &connection_id, &state);
                                }
                                Ok(None) => break,
                                Err(e) => {
                                    warn!(connection = %connection_id, error = %e, "Protocol error");
                                    metrics::record_error("protocol");
                                    break 'session;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        // Treat text as binary
                        read_buffer.extend_from_slice(text.as_bytes());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break 'session;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %connection_id, "Received close frame");
                        break 'session;
                    }
                    Some(Err(e)) => {
                        warn!(connection = %connection_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break 'session;
                    }
                    None => {
                        debug!(connection = %connection_id, "WebSocket stream ended");
                        break 'session;
                    }
                }
            }
        }
    }

    // Cleanup cascades through presence, typing, and room subscriptions
    state.hub.disconnect(&connection_id);
    metrics::set_active_rooms(state.hub.room_count());

    debug!(connection = %connection_id, "WebSocket disconnected");
}

/// Dispatch a decoded client event into the hub.
///
/// Validation failures come back as an error notice to the originating
/// connection alone; not-found conditions are already silent inside the
/// hub.
fn dispatch(event: &ClientEvent, connection_id: &str, state: &Arc<AppState>) {
    let hub = &state.hub;

    let result = match event {
        ClientEvent::Identify { display_name } => hub.identify(connection_id, display_name),

        ClientEvent::CreateRoom { name } => {
            let result = hub.create_room(connection_id, name).map(|_| ());
            metrics::set_active_rooms(hub.room_count());
            result
        }

        ClientEvent::JoinRoom { room_id } => {
            hub.join_room(connection_id, room_id);
            Ok(())
        }

        ClientEvent::SendMessage { text, room_id } => {
            let result = hub.send_message(connection_id, room_id, text);
            if result.is_ok() {
                metrics::record_chat_message("room");
            }
            result
        }

        ClientEvent::SendPrivateMessage { recipient_id, text } => {
            let result = hub.send_private(connection_id, recipient_id, text);
            if result.is_ok() {
                metrics::record_chat_message("private");
            }
            result
        }

        ClientEvent::SetTyping { room_id, is_typing } => {
            hub.set_typing(connection_id, room_id, *is_typing);
            Ok(())
        }

        ClientEvent::ToggleReaction {
            message_id,
            emoji,
            room_id,
        } => {
            hub.toggle_reaction(connection_id, *message_id, emoji, room_id);
            metrics::record_reaction();
            Ok(())
        }
    };

    if let Err(e) = result {
        debug!(connection = %connection_id, error = %e, "Validation failure");
        metrics::record_error("validation");
        hub.notify_error(connection_id, &e);
    }
}
