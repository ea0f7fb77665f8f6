//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{ArenaCommand, Outbound};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::ClientMsg;

/// Longest display name kept, in characters
pub const MAX_NAME_CHARS: usize = 16;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Display name chosen by the client
    #[serde(default)]
    pub name: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let id = Uuid::new_v4();
    let name = display_name(query.name.as_deref(), id);
    ws.on_upgrade(move |socket| handle_socket(socket, id, name, state))
}

/// Trimmed, length-capped name, or `Survivor-XXXX` from the player id
pub fn display_name(raw: Option<&str>, id: Uuid) -> String {
    let cleaned: String = raw
        .unwrap_or_default()
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_CHARS)
        .collect();
    let cleaned = cleaned.trim_end();

    if cleaned.is_empty() {
        let simple = id.simple().to_string();
        format!("Survivor-{}", simple[..4].to_uppercase())
    } else {
        cleaned.to_string()
    }
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, id: Uuid, name: String, state: AppState) {
    info!(player_id = %id, name = %name, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let command_tx = state.arena.command_tx.clone();

    // Subscribe before joining so the targeted welcome is not missed
    let outbound_rx = state.arena.subscribe();

    if command_tx.send(ArenaCommand::Join { id, name }).await.is_err() {
        warn!(player_id = %id, "Arena is not running, dropping connection");
        return;
    }

    run_session(id, ws_sink, ws_stream, command_tx.clone(), outbound_rx).await;

    // Cleanup on disconnect
    let _ = command_tx.send(ArenaCommand::Leave { id }).await;

    info!(player_id = %id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    id: Uuid,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    command_tx: mpsc::Sender<ArenaCommand>,
    mut outbound_rx: broadcast::Receiver<Outbound>,
) {
    let rate_limiter = ConnectionRateLimiter::new();

    // Spawn writer task: arena broadcast -> WebSocket
    let mut writer_handle = tokio::spawn(async move {
        loop {
            match outbound_rx.recv().await {
                Ok(msg) => {
                    if !msg.is_for(id) {
                        continue;
                    }
                    if let Err(e) = ws_sink.send(Message::Text(msg.json.to_string())).await {
                        debug!(player_id = %id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(player_id = %id, lagged_count = n, "Client lagged, skipped messages");
                    // Continue - don't disconnect for lag
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(player_id = %id, "Outbound channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> arena task
    loop {
        tokio::select! {
            _ = &mut writer_handle => {
                warn!(player_id = %id, "Writer stopped, closing connection");
                return;
            }
            frame = ws_stream.next() => {
                let Some(result) = frame else { break };
                match result {
                    Ok(Message::Text(text)) => {
                        if !rate_limiter.check_input() {
                            debug!(player_id = %id, "Rate limited inbound message");
                            continue;
                        }

                        match serde_json::from_str::<ClientMsg>(&text) {
                            Ok(msg) => {
                                if command_tx.send(ArenaCommand::Client { id, msg }).await.is_err() {
                                    debug!(player_id = %id, "Command channel closed");
                                    break;
                                }
                            }
                            Err(e) => {
                                debug!(player_id = %id, error = %e, "Dropping malformed client message");
                            }
                        }
                    }
                    Ok(Message::Binary(_)) => {
                        debug!(player_id = %id, "Received binary message, ignoring");
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Ok(Message::Close(_)) => {
                        info!(player_id = %id, "Client initiated close");
                        break;
                    }
                    Err(e) => {
                        warn!(player_id = %id, error = %e, "WebSocket error");
                        break;
                    }
                }
            }
        }
    }

    writer_handle.abort();
}
