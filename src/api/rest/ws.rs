use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let rx = state.trip_events_tx.subscribe();

    info!("websocket client connected");

    let send_task = tokio::spawn(async move {
        let mut events = BroadcastStream::new(rx);
        while let Some(event) = events.next().await {
            // A lagged receiver just misses events; snapshots are
            // self-contained, so the next one catches it up.
            let Ok(offer) = event else { continue };

            let json = match serde_json::to_string(&offer) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize trip event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("websocket client disconnected");
}
