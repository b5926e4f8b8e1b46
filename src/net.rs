use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use log::{error, info, warn};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::accept_async;
use tungstenite::Message;
use uuid::Uuid;

use crate::arcade_drive::DriveIntent;
use crate::physics::PhysicsWorld;
use crate::state::SharedGameState;

const SPAWN_POSITION: [f32; 3] = [0.0, 1.3, 0.0];

/// Incoming client message. Inputs are held buttons, not axes: the
/// drive model does its own ramping server-side.
#[derive(Debug, Deserialize)]
struct ClientMessage {
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(flatten)]
    intent: DriveIntent,
}

pub async fn start_websocket_server(
    state: Arc<Mutex<SharedGameState>>,
    physics: Arc<Mutex<PhysicsWorld>>,
) {
    let listener = match TcpListener::bind("0.0.0.0:9001").await {
        Ok(l) => l,
        Err(e) => {
            error!("failed to bind websocket port: {e}");
            return;
        }
    };

    info!("websocket listening on ws://localhost:9001");

    loop {
        let (raw, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("accept failed: {e}");
                continue;
            }
        };
        let state_clone = Arc::clone(&state);
        let physics_clone = Arc::clone(&physics);

        tokio::spawn(async move {
            let ws = match accept_async(raw).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("websocket handshake with {addr} failed: {e}");
                    return;
                }
            };
            let (mut write, mut read) = ws.split();

            // -------------------------------
            // 1) Outgoing message channel + send loop
            // -------------------------------
            let (tx, mut rx) = mpsc::unbounded_channel::<String>();

            {
                let mut game = state_clone.lock().await;
                game.register_client(tx.clone());
            }

            tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    if write.send(Message::Text(msg)).await.is_err() {
                        break;
                    }
                }
            });

            // -------------------------------
            // 2) Spawn the player's car
            // -------------------------------
            let player_id = Uuid::new_v4().to_string();
            {
                let mut phys = physics_clone.lock().await;
                if let Err(e) =
                    phys.spawn_vehicle_for_player(player_id.clone(), SPAWN_POSITION)
                {
                    warn!("rejecting {addr}: bad car config: {e}");
                    return;
                }
            }

            info!("player connected: {player_id} ({addr})");

            let welcome = format!(r#"{{"type":"welcome","player_id":"{player_id}"}}"#);
            let _ = tx.send(welcome);

            // -------------------------------
            // 3) Main receive loop
            // -------------------------------
            while let Some(msg) = read.next().await {
                let msg = match msg {
                    Ok(m) => m,
                    Err(_) => break,
                };

                if !msg.is_text() {
                    continue;
                }
                let text = match msg.to_text() {
                    Ok(t) => t,
                    Err(_) => continue,
                };

                let parsed = match serde_json::from_str::<ClientMessage>(text) {
                    Ok(v) => v,
                    Err(_) => continue,
                };

                match parsed.msg_type.as_str() {
                    "ping" => {
                        let _ = tx.send("{\"type\":\"pong\"}".into());
                    }
                    "input" => {
                        let mut phys = physics_clone.lock().await;
                        phys.apply_player_input(&player_id, parsed.intent);
                    }
                    other => {
                        warn!("unknown message type {other:?} from {player_id}");
                    }
                }
            }

            info!("player disconnected: {player_id}");
            let mut phys = physics_clone.lock().await;
            phys.remove_vehicle(&player_id);
        });
    }
}
