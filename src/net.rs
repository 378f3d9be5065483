use std::sync::Arc;
use futures::{StreamExt, SinkExt};
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use crate::state::{SharedGameState, Axes};
use crate::physics::PhysicsWorld;

#[derive(Debug)]
struct ClientMessage {
    msg_type: String,
    throttle: f32,
    steer: f32,
    handbrake: bool,
}

impl ClientMessage {
    fn from_json(txt: &str) -> Option<Self> {
        let v = serde_json::from_str::<serde_json::Value>(txt).ok()?;

        Some(ClientMessage {
            msg_type: v.get("type")?.as_str()?.to_string(),
            throttle: v.get("throttle").and_then(|x| x.as_f64()).unwrap_or(0.0) as f32,
            steer: v.get("steer").and_then(|x| x.as_f64()).unwrap_or(0.0) as f32,
            handbrake: v.get("handbrake").and_then(|x| x.as_bool()).unwrap_or(false),
        })
    }
}

pub async fn start_websocket_server(
    state: Arc<Mutex<SharedGameState>>,
    physics: Arc<Mutex<PhysicsWorld>>,
) {
    let listener = TcpListener::bind("0.0.0.0:9001")
        .await
        .expect("Failed to bind WebSocket port");

    println!("🌐 WebSocket listening on ws://localhost:9001");

    loop {
        let Ok((raw, _)) = listener.accept().await else {
            continue;
        };
        let state_clone = Arc::clone(&state);
        let physics_clone = Arc::clone(&physics);

        tokio::spawn(async move {
            let ws = match accept_async(raw).await {
                Ok(ws) => ws,
                Err(_) => return,
            };
            let (mut write, mut read) = ws.split();

            // -------------------------------
            // 1) Create outgoing message channel
            // -------------------------------
            let (tx, mut rx) = mpsc::unbounded_channel::<String>();

            {
                let mut game = state_clone.lock().await;
                game.register_client(tx.clone());
            }

            // -------------------------------
            // 2) Spawn send-loop task
            // -------------------------------
            tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    let _ = write.send(Message::Text(msg)).await;
                }
            });

            // -------------------------------
            // 3) Create entity + vehicle body
            // -------------------------------
            let player_id = Uuid::new_v4().to_string();
            {
                let mut game = state_clone.lock().await;
                let mut phys = physics_clone.lock().await;

                if let Err(e) = phys.spawn_vehicle_for_player(player_id.clone()) {
                    eprintln!("❌ Could not spawn vehicle for {}: {}", player_id, e);
                    return;
                }
                game.add_entity(player_id.clone());
            }

            println!("🟢 Player connected: {}", player_id);

            // Send welcome through the outgoing TX channel
            let welcome = format!(
                r#"{{"type":"welcome","player_id":"{}"}}"#,
                player_id
            );
            let _ = tx.send(welcome);

            // -------------------------------
            // 4) Main receive loop
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

                if text.contains("\"type\":\"ping\"") {
                    let _ = tx.send("{\"type\":\"pong\"}".into());
                    continue;
                }

                let parsed = match ClientMessage::from_json(text) {
                    Some(v) => v,
                    None => continue,
                };

                if parsed.msg_type == "input" {
                    let axes = Axes {
                        throttle: parsed.throttle,
                        steer: parsed.steer,
                        handbrake: parsed.handbrake,
                    };

                    let mut game = state_clone.lock().await;
                    let tick = game.tick;
                    game.update_input(&player_id, axes, tick);
                }
            }

            println!("🔴 Player disconnected: {}", player_id);
            {
                let mut game = state_clone.lock().await;
                game.remove_entity(&player_id);
            }
            let mut phys = physics_clone.lock().await;
            phys.remove_player(&player_id);
        });
    }
}
