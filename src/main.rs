use vehicle_server::net::start_websocket_server;
use vehicle_server::physics::PhysicsWorld;
use vehicle_server::state::SharedGameState;

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration};

#[tokio::main]
async fn main() {
    println!("🚀 Starting Vehicle Physics Server...");

    let state = Arc::new(Mutex::new(SharedGameState::new()));
    let physics = Arc::new(Mutex::new(PhysicsWorld::new()));

    // Start WebSocket server
    tokio::spawn(start_websocket_server(
        Arc::clone(&state),
        Arc::clone(&physics),
    ));

    // Fixed timestep: ~60 Hz
    let mut ticker = interval(Duration::from_millis(16));

    loop {
        ticker.tick().await;

        let mut phys = physics.lock().await;
        let mut game = state.lock().await;

        // Push the latest input of every entity onto its vehicle
        for entity in game.entities.values() {
            if let Some(ref input) = entity.last_input {
                let axes = &input.axes;
                phys.apply_player_input(&entity.id, axes.throttle, axes.steer, axes.handbrake);
            }
        }

        // Step physics
        phys.step(1.0 / 60.0);

        // Advance tick + broadcast snapshot
        game.tick += 1;
        game.broadcast_snapshot(&phys);
    }
}
