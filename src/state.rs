use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;

use crate::physics::PhysicsWorld;
use crate::vehicle::WheelTelemetry;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Axes {
    pub throttle: f32,
    pub steer: f32,
    pub handbrake: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityInput {
    pub tick: u64,
    pub axes: Axes,
}

pub struct Entity {
    pub id: String,
    pub last_input: Option<EntityInput>,
}

#[derive(Serialize)]
pub struct PlayerSnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub rotation: [f32; 4], // quaternion (i, j, k, w)
    pub wheels: Vec<WheelTelemetry>,
}

#[derive(Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub players: Vec<PlayerSnapshot>,
}

pub struct SharedGameState {
    pub tick: u64,
    pub clients: Vec<UnboundedSender<String>>,
    pub entities: HashMap<String, Entity>,
}

impl SharedGameState {
    pub fn new() -> Self {
        Self {
            tick: 0,
            clients: Vec::new(),
            entities: HashMap::new(),
        }
    }

    pub fn register_client(&mut self, tx: UnboundedSender<String>) {
        self.clients.push(tx);
    }

    pub fn add_entity(&mut self, id: String) {
        self.entities.insert(
            id.clone(),
            Entity {
                id,
                last_input: None,
            },
        );
    }

    pub fn remove_entity(&mut self, id: &str) {
        self.entities.remove(id);
    }

    pub fn update_input(&mut self, id: &str, axes: Axes, tick: u64) {
        if let Some(entity) = self.entities.get_mut(id) {
            entity.last_input = Some(EntityInput { tick, axes });
        }
    }

    /// Build and send a snapshot of all entities to all clients.
    pub fn broadcast_snapshot(&self, physics: &PhysicsWorld) {
        let mut players = Vec::with_capacity(self.entities.len());

        for entity in self.entities.values() {
            let Some(vehicle) = physics.vehicles.get(&entity.id) else {
                continue;
            };
            if let Some(body) = physics.bodies.get(vehicle.body) {
                let pos = body.translation();
                let rot = body.rotation();
                players.push(PlayerSnapshot {
                    id: entity.id.clone(),
                    x: pos.x,
                    y: pos.y,
                    z: pos.z,
                    rotation: [rot.i, rot.j, rot.k, rot.w],
                    wheels: vehicle.wheel_telemetry(),
                });
            }
        }

        let json = serde_json::to_string(&Snapshot {
            tick: self.tick,
            players,
        })
        .unwrap();

        for tx in &self.clients {
            let _ = tx.send(json.clone());
        }
    }
}
