use log::warn;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::physics::{PhysicsWorld, WheelPose};

/// Speed (m/s) to engine pitch slope: idle 1.0, +1 per 25 m/s.
const ENGINE_PITCH_PER_MPS: f32 = 1.0 / 25.0;

#[derive(Serialize)]
pub struct PlayerSnapshot {
    pub id: String,
    pub position: [f32; 3],
    pub rotation: [f32; 4], // quaternion (i, j, k, w)
    pub speed_kmh: f32,
    pub speed_display: i32, // rounded for the HUD
    pub is_drifting: bool,
    pub is_traction_locked: bool,
    pub skid_active: bool,
    pub engine_pitch: f32,
    pub wheels: Vec<WheelPose>,
}

#[derive(Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub players: Vec<PlayerSnapshot>,
}

pub struct SharedGameState {
    pub tick: u64,
    pub clients: Vec<UnboundedSender<String>>,
}

impl SharedGameState {
    pub fn new() -> Self {
        Self {
            tick: 0,
            clients: Vec::new(),
        }
    }

    pub fn register_client(&mut self, tx: UnboundedSender<String>) {
        self.clients.push(tx);
    }

    /// Build and send a snapshot of every vehicle to all clients.
    /// Senders whose receive side is gone are dropped from the list.
    pub fn broadcast_snapshot(&mut self, physics: &PhysicsWorld) {
        let mut players = Vec::with_capacity(physics.vehicles.len());

        for (id, vehicle) in &physics.vehicles {
            if let Some(body) = physics.bodies.get(vehicle.body) {
                let iso = body.position();
                let ctrl = &vehicle.controller;
                let speed_mps = body.linvel().magnitude();
                players.push(PlayerSnapshot {
                    id: id.clone(),
                    position: [
                        iso.translation.vector.x,
                        iso.translation.vector.y,
                        iso.translation.vector.z,
                    ],
                    rotation: [
                        iso.rotation.i,
                        iso.rotation.j,
                        iso.rotation.k,
                        iso.rotation.w,
                    ],
                    speed_kmh: ctrl.car_speed(),
                    speed_display: ctrl.car_speed().round() as i32,
                    is_drifting: ctrl.is_drifting(),
                    is_traction_locked: ctrl.is_traction_locked(),
                    skid_active: ctrl.skid_active(),
                    engine_pitch: 1.0 + speed_mps.abs() * ENGINE_PITCH_PER_MPS,
                    wheels: vehicle.wheel_poses.clone(),
                });
            }
        }

        let json = match serde_json::to_string(&Snapshot {
            tick: self.tick,
            players,
        }) {
            Ok(json) => json,
            Err(e) => {
                warn!("snapshot serialization failed: {e}");
                return;
            }
        };

        self.clients.retain(|tx| tx.send(json.clone()).is_ok());
    }
}
