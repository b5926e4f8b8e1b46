mod arcade_drive;
mod net;
mod physics;
mod state;

use crate::net::start_websocket_server;
use crate::physics::PhysicsWorld;
use crate::state::SharedGameState;

use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration};

#[tokio::main]
async fn main() {
    env_logger::init();
    info!("starting parking server");

    let state = Arc::new(Mutex::new(SharedGameState::new()));
    let physics = Arc::new(Mutex::new(PhysicsWorld::new()));

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

        phys.step(1.0 / 60.0);

        game.tick += 1;
        game.broadcast_snapshot(&phys);
    }
}
