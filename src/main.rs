use kart_server::error::KartError;
use kart_server::kart::KartTuning;
use kart_server::net::start_websocket_server;
use kart_server::physics::PhysicsWorld;
use kart_server::settings::ServerSettings;
use kart_server::state::SharedGameState;

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), KartError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = ServerSettings::load("kart-server")?;
    let tuning = KartTuning::load(&settings.profile, settings.tuning_file.as_deref())?;
    info!(profile = %settings.profile, tick_rate = settings.tick_rate, "starting kart server");

    let state = Arc::new(Mutex::new(SharedGameState::new()));
    let physics = Arc::new(Mutex::new(PhysicsWorld::new(tuning, &settings)?));

    // Start WebSocket server
    let server = tokio::spawn(start_websocket_server(
        settings.bind.clone(),
        Arc::clone(&state),
        Arc::clone(&physics),
    ));

    // Fixed timestep
    let dt = settings.tick_dt();
    let mut ticker = interval(Duration::from_secs_f32(dt));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if server.is_finished() {
            break;
        }

        let mut phys = physics.lock().await;
        let mut game = state.lock().await;

        let report = phys.step(dt)?;
        for (kart, fault) in &report.faults {
            warn!(kart = %kart, error = %fault, "kart fault, respawned");
        }

        // Advance tick + broadcast snapshot
        game.tick += 1;
        game.broadcast_snapshot(&phys);
    }

    match server.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            error!(error = %err, "websocket server stopped");
            Err(err)
        }
        Err(join) => {
            error!(error = %join, "websocket task panicked");
            Ok(())
        }
    }
}
