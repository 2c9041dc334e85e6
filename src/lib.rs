// Starfall - Physics-driven astronomical vignettes from free-text requests
// Library root and the interactive entry point

pub mod api_client;
pub mod camera;
pub mod collision_resolver;
pub mod config;
pub mod effects;
pub mod lifecycle;
pub mod physics_engine;
pub mod scenario;
pub mod scene;
pub mod state_manager;

use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

pub use api_client::{ClientError, GenerationClient, SceneGenerator};
pub use config::{AppConfig, SimConfig};
pub use lifecycle::{FrameReport, ScenarioController};
pub use scenario::{SceneDescriptor, ScenarioKind};
pub use state_manager::{start_simulation_loop, AppState};

/// Run the frame loop in the background and apply one request per stdin line.
///
/// `status` prints a JSON snapshot, `pause` / `resume` freeze the loop,
/// `quit` or `exit` (or end of input) stops.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let app_state = AppState::new(&config);
    let client = GenerationClient::from_config(&config);

    // Start background simulation loop
    *app_state.is_running.write() = true;
    let sim_thread = start_simulation_loop(
        app_state.controller.clone(),
        app_state.is_running.clone(),
        app_state.is_paused.clone(),
        config.frame_interval(),
    );
    info!("simulation running, requests go to {}", client.api_base());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let request = line.trim();
        match request {
            "" => continue,
            "quit" | "exit" => break,
            "status" => println!("{}", serde_json::to_string_pretty(&app_state.snapshot())?),
            "pause" => app_state.set_paused(true),
            "resume" => app_state.set_paused(false),
            _ => {
                // Failures are already on the status line; the current scenario keeps running
                if let Err(e) = app_state.handle_request(&client, request).await {
                    warn!("{}", e);
                }
                let status = app_state.status();
                println!("[{}] {}", status.at.format("%H:%M:%S"), status.text);
            }
        }
    }

    *app_state.is_running.write() = false;
    sim_thread
        .join()
        .map_err(|_| anyhow::anyhow!("simulation thread panicked"))?;
    info!("stopped after {} frames", app_state.controller.read().frame());
    Ok(())
}
