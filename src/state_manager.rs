// State Manager - Thread-safe scenario state handling
// Shares the controller with the background frame loop and applies text requests to it

use chrono::{DateTime, Local};
use log::{info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::api_client::{ClientError, SceneGenerator};
use crate::camera::CameraPose;
use crate::config::AppConfig;
use crate::lifecycle::ScenarioController;
use crate::physics_engine::{BodyRole, PhysicsWorld};
use crate::scenario::{SceneDescriptor, ScenarioError, ScenarioKind};
use crate::scene::SceneGraph;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

// =============================================================================
// STATUS LINE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Idle,
    Thinking,
    Applied,
    Failed,
}

/// Last user-visible status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMessage {
    pub text: String,
    pub kind: StatusKind,
    pub at: DateTime<Local>,
}

impl StatusMessage {
    pub fn new(kind: StatusKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
            at: Local::now(),
        }
    }
}

// =============================================================================
// GLOBAL STATE
// =============================================================================

pub struct AppState {
    pub controller: Arc<RwLock<ScenarioController>>,
    pub status: Arc<RwLock<StatusMessage>>,
    pub is_running: Arc<RwLock<bool>>,
    pub is_paused: Arc<RwLock<bool>>,
}

impl AppState {
    /// Controller with the default solar system already running
    pub fn new(config: &AppConfig) -> Self {
        let mut controller = ScenarioController::headless(config.sim.clone());
        if let Err(e) = controller.switch_scenario(&SceneDescriptor::new("solar_system", Vec::new())) {
            warn!("initial scenario failed: {}", e);
        }

        Self {
            controller: Arc::new(RwLock::new(controller)),
            status: Arc::new(RwLock::new(StatusMessage::new(StatusKind::Idle, "ready"))),
            is_running: Arc::new(RwLock::new(false)),
            is_paused: Arc::new(RwLock::new(false)),
        }
    }

    pub fn set_status(&self, kind: StatusKind, text: impl Into<String>) {
        *self.status.write() = StatusMessage::new(kind, text);
    }

    pub fn status(&self) -> StatusMessage {
        self.status.read().clone()
    }

    pub fn set_paused(&self, paused: bool) {
        *self.is_paused.write() = paused;
    }

    /// Generate a descriptor for `text` and switch to it.
    /// On any failure the running scenario is left untouched.
    pub async fn handle_request<G: SceneGenerator>(
        &self,
        generator: &G,
        text: &str,
    ) -> Result<ScenarioKind, RequestError> {
        self.set_status(StatusKind::Thinking, "thinking...");

        let descriptor = match generator.generate(text).await {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!("request {:?} failed: {}", text, e);
                self.set_status(StatusKind::Failed, format!("error: {}", e));
                return Err(e.into());
            }
        };

        // Lock only after the await; a switch happens between frames
        let switched = self.controller.write().switch_scenario(&descriptor);
        match switched {
            Ok(kind) => {
                info!("request {:?} applied as {}", text, kind);
                self.set_status(StatusKind::Applied, format!("applied: {}", kind));
                Ok(kind)
            }
            Err(e) => {
                warn!("request {:?} rejected: {}", text, e);
                self.set_status(StatusKind::Failed, format!("error: {}", e));
                Err(e.into())
            }
        }
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        let status = self.status();
        let controller = self.controller.read();
        FrameSnapshot::capture(&*controller, status)
    }
}

// =============================================================================
// SIMULATION LOOP (runs in background thread)
// =============================================================================

pub fn start_simulation_loop(
    controller: Arc<RwLock<ScenarioController>>,
    is_running: Arc<RwLock<bool>>,
    is_paused: Arc<RwLock<bool>>,
    frame_interval: Duration,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut last = Instant::now();

        loop {
            let start = Instant::now();
            let dt = start.duration_since(last).as_secs_f64();
            last = start;

            if !*is_paused.read() {
                // One frame per write lock, so a switch can only land between frames
                controller.write().tick(dt);
            }

            // Check if we should stop
            if !*is_running.read() {
                break;
            }

            // Sleep to maintain frame rate
            let elapsed = start.elapsed();
            if elapsed < frame_interval {
                thread::sleep(frame_interval - elapsed);
            }
        }
    })
}

// =============================================================================
// SERIALIZABLE SNAPSHOT
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodySnapshot {
    pub id: u64,
    pub name: String,
    pub role: BodyRole,
    pub texture_key: String,
    pub mass: f64,
    pub radius: f64,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub scenario: Option<ScenarioKind>,
    pub frame: u64,
    pub clock: f64,
    pub bodies: Vec<BodySnapshot>,
    pub effects: Vec<String>,
    pub pending_events: usize,
    pub focused: Option<u64>,
    pub camera: CameraPose,
    pub status: StatusMessage,
}

impl FrameSnapshot {
    pub fn capture<S, P>(controller: &ScenarioController<S, P>, status: StatusMessage) -> Self
    where
        S: SceneGraph + 'static,
        P: PhysicsWorld + 'static,
    {
        let bodies = controller
            .registry()
            .iter_live()
            .map(|b| BodySnapshot {
                id: b.id.0,
                name: b.name.clone(),
                role: b.role,
                texture_key: b.texture_key.clone(),
                mass: b.mass,
                radius: b.radius,
                position: [b.position.x, b.position.y, b.position.z],
                velocity: [b.velocity.x, b.velocity.y, b.velocity.z],
            })
            .collect();

        Self {
            scenario: controller.kind(),
            frame: controller.frame(),
            clock: controller.clock(),
            bodies,
            effects: controller
                .effects()
                .iter()
                .map(|e| format!("{:?}", e.kind()))
                .collect(),
            pending_events: controller.events().len(),
            focused: controller.focus().focused().map(|id| id.0),
            camera: controller.camera().pose(),
            status,
        }
    }
}
