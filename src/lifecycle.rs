// Scenario Lifecycle Controller - Owns the active scenario and drives each frame
//
// Frame order:
//   1. clock + due scheduled events
//   2. scenario update hook
//   3. sub-steps: gravity -> physics step -> registry sync -> contact resolution
//   4. body pass: transforms, reap dead
//   5. effect pass: advance, drop finished
//   6. camera follow

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::camera::{CameraPose, CameraRig, FocusController, Ray};
use crate::collision_resolver::{resolve_contact, ResolveContext, Resolution};
use crate::config::SimConfig;
use crate::effects::{ActiveEffect, EffectFrame, EffectKind, EffectRequest, EffectStatus, FlameTrail};
use crate::physics_engine::{
    BodyId, BodyRegistry, BodySpec, FixedStepper, GravityIntegrator, PhysicsWorld, PointMassWorld,
    Vector3,
};
use crate::scenario::{
    HookContext, PassthroughSetup, SceneDescriptor, ScenarioError, ScenarioHooks, ScenarioKind,
    ScenarioSetup, SetupRegistry,
};
use crate::scene::{Color, HeadlessScene, SceneGraph, TextureCatalog, TextureResolver};

// =============================================================================
// SCHEDULED EVENTS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduledEvent {
    SpawnMerged(BodySpec),
}

#[derive(Debug)]
struct PendingEvent {
    due_at: f64,
    seq: u64,
    event: ScheduledEvent,
}

/// Events keyed on the controller clock, fired in due order (insertion order on ties)
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: Vec<PendingEvent>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due_at: f64, event: ScheduledEvent) {
        self.pending.push(PendingEvent {
            due_at,
            seq: self.next_seq,
            event,
        });
        self.next_seq += 1;
    }

    /// Remove and return every event due at or before `now`
    pub fn drain_due(&mut self, now: f64) -> Vec<ScheduledEvent> {
        let (mut due, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|p| p.due_at <= now);
        self.pending = waiting;

        due.sort_by(|a, b| a.due_at.total_cmp(&b.due_at).then(a.seq.cmp(&b.seq)));
        due.into_iter().map(|p| p.event).collect()
    }

    pub fn next_due(&self) -> Option<f64> {
        self.pending.iter().map(|p| p.due_at).min_by(f64::total_cmp)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecyclePhase {
    Uninitialized,
    Active(ScenarioKind),
    Transitioning,
}

struct ActiveScenario {
    kind: ScenarioKind,
    hooks: Option<Box<dyn ScenarioHooks>>,
}

/// What happened during one `tick`
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub frame: u64,
    pub substeps: usize,
    pub forces_applied: usize,
    pub spawned: Vec<BodyId>,
    pub resolutions: Vec<Resolution>,
    pub reaped: Vec<BodyId>,
    pub effects_finished: usize,
}

pub struct ScenarioController<S = HeadlessScene, P = PointMassWorld>
where
    S: SceneGraph + 'static,
    P: PhysicsWorld + 'static,
{
    config: SimConfig,
    scene: S,
    physics: P,
    textures: Box<dyn TextureResolver>,
    setups: SetupRegistry,
    registry: BodyRegistry,
    effects: Vec<ActiveEffect>,
    events: EventQueue,
    scenario: Option<ActiveScenario>,
    phase: LifecyclePhase,
    camera: CameraRig,
    focus: FocusController,
    stepper: FixedStepper,
    gravity: GravityIntegrator,
    rng: StdRng,
    clock: f64,
    frame: u64,
}

impl ScenarioController {
    /// Headless scene, point-mass physics and the built-in setups
    pub fn headless(config: SimConfig) -> Self {
        Self::new(
            config,
            HeadlessScene::new(),
            PointMassWorld::new(),
            Box::new(TextureCatalog::default()),
            SetupRegistry::builtin(),
        )
    }
}

impl<S, P> ScenarioController<S, P>
where
    S: SceneGraph + 'static,
    P: PhysicsWorld + 'static,
{
    pub fn new(
        config: SimConfig,
        scene: S,
        physics: P,
        textures: Box<dyn TextureResolver>,
        setups: SetupRegistry,
    ) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            stepper: FixedStepper::new(config.fixed_step, config.max_substeps),
            gravity: GravityIntegrator::from_config(&config),
            config,
            scene,
            physics,
            textures,
            setups,
            registry: BodyRegistry::new(),
            effects: Vec::new(),
            events: EventQueue::new(),
            scenario: None,
            phase: LifecyclePhase::Uninitialized,
            camera: CameraRig::default(),
            focus: FocusController::new(),
            rng,
            clock: 0.0,
            frame: 0,
        }
    }

    // ---- Scenario switching -------------------------------------------------

    /// Tear down the running scenario and build the one `descriptor` describes.
    /// A descriptor without `scenarioType` is rejected and nothing changes.
    pub fn switch_scenario(&mut self, descriptor: &SceneDescriptor) -> Result<ScenarioKind, ScenarioError> {
        let kind = ScenarioKind::resolve(descriptor)?;

        self.phase = LifecyclePhase::Transitioning;
        self.teardown();

        let setup = match self.setups.run(kind, descriptor, &mut self.scene) {
            Ok(setup) => setup,
            Err(e) => {
                warn!("{}, falling back to passthrough", e);
                PassthroughSetup.setup(kind, descriptor, &mut self.scene)?
            }
        };

        let ids: Vec<BodyId> = setup
            .bodies
            .into_iter()
            .map(|spec| {
                self.registry
                    .spawn(spec, &mut self.physics, &mut self.scene, self.textures.as_ref())
            })
            .collect();

        let mut hooks = setup.hooks;
        if let Some(hooks) = hooks.as_mut() {
            hooks.attach(&ids);
        }

        if let Some((primary, impactor)) = setup.impact_pair {
            if let (Some(&primary), Some(&impactor)) = (ids.get(primary), ids.get(impactor)) {
                self.effects.push(ActiveEffect::FlameTrail(FlameTrail::attach(
                    &mut self.scene,
                    impactor,
                    Some(primary),
                )));
            }
        }

        let camera = setup
            .camera
            .or_else(|| descriptor.camera_position.map(CameraPose::looking_at_origin));
        if let Some(pose) = camera {
            self.camera.set_default(pose);
        }

        info!("scenario '{}' active with {} bodies", kind, ids.len());
        self.scenario = Some(ActiveScenario { kind, hooks });
        self.phase = LifecyclePhase::Active(kind);
        Ok(kind)
    }

    /// Release everything the running scenario owns. Cleanup failures are logged only.
    fn teardown(&mut self) {
        if let Some(mut active) = self.scenario.take() {
            if let Some(hooks) = active.hooks.as_mut() {
                if let Err(e) = hooks.cleanup(&mut self.scene) {
                    warn!("cleanup of '{}' failed: {}", active.kind, e);
                }
            }
        }

        self.focus.clear();
        for effect in self.effects.iter_mut() {
            effect.dispose(&mut self.scene);
        }
        self.effects.clear();
        self.registry.clear(&mut self.physics, &mut self.scene);
        self.events.clear();
        self.stepper.reset();
    }

    // ---- Frame --------------------------------------------------------------

    pub fn tick(&mut self, dt: f64) -> FrameReport {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        self.frame += 1;
        self.clock += dt;

        let mut report = FrameReport {
            frame: self.frame,
            ..Default::default()
        };

        for event in self.events.drain_due(self.clock) {
            match event {
                ScheduledEvent::SpawnMerged(spec) => report.spawned.push(self.spawn_merged(spec)),
            }
        }

        if let Some(hooks) = self.scenario.as_mut().and_then(|s| s.hooks.as_mut()) {
            let mut ctx = HookContext {
                bodies: &mut self.registry,
                physics: &mut self.physics,
                scene: &mut self.scene,
            };
            hooks.update(dt, &mut ctx);
        }

        let gravity_on = self.gravity_enabled();
        report.substeps = self.stepper.substeps(dt);
        for _ in 0..report.substeps {
            if gravity_on {
                report.forces_applied += self.gravity.apply(&self.registry, &mut self.physics);
            }
            self.physics.step(self.stepper.fixed_step);
            self.registry.sync_from(&self.physics);

            for contact in self.physics.take_contacts() {
                let (Some(a), Some(b)) = (
                    self.registry.find_by_physics(contact.a),
                    self.registry.find_by_physics(contact.b),
                ) else {
                    continue;
                };
                let resolution = self.on_body_contact(a, b);
                if resolution != Resolution::Ignored {
                    report.resolutions.push(resolution);
                }
            }
        }

        self.registry.push_transforms(&mut self.scene);
        report.reaped = self.registry.reap_dead(&mut self.physics, &mut self.scene);

        report.effects_finished = self.advance_effects();

        self.focus.follow(&mut self.camera, &self.registry, &self.scene);

        report
    }

    fn advance_effects(&mut self) -> usize {
        let mut frame = EffectFrame {
            scene: &mut self.scene,
            bodies: &self.registry,
            rng: &mut self.rng,
            tick: self.frame,
        };

        let before = self.effects.len();
        self.effects.retain_mut(|effect| {
            if effect.advance(&mut frame) == EffectStatus::Running {
                return true;
            }
            effect.dispose(&mut *frame.scene);
            false
        });
        before - self.effects.len()
    }

    fn spawn_merged(&mut self, spec: BodySpec) -> BodyId {
        let origin = spec.position;
        let name = spec.name.clone();
        let id = self
            .registry
            .spawn(spec, &mut self.physics, &mut self.scene, self.textures.as_ref());
        self.spawn_effect(EffectRequest::Explosion { color: Color::WHITE }, origin);
        info!("{} formed at {:?}", name, origin);
        id
    }

    /// Entry point for a contact reported between two registered bodies
    pub fn on_body_contact(&mut self, a: BodyId, b: BodyId) -> Resolution {
        let mut ctx = ResolveContext {
            physics: &mut self.physics,
            scene: &mut self.scene,
            rng: &mut self.rng,
            effects: &mut self.effects,
            events: &mut self.events,
            now: self.clock,
            merge_delay: self.config.merge_delay,
        };
        resolve_contact(&mut self.registry, a, b, &mut ctx)
    }

    /// Start a one-shot effect at `origin` and register it with this scenario
    pub fn spawn_effect(&mut self, request: EffectRequest, origin: Vector3) -> EffectKind {
        let effect = ActiveEffect::spawn(request, origin, &mut self.scene, &mut self.rng);
        let kind = effect.kind();
        debug!("registered {:?}, {} effects active", kind, self.effects.len() + 1);
        self.effects.push(effect);
        kind
    }

    pub fn pick(&mut self, ray: &Ray) -> Option<BodyId> {
        self.focus.pick(ray, &self.registry, &mut self.camera)
    }

    // ---- Accessors ----------------------------------------------------------

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn kind(&self) -> Option<ScenarioKind> {
        self.scenario.as_ref().map(|s| s.kind)
    }

    pub fn gravity_enabled(&self) -> bool {
        self.kind().map_or(false, |k| k.gravity_enabled())
    }

    pub fn registry(&self) -> &BodyRegistry {
        &self.registry
    }

    pub fn effects(&self) -> &[ActiveEffect] {
        &self.effects
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    pub fn focus(&self) -> &FocusController {
        &self.focus
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

// =============================================================================
// TESTS
// =============================================================================
