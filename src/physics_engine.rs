// Physics Engine - Dominant-mass gravity and rigid-body plumbing
// Implements the body registry, the gravity pass and a point-mass physics world

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::SimConfig;
use crate::scene::{Color, Primitive, SceneGraph, TextureResolver, VisualHandle, VisualSpec};

// =============================================================================
// SCENE-SCALE CONSTANTS
// =============================================================================

/// Gravitational constant at vignette scale
pub const G: f64 = 10.0;

/// Squared separation below which a gravity pair is skipped for the step
pub const MIN_DISTANCE_SQ: f64 = 1.0;

/// Descriptor `size` to body radius
pub const SIZE_TO_RADIUS: f64 = 3.0;

// =============================================================================
// 3D VECTOR MATHEMATICS
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const UP: Vector3 = Vector3 {
        x: 0.0,
        y: 1.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude_squared().sqrt()
    }

    pub fn magnitude_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag > 1e-15 {
            Self {
                x: self.x / mag,
                y: self.y / mag,
                z: self.z / mag,
            }
        } else {
            Self::zero()
        }
    }

    pub fn dot(&self, other: &Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn scale(&self, s: f64) -> Self {
        Self {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }

    pub fn add(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }

    pub fn sub(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }

    pub fn distance(&self, other: &Vector3) -> f64 {
        self.sub(other).magnitude()
    }

    /// Move `t` of the way toward `target`
    pub fn lerp(&self, target: &Vector3, t: f64) -> Vector3 {
        self.add(&target.sub(self).scale(t))
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

// =============================================================================
// BODIES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub u64);

/// Role tag fixed at creation; resolution logic never looks at names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyRole {
    #[default]
    Generic,
    Sun,
    Earth,
    Asteroid,
}

impl BodyRole {
    /// One-time classification for descriptor objects that carry no explicit role
    pub fn classify(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("asteroid") {
            BodyRole::Asteroid
        } else if lower.contains("earth") {
            BodyRole::Earth
        } else if lower.contains("sun") {
            BodyRole::Sun
        } else {
            BodyRole::Generic
        }
    }
}

/// Everything needed to instantiate a body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodySpec {
    pub name: String,
    pub role: BodyRole,
    pub texture_key: String,
    pub mass: f64,
    pub radius: f64,
    pub position: Vector3,
    pub velocity: Vector3,
}

impl BodySpec {
    pub fn momentum(&self) -> Vector3 {
        self.velocity.scale(self.mass)
    }
}

#[derive(Debug, Clone)]
pub struct Body {
    pub id: BodyId,
    pub name: String,
    pub role: BodyRole,
    pub texture_key: String,
    pub mass: f64,
    pub radius: f64,
    pub position: Vector3,
    pub velocity: Vector3,
    pub alive: bool,
    pub visual: Option<VisualHandle>,
    pub physics: Option<PhysicsHandle>,
}

impl Body {
    pub fn momentum(&self) -> Vector3 {
        self.velocity.scale(self.mass)
    }
}

// =============================================================================
// BODY REGISTRY
// =============================================================================

/// Live bodies of the active scenario, paired with their external handles
#[derive(Debug, Default)]
pub struct BodyRegistry {
    bodies: Vec<Body>,
    next_id: u64,
}

impl BodyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the physics body and visual for `spec` and register it
    pub fn spawn(
        &mut self,
        spec: BodySpec,
        physics: &mut dyn PhysicsWorld,
        scene: &mut dyn SceneGraph,
        textures: &dyn TextureResolver,
    ) -> BodyId {
        let id = BodyId(self.next_id);
        self.next_id += 1;

        let physics_handle = physics.add_body(RigidBodyDesc {
            mass: spec.mass,
            radius: spec.radius,
            position: spec.position,
            velocity: spec.velocity,
        });

        let visual = scene.create_visual(
            VisualSpec::new(
                Primitive::Sphere {
                    texture: Some(textures.resolve(&spec.texture_key)),
                    color: Color::WHITE,
                },
                spec.position,
            )
            .with_scale(spec.radius),
        );

        self.bodies.push(Body {
            id,
            name: spec.name,
            role: spec.role,
            texture_key: spec.texture_key,
            mass: spec.mass,
            radius: spec.radius,
            position: spec.position,
            velocity: spec.velocity,
            alive: true,
            visual: Some(visual),
            physics: Some(physics_handle),
        });

        id
    }

    pub fn get(&self, id: BodyId) -> Option<&Body> {
        self.bodies.iter().find(|b| b.id == id)
    }

    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.iter_mut().find(|b| b.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Body> {
        self.bodies.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Body> {
        self.bodies.iter_mut()
    }

    pub fn iter_live(&self) -> impl Iterator<Item = &Body> {
        self.bodies.iter().filter(|b| b.alive)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.iter_live().count()
    }

    pub fn find_by_physics(&self, handle: PhysicsHandle) -> Option<BodyId> {
        self.bodies
            .iter()
            .find(|b| b.physics == Some(handle))
            .map(|b| b.id)
    }

    /// Copy the latest rigid-body state into live bodies
    pub fn sync_from(&mut self, physics: &dyn PhysicsWorld) {
        for body in self.bodies.iter_mut().filter(|b| b.alive) {
            if let Some(state) = body.physics.and_then(|h| physics.body_state(h)) {
                body.position = state.position;
                body.velocity = state.velocity;
            }
        }
    }

    pub fn push_transforms(&self, scene: &mut dyn SceneGraph) {
        for body in self.iter_live() {
            if let Some(visual) = body.visual {
                scene.set_transform(visual, body.position, body.radius);
            }
        }
    }

    /// Remove dead bodies and release their physics and visual handles
    pub fn reap_dead(
        &mut self,
        physics: &mut dyn PhysicsWorld,
        scene: &mut dyn SceneGraph,
    ) -> Vec<BodyId> {
        let mut reaped = Vec::new();
        self.bodies.retain_mut(|body| {
            if body.alive {
                return true;
            }
            release_handles(body, &mut *physics, &mut *scene);
            reaped.push(body.id);
            false
        });
        reaped
    }

    /// Release every body, alive or not
    pub fn clear(&mut self, physics: &mut dyn PhysicsWorld, scene: &mut dyn SceneGraph) {
        for body in self.bodies.iter_mut() {
            release_handles(body, physics, scene);
        }
        self.bodies.clear();
    }
}

fn release_handles(body: &mut Body, physics: &mut dyn PhysicsWorld, scene: &mut dyn SceneGraph) {
    if let Some(handle) = body.physics.take() {
        physics.remove_body(handle);
    }
    if let Some(visual) = body.visual.take() {
        scene.remove_visual(visual);
    }
}

// =============================================================================
// GRAVITY (single dominant mass)
// =============================================================================

pub struct GravityIntegrator {
    pub g: f64,
    /// Pairs closer than this (squared) get no force for the step
    pub min_distance_sq: f64,
}

impl GravityIntegrator {
    pub fn new(g: f64, min_distance_sq: f64) -> Self {
        Self { g, min_distance_sq }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(config.gravity_constant, config.min_distance_sq)
    }

    /// F = G * m_star * m_body / r², directed from body to star
    pub fn force_on(&self, body: &Body, star: &Body) -> Option<Vector3> {
        let dist_vec = star.position.sub(&body.position);
        let r_sq = dist_vec.magnitude_squared();
        if r_sq < self.min_distance_sq {
            return None;
        }

        let force = self.g * star.mass * body.mass / r_sq;
        Some(dist_vec.normalize().scale(force))
    }

    /// Apply the star's pull to every other live body. Returns the number of forces applied.
    pub fn apply(&self, registry: &BodyRegistry, physics: &mut dyn PhysicsWorld) -> usize {
        let live: Vec<&Body> = registry
            .iter_live()
            .filter(|b| b.physics.is_some())
            .collect();
        if live.len() < 2 {
            return 0;
        }

        let Some(star) = dominant_body(&live) else {
            return 0;
        };

        let mut applied = 0;
        for body in live.iter().filter(|b| b.id != star.id) {
            let (Some(handle), Some(force)) = (body.physics, self.force_on(body, star)) else {
                continue;
            };
            physics.apply_force(handle, force);
            applied += 1;
        }
        applied
    }
}

impl Default for GravityIntegrator {
    fn default() -> Self {
        Self::new(G, MIN_DISTANCE_SQ)
    }
}

/// Highest-mass body; the earliest one wins a tie
fn dominant_body<'a>(bodies: &[&'a Body]) -> Option<&'a Body> {
    bodies.iter().copied().fold(None, |best, b| match best {
        Some(star) if star.mass >= b.mass => Some(star),
        _ => Some(b),
    })
}

// =============================================================================
// PHYSICS WORLD
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicsHandle(pub u64);

#[derive(Debug, Clone, Copy)]
pub struct RigidBodyDesc {
    pub mass: f64,
    pub radius: f64,
    pub position: Vector3,
    pub velocity: Vector3,
}

#[derive(Debug, Clone, Copy)]
pub struct BodyState {
    pub position: Vector3,
    pub velocity: Vector3,
}

/// Two rigid bodies whose shapes overlapped during a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub a: PhysicsHandle,
    pub b: PhysicsHandle,
}

/// Physics collaborator. Forces accumulate until the next `step` and are then cleared.
pub trait PhysicsWorld: Send + Sync {
    fn add_body(&mut self, desc: RigidBodyDesc) -> PhysicsHandle;
    fn remove_body(&mut self, handle: PhysicsHandle) -> bool;
    fn apply_force(&mut self, handle: PhysicsHandle, force: Vector3);
    fn step(&mut self, dt: f64);
    fn take_contacts(&mut self) -> Vec<Contact>;
    fn body_state(&self, handle: PhysicsHandle) -> Option<BodyState>;
    fn set_radius(&mut self, handle: PhysicsHandle, radius: f64);
    fn body_count(&self) -> usize;
}

#[derive(Debug, Clone)]
struct PointMass {
    mass: f64,
    radius: f64,
    position: Vector3,
    velocity: Vector3,
    force: Vector3,
}

/// Semi-implicit Euler point masses with sphere overlap detection (naive broadphase).
/// Contacts are reported every step while two spheres overlap; there is no contact response.
#[derive(Debug, Default)]
pub struct PointMassWorld {
    bodies: HashMap<u64, PointMass>,
    order: Vec<u64>,
    next_handle: u64,
    contacts: Vec<Contact>,
}

impl PointMassWorld {
    pub fn new() -> Self {
        Self::default()
    }

    fn detect_contacts(&mut self) {
        for (i, &ha) in self.order.iter().enumerate() {
            for &hb in &self.order[i + 1..] {
                let (Some(a), Some(b)) = (self.bodies.get(&ha), self.bodies.get(&hb)) else {
                    continue;
                };
                let reach = a.radius + b.radius;
                if a.position.sub(&b.position).magnitude_squared() < reach * reach {
                    self.contacts.push(Contact {
                        a: PhysicsHandle(ha),
                        b: PhysicsHandle(hb),
                    });
                }
            }
        }
    }
}

impl PhysicsWorld for PointMassWorld {
    fn add_body(&mut self, desc: RigidBodyDesc) -> PhysicsHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.bodies.insert(
            handle,
            PointMass {
                mass: desc.mass,
                radius: desc.radius,
                position: desc.position,
                velocity: desc.velocity,
                force: Vector3::zero(),
            },
        );
        self.order.push(handle);
        PhysicsHandle(handle)
    }

    fn remove_body(&mut self, handle: PhysicsHandle) -> bool {
        self.order.retain(|&h| h != handle.0);
        self.bodies.remove(&handle.0).is_some()
    }

    fn apply_force(&mut self, handle: PhysicsHandle, force: Vector3) {
        if let Some(body) = self.bodies.get_mut(&handle.0) {
            body.force = body.force.add(&force);
        }
    }

    fn step(&mut self, dt: f64) {
        for body in self.bodies.values_mut() {
            if body.mass > 0.0 {
                let accel = body.force.scale(1.0 / body.mass);
                body.velocity = body.velocity.add(&accel.scale(dt));
            }
            body.position = body.position.add(&body.velocity.scale(dt));
            body.force = Vector3::zero();
        }
        self.detect_contacts();
    }

    fn take_contacts(&mut self) -> Vec<Contact> {
        std::mem::take(&mut self.contacts)
    }

    fn body_state(&self, handle: PhysicsHandle) -> Option<BodyState> {
        self.bodies.get(&handle.0).map(|b| BodyState {
            position: b.position,
            velocity: b.velocity,
        })
    }

    fn set_radius(&mut self, handle: PhysicsHandle, radius: f64) {
        if let Some(body) = self.bodies.get_mut(&handle.0) {
            body.radius = radius;
        }
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

// =============================================================================
// FIXED-STEP SUB-STEPPING
// =============================================================================

/// Splits a frame's elapsed time into fixed physics sub-steps.
/// Leftover time carries into the next frame; time beyond `max_substeps` is dropped.
#[derive(Debug, Clone)]
pub struct FixedStepper {
    pub fixed_step: f64,
    pub max_substeps: usize,
    accumulator: f64,
}

impl FixedStepper {
    pub fn new(fixed_step: f64, max_substeps: usize) -> Self {
        Self {
            fixed_step,
            max_substeps: max_substeps.max(1),
            accumulator: 0.0,
        }
    }

    pub fn substeps(&mut self, frame_dt: f64) -> usize {
        self.accumulator += frame_dt;
        let mut steps = 0;
        // Tolerance keeps a 1/60 frame from being lost to rounding
        while self.accumulator + 1e-9 >= self.fixed_step && steps < self.max_substeps {
            self.accumulator -= self.fixed_step;
            steps += 1;
        }
        self.accumulator = self.accumulator.max(0.0) % self.fixed_step;
        steps
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

// =============================================================================
// TESTS
// =============================================================================
