// Particle Effects - Flame trail, debris burst, flash + shockwave, explosion
// Effects never reschedule themselves: the owner calls `advance` once per frame until finished

use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
use std::f64::consts::TAU;

use crate::physics_engine::{BodyId, BodyRegistry, Vector3};
use crate::scene::{Color, Primitive, SceneGraph, VisualHandle, VisualSpec};

/// Fixed integration step for one effect tick
pub const EFFECT_DT: f64 = 1.0 / 60.0;

/// Opacity at which fading effects are considered gone
const VANISH_OPACITY: f64 = 0.02;

// =============================================================================
// PARTICLE RING BUFFER
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct Particle {
    pub position: Vector3,
    pub velocity: Vector3,
    pub born_tick: u64,
}

/// Fixed-capacity particle slots. Once full, the oldest slot is overwritten.
#[derive(Debug, Clone)]
pub struct ParticleBuffer {
    slots: Vec<Particle>,
    cursor: u64,
    alive: usize,
}

impl ParticleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Particle::default(); capacity.max(1)],
            cursor: 0,
            alive: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn alive_count(&self) -> usize {
        self.alive
    }

    /// Total particles ever written
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Write one particle and return the slot it landed in
    pub fn emit(&mut self, position: Vector3, velocity: Vector3, tick: u64) -> usize {
        let slot = (self.cursor % self.slots.len() as u64) as usize;
        self.cursor += 1;
        self.alive = (self.alive + 1).min(self.slots.len());
        self.slots[slot] = Particle {
            position,
            velocity,
            born_tick: tick,
        };
        slot
    }

    pub fn live(&self) -> &[Particle] {
        &self.slots[..self.alive]
    }

    pub fn live_mut(&mut self) -> &mut [Particle] {
        &mut self.slots[..self.alive]
    }

    /// x += v*dt, then v *= damping
    pub fn integrate(&mut self, dt: f64, damping: f64) {
        for p in self.live_mut() {
            p.position = p.position.add(&p.velocity.scale(dt));
            p.velocity = p.velocity.scale(damping);
        }
    }

    pub fn positions(&self) -> Vec<Vector3> {
        self.live().iter().map(|p| p.position).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectStatus {
    Running,
    Finished,
}

/// What an effect may touch during one `advance`
pub struct EffectFrame<'a> {
    pub scene: &'a mut dyn SceneGraph,
    pub bodies: &'a BodyRegistry,
    pub rng: &'a mut StdRng,
    pub tick: u64,
}

fn release(scene: &mut dyn SceneGraph, handle: &mut Option<VisualHandle>) {
    if let Some(h) = handle.take() {
        scene.remove_visual(h);
    }
}

fn signed_unit(rng: &mut StdRng) -> f64 {
    rng.gen::<f64>() - 0.5
}

// =============================================================================
// FLAME TRAIL
// =============================================================================

pub const TRAIL_CAPACITY: usize = 1400;
const TRAIL_FADE: f64 = 0.92;
const TRAIL_RANGE: f64 = 200.0;

/// How strongly the trail burns at `distance` from the primary body (0..=1)
pub fn trail_strength(distance: f64) -> f64 {
    (1.0 - distance / TRAIL_RANGE).clamp(0.0, 1.0)
}

/// Streak of burning particles behind an impactor, brighter near the primary
pub struct FlameTrail {
    source: BodyId,
    primary: Option<BodyId>,
    buffer: ParticleBuffer,
    visual: Option<VisualHandle>,
    opacity: f64,
    finished: bool,
}

impl FlameTrail {
    pub fn attach(scene: &mut dyn SceneGraph, source: BodyId, primary: Option<BodyId>) -> Self {
        let visual = scene.create_visual(VisualSpec::new(
            Primitive::Points {
                capacity: TRAIL_CAPACITY,
                point_size: 0.7,
                color: Color::from_hex(0xffaa33),
                vertex_colors: None,
                additive: true,
            },
            Vector3::zero(),
        ));

        Self {
            source,
            primary,
            buffer: ParticleBuffer::new(TRAIL_CAPACITY),
            visual: Some(visual),
            opacity: 1.0,
            finished: false,
        }
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn buffer(&self) -> &ParticleBuffer {
        &self.buffer
    }

    pub fn advance(&mut self, frame: &mut EffectFrame<'_>) -> EffectStatus {
        if self.finished {
            return EffectStatus::Finished;
        }

        let Some(source) = frame.bodies.get(self.source).filter(|b| b.alive) else {
            return self.fade(frame.scene);
        };

        let primary_pos = self
            .primary
            .and_then(|id| frame.bodies.get(id))
            .map(|b| b.position)
            .unwrap_or_else(Vector3::zero);
        let strength = trail_strength(source.position.distance(&primary_pos));

        self.opacity = 0.10 + 0.90 * strength;

        let mut dir = source.velocity;
        if dir.magnitude_squared() < 1e-6 {
            dir = Vector3::new(1.0, 0.0, 0.0);
        }
        let backward = dir.normalize().scale(-1.0);

        let emit = (2.0 + 14.0 * strength).floor() as usize;
        for _ in 0..emit {
            let rng = &mut *frame.rng;
            let jitter = 0.8 + rng.gen::<f64>() * 1.2;
            let spawn = source.position.add(&Vector3::new(
                signed_unit(rng) * jitter,
                signed_unit(rng) * jitter,
                signed_unit(rng) * jitter,
            ));
            let speed = 6.0 + rng.gen::<f64>() * 10.0;
            let spread = Vector3::new(
                signed_unit(rng) * 2.0,
                signed_unit(rng) * 2.0,
                signed_unit(rng) * 2.0,
            );
            self.buffer
                .emit(spawn, backward.scale(speed).add(&spread), frame.tick);
        }

        // More drag close to the primary
        self.buffer.integrate(EFFECT_DT, 0.93 - 0.08 * strength);

        if let Some(visual) = self.visual {
            frame.scene.set_opacity(visual, self.opacity);
            frame.scene.update_points(visual, &self.buffer.positions());
        }

        EffectStatus::Running
    }

    fn fade(&mut self, scene: &mut dyn SceneGraph) -> EffectStatus {
        self.opacity *= TRAIL_FADE;
        if self.opacity < VANISH_OPACITY {
            self.dispose(scene);
            return EffectStatus::Finished;
        }
        if let Some(visual) = self.visual {
            scene.set_opacity(visual, self.opacity);
        }
        EffectStatus::Running
    }

    pub fn dispose(&mut self, scene: &mut dyn SceneGraph) {
        self.finished = true;
        release(scene, &mut self.visual);
    }
}

// =============================================================================
// DEBRIS BURST
// =============================================================================

pub const DEBRIS_COUNT: usize = 900;

/// Colour band of a debris particle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebrisShade {
    Burnt,
    Rock,
    Ash,
    Bright,
}

impl DebrisShade {
    pub fn from_sample(c: f64) -> Self {
        if c > 0.88 {
            DebrisShade::Bright
        } else if c > 0.55 {
            DebrisShade::Ash
        } else if c > 0.25 {
            DebrisShade::Rock
        } else {
            DebrisShade::Burnt
        }
    }

    pub fn color(self) -> Color {
        match self {
            DebrisShade::Bright => Color::rgb(1.0, 1.0, 1.0),
            DebrisShade::Ash => Color::rgb(0.78, 0.78, 0.80),
            DebrisShade::Rock => Color::rgb(0.48, 0.50, 0.52),
            DebrisShade::Burnt => Color::rgb(0.22, 0.23, 0.25),
        }
    }
}

/// Orthonormal pair spanning the plane perpendicular to `normal`
pub fn tangent_basis(normal: &Vector3) -> (Vector3, Vector3) {
    let mut t1 = normal.cross(&Vector3::UP);
    if t1.magnitude_squared() < 1e-4 {
        t1 = Vector3::new(1.0, 0.0, 0.0);
    }
    let t1 = t1.normalize();
    let t2 = normal.cross(&t1).normalize();
    (t1, t2)
}

/// One-shot spray of rock thrown out of an impact site
pub struct DebrisBurst {
    buffer: ParticleBuffer,
    shades: Vec<DebrisShade>,
    normal: Vector3,
    visual: Option<VisualHandle>,
    opacity: f64,
    point_scale: f64,
    finished: bool,
}

impl DebrisBurst {
    pub fn spawn(
        scene: &mut dyn SceneGraph,
        rng: &mut StdRng,
        origin: Vector3,
        normal: Vector3,
        reference_radius: f64,
        count: usize,
    ) -> Self {
        let (t1, t2) = tangent_basis(&normal);
        let mut buffer = ParticleBuffer::new(count);
        let mut shades = Vec::with_capacity(count);

        for _ in 0..count {
            let r = rng.gen::<f64>() * reference_radius * 0.3;
            let a = rng.gen::<f64>() * TAU;
            let offset = t1
                .scale(a.cos() * r)
                .add(&t2.scale(a.sin() * r))
                .add(&normal.scale(reference_radius * 0.02));

            let normal_speed = 28.0 + rng.gen::<f64>() * 12.0;
            let swirl_speed = 10.0 + rng.gen::<f64>() * 8.0;
            let velocity = normal
                .scale(normal_speed)
                .add(&t1.scale(signed_unit(rng) * swirl_speed))
                .add(&t2.scale(signed_unit(rng) * swirl_speed));

            buffer.emit(origin.add(&offset), velocity, 0);
            shades.push(DebrisShade::from_sample(rng.gen::<f64>()));
        }

        let visual = scene.create_visual(VisualSpec::new(
            Primitive::Points {
                capacity: count,
                point_size: 1.3,
                color: Color::WHITE,
                vertex_colors: Some(shades.iter().map(|s| s.color()).collect()),
                additive: true,
            },
            Vector3::zero(),
        ));
        scene.update_points(visual, &buffer.positions());

        Self {
            buffer,
            shades,
            normal,
            visual: Some(visual),
            opacity: 1.0,
            point_scale: 1.0,
            finished: false,
        }
    }

    pub fn buffer(&self) -> &ParticleBuffer {
        &self.buffer
    }

    pub fn shades(&self) -> &[DebrisShade] {
        &self.shades
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn advance(&mut self, scene: &mut dyn SceneGraph) -> EffectStatus {
        if self.finished {
            return EffectStatus::Finished;
        }

        let settle = self.normal.scale(0.3 * EFFECT_DT);
        for p in self.buffer.live_mut() {
            p.velocity = p.velocity.scale(0.985).add(&settle);
            p.position = p.position.add(&p.velocity.scale(EFFECT_DT));
        }

        self.opacity *= 0.96;
        self.point_scale *= 1.005;

        if self.opacity <= VANISH_OPACITY {
            self.dispose(scene);
            return EffectStatus::Finished;
        }

        if let Some(visual) = self.visual {
            scene.update_points(visual, &self.buffer.positions());
            scene.set_opacity(visual, self.opacity);
            scene.set_point_scale(visual, self.point_scale);
        }
        EffectStatus::Running
    }

    pub fn dispose(&mut self, scene: &mut dyn SceneGraph) {
        self.finished = true;
        release(scene, &mut self.visual);
    }
}

// =============================================================================
// FLASH + SHOCKWAVE
// =============================================================================

struct FadingPrimitive {
    handle: VisualHandle,
    position: Vector3,
    scale: f64,
    opacity: f64,
}

/// White flash sphere plus an expanding ring. The two parts vanish independently.
pub struct ImpactFlash {
    flash: Option<FadingPrimitive>,
    ring: Option<FadingPrimitive>,
}

impl ImpactFlash {
    pub fn spawn(scene: &mut dyn SceneGraph, origin: Vector3) -> Self {
        let flash = scene.create_visual(
            VisualSpec::new(
                Primitive::Sphere {
                    texture: None,
                    color: Color::WHITE,
                },
                origin,
            )
            .with_scale(12.0),
        );
        let ring = scene.create_visual(
            VisualSpec::new(
                Primitive::Ring {
                    inner: 8.0,
                    outer: 9.0,
                    color: Color::from_hex(0xfff2aa),
                },
                origin,
            )
            .with_opacity(0.85),
        );

        Self {
            flash: Some(FadingPrimitive {
                handle: flash,
                position: origin,
                scale: 12.0,
                opacity: 1.0,
            }),
            ring: Some(FadingPrimitive {
                handle: ring,
                position: origin,
                scale: 1.0,
                opacity: 0.85,
            }),
        }
    }

    pub fn flash_visible(&self) -> bool {
        self.flash.is_some()
    }

    pub fn ring_visible(&self) -> bool {
        self.ring.is_some()
    }

    pub fn advance(&mut self, scene: &mut dyn SceneGraph) -> EffectStatus {
        if let Some(flash) = self.flash.as_mut() {
            flash.scale *= 1.08;
            flash.opacity -= 0.12;
            if flash.opacity > 0.0 {
                update_fading(scene, flash);
            } else if let Some(done) = self.flash.take() {
                scene.remove_visual(done.handle);
            }
        }

        if let Some(ring) = self.ring.as_mut() {
            ring.scale *= 1.09;
            ring.opacity *= 0.9;
            if ring.opacity > VANISH_OPACITY {
                update_fading(scene, ring);
            } else if let Some(done) = self.ring.take() {
                scene.remove_visual(done.handle);
            }
        }

        if self.is_finished() {
            EffectStatus::Finished
        } else {
            EffectStatus::Running
        }
    }

    pub fn is_finished(&self) -> bool {
        self.flash.is_none() && self.ring.is_none()
    }

    pub fn dispose(&mut self, scene: &mut dyn SceneGraph) {
        for part in [self.flash.take(), self.ring.take()].into_iter().flatten() {
            scene.remove_visual(part.handle);
        }
    }
}

fn update_fading(scene: &mut dyn SceneGraph, part: &FadingPrimitive) {
    scene.set_transform(part.handle, part.position, part.scale);
    scene.set_opacity(part.handle, part.opacity);
}

// =============================================================================
// GENERIC EXPLOSION
// =============================================================================

pub const EXPLOSION_COUNT: usize = 400;

/// Spherical burst used as the merge flourish
pub struct Explosion {
    buffer: ParticleBuffer,
    visual: Option<VisualHandle>,
    opacity: f64,
    finished: bool,
}

impl Explosion {
    pub fn spawn(scene: &mut dyn SceneGraph, rng: &mut StdRng, origin: Vector3, color: Color) -> Self {
        let mut buffer = ParticleBuffer::new(EXPLOSION_COUNT);
        for _ in 0..EXPLOSION_COUNT {
            let z: f64 = rng.gen_range(-1.0..1.0);
            let theta = rng.gen::<f64>() * TAU;
            let ring = (1.0 - z * z).sqrt();
            let dir = Vector3::new(ring * theta.cos(), ring * theta.sin(), z);
            let speed = rng.gen_range(8.0..20.0);
            buffer.emit(origin, dir.scale(speed), 0);
        }

        let visual = scene.create_visual(VisualSpec::new(
            Primitive::Points {
                capacity: EXPLOSION_COUNT,
                point_size: 1.0,
                color,
                vertex_colors: None,
                additive: true,
            },
            Vector3::zero(),
        ));
        scene.update_points(visual, &buffer.positions());

        Self {
            buffer,
            visual: Some(visual),
            opacity: 1.0,
            finished: false,
        }
    }

    pub fn advance(&mut self, scene: &mut dyn SceneGraph) -> EffectStatus {
        if self.finished {
            return EffectStatus::Finished;
        }

        self.buffer.integrate(EFFECT_DT, 0.96);
        self.opacity *= 0.95;

        if self.opacity <= VANISH_OPACITY {
            self.dispose(scene);
            return EffectStatus::Finished;
        }

        if let Some(visual) = self.visual {
            scene.update_points(visual, &self.buffer.positions());
            scene.set_opacity(visual, self.opacity);
        }
        EffectStatus::Running
    }

    pub fn dispose(&mut self, scene: &mut dyn SceneGraph) {
        self.finished = true;
        release(scene, &mut self.visual);
    }
}

// =============================================================================
// ACTIVE EFFECTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    FlameTrail,
    DebrisBurst,
    FlashShockwave,
    Explosion,
}

/// One-shot effects that can be requested at a point in space
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectRequest {
    FlashShockwave,
    DebrisBurst {
        normal: Vector3,
        reference_radius: f64,
    },
    Explosion {
        color: Color,
    },
}

pub enum ActiveEffect {
    FlameTrail(FlameTrail),
    DebrisBurst(DebrisBurst),
    FlashShockwave(ImpactFlash),
    Explosion(Explosion),
}

impl ActiveEffect {
    pub fn spawn(
        request: EffectRequest,
        origin: Vector3,
        scene: &mut dyn SceneGraph,
        rng: &mut StdRng,
    ) -> Self {
        debug!("spawning {:?} at {:?}", request, origin);
        match request {
            EffectRequest::FlashShockwave => ActiveEffect::FlashShockwave(ImpactFlash::spawn(scene, origin)),
            EffectRequest::DebrisBurst {
                normal,
                reference_radius,
            } => ActiveEffect::DebrisBurst(DebrisBurst::spawn(
                scene,
                rng,
                origin,
                normal,
                reference_radius,
                DEBRIS_COUNT,
            )),
            EffectRequest::Explosion { color } => {
                ActiveEffect::Explosion(Explosion::spawn(scene, rng, origin, color))
            }
        }
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            ActiveEffect::FlameTrail(_) => EffectKind::FlameTrail,
            ActiveEffect::DebrisBurst(_) => EffectKind::DebrisBurst,
            ActiveEffect::FlashShockwave(_) => EffectKind::FlashShockwave,
            ActiveEffect::Explosion(_) => EffectKind::Explosion,
        }
    }

    pub fn advance(&mut self, frame: &mut EffectFrame<'_>) -> EffectStatus {
        let status = match self {
            ActiveEffect::FlameTrail(e) => e.advance(frame),
            ActiveEffect::DebrisBurst(e) => e.advance(frame.scene),
            ActiveEffect::FlashShockwave(e) => e.advance(frame.scene),
            ActiveEffect::Explosion(e) => e.advance(frame.scene),
        };
        if status == EffectStatus::Finished {
            debug!("{:?} finished", self.kind());
        }
        status
    }

    /// Release every primitive the effect still holds. Safe to repeat.
    pub fn dispose(&mut self, scene: &mut dyn SceneGraph) {
        match self {
            ActiveEffect::FlameTrail(e) => e.dispose(scene),
            ActiveEffect::DebrisBurst(e) => e.dispose(scene),
            ActiveEffect::FlashShockwave(e) => e.dispose(scene),
            ActiveEffect::Explosion(e) => e.dispose(scene),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics_engine::{BodyRole, BodySpec, PointMassWorld};
    use crate::scene::{HeadlessScene, TextureCatalog};
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn registry_with(position: Vector3, velocity: Vector3) -> (BodyRegistry, PointMassWorld, HeadlessScene, BodyId) {
        let mut registry = BodyRegistry::new();
        let mut physics = PointMassWorld::new();
        let mut scene = HeadlessScene::new();
        let id = registry.spawn(
            BodySpec {
                name: "Asteroid-01".to_string(),
                role: BodyRole::Asteroid,
                texture_key: "Mars".to_string(),
                mass: 3.0,
                radius: 1.2,
                position,
                velocity,
            },
            &mut physics,
            &mut scene,
            &TextureCatalog::default(),
        );
        (registry, physics, scene, id)
    }

    #[test]
    fn test_ring_buffer_never_exceeds_capacity() {
        let mut buffer = ParticleBuffer::new(TRAIL_CAPACITY);
        for i in 0..5_000u64 {
            buffer.emit(Vector3::new(i as f64, 0.0, 0.0), Vector3::zero(), i);
            assert!(buffer.alive_count() <= buffer.capacity());
        }
        assert_eq!(buffer.alive_count(), TRAIL_CAPACITY);
        assert_eq!(buffer.cursor(), 5_000);
        // Slot 0 was last written by emission 4200 (3 full wraps)
        assert_eq!(buffer.live()[0].born_tick, 4_200);
    }

    #[test]
    fn test_trail_emits_more_near_primary() {
        let (registry, _physics, mut scene, id) =
            registry_with(Vector3::zero(), Vector3::new(-14.0, 0.0, 6.0));
        let mut rng = rng();
        let mut trail = FlameTrail::attach(&mut scene, id, None);

        let mut frame = EffectFrame {
            scene: &mut scene,
            bodies: &registry,
            rng: &mut rng,
            tick: 1,
        };
        assert_eq!(trail.advance(&mut frame), EffectStatus::Running);
        // strength 1 at the primary: floor(2 + 14) particles
        assert_eq!(trail.buffer().alive_count(), 16);
        assert!((trail.opacity() - 1.0).abs() < 1e-12);

        for tick in 2..500 {
            frame.tick = tick;
            trail.advance(&mut frame);
        }
        assert_eq!(trail.buffer().alive_count(), TRAIL_CAPACITY);
    }

    #[test]
    fn test_trail_far_from_primary_is_faint() {
        let (registry, _physics, mut scene, id) =
            registry_with(Vector3::new(250.0, 0.0, 0.0), Vector3::new(-14.0, 0.0, 0.0));
        let mut rng = rng();
        let mut trail = FlameTrail::attach(&mut scene, id, None);
        let mut frame = EffectFrame {
            scene: &mut scene,
            bodies: &registry,
            rng: &mut rng,
            tick: 1,
        };
        trail.advance(&mut frame);
        assert_eq!(trail.buffer().alive_count(), 2);
        assert!((trail.opacity() - 0.10).abs() < 1e-12);

        // Particles stream backward, against the body's motion
        assert!(trail.buffer().live().iter().all(|p| p.velocity.x > 0.0));
    }

    #[test]
    fn test_trail_fades_after_source_dies_and_disposes_once() {
        let (mut registry, _physics, mut scene, id) =
            registry_with(Vector3::zero(), Vector3::new(1.0, 0.0, 0.0));
        let mut rng = rng();
        let mut trail = FlameTrail::attach(&mut scene, id, None);
        registry.get_mut(id).unwrap().alive = false;

        let mut ticks = 0;
        loop {
            let mut frame = EffectFrame {
                scene: &mut scene,
                bodies: &registry,
                rng: &mut rng,
                tick: ticks,
            };
            ticks += 1;
            if trail.advance(&mut frame) == EffectStatus::Finished {
                break;
            }
            assert!(ticks < 100, "trail never finished");
        }
        // 0.92^47 is the first power below 0.02
        assert_eq!(ticks, 47);
        assert_eq!(trail.buffer().alive_count(), 0);

        let released = scene.released_count();
        trail.dispose(&mut scene);
        trail.dispose(&mut scene);
        assert_eq!(scene.released_count(), released);
        assert_eq!(scene.double_release_count(), 0);
    }

    #[test]
    fn test_debris_leaves_along_normal() {
        let mut scene = HeadlessScene::new();
        let mut rng = rng();
        let normal = Vector3::new(1.0, 0.0, 0.0);
        let origin = Vector3::new(3.0, 0.0, 0.0);
        let radius = 3.21;
        let debris = DebrisBurst::spawn(&mut scene, &mut rng, origin, normal, radius, DEBRIS_COUNT);

        assert_eq!(debris.buffer().alive_count(), DEBRIS_COUNT);
        assert_eq!(debris.shades().len(), DEBRIS_COUNT);
        for p in debris.buffer().live() {
            let outward = p.velocity.dot(&normal);
            assert!((28.0..=40.0).contains(&outward), "normal speed {}", outward);

            let offset = p.position.sub(&origin);
            let lift = offset.dot(&normal);
            assert!((lift - radius * 0.02).abs() < 1e-9);
            let in_plane = offset.sub(&normal.scale(lift)).magnitude();
            assert!(in_plane <= radius * 0.3 + 1e-9);
        }
    }

    #[test]
    fn test_debris_finishes_and_releases() {
        let mut scene = HeadlessScene::new();
        let mut rng = rng();
        let mut debris = DebrisBurst::spawn(
            &mut scene,
            &mut rng,
            Vector3::zero(),
            Vector3::UP,
            3.0,
            DEBRIS_COUNT,
        );
        assert_eq!(scene.live_count(), 1);
        let visual = debris.visual.unwrap();
        assert_eq!(scene.get(visual).unwrap().uploaded_points, DEBRIS_COUNT);

        let mut ticks = 0;
        while debris.advance(&mut scene) == EffectStatus::Running {
            ticks += 1;
        }
        // 0.96^96 is the first power at or below 0.02
        assert_eq!(ticks + 1, 96);
        assert_eq!(scene.live_count(), 0);

        debris.dispose(&mut scene);
        assert_eq!(scene.double_release_count(), 0);
    }

    #[test]
    fn test_debris_shade_bands() {
        assert_eq!(DebrisShade::from_sample(0.95), DebrisShade::Bright);
        assert_eq!(DebrisShade::from_sample(0.6), DebrisShade::Ash);
        assert_eq!(DebrisShade::from_sample(0.3), DebrisShade::Rock);
        assert_eq!(DebrisShade::from_sample(0.1), DebrisShade::Burnt);
    }

    #[test]
    fn test_tangent_basis_for_vertical_normal() {
        let (t1, t2) = tangent_basis(&Vector3::UP);
        assert!((t1.magnitude() - 1.0).abs() < 1e-12);
        assert!((t2.magnitude() - 1.0).abs() < 1e-12);
        assert!(t1.dot(&Vector3::UP).abs() < 1e-12);
        assert!(t2.dot(&t1).abs() < 1e-12);
    }

    #[test]
    fn test_flash_and_ring_release_independently() {
        let mut scene = HeadlessScene::new();
        let mut flash = ImpactFlash::spawn(&mut scene, Vector3::zero());
        assert_eq!(scene.live_count(), 2);

        for _ in 0..9 {
            flash.advance(&mut scene);
        }
        assert!(!flash.flash_visible());
        assert!(flash.ring_visible());
        assert_eq!(scene.live_count(), 1);

        let mut ticks = 9;
        while flash.advance(&mut scene) == EffectStatus::Running {
            ticks += 1;
        }
        // 0.85 * 0.9^36 is the first value at or below 0.02
        assert_eq!(ticks + 1, 36);
        assert_eq!(scene.live_count(), 0);

        flash.dispose(&mut scene);
        flash.dispose(&mut scene);
        assert_eq!(scene.double_release_count(), 0);
    }

    #[test]
    fn test_dispose_mid_flight_releases_everything_once() {
        let mut scene = HeadlessScene::new();
        let mut rng = rng();
        let mut effects = vec![
            ActiveEffect::spawn(EffectRequest::FlashShockwave, Vector3::zero(), &mut scene, &mut rng),
            ActiveEffect::spawn(
                EffectRequest::DebrisBurst {
                    normal: Vector3::UP,
                    reference_radius: 3.0,
                },
                Vector3::zero(),
                &mut scene,
                &mut rng,
            ),
            ActiveEffect::spawn(
                EffectRequest::Explosion { color: Color::WHITE },
                Vector3::zero(),
                &mut scene,
                &mut rng,
            ),
        ];
        assert_eq!(scene.live_count(), 4);

        for effect in effects.iter_mut() {
            effect.dispose(&mut scene);
            effect.dispose(&mut scene);
        }
        assert_eq!(scene.live_count(), 0);
        assert_eq!(scene.released_count(), 4);
        assert_eq!(scene.double_release_count(), 0);
    }

    #[test]
    fn test_explosion_runs_to_completion() {
        let mut scene = HeadlessScene::new();
        let mut rng = rng();
        let mut explosion = Explosion::spawn(&mut scene, &mut rng, Vector3::zero(), Color::WHITE);
        let mut ticks = 1;
        while explosion.advance(&mut scene) == EffectStatus::Running {
            ticks += 1;
        }
        assert_eq!(ticks, 77);
        assert_eq!(scene.live_count(), 0);
    }
}
