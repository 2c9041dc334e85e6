// Scenario Catalogue - Scenario kinds, scene descriptors, hooks and the built-in setups

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::camera::CameraPose;
use crate::physics_engine::{
    BodyId, BodyRegistry, BodyRole, BodySpec, PhysicsWorld, Vector3, SIZE_TO_RADIUS,
};
use crate::scene::{Color, Primitive, SceneGraph, VisualHandle, VisualSpec};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("malformed scene descriptor: {0}")]
    MalformedDescriptor(String),
    #[error("scenario cleanup failed: {0}")]
    CleanupFailed(String),
    #[error("no setup registered for scenario kind '{0}'")]
    MissingSetup(String),
}

// =============================================================================
// SCENARIO KINDS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    Collision,
    Orbit,
    SolarEclipse,
    LunarEclipse,
    PlanetBirth,
    AsteroidImpact,
    Generic,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 7] = [
        ScenarioKind::Collision,
        ScenarioKind::Orbit,
        ScenarioKind::SolarEclipse,
        ScenarioKind::LunarEclipse,
        ScenarioKind::PlanetBirth,
        ScenarioKind::AsteroidImpact,
        ScenarioKind::Generic,
    ];

    /// Parse a `scenarioType` string. `solar_system` is an alias of `orbit`.
    pub fn parse(raw: &str) -> Option<Self> {
        let key = raw.trim().to_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "collision" => Some(ScenarioKind::Collision),
            "orbit" | "solar_system" => Some(ScenarioKind::Orbit),
            "solar_eclipse" => Some(ScenarioKind::SolarEclipse),
            "lunar_eclipse" => Some(ScenarioKind::LunarEclipse),
            "planet_birth" => Some(ScenarioKind::PlanetBirth),
            "asteroid_impact" => Some(ScenarioKind::AsteroidImpact),
            "generic" => Some(ScenarioKind::Generic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioKind::Collision => "collision",
            ScenarioKind::Orbit => "orbit",
            ScenarioKind::SolarEclipse => "solar_eclipse",
            ScenarioKind::LunarEclipse => "lunar_eclipse",
            ScenarioKind::PlanetBirth => "planet_birth",
            ScenarioKind::AsteroidImpact => "asteroid_impact",
            ScenarioKind::Generic => "generic",
        }
    }

    /// These kinds drive their own motion and run without ambient gravity
    pub fn gravity_enabled(&self) -> bool {
        !matches!(
            self,
            ScenarioKind::Collision | ScenarioKind::PlanetBirth | ScenarioKind::AsteroidImpact
        )
    }

    /// Decide the kind a descriptor will run as.
    ///
    /// An earth-like plus an asteroid-like object always forces `AsteroidImpact`,
    /// whatever was requested. Unknown kinds degrade to `Generic`.
    pub fn resolve(descriptor: &SceneDescriptor) -> Result<Self, ScenarioError> {
        let requested = descriptor
            .scenario_type
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ScenarioError::MalformedDescriptor("missing scenarioType".to_string()))?;

        let roles: Vec<BodyRole> = descriptor.objects.iter().map(|o| o.role()).collect();
        if roles.contains(&BodyRole::Earth) && roles.contains(&BodyRole::Asteroid) {
            if requested != ScenarioKind::AsteroidImpact.as_str() {
                info!("earth + asteroid present, running '{}' as asteroid_impact", requested);
            }
            return Ok(ScenarioKind::AsteroidImpact);
        }

        match Self::parse(requested) {
            Some(kind) => Ok(kind),
            None => {
                warn!("unknown scenario type '{}', using generic passthrough", requested);
                Ok(ScenarioKind::Generic)
            }
        }
    }
}

impl std::fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// SCENE DESCRIPTOR (wire format)
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_type: Option<String>,
    #[serde(default)]
    pub objects: Vec<ObjectDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_position: Option<Vector3>,
}

impl SceneDescriptor {
    pub fn new(scenario_type: &str, objects: Vec<ObjectDescriptor>) -> Self {
        Self {
            scenario_type: Some(scenario_type.to_string()),
            objects,
            camera_position: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn default_texture_key() -> String {
    "Moon".to_string()
}

fn one() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_texture_key")]
    pub texture_key: String,
    #[serde(default = "one")]
    pub size: f64,
    #[serde(default = "one")]
    pub mass: f64,
    #[serde(default)]
    pub position: Vector3,
    #[serde(default)]
    pub velocity: Vector3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<BodyRole>,
}

impl ObjectDescriptor {
    pub fn new(name: &str, texture_key: &str, size: f64, mass: f64, position: Vector3, velocity: Vector3) -> Self {
        Self {
            name: name.to_string(),
            texture_key: texture_key.to_string(),
            size,
            mass,
            position,
            velocity,
            role: None,
        }
    }

    /// Explicit role, or one classified from the name
    pub fn role(&self) -> BodyRole {
        self.role.unwrap_or_else(|| BodyRole::classify(&self.name))
    }

    pub fn to_body_spec(&self) -> BodySpec {
        let mass = positive_or_default(self.mass, &self.name, "mass");
        let size = positive_or_default(self.size, &self.name, "size");
        let name = if self.name.trim().is_empty() {
            "Body".to_string()
        } else {
            self.name.clone()
        };

        BodySpec {
            role: self.role(),
            name,
            texture_key: self.texture_key.clone(),
            mass,
            radius: size * SIZE_TO_RADIUS,
            position: self.position,
            velocity: self.velocity,
        }
    }
}

fn positive_or_default(value: f64, name: &str, field: &str) -> f64 {
    if value > 0.0 && value.is_finite() {
        value
    } else {
        warn!("object '{}' has {} {}, using 1.0", name, field, value);
        1.0
    }
}

// =============================================================================
// HOOKS & SETUP
// =============================================================================

/// Mutable access handed to a scenario's update hook for one frame
pub struct HookContext<'a> {
    pub bodies: &'a mut BodyRegistry,
    pub physics: &'a mut dyn PhysicsWorld,
    pub scene: &'a mut dyn SceneGraph,
}

/// Optional per-scenario behaviour. Every method has a no-op default.
pub trait ScenarioHooks: Send + Sync {
    /// Called once with the ids of the spawned bodies, in setup order
    fn attach(&mut self, _bodies: &[BodyId]) {}

    fn update(&mut self, _dt: f64, _ctx: &mut HookContext<'_>) {}

    fn cleanup(&mut self, _scene: &mut dyn SceneGraph) -> Result<(), ScenarioError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct ScenarioSetupResult {
    pub bodies: Vec<BodySpec>,
    pub camera: Option<CameraPose>,
    pub hooks: Option<Box<dyn ScenarioHooks>>,
    /// (primary, impactor) indices into `bodies`; gets a flame trail
    pub impact_pair: Option<(usize, usize)>,
}

pub trait ScenarioSetup: Send + Sync {
    fn setup(
        &self,
        kind: ScenarioKind,
        descriptor: &SceneDescriptor,
        scene: &mut dyn SceneGraph,
    ) -> Result<ScenarioSetupResult, ScenarioError>;
}

fn bodies_from(descriptor: &SceneDescriptor) -> Vec<BodySpec> {
    descriptor.objects.iter().map(ObjectDescriptor::to_body_spec).collect()
}

/// One body per object, nothing else
pub struct PassthroughSetup;

impl ScenarioSetup for PassthroughSetup {
    fn setup(
        &self,
        _kind: ScenarioKind,
        descriptor: &SceneDescriptor,
        _scene: &mut dyn SceneGraph,
    ) -> Result<ScenarioSetupResult, ScenarioError> {
        Ok(ScenarioSetupResult {
            bodies: bodies_from(descriptor),
            ..Default::default()
        })
    }
}

pub struct CollisionSetup;

impl ScenarioSetup for CollisionSetup {
    fn setup(
        &self,
        _kind: ScenarioKind,
        descriptor: &SceneDescriptor,
        _scene: &mut dyn SceneGraph,
    ) -> Result<ScenarioSetupResult, ScenarioError> {
        Ok(ScenarioSetupResult {
            bodies: bodies_from(descriptor),
            camera: Some(CameraPose::looking_at_origin(Vector3::new(0.0, 50.0, 100.0))),
            ..Default::default()
        })
    }
}

// ---- Orbit / eclipses --------------------------------------------------------

const SOLAR_MASS: f64 = 1000.0;

/// Speed of a circular orbit at `r` around the default sun
fn circular_speed(r: f64) -> f64 {
    (crate::physics_engine::G * SOLAR_MASS / r).sqrt()
}

fn default_solar_system() -> Vec<ObjectDescriptor> {
    vec![
        ObjectDescriptor::new("Sun", "Sun", 5.0, SOLAR_MASS, Vector3::zero(), Vector3::zero()),
        ObjectDescriptor::new(
            "Earth",
            "Earth",
            1.0,
            10.0,
            Vector3::new(60.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, -circular_speed(60.0)),
        ),
        ObjectDescriptor::new(
            "Moon",
            "Moon",
            0.27,
            1.0,
            Vector3::new(90.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, -circular_speed(90.0)),
        ),
    ]
}

/// Orbit and both eclipse kinds. Empty descriptors get a Sun / Earth / Moon system.
pub struct SolarSystemSetup;

impl ScenarioSetup for SolarSystemSetup {
    fn setup(
        &self,
        kind: ScenarioKind,
        descriptor: &SceneDescriptor,
        _scene: &mut dyn SceneGraph,
    ) -> Result<ScenarioSetupResult, ScenarioError> {
        let bodies = if descriptor.objects.is_empty() {
            default_solar_system().iter().map(ObjectDescriptor::to_body_spec).collect()
        } else {
            bodies_from(descriptor)
        };

        let camera = match kind {
            ScenarioKind::SolarEclipse | ScenarioKind::LunarEclipse => {
                CameraPose::looking_at_origin(Vector3::new(0.0, 4.0, 150.0))
            }
            _ => CameraPose::looking_at_origin(Vector3::new(0.0, 80.0, 160.0)),
        };

        Ok(ScenarioSetupResult {
            bodies,
            camera: Some(camera),
            ..Default::default()
        })
    }
}

// ---- Planet birth ------------------------------------------------------------

/// Seconds for a newborn planet to reach full size
pub const BIRTH_DURATION: f64 = 6.0;
const BIRTH_START_FRACTION: f64 = 0.1;
const DUST_PARTICLES: usize = 600;

pub struct PlanetBirthSetup;

impl ScenarioSetup for PlanetBirthSetup {
    fn setup(
        &self,
        _kind: ScenarioKind,
        descriptor: &SceneDescriptor,
        scene: &mut dyn SceneGraph,
    ) -> Result<ScenarioSetupResult, ScenarioError> {
        let mut bodies = bodies_from(descriptor);
        let full_radii: Vec<f64> = bodies.iter().map(|b| b.radius).collect();
        for body in bodies.iter_mut() {
            body.radius *= BIRTH_START_FRACTION;
        }

        let dust = scene.create_visual(
            VisualSpec::new(
                Primitive::Points {
                    capacity: DUST_PARTICLES,
                    point_size: 0.9,
                    color: Color::from_hex(0xc9a27a),
                    vertex_colors: None,
                    additive: false,
                },
                Vector3::zero(),
            )
            .with_opacity(0.8),
        );

        Ok(ScenarioSetupResult {
            bodies,
            camera: Some(CameraPose::looking_at_origin(Vector3::new(0.0, 30.0, 60.0))),
            hooks: Some(Box::new(PlanetBirthHooks {
                full_radii,
                growing: Vec::new(),
                elapsed: 0.0,
                dust: Some(dust),
            })),
            impact_pair: None,
        })
    }
}

/// Grows each body from 10% to full radius and fades the dust cloud
pub struct PlanetBirthHooks {
    full_radii: Vec<f64>,
    growing: Vec<(BodyId, f64)>,
    elapsed: f64,
    dust: Option<VisualHandle>,
}

impl PlanetBirthHooks {
    pub fn growth_fraction(&self) -> f64 {
        (self.elapsed / BIRTH_DURATION).min(1.0)
    }
}

impl ScenarioHooks for PlanetBirthHooks {
    fn attach(&mut self, bodies: &[BodyId]) {
        self.growing = bodies
            .iter()
            .copied()
            .zip(self.full_radii.iter().copied())
            .collect();
    }

    fn update(&mut self, dt: f64, ctx: &mut HookContext<'_>) {
        self.elapsed += dt;
        let frac = self.growth_fraction();
        let scale = BIRTH_START_FRACTION + (1.0 - BIRTH_START_FRACTION) * frac;

        for &(id, full) in &self.growing {
            let Some(body) = ctx.bodies.get_mut(id).filter(|b| b.alive) else {
                continue;
            };
            body.radius = full * scale;
            if let Some(handle) = body.physics {
                ctx.physics.set_radius(handle, body.radius);
            }
        }

        if let Some(dust) = self.dust {
            ctx.scene.set_opacity(dust, 0.8 * (1.0 - 0.7 * frac));
        }
    }

    fn cleanup(&mut self, scene: &mut dyn SceneGraph) -> Result<(), ScenarioError> {
        if let Some(dust) = self.dust.take() {
            scene.remove_visual(dust);
        }
        Ok(())
    }
}

// ---- Asteroid impact ---------------------------------------------------------

/// Sun, a resting Earth and an asteroid on course to hit it about 12 s in
fn default_impact_system() -> Vec<ObjectDescriptor> {
    vec![
        ObjectDescriptor::new("Sun", "Sun", 3.33, 5000.0, Vector3::zero(), Vector3::zero()),
        ObjectDescriptor::new(
            "Earth",
            "Earth",
            1.07,
            50.0,
            Vector3::new(45.0, 0.0, 0.0),
            Vector3::zero(),
        ),
        ObjectDescriptor::new(
            "Asteroid-01",
            "Mars",
            0.4,
            3.0,
            Vector3::new(213.0, 7.2, -72.0),
            Vector3::new(-14.0, -0.6, 6.0),
        ),
    ]
}

pub struct AsteroidImpactSetup;

impl ScenarioSetup for AsteroidImpactSetup {
    fn setup(
        &self,
        _kind: ScenarioKind,
        descriptor: &SceneDescriptor,
        _scene: &mut dyn SceneGraph,
    ) -> Result<ScenarioSetupResult, ScenarioError> {
        let bodies: Vec<BodySpec> = if descriptor.objects.is_empty() {
            default_impact_system().iter().map(ObjectDescriptor::to_body_spec).collect()
        } else {
            bodies_from(descriptor)
        };

        let primary = bodies.iter().position(|b| b.role == BodyRole::Earth);
        let impactor = bodies.iter().position(|b| b.role == BodyRole::Asteroid);

        let camera = primary.map(|i| {
            let target = bodies[i].position;
            CameraPose::new(target.add(&Vector3::new(40.0, 25.0, 70.0)), target)
        });

        Ok(ScenarioSetupResult {
            camera,
            impact_pair: primary.zip(impactor),
            bodies,
            hooks: None,
        })
    }
}

// =============================================================================
// SETUP REGISTRY
// =============================================================================

/// Scenario kind -> setup module
pub struct SetupRegistry {
    setups: HashMap<ScenarioKind, Box<dyn ScenarioSetup>>,
}

impl SetupRegistry {
    pub fn empty() -> Self {
        Self {
            setups: HashMap::new(),
        }
    }

    /// Every built-in kind registered
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(ScenarioKind::Generic, PassthroughSetup);
        registry.register(ScenarioKind::Collision, CollisionSetup);
        registry.register(ScenarioKind::Orbit, SolarSystemSetup);
        registry.register(ScenarioKind::SolarEclipse, SolarSystemSetup);
        registry.register(ScenarioKind::LunarEclipse, SolarSystemSetup);
        registry.register(ScenarioKind::PlanetBirth, PlanetBirthSetup);
        registry.register(ScenarioKind::AsteroidImpact, AsteroidImpactSetup);
        registry
    }

    pub fn register(&mut self, kind: ScenarioKind, setup: impl ScenarioSetup + 'static) {
        self.setups.insert(kind, Box::new(setup));
    }

    pub fn run(
        &self,
        kind: ScenarioKind,
        descriptor: &SceneDescriptor,
        scene: &mut dyn SceneGraph,
    ) -> Result<ScenarioSetupResult, ScenarioError> {
        let setup = self
            .setups
            .get(&kind)
            .ok_or_else(|| ScenarioError::MissingSetup(kind.as_str().to_string()))?;
        setup.setup(kind, descriptor, scene)
    }
}

impl Default for SetupRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics_engine::PointMassWorld;
    use crate::scene::{HeadlessScene, TextureCatalog};

    fn object(name: &str) -> ObjectDescriptor {
        ObjectDescriptor::new(name, "Moon", 1.0, 1.0, Vector3::zero(), Vector3::zero())
    }

    #[test]
    fn test_parse_kinds_and_aliases() {
        assert_eq!(ScenarioKind::parse("solar_system"), Some(ScenarioKind::Orbit));
        assert_eq!(ScenarioKind::parse(" Planet-Birth "), Some(ScenarioKind::PlanetBirth));
        assert_eq!(ScenarioKind::parse("wormhole"), None);
        for kind in ScenarioKind::ALL {
            assert_eq!(ScenarioKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_gravity_flags() {
        assert!(!ScenarioKind::Collision.gravity_enabled());
        assert!(!ScenarioKind::PlanetBirth.gravity_enabled());
        assert!(!ScenarioKind::AsteroidImpact.gravity_enabled());
        assert!(ScenarioKind::Orbit.gravity_enabled());
        assert!(ScenarioKind::SolarEclipse.gravity_enabled());
        assert!(ScenarioKind::Generic.gravity_enabled());
    }

    #[test]
    fn test_earth_and_asteroid_force_impact_kind() {
        let descriptor = SceneDescriptor::new("collision", vec![object("Earth"), object("asteroid 99942")]);
        assert_eq!(ScenarioKind::resolve(&descriptor).unwrap(), ScenarioKind::AsteroidImpact);

        // An explicit role counts the same as a name match
        let mut rock = object("Apophis");
        rock.role = Some(BodyRole::Asteroid);
        let descriptor = SceneDescriptor::new("orbit", vec![object("EARTH"), rock]);
        assert_eq!(ScenarioKind::resolve(&descriptor).unwrap(), ScenarioKind::AsteroidImpact);
    }

    #[test]
    fn test_unknown_kind_is_generic_and_missing_kind_is_malformed() {
        let descriptor = SceneDescriptor::new("black_hole", vec![object("A")]);
        assert_eq!(ScenarioKind::resolve(&descriptor).unwrap(), ScenarioKind::Generic);

        let missing = SceneDescriptor::default();
        assert!(matches!(
            ScenarioKind::resolve(&missing),
            Err(ScenarioError::MalformedDescriptor(_))
        ));
    }

    #[test]
    fn test_descriptor_wire_format() {
        let json = r#"{
            "scenarioType": "collision",
            "cameraPosition": {"x": 0, "y": 50, "z": 100},
            "objects": [
                {"name": "A", "textureKey": "Mars", "size": 2.0, "mass": 10,
                 "position": {"x": -40, "y": 0, "z": 0},
                 "velocity": {"x": 12},
                 "role": "asteroid"}
            ]
        }"#;
        let descriptor = SceneDescriptor::from_json(json).unwrap();
        assert_eq!(descriptor.scenario_type.as_deref(), Some("collision"));
        assert_eq!(descriptor.camera_position, Some(Vector3::new(0.0, 50.0, 100.0)));

        let spec = descriptor.objects[0].to_body_spec();
        assert_eq!(spec.role, BodyRole::Asteroid);
        assert!((spec.radius - 6.0).abs() < 1e-12);
        assert_eq!(spec.velocity, Vector3::new(12.0, 0.0, 0.0));

        let bare = SceneDescriptor::from_json(r#"{"scenarioType":"orbit"}"#).unwrap();
        assert!(bare.objects.is_empty());
    }

    #[test]
    fn test_non_positive_mass_and_size_fall_back() {
        let mut obj = object("Dust");
        obj.mass = -5.0;
        obj.size = 0.0;
        let spec = obj.to_body_spec();
        assert!((spec.mass - 1.0).abs() < 1e-12);
        assert!((spec.radius - SIZE_TO_RADIUS).abs() < 1e-12);
    }

    #[test]
    fn test_impact_setup_seeds_reference_triple() {
        let mut scene = HeadlessScene::new();
        let descriptor = SceneDescriptor::new("asteroid_impact", Vec::new());
        let result = SetupRegistry::builtin()
            .run(ScenarioKind::AsteroidImpact, &descriptor, &mut scene)
            .unwrap();

        let masses: Vec<f64> = result.bodies.iter().map(|b| b.mass).collect();
        assert_eq!(masses, vec![5000.0, 50.0, 3.0]);
        assert_eq!(result.impact_pair, Some((1, 2)));
        assert!(result.camera.is_some());
    }

    #[test]
    fn test_solar_system_defaults_when_empty() {
        let mut scene = HeadlessScene::new();
        let descriptor = SceneDescriptor::new("solar_system", Vec::new());
        let result = SetupRegistry::builtin()
            .run(ScenarioKind::Orbit, &descriptor, &mut scene)
            .unwrap();
        assert_eq!(result.bodies.len(), 3);
        assert_eq!(result.bodies[0].role, BodyRole::Sun);
        assert_eq!(result.bodies[1].role, BodyRole::Earth);
    }

    #[test]
    fn test_planet_birth_grows_and_cleans_up_dust() {
        let mut scene = HeadlessScene::new();
        let mut physics = PointMassWorld::new();
        let mut bodies = BodyRegistry::new();
        let textures = TextureCatalog::default();

        let descriptor = SceneDescriptor::new("planet_birth", vec![object("Proto")]);
        let result = SetupRegistry::builtin()
            .run(ScenarioKind::PlanetBirth, &descriptor, &mut scene)
            .unwrap();
        assert_eq!(scene.live_count(), 1);
        assert!((result.bodies[0].radius - 0.3).abs() < 1e-12);

        let ids: Vec<BodyId> = result
            .bodies
            .into_iter()
            .map(|spec| bodies.spawn(spec, &mut physics, &mut scene, &textures))
            .collect();
        let mut hooks = result.hooks.unwrap();
        hooks.attach(&ids);

        for _ in 0..(BIRTH_DURATION as usize * 60 + 10) {
            let mut ctx = HookContext {
                bodies: &mut bodies,
                physics: &mut physics,
                scene: &mut scene,
            };
            hooks.update(1.0 / 60.0, &mut ctx);
        }
        assert!((bodies.get(ids[0]).unwrap().radius - 3.0).abs() < 1e-9);

        hooks.cleanup(&mut scene).unwrap();
        hooks.cleanup(&mut scene).unwrap();
        assert_eq!(scene.live_count(), 1); // only the body visual remains
        assert_eq!(scene.double_release_count(), 0);
    }

    #[test]
    fn test_missing_setup_is_reported() {
        let mut scene = HeadlessScene::new();
        let result = SetupRegistry::empty().run(
            ScenarioKind::Orbit,
            &SceneDescriptor::new("orbit", Vec::new()),
            &mut scene,
        );
        assert!(matches!(result, Err(ScenarioError::MissingSetup(_))));
    }
}
