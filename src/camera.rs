// Camera Focus Controller - Ray picking against live bodies, smoothed follow, reset

use log::debug;
use serde::{Deserialize, Serialize};

use crate::physics_engine::{Body, BodyId, BodyRegistry, Vector3};
use crate::scene::SceneGraph;

/// Per-frame approach factor of the camera target toward the focused body
pub const TARGET_LERP: f64 = 0.1;
/// Per-frame approach factor of the camera position toward the follow point
pub const POSITION_LERP: f64 = 0.08;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Vector3,
    pub look_at: Vector3,
}

impl CameraPose {
    pub fn new(position: Vector3, look_at: Vector3) -> Self {
        Self { position, look_at }
    }

    /// Looking at the origin from `position`
    pub fn looking_at_origin(position: Vector3) -> Self {
        Self::new(position, Vector3::zero())
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self::looking_at_origin(Vector3::new(0.0, 50.0, 100.0))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vector3,
    pub direction: Vector3,
}

impl Ray {
    pub fn new(origin: Vector3, direction: Vector3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Distance along the ray to the first point on the sphere, if any.
    /// A ray starting inside the sphere hits at distance 0.
    pub fn intersect_sphere(&self, center: &Vector3, radius: f64) -> Option<f64> {
        let oc = self.origin.sub(center);
        let b = oc.dot(&self.direction);
        let c = oc.magnitude_squared() - radius * radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sq = disc.sqrt();
        let far = -b + sq;
        if far < 0.0 {
            return None;
        }
        Some((-b - sq).max(0.0))
    }
}

// =============================================================================
// CAMERA RIG
// =============================================================================

#[derive(Debug, Clone)]
pub struct CameraRig {
    pub position: Vector3,
    pub target: Vector3,
    default_pose: CameraPose,
}

impl CameraRig {
    pub fn new(pose: CameraPose) -> Self {
        Self {
            position: pose.position,
            target: pose.look_at,
            default_pose: pose,
        }
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose::new(self.position, self.target)
    }

    pub fn default_pose(&self) -> CameraPose {
        self.default_pose
    }

    /// Jump to `pose` and remember it as the reset pose
    pub fn set_default(&mut self, pose: CameraPose) {
        self.default_pose = pose;
        self.reset_to_default();
    }

    pub fn reset_to_default(&mut self) {
        self.position = self.default_pose.position;
        self.target = self.default_pose.look_at;
    }
}

impl Default for CameraRig {
    fn default() -> Self {
        Self::new(CameraPose::default())
    }
}

// =============================================================================
// FOCUS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusState {
    #[default]
    Unfocused,
    Focused(BodyId),
}

#[derive(Debug, Default)]
pub struct FocusController {
    state: FocusState,
}

/// Where the camera settles when following `body`: above and behind, scaled by radius
pub fn follow_point(body: &Body) -> Vector3 {
    body.position
        .add(&Vector3::new(0.0, body.radius * 1.5, body.radius * 4.0))
}

impl FocusController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FocusState {
        self.state
    }

    pub fn focused(&self) -> Option<BodyId> {
        match self.state {
            FocusState::Focused(id) => Some(id),
            FocusState::Unfocused => None,
        }
    }

    pub fn clear(&mut self) {
        self.state = FocusState::Unfocused;
    }

    /// Focus the nearest live body the ray hits. A miss restores the default pose.
    pub fn pick(&mut self, ray: &Ray, bodies: &BodyRegistry, rig: &mut CameraRig) -> Option<BodyId> {
        let hit = bodies
            .iter_live()
            .filter(|b| b.visual.is_some())
            .filter_map(|b| ray.intersect_sphere(&b.position, b.radius).map(|t| (t, b.id)))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, id)| id);

        match hit {
            Some(id) => {
                debug!("camera focus -> {:?}", id);
                self.state = FocusState::Focused(id);
            }
            None => {
                self.state = FocusState::Unfocused;
                rig.reset_to_default();
            }
        }
        hit
    }

    /// One frame of smoothed follow. Drops focus if the body or its visual is gone.
    pub fn follow(&mut self, rig: &mut CameraRig, bodies: &BodyRegistry, scene: &dyn SceneGraph) {
        let Some(id) = self.focused() else {
            return;
        };

        let body = bodies
            .get(id)
            .filter(|b| b.alive)
            .filter(|b| b.visual.map_or(false, |v| scene.contains(v)));

        match body {
            Some(body) => {
                rig.target = rig.target.lerp(&body.position, TARGET_LERP);
                rig.position = rig.position.lerp(&follow_point(body), POSITION_LERP);
            }
            None => {
                debug!("focused body {:?} is gone, dropping focus", id);
                self.state = FocusState::Unfocused;
            }
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

    fn spec(name: &str, x: f64, radius: f64) -> BodySpec {
        BodySpec {
            name: name.to_string(),
            role: BodyRole::Generic,
            texture_key: "Moon".to_string(),
            mass: 1.0,
            radius,
            position: Vector3::new(x, 0.0, 0.0),
            velocity: Vector3::zero(),
        }
    }

    fn world() -> (BodyRegistry, PointMassWorld, HeadlessScene, BodyId, BodyId) {
        let mut registry = BodyRegistry::new();
        let mut physics = PointMassWorld::new();
        let mut scene = HeadlessScene::new();
        let textures = TextureCatalog::default();
        let near = registry.spawn(spec("near", 10.0, 2.0), &mut physics, &mut scene, &textures);
        let far = registry.spawn(spec("far", 30.0, 5.0), &mut physics, &mut scene, &textures);
        (registry, physics, scene, near, far)
    }

    #[test]
    fn test_ray_sphere() {
        let ray = Ray::new(Vector3::zero(), Vector3::new(2.0, 0.0, 0.0));
        let t = ray.intersect_sphere(&Vector3::new(10.0, 0.0, 0.0), 2.0).unwrap();
        assert!((t - 8.0).abs() < 1e-9);
        assert!(ray.intersect_sphere(&Vector3::new(-10.0, 0.0, 0.0), 2.0).is_none());
        assert!(ray.intersect_sphere(&Vector3::new(10.0, 5.0, 0.0), 2.0).is_none());
    }

    #[test]
    fn test_pick_nearest_hit_wins() {
        let (registry, _physics, _scene, near, _far) = world();
        let mut rig = CameraRig::default();
        let mut focus = FocusController::new();

        let ray = Ray::new(Vector3::zero(), Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(focus.pick(&ray, &registry, &mut rig), Some(near));
        assert_eq!(focus.state(), FocusState::Focused(near));
    }

    #[test]
    fn test_miss_restores_default_pose() {
        let (registry, _physics, _scene, _near, _far) = world();
        let mut rig = CameraRig::default();
        rig.position = Vector3::new(1.0, 2.0, 3.0);
        rig.target = Vector3::new(10.0, 0.0, 0.0);
        let mut focus = FocusController::new();

        let ray = Ray::new(Vector3::zero(), Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(focus.pick(&ray, &registry, &mut rig), None);
        assert_eq!(focus.state(), FocusState::Unfocused);
        assert_eq!(rig.pose(), CameraPose::default());
    }

    #[test]
    fn test_follow_approaches_offset_point() {
        let (registry, _physics, scene, near, _far) = world();
        let mut rig = CameraRig::new(CameraPose::looking_at_origin(Vector3::zero()));
        let mut focus = FocusController::new();
        focus.pick(
            &Ray::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0)),
            &registry,
            &mut rig,
        );

        focus.follow(&mut rig, &registry, &scene);
        // target moves 10% of the way to (10,0,0)
        assert!((rig.target.x - 1.0).abs() < 1e-9);
        // position moves 8% of the way to (10, 3, 8)
        assert!((rig.position.x - 0.8).abs() < 1e-9);
        assert!((rig.position.y - 0.24).abs() < 1e-9);
        assert!((rig.position.z - 0.64).abs() < 1e-9);

        for _ in 0..500 {
            focus.follow(&mut rig, &registry, &scene);
        }
        assert!(rig.position.distance(&Vector3::new(10.0, 3.0, 8.0)) < 1e-6);
    }

    #[test]
    fn test_focus_drops_when_body_dies() {
        let (mut registry, mut physics, mut scene, near, _far) = world();
        let mut rig = CameraRig::default();
        let mut focus = FocusController::new();
        focus.pick(
            &Ray::new(Vector3::zero(), Vector3::new(1.0, 0.0, 0.0)),
            &registry,
            &mut rig,
        );

        registry.get_mut(near).unwrap().alive = false;
        registry.reap_dead(&mut physics, &mut scene);

        let before = rig.pose();
        focus.follow(&mut rig, &registry, &scene);
        assert_eq!(focus.focused(), None);
        assert_eq!(rig.pose(), before);
    }
}
