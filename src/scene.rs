// Scene Collaborator - Visual primitives owned outside the simulation core
// The core only creates, moves, fades and releases handles through `SceneGraph`

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::physics_engine::Vector3;

// =============================================================================
// COLOURS & TEXTURES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Build from a packed 0xRRGGBB value
    pub fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as f32 / 255.0,
            g: ((hex >> 8) & 0xff) as f32 / 255.0,
            b: (hex & 0xff) as f32 / 255.0,
        }
    }
}

/// Material input produced by a `TextureResolver`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TextureRef {
    Image(PathBuf),
    Plain(Color),
}

pub trait TextureResolver: Send + Sync {
    fn resolve(&self, key: &str) -> TextureRef;
}

/// Texture keys the text-generation prompt is allowed to use
pub const KNOWN_TEXTURES: [&str; 10] = [
    "Sun", "Mercury", "Venus", "Earth", "Moon", "Mars", "Jupiter", "Saturn", "Uranus", "Neptune",
];

/// Maps texture keys onto image files under a root directory.
/// Unknown keys resolve to a plain grey material instead of failing.
pub struct TextureCatalog {
    root: PathBuf,
}

impl TextureCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for TextureCatalog {
    fn default() -> Self {
        Self::new("textures")
    }
}

impl TextureResolver for TextureCatalog {
    fn resolve(&self, key: &str) -> TextureRef {
        let known = KNOWN_TEXTURES
            .iter()
            .find(|k| k.eq_ignore_ascii_case(key.trim()));

        match known {
            Some(name) => TextureRef::Image(self.root.join(format!("{}.jpg", name.to_lowercase()))),
            None => TextureRef::Plain(Color::rgb(0.6, 0.6, 0.62)),
        }
    }
}

// =============================================================================
// VISUAL PRIMITIVES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisualHandle(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// Unit sphere; the transform scale is its radius
    Sphere {
        texture: Option<TextureRef>,
        color: Color,
    },
    /// Point cloud with a fixed number of vertices
    Points {
        capacity: usize,
        point_size: f64,
        color: Color,
        vertex_colors: Option<Vec<Color>>,
        additive: bool,
    },
    /// Flat annulus lying in the XZ plane
    Ring {
        inner: f64,
        outer: f64,
        color: Color,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisualSpec {
    pub primitive: Primitive,
    pub position: Vector3,
    pub scale: f64,
    pub opacity: f64,
}

impl VisualSpec {
    pub fn new(primitive: Primitive, position: Vector3) -> Self {
        Self {
            primitive,
            position,
            scale: 1.0,
            opacity: 1.0,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }
}

/// Rendering collaborator. `remove_visual` releases geometry and material together.
pub trait SceneGraph: Send + Sync {
    fn create_visual(&mut self, spec: VisualSpec) -> VisualHandle;
    fn remove_visual(&mut self, handle: VisualHandle);
    fn set_transform(&mut self, handle: VisualHandle, position: Vector3, scale: f64);
    fn set_visible(&mut self, handle: VisualHandle, visible: bool);
    fn set_opacity(&mut self, handle: VisualHandle, opacity: f64);
    fn set_point_scale(&mut self, handle: VisualHandle, scale: f64);
    fn update_points(&mut self, handle: VisualHandle, positions: &[Vector3]);
    fn contains(&self, handle: VisualHandle) -> bool;
}

// =============================================================================
// HEADLESS SCENE
// =============================================================================

#[derive(Debug, Clone)]
pub struct VisualRecord {
    pub spec: VisualSpec,
    pub position: Vector3,
    pub scale: f64,
    pub point_scale: f64,
    pub visible: bool,
    pub opacity: f64,
    pub uploaded_points: usize,
}

/// In-memory scene used by the headless binary and the tests.
/// Tracks every live primitive and counts releases of unknown handles.
#[derive(Debug, Default)]
pub struct HeadlessScene {
    visuals: HashMap<u64, VisualRecord>,
    next_id: u64,
    released: u64,
    double_releases: u64,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handle: VisualHandle) -> Option<&VisualRecord> {
        self.visuals.get(&handle.0)
    }

    pub fn live_count(&self) -> usize {
        self.visuals.len()
    }

    pub fn released_count(&self) -> u64 {
        self.released
    }

    /// Releases of handles that were already gone
    pub fn double_release_count(&self) -> u64 {
        self.double_releases
    }
}

impl SceneGraph for HeadlessScene {
    fn create_visual(&mut self, spec: VisualSpec) -> VisualHandle {
        let handle = VisualHandle(self.next_id);
        self.next_id += 1;
        self.visuals.insert(
            handle.0,
            VisualRecord {
                position: spec.position,
                scale: spec.scale,
                point_scale: 1.0,
                visible: true,
                opacity: spec.opacity,
                uploaded_points: 0,
                spec,
            },
        );
        handle
    }

    fn remove_visual(&mut self, handle: VisualHandle) {
        if self.visuals.remove(&handle.0).is_some() {
            self.released += 1;
        } else {
            self.double_releases += 1;
        }
    }

    fn set_transform(&mut self, handle: VisualHandle, position: Vector3, scale: f64) {
        if let Some(v) = self.visuals.get_mut(&handle.0) {
            v.position = position;
            v.scale = scale;
        }
    }

    fn set_visible(&mut self, handle: VisualHandle, visible: bool) {
        if let Some(v) = self.visuals.get_mut(&handle.0) {
            v.visible = visible;
        }
    }

    fn set_opacity(&mut self, handle: VisualHandle, opacity: f64) {
        if let Some(v) = self.visuals.get_mut(&handle.0) {
            v.opacity = opacity;
        }
    }

    fn set_point_scale(&mut self, handle: VisualHandle, scale: f64) {
        if let Some(v) = self.visuals.get_mut(&handle.0) {
            v.point_scale = scale;
        }
    }

    fn update_points(&mut self, handle: VisualHandle, positions: &[Vector3]) {
        if let Some(v) = self.visuals.get_mut(&handle.0) {
            v.uploaded_points = positions.len();
        }
    }

    fn contains(&self, handle: VisualHandle) -> bool {
        self.visuals.contains_key(&handle.0)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex() {
        let c = Color::from_hex(0xffaa33);
        assert!((c.r - 1.0).abs() < 1e-6);
        assert!((c.g - 170.0 / 255.0).abs() < 1e-6);
        assert!((c.b - 51.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_catalog_resolves_known_and_unknown_keys() {
        let catalog = TextureCatalog::new("assets");
        assert_eq!(
            catalog.resolve("earth"),
            TextureRef::Image(PathBuf::from("assets").join("earth.jpg"))
        );
        assert!(matches!(catalog.resolve("Pluto"), TextureRef::Plain(_)));
    }

    #[test]
    fn test_headless_counts_double_release() {
        let mut scene = HeadlessScene::new();
        let h = scene.create_visual(VisualSpec::new(
            Primitive::Ring {
                inner: 8.0,
                outer: 9.0,
                color: Color::WHITE,
            },
            Vector3::zero(),
        ));
        assert!(scene.contains(h));

        scene.remove_visual(h);
        scene.remove_visual(h);

        assert!(!scene.contains(h));
        assert_eq!(scene.released_count(), 1);
        assert_eq!(scene.double_release_count(), 1);
    }
}
