//! Viewer configuration.
//!
//! [`ViewerConfig`] gathers every fixed constant the viewer starts from: asset
//! paths, window size, camera placement, orbit limits, the directional light
//! and its shadow frustum, and the initial parameter values. All fields are
//! public and the common ones have builder setters.
//!
//! ```
//! use vista::ViewerConfig;
//!
//! let config = ViewerConfig::new()
//!     .title("Statue")
//!     .size(1280, 720)
//!     .environment("assets/studio.hdr")
//!     .model("assets/statue/scene.gltf");
//! assert_eq!(config.width, 1280);
//! ```

use glam::{UVec2, Vec3};

use crate::params::{BloomParameters, ColorGradeParameters, LightingParameters};

/// Perspective camera placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraConfig {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(-38.0, 39.0, -61.0),
            target: Vec3::new(0.0, 10.0, 0.0),
            fov: 45.0,
            near: 0.25,
            far: 3000.0,
        }
    }
}

/// Orbit controller limits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitConfig {
    pub min_distance: f32,
    pub max_distance: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            min_distance: 2.0,
            max_distance: 5000.0,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
        }
    }
}

/// Orthographic shadow frustum and shadow-map settings of the directional light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowConfig {
    pub near: f32,
    pub far: f32,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub map_size: UVec2,
    /// Depth bias added to the receiver depth. Negative values fight acne.
    pub bias: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            near: 1.0,
            far: 1000.0,
            left: -250.0,
            right: 250.0,
            top: 250.0,
            bottom: -250.0,
            map_size: UVec2::splat(1024),
            bias: -0.002,
        }
    }
}

/// The scene's directional light.
#[derive(Clone, Debug, PartialEq)]
pub struct LightConfig {
    pub name: String,
    pub color: Vec3,
    pub position: Vec3,
    pub target: Vec3,
    pub shadow: ShadowConfig,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            name: "Dir. Light".to_string(),
            color: Vec3::ONE,
            position: Vec3::new(-150.0, 500.0, 300.0),
            target: Vec3::ZERO,
            shadow: ShadowConfig::default(),
        }
    }
}

/// Everything the viewer needs to start.
#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Equirectangular Radiance HDR image used as background and light source.
    pub environment_path: String,
    /// glTF (`.gltf` or `.glb`) model.
    pub model_path: String,
    /// TTF/OTF font for the panel and stats labels. Optional at runtime.
    pub font_path: String,
    pub font_size: f32,
    pub camera: CameraConfig,
    pub orbit: OrbitConfig,
    pub light: LightConfig,
    pub bloom: BloomParameters,
    pub lighting: LightingParameters,
    pub color: ColorGradeParameters,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "Vista".to_string(),
            width: 1280,
            height: 720,
            environment_path: "assets/Alexs_Apt_Env.hdr".to_string(),
            model_path: "assets/wolf_head_statuine/scene.gltf".to_string(),
            font_path: "assets/fonts/DejaVuSansMono.ttf".to_string(),
            font_size: 13.0,
            camera: CameraConfig::default(),
            orbit: OrbitConfig::default(),
            light: LightConfig::default(),
            bloom: BloomParameters::default(),
            lighting: LightingParameters::default(),
            color: ColorGradeParameters::default(),
        }
    }
}

impl ViewerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the window title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the initial window size in logical pixels.
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn environment(mut self, path: impl Into<String>) -> Self {
        self.environment_path = path.into();
        self
    }

    pub fn model(mut self, path: impl Into<String>) -> Self {
        self.model_path = path.into();
        self
    }

    pub fn font(mut self, path: impl Into<String>, size: f32) -> Self {
        self.font_path = path.into();
        self.font_size = size;
        self
    }

    /// Apply positional command-line overrides: `[ENV_HDR] [MODEL]`.
    pub fn with_args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        if let Some(environment) = args.next() {
            self.environment_path = environment;
        }
        if let Some(model) = args.next() {
            self.model_path = model;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_statue_scene() {
        let config = ViewerConfig::default();
        assert_eq!(config.camera.position, Vec3::new(-38.0, 39.0, -61.0));
        assert_eq!(config.camera.target, Vec3::new(0.0, 10.0, 0.0));
        assert_eq!(config.camera.fov, 45.0);
        assert_eq!(config.orbit.min_distance, 2.0);
        assert_eq!(config.orbit.max_distance, 5000.0);
        assert_eq!(config.light.shadow.map_size, UVec2::new(1024, 1024));
        assert!(config.light.shadow.bias < 0.0);
    }

    #[test]
    fn positional_args_override_asset_paths() {
        let config = ViewerConfig::new().with_args(["sky.hdr".to_string()]);
        assert_eq!(config.environment_path, "sky.hdr");
        assert_eq!(config.model_path, ViewerConfig::default().model_path);

        let config =
            ViewerConfig::new().with_args(["sky.hdr".to_string(), "bust.glb".to_string()]);
        assert_eq!(config.model_path, "bust.glb");
    }
}
