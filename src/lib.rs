//! # Vista
//!
//! **An HDR scene viewer: one glTF model lit by an environment map.**
//!
//! Vista loads an equirectangular Radiance HDR image, bakes it into
//! irradiance and specular radiance maps, and lights a glTF model with it
//! together with a shadow-casting directional light. The frame goes through
//! bloom, anti-aliasing and a color-grade node graph, and every parameter is
//! exposed on a panel next to a live stats overlay.
//!
//! ## Quick Start
//!
//! ```no_run
//! use vista::ViewerConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ViewerConfig::new()
//!         .environment("assets/studio.hdr")
//!         .model("assets/helmet/scene.gltf");
//!     vista::run(config)
//! }
//! ```
//!
//! The [`Viewer`] itself is generic over [`Renderer`] and [`AssetLoader`],
//! so it can be driven headless with fakes in tests.

mod app;
pub mod camera;
pub mod clock;
pub mod color_grade;
pub mod config;
pub mod environment;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod input;
pub mod loaders;
pub mod orbit_controls;
pub mod panel;
pub mod params;
pub mod postprocess;
pub mod render;
pub mod renderer;
pub mod scene;
pub mod stats;
pub mod ui;
pub mod viewer;

#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(not(target_arch = "wasm32"))]
pub use app::run;
pub use app::{RunningViewer, ViewerApp};
pub use camera::PerspectiveCamera;
pub use clock::Clock;
pub use color_grade::{ColorGradeGraph, NodeFrame};
pub use config::ViewerConfig;
pub use environment::{EnvironmentBaker, EnvironmentMap, HdrImage};
pub use error::LoadError;
pub use frame::{FrameContext, FrameLoop, FrameStep};
pub use input::Input;
pub use loaders::{AssetLoader, AssetSource, AssetStore, FileSource};
pub use orbit_controls::OrbitControls;
pub use panel::{ParamChange, ParamId, ParameterPanel};
pub use params::{BloomParameters, ColorGradeParameters, LightingParameters, RenderStats};
pub use postprocess::{Pass, PostProcessPipeline};
pub use render::{GpuContext, WgpuRenderer};
pub use renderer::{RenderError, RenderInfo, Renderer, RendererSettings};
pub use scene::{Model, SceneGraph};
pub use stats::{StatsMode, StatsOverlay};
pub use viewer::Viewer;

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, UVec2, Vec2, Vec3, Vec4};

// Re-export the ECS handle type used for scene entities
pub use hecs::Entity;
