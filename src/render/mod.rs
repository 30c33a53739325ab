//! wgpu implementation of [`Renderer`](crate::renderer::Renderer).
//!
//! Frame order: shadow map, background and meshes into an HDR target
//! ([`scene_pass`]), then bloom, anti-aliasing and the color grade
//! ([`composer`]), then the 2D overlay straight onto the surface
//! ([`draw2d`]).

pub mod antialias;
pub mod bloom;
pub mod composer;
pub mod draw2d;
pub mod font;
pub mod fullscreen;
pub mod gpu;
pub mod grade;
pub mod mesh;
pub mod scene_pass;
pub mod target;
pub mod texture;
mod wgpu_renderer;

pub use gpu::GpuContext;
pub use wgpu_renderer::WgpuRenderer;
