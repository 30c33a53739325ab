//! The viewer: owns the scene, the parameters and the renderer, and runs the
//! initialization sequence and the frame loop.

use std::sync::Arc;

use glam::{UVec2, Vec3};
use hecs::Entity;

use crate::camera::PerspectiveCamera;
use crate::color_grade::{AdjustmentKind, NodeFrame};
use crate::config::ViewerConfig;
use crate::environment::{EnvironmentBaker, EnvironmentMap};
use crate::error::LoadError;
use crate::frame::{FrameContext, FrameLoop};
use crate::input::Input;
use crate::loaders::{AssetLoader, ensure_not_empty};
use crate::orbit_controls::OrbitControls;
use crate::panel::{ParamChange, ParamId, ParameterPanel};
use crate::params::{
    BloomParameters, ColorGradeParameters, LightingParameters, RenderStats, hue_angle,
    tone_mapping_exposure,
};
use crate::postprocess::PostProcessPipeline;
use crate::renderer::{
    OutputEncoding, RenderError, Renderer, ShadowMapKind, ShadowMapSettings, ToneMapping,
};
use crate::scene::{
    DirectionalLight, DirectionalShadow, Mesh, Model, SceneGraph, Shadows, Transform,
};
use crate::stats::StatsOverlay;
use crate::ui::DrawList;

/// A running viewer over some [`Renderer`].
///
/// Build one with [`Viewer::initialize`], forward resizes to
/// [`Viewer::resize`] and call [`Viewer::frame`] once per display refresh.
pub struct Viewer<R: Renderer> {
    pub(crate) config: ViewerConfig,
    pub(crate) renderer: R,
    pub(crate) camera: PerspectiveCamera,
    pub(crate) controls: OrbitControls,
    pub(crate) scene: SceneGraph,
    pub(crate) light: Entity,
    pub(crate) loaded_meshes: Vec<Entity>,
    pub(crate) bloom: BloomParameters,
    pub(crate) lighting: LightingParameters,
    pub(crate) color: ColorGradeParameters,
    pub(crate) pipeline: PostProcessPipeline,
    pub(crate) node_frame: NodeFrame,
    pub(crate) panel: ParameterPanel,
    pub(crate) stats_overlay: StatsOverlay,
    pub(crate) render_stats: RenderStats,
    pub(crate) overlay: DrawList,
    frame_loop: Option<FrameLoop<R>>,
}

impl<R: Renderer> Viewer<R> {
    /// Configure the renderer, load and bake the environment, load the model,
    /// add the light and build the post-processing chain and the GUI.
    ///
    /// The environment is loaded first; if it fails the model is never
    /// requested.
    pub async fn initialize<L: AssetLoader>(
        config: ViewerConfig,
        mut renderer: R,
        loader: &mut L,
    ) -> Result<Self, LoadError> {
        let bloom = config.bloom;
        let lighting = config.lighting;
        let color = config.color;

        let mut size = renderer.size();
        if size.x == 0 || size.y == 0 {
            size = UVec2::new(config.width.max(1), config.height.max(1));
        }
        renderer.set_size(size.x, size.y);
        {
            let settings = renderer.settings_mut();
            settings.tone_mapping = ToneMapping::AcesFilmic;
            settings.tone_mapping_exposure = tone_mapping_exposure(bloom.exposure);
            settings.output_encoding = OutputEncoding::Srgb;
            settings.shadow_map = ShadowMapSettings {
                enabled: true,
                kind: ShadowMapKind::PcfSoft,
            };
            settings.auto_reset_info = false;
        }

        let camera_config = &config.camera;
        let camera = PerspectiveCamera::new(
            camera_config.fov,
            size.x as f32 / size.y as f32,
            camera_config.near,
            camera_config.far,
        )
        .at(camera_config.position)
        .looking_at(camera_config.target);
        let mut controls = OrbitControls::new(config.orbit);
        controls.target = camera_config.target;

        let mut scene = SceneGraph::new();

        let environment = {
            let image = loader.load_environment(&config.environment_path).await?;
            let image = ensure_not_empty(&config.environment_path, image)?;
            let mut baker = EnvironmentBaker::new();
            Arc::new(baker.bake_equirectangular(&image))
        };
        install_environment(&mut scene, &mut renderer, environment);

        let model = loader.load_model(&config.model_path).await?;
        let mut loaded_meshes = Vec::new();
        spawn_model(
            &mut scene,
            model,
            lighting.environment_intensity,
            &mut loaded_meshes,
        );

        let light = spawn_light(&mut scene, &config, lighting.directional_intensity);

        let pipeline = PostProcessPipeline::new(size, &bloom, &color);

        let mut panel = ParameterPanel::new(&bloom, &color, &lighting);
        panel.set_viewport_width(size.x as f32);

        log::info!(
            "viewer ready: {} mesh nodes, {}x{}",
            loaded_meshes.len(),
            size.x,
            size.y
        );

        Ok(Self {
            config,
            renderer,
            camera,
            controls,
            scene,
            light,
            loaded_meshes,
            bloom,
            lighting,
            color,
            pipeline,
            node_frame: NodeFrame::new(),
            panel,
            stats_overlay: StatsOverlay::new(),
            render_stats: RenderStats::default(),
            overlay: DrawList::new(),
            frame_loop: Some(FrameLoop::new()),
        })
    }

    /// Load another model into the scene. Its meshes take the environment
    /// intensity current at load time.
    pub async fn load_model<L: AssetLoader>(
        &mut self,
        loader: &mut L,
        path: &str,
    ) -> Result<Entity, LoadError> {
        let model = loader.load_model(path).await?;
        Ok(spawn_model(
            &mut self.scene,
            model,
            self.lighting.environment_intensity,
            &mut self.loaded_meshes,
        ))
    }

    /// Replace the environment with a new image.
    pub async fn load_environment<L: AssetLoader>(
        &mut self,
        loader: &mut L,
        path: &str,
    ) -> Result<(), LoadError> {
        let environment = {
            let image = loader.load_environment(path).await?;
            let mut baker = EnvironmentBaker::new();
            Arc::new(baker.bake_equirectangular(&image))
        };
        install_environment(&mut self.scene, &mut self.renderer, environment);
        Ok(())
    }

    /// Resize the camera, the renderer and every post pass together.
    /// Zero sizes (minimized windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.camera.set_aspect(width as f32 / height as f32);
        self.renderer.set_size(width, height);
        self.pipeline.set_size(width, height);
        self.panel.set_viewport_width(width as f32);
        log::debug!("resized to {width}x{height}");
    }

    /// Edit a parameter through the panel, as a user would.
    pub fn set_param(&mut self, id: ParamId, value: f32) -> Option<ParamChange> {
        let change = self.panel.set(id, value)?;
        self.apply(change);
        Some(change)
    }

    /// Write an accepted edit into its parameter bag and live consumer.
    pub fn apply(&mut self, change: ParamChange) {
        let ParamChange { id, value } = change;
        match id {
            ParamId::Exposure => {
                self.bloom.exposure = value;
                self.renderer.settings_mut().tone_mapping_exposure = tone_mapping_exposure(value);
            }
            ParamId::BloomThreshold => {
                self.bloom.threshold = value;
                if let Some(bloom) = self.pipeline.bloom_mut() {
                    bloom.threshold = value;
                }
            }
            ParamId::BloomStrength => {
                self.bloom.strength = value;
                if let Some(bloom) = self.pipeline.bloom_mut() {
                    bloom.strength = value;
                }
            }
            ParamId::BloomRadius => {
                self.bloom.radius = value;
                if let Some(bloom) = self.pipeline.bloom_mut() {
                    bloom.radius = value;
                }
            }
            ParamId::Hue => {
                self.color.hue = value;
                self.set_grade(AdjustmentKind::Hue, hue_angle(value));
            }
            ParamId::Saturation => {
                self.color.saturation = value;
                self.set_grade(AdjustmentKind::Saturation, value);
            }
            ParamId::Vibrance => {
                self.color.vibrance = value;
                self.set_grade(AdjustmentKind::Vibrance, value);
            }
            ParamId::Brightness => {
                self.color.brightness = value;
                self.set_grade(AdjustmentKind::Brightness, value);
            }
            ParamId::Contrast => {
                self.color.contrast = value;
                self.set_grade(AdjustmentKind::Contrast, value);
            }
            ParamId::EnvIntensity => {
                self.lighting.environment_intensity = value;
                for &entity in &self.loaded_meshes {
                    if let Some(mut mesh) = self.scene.get_mut::<Mesh>(entity) {
                        mesh.material.env_map_intensity = value;
                    }
                }
            }
            ParamId::DirectionalIntensity => {
                self.lighting.directional_intensity = value;
                if let Some(mut light) = self.scene.get_mut::<DirectionalLight>(self.light) {
                    light.intensity = value;
                }
            }
        }
        log::debug!("{} = {value}", id.label());
    }

    fn set_grade(&mut self, kind: AdjustmentKind, value: f32) {
        if let Some(graph) = self.pipeline.color_grade() {
            graph.scalar(kind).set(value);
        }
    }

    /// Run one tick of the frame loop.
    pub fn frame(&mut self, dt: f64, input: &Input) -> Result<(), RenderError> {
        let Some(mut frame_loop) = self.frame_loop.take() else {
            return Ok(());
        };
        let result = frame_loop.run(self, &FrameContext { dt, input });
        self.frame_loop = Some(frame_loop);
        result
    }

    pub fn frame_steps(&self) -> Vec<&'static str> {
        self.frame_loop.as_ref().map(FrameLoop::names).unwrap_or_default()
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn controls(&self) -> &OrbitControls {
        &self.controls
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// Mesh nodes of every loaded model, in load and traversal order.
    pub fn loaded_meshes(&self) -> &[Entity] {
        &self.loaded_meshes
    }

    pub fn light(&self) -> Entity {
        self.light
    }

    pub fn bloom(&self) -> &BloomParameters {
        &self.bloom
    }

    pub fn lighting(&self) -> &LightingParameters {
        &self.lighting
    }

    pub fn color(&self) -> &ColorGradeParameters {
        &self.color
    }

    pub fn pipeline(&self) -> &PostProcessPipeline {
        &self.pipeline
    }

    pub fn panel(&self) -> &ParameterPanel {
        &self.panel
    }

    pub fn stats_overlay(&self) -> &StatsOverlay {
        &self.stats_overlay
    }

    /// Counters captured at the start of the last frame.
    pub fn render_stats(&self) -> &RenderStats {
        &self.render_stats
    }

    pub fn overlay(&self) -> &DrawList {
        &self.overlay
    }
}

fn install_environment<R: Renderer>(
    scene: &mut SceneGraph,
    renderer: &mut R,
    environment: Arc<EnvironmentMap>,
) {
    renderer.prepare_environment(&environment);
    scene.background = Some(environment.clone());
    scene.environment = Some(environment);
}

/// Add `model` to the scene and prepare its mesh nodes for lighting.
fn spawn_model(
    scene: &mut SceneGraph,
    model: Model,
    environment_intensity: f32,
    loaded_meshes: &mut Vec<Entity>,
) -> Entity {
    let root = scene.add_model(model);
    let meshes: Vec<Entity> = scene
        .descendants(root)
        .into_iter()
        .filter(|&entity| scene.get::<Mesh>(entity).is_some())
        .collect();

    for &entity in &meshes {
        if let Some(mut mesh) = scene.get_mut::<Mesh>(entity) {
            mesh.material.env_map_intensity = environment_intensity;
        }
        scene.insert(
            entity,
            Shadows {
                cast: true,
                receive: true,
            },
        );
    }
    loaded_meshes.extend(meshes);
    root
}

fn spawn_light(scene: &mut SceneGraph, config: &ViewerConfig, intensity: f32) -> Entity {
    let light = &config.light;
    let shadow = &light.shadow;
    let entity = scene.spawn(light.name.clone(), Transform::from_position(light.position));
    scene.insert(
        entity,
        DirectionalLight {
            color: light.color,
            intensity,
            target: light.target,
            shadow: Some(DirectionalShadow {
                left: shadow.left,
                right: shadow.right,
                top: shadow.top,
                bottom: shadow.bottom,
                near: shadow.near,
                far: shadow.far,
                map_size: shadow.map_size,
                bias: shadow.bias,
            }),
        },
    );
    entity
}

/// Direction the light shines in.
pub fn light_direction(position: Vec3, target: Vec3) -> Vec3 {
    (target - position).normalize_or(Vec3::NEG_Y)
}
