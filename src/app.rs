//! Window shell: owns the winit window and drives a [`Viewer`] from its
//! events.

use std::sync::Arc;

use anyhow::Context;
use log::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowId};

use crate::clock::Clock;
use crate::config::ViewerConfig;
use crate::input::Input;
use crate::loaders::{AssetSource, AssetStore};
use crate::render::{GpuContext, WgpuRenderer};
use crate::renderer::RenderError;
use crate::viewer::Viewer;

/// A window with a fully initialized viewer behind it.
pub struct RunningViewer {
    window: Arc<Window>,
    viewer: Viewer<WgpuRenderer>,
    input: Input,
    clock: Clock,
}

impl RunningViewer {
    /// Create the GPU context for `window`, load the overlay font and run
    /// the viewer's initialization sequence against `loader`.
    pub async fn start<S: AssetSource>(
        window: Arc<Window>,
        config: ViewerConfig,
        mut loader: AssetStore<S>,
    ) -> anyhow::Result<Self> {
        let gpu = GpuContext::new(window.clone()).await?;
        let mut renderer = WgpuRenderer::new(gpu);
        load_font(&mut renderer, loader.source(), &config).await;

        let viewer = Viewer::initialize(config, renderer, &mut loader)
            .await
            .context("failed to initialize the viewer")?;
        info!("viewer ready: {} meshes", viewer.loaded_meshes().len());

        window.request_redraw();
        Ok(Self {
            window,
            viewer,
            input: Input::new(),
            clock: Clock::new(),
        })
    }

    pub fn viewer(&self) -> &Viewer<WgpuRenderer> {
        &self.viewer
    }

    /// Handle one window event. Returns an error when the viewer cannot
    /// continue.
    fn handle(&mut self, event: WindowEvent) -> Result<bool, RenderError> {
        self.input.handle_event(&event);

        match event {
            WindowEvent::CloseRequested => return Ok(false),
            WindowEvent::Resized(size) => self.viewer.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                let dt = self.clock.delta();
                match self.viewer.frame(dt, &self.input) {
                    Ok(()) => {}
                    Err(RenderError::SurfaceLost) => {
                        warn!("surface lost, reconfigured and skipped the frame")
                    }
                    Err(RenderError::Timeout) => warn!("surface timeout, frame skipped"),
                    Err(e) => return Err(e),
                }
                self.input.begin_frame();
                self.window.request_redraw();
            }
            _ => {}
        }
        Ok(true)
    }
}

/// The overlay font is optional: without one, labels are skipped.
async fn load_font<S: AssetSource>(
    renderer: &mut WgpuRenderer,
    source: &S,
    config: &ViewerConfig,
) {
    match source.read(&config.font_path).await {
        Ok(bytes) => {
            if let Err(e) = renderer.load_font(&bytes, config.font_size) {
                warn!("could not parse font {}: {e}; overlay text disabled", config.font_path);
            }
        }
        Err(e) => warn!("{e}; overlay text disabled"),
    }
}

#[cfg(target_arch = "wasm32")]
type StartSlot = std::rc::Rc<std::cell::RefCell<Option<anyhow::Result<RunningViewer>>>>;

enum AppState {
    /// Waiting for the platform to allow window creation.
    Pending(Option<ViewerConfig>),
    /// Window created, initialization running on the browser's executor.
    #[cfg(target_arch = "wasm32")]
    Starting(StartSlot),
    Running(RunningViewer),
    Stopped,
}

/// winit application driving a single viewer window.
pub struct ViewerApp {
    state: AppState,
    error: Option<anyhow::Error>,
}

impl ViewerApp {
    /// Create the window and viewer on the first `resumed` event.
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            state: AppState::Pending(Some(config)),
            error: None,
        }
    }

    /// The error that stopped the event loop, if any.
    pub fn take_error(&mut self) -> Option<anyhow::Error> {
        self.error.take()
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.error = Some(err);
        self.state = AppState::Stopped;
        event_loop.exit();
    }

    /// Pick up the viewer once its async initialization has finished.
    #[cfg(target_arch = "wasm32")]
    fn poll_start(&mut self, event_loop: &ActiveEventLoop) {
        let AppState::Starting(slot) = &self.state else {
            return;
        };
        let Some(result) = slot.borrow_mut().take() else {
            return;
        };
        match result {
            Ok(running) => self.state = AppState::Running(running),
            Err(e) => self.fail(event_loop, e),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn start_native(
    event_loop: &ActiveEventLoop,
    config: ViewerConfig,
) -> anyhow::Result<RunningViewer> {
    use crate::loaders::FileSource;
    use winit::dpi::LogicalSize;

    let attributes = Window::default_attributes()
        .with_title(config.title.clone())
        .with_inner_size(LogicalSize::new(config.width, config.height));
    let window = Arc::new(
        event_loop
            .create_window(attributes)
            .context("failed to create window")?,
    );
    pollster::block_on(RunningViewer::start(
        window,
        config,
        AssetStore::new(FileSource::cwd()),
    ))
}

#[cfg(target_arch = "wasm32")]
fn start_web(event_loop: &ActiveEventLoop, config: ViewerConfig) -> anyhow::Result<StartSlot> {
    use crate::loaders::FetchSource;
    use wasm_bindgen::JsCast;
    use web_sys::HtmlCanvasElement;
    use winit::dpi::PhysicalSize;
    use winit::platform::web::WindowAttributesExtWebSys;

    let canvas = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id("canvas"))
        .and_then(|e| e.dyn_into::<HtmlCanvasElement>().ok())
        .context("no <canvas id=\"canvas\"> element on the page")?;
    let width = if canvas.width() > 0 { canvas.width() } else { config.width };
    let height = if canvas.height() > 0 { canvas.height() } else { config.height };

    let attributes = Window::default_attributes()
        .with_canvas(Some(canvas))
        .with_inner_size(PhysicalSize::new(width, height));
    let window = Arc::new(
        event_loop
            .create_window(attributes)
            .context("failed to create window")?,
    );

    let slot = StartSlot::default();
    let result = slot.clone();
    wasm_bindgen_futures::spawn_local(async move {
        let started =
            RunningViewer::start(window.clone(), config, AssetStore::new(FetchSource::default()))
                .await;
        *result.borrow_mut() = Some(started);
        window.request_redraw();
    });
    Ok(slot)
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let AppState::Pending(config) = &mut self.state else {
            return;
        };
        let Some(config) = config.take() else {
            return;
        };

        #[cfg(not(target_arch = "wasm32"))]
        match start_native(event_loop, config) {
            Ok(running) => self.state = AppState::Running(running),
            Err(e) => self.fail(event_loop, e),
        }

        #[cfg(target_arch = "wasm32")]
        match start_web(event_loop, config) {
            Ok(slot) => self.state = AppState::Starting(slot),
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        #[cfg(target_arch = "wasm32")]
        self.poll_start(event_loop);

        let AppState::Running(running) = &mut self.state else {
            return;
        };
        match running.handle(event) {
            Ok(true) => {}
            Ok(false) => {
                self.state = AppState::Stopped;
                event_loop.exit();
            }
            Err(e) => self.fail(event_loop, e.into()),
        }
    }
}

/// Open a window and run the viewer until it is closed.
#[cfg(not(target_arch = "wasm32"))]
pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    use winit::event_loop::{ControlFlow, EventLoop};

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp::new(config);
    event_loop.run_app(&mut app)?;
    match app.take_error() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
