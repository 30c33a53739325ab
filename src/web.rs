//! Browser entry point.
//!
//! The page must contain a `<canvas id="canvas">`; assets are fetched
//! relative to the page.

use wasm_bindgen::prelude::*;
use winit::event_loop::EventLoop;
use winit::platform::web::EventLoopExtWebSys;

use crate::app::ViewerApp;
use crate::config::ViewerConfig;

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    let event_loop = EventLoop::new().map_err(|e| JsValue::from_str(&e.to_string()))?;
    event_loop.spawn_app(ViewerApp::new(ViewerConfig::new()));
    Ok(())
}
