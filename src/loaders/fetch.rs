//! Browser asset source backed by `window.fetch`.

use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, RequestMode, Response};

use super::AssetSource;
use crate::error::LoadError;

/// Fetches paths relative to `base` (the page location when empty).
#[derive(Clone, Debug, Default)]
pub struct FetchSource {
    base: String,
}

impl FetchSource {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    fn url(&self, path: &str) -> String {
        if self.base.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.base.trim_end_matches('/'), path)
        }
    }
}

impl AssetSource for FetchSource {
    async fn read(&self, path: &str) -> Result<Vec<u8>, LoadError> {
        let js_err = |e: wasm_bindgen::JsValue| LoadError::fetch(path, format!("{e:?}"));

        let init = RequestInit::new();
        init.set_method("GET");
        init.set_mode(RequestMode::Cors);
        let request = Request::new_with_str_and_init(&self.url(path), &init).map_err(js_err)?;

        let window = web_sys::window().ok_or_else(|| LoadError::fetch(path, "no window"))?;
        let response: Response = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(js_err)?
            .dyn_into()
            .map_err(js_err)?;

        if !response.ok() {
            return Err(LoadError::fetch(
                path,
                format!("HTTP {} {}", response.status(), response.status_text()),
            ));
        }

        let buffer = JsFuture::from(response.array_buffer().map_err(js_err)?)
            .await
            .map_err(js_err)?;
        Ok(js_sys::Uint8Array::new(&buffer).to_vec())
    }
}
