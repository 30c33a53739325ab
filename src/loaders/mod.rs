//! Asset loading: bytes come from an [`AssetSource`], decoding happens here.
//!
//! The viewer only sees the [`AssetLoader`] trait. [`AssetStore`] is the real
//! implementation; it works over the filesystem natively and over HTTP fetch
//! in the browser.

mod gltf_loader;
mod hdr_loader;

#[cfg(target_arch = "wasm32")]
mod fetch;

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::environment::HdrImage;
use crate::error::LoadError;
use crate::scene::Model;

pub use gltf_loader::{DecodedImage, bound_images, build_model};
pub use hdr_loader::decode_environment;
pub(crate) use hdr_loader::ensure_not_empty;

#[cfg(target_arch = "wasm32")]
pub use fetch::FetchSource;

/// Somewhere asset bytes can be read from.
#[allow(async_fn_in_trait)]
pub trait AssetSource {
    async fn read(&self, path: &str) -> Result<Vec<u8>, LoadError>;
}

/// Decodes the two kinds of assets the viewer needs.
#[allow(async_fn_in_trait)]
pub trait AssetLoader {
    async fn load_environment(&mut self, path: &str) -> Result<HdrImage, LoadError>;

    async fn load_model(&mut self, path: &str) -> Result<Model, LoadError>;
}

/// Reads paths relative to a root directory.
#[derive(Clone, Debug)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve against the current working directory.
    pub fn cwd() -> Self {
        Self::new(".")
    }
}

impl AssetSource for FileSource {
    async fn read(&self, path: &str) -> Result<Vec<u8>, LoadError> {
        std::fs::read(self.root.join(path)).map_err(|source| LoadError::Io {
            path: path.to_string(),
            source,
        })
    }
}

/// `uri` relative to the directory holding `base`.
pub fn resolve_relative(base: &str, uri: &str) -> String {
    match base.rfind(['/', '\\']) {
        Some(slash) => format!("{}/{}", &base[..slash], uri),
        None => uri.to_string(),
    }
}

/// Decode what follows `data:` in a URI. glTF embeds only base64 payloads.
pub fn decode_data_uri(model_path: &str, data: &str) -> Result<Vec<u8>, LoadError> {
    let unsupported = |what: String| LoadError::Unsupported {
        path: model_path.to_string(),
        what,
    };
    let (header, payload) = data
        .split_once(',')
        .ok_or_else(|| unsupported("a data URI without a payload".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(unsupported(format!("a non-base64 data URI ({header})")));
    }
    base64::decode(payload).map_err(|source| LoadError::DataUri {
        path: model_path.to_string(),
        source,
    })
}

/// [`AssetLoader`] over any [`AssetSource`].
pub struct AssetStore<S> {
    source: S,
}

impl<S: AssetSource> AssetStore<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Bytes of a buffer or image URI: embedded, or read next to the model.
    async fn read_referenced(&self, model_path: &str, uri: &str) -> Result<Vec<u8>, LoadError> {
        match uri.strip_prefix("data:") {
            Some(data) => decode_data_uri(model_path, data),
            None => self.source.read(&resolve_relative(model_path, uri)).await,
        }
    }
}

impl<S: AssetSource> AssetLoader for AssetStore<S> {
    async fn load_environment(&mut self, path: &str) -> Result<HdrImage, LoadError> {
        let bytes = self.source.read(path).await?;
        let image = decode_environment(path, &bytes)?;
        log::info!("loaded environment {path} ({}x{})", image.width, image.height);
        Ok(image)
    }

    async fn load_model(&mut self, path: &str) -> Result<Model, LoadError> {
        let bytes = self.source.read(path).await?;
        let gltf = ::gltf::Gltf::from_slice(&bytes).map_err(|source| LoadError::Model {
            path: path.to_string(),
            source,
        })?;

        let mut buffers = Vec::new();
        for buffer in gltf.buffers() {
            let data = match buffer.source() {
                ::gltf::buffer::Source::Bin => gltf.blob.clone(),
                ::gltf::buffer::Source::Uri(uri) => Some(self.read_referenced(path, uri).await?),
            };
            match data {
                Some(data) if data.len() >= buffer.length() => buffers.push(data),
                _ => {
                    return Err(LoadError::MissingBuffer {
                        path: path.to_string(),
                        index: buffer.index(),
                    });
                }
            }
        }

        let bound = bound_images(&gltf.document);
        let mut images = BTreeMap::new();
        for image in gltf.images().filter(|image| bound.contains(&image.index())) {
            let embedded = format!("{path}#image{}", image.index());
            let (label, bytes) = match image.source() {
                ::gltf::image::Source::View { view, .. } => {
                    let start = view.offset();
                    let end = start + view.length();
                    let data = buffers
                        .get(view.buffer().index())
                        .and_then(|b| b.get(start..end))
                        .ok_or_else(|| LoadError::MissingBuffer {
                            path: path.to_string(),
                            index: view.buffer().index(),
                        })?;
                    (embedded, data.to_vec())
                }
                ::gltf::image::Source::Uri { uri, .. } => {
                    let bytes = self.read_referenced(path, uri).await?;
                    let label = if uri.starts_with("data:") {
                        embedded
                    } else {
                        resolve_relative(path, uri)
                    };
                    (label, bytes)
                }
            };
            images.insert(image.index(), DecodedImage::decode(&label, &bytes)?);
        }
        let skipped = gltf.images().len() - images.len();
        if skipped > 0 {
            log::debug!("{path}: skipped {skipped} images no material slot samples");
        }

        let model = build_model(path, &gltf.document, &buffers, images)?;
        log::info!(
            "loaded model {path}: {} nodes, {} primitives, {} textures",
            model.nodes.len(),
            model.primitive_count(),
            model.textures.len()
        );
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_uris_resolve_next_to_the_model() {
        assert_eq!(
            resolve_relative("assets/wolf/scene.gltf", "scene.bin"),
            "assets/wolf/scene.bin"
        );
        assert_eq!(resolve_relative("scene.gltf", "textures/a.png"), "textures/a.png");
        assert_eq!(
            resolve_relative("https://host/models/a.gltf", "a.bin"),
            "https://host/models/a.bin"
        );
    }

    #[test]
    fn base64_data_uris_decode() {
        let bytes = decode_data_uri("m.gltf", "application/octet-stream;base64,AQID").unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);

        let err = decode_data_uri("m.gltf", "text/plain,hello").unwrap_err();
        assert!(matches!(err, LoadError::Unsupported { .. }));
        let err = decode_data_uri("m.gltf", "application/octet-stream;base64,@@@").unwrap_err();
        assert!(matches!(err, LoadError::DataUri { .. }));
        assert_eq!(err.path(), "m.gltf");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::new(dir.path());
        let err = pollster::block_on(source.read("nope.hdr")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert_eq!(err.path(), "nope.hdr");
    }
}
