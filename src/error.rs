//! Error types for asset loading.

use thiserror::Error;

/// Failure to fetch or decode one of the viewer's assets.
///
/// Load errors are fatal to viewer initialization: the environment map and
/// the model are both required, and nothing is retried.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch {path}: {reason}")]
    Fetch { path: String, reason: String },

    #[error("failed to decode environment image {path}")]
    Environment {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to parse model {path}")]
    Model {
        path: String,
        #[source]
        source: gltf::Error,
    },

    #[error("failed to decode texture {path}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("model {path} references buffer {index} which is missing or too short")]
    MissingBuffer { path: String, index: usize },

    #[error("model {path} has a malformed base64 data URI")]
    DataUri {
        path: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("{path}: {what} is not supported")]
    Unsupported { path: String, what: String },

    #[error("model {path} contains no scene")]
    EmptyScene { path: String },
}

impl LoadError {
    /// Path of the asset that failed to load.
    pub fn path(&self) -> &str {
        match self {
            LoadError::Io { path, .. }
            | LoadError::Fetch { path, .. }
            | LoadError::Environment { path, .. }
            | LoadError::Model { path, .. }
            | LoadError::Image { path, .. }
            | LoadError::MissingBuffer { path, .. }
            | LoadError::DataUri { path, .. }
            | LoadError::Unsupported { path, .. }
            | LoadError::EmptyScene { path } => path,
        }
    }

    pub(crate) fn fetch(path: impl Into<String>, reason: impl ToString) -> Self {
        LoadError::Fetch {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_reported_for_every_variant() {
        let err = LoadError::fetch("assets/env.hdr", "404 Not Found");
        assert_eq!(err.path(), "assets/env.hdr");
        assert_eq!(
            err.to_string(),
            "failed to fetch assets/env.hdr: 404 Not Found"
        );

        let err = LoadError::EmptyScene {
            path: "scene.gltf".into(),
        };
        assert_eq!(err.path(), "scene.gltf");
    }

    #[test]
    fn io_error_keeps_its_source() {
        let err = LoadError::Io {
            path: "missing.hdr".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("gone"));
    }
}
