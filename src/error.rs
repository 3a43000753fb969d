//! Typed errors for the pieces that talk to the outside world: the model
//! artifact, the capture sources and the configuration file. Persistence and
//! UI code keep using `anyhow` and convert these at the screen boundary.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::capture::Capability;

/// Failures raised by the classifier adapter. Load failures and
/// classification failures are kept apart so the capture screen can disable
/// analysis for the former and merely report the latter.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("model file not found at {0}")]
    ModelMissing(PathBuf),
    #[error("failed to load model from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },
    #[error("model expects {expected} input values, got {actual}")]
    InputShape { expected: usize, actual: usize },
    #[error("inference failed: {0}")]
    Inference(String),
}

impl ClassifierError {
    /// True when the model never became usable.
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            ClassifierError::ModelMissing(_) | ClassifierError::ModelLoad { .. }
        )
    }
}

/// Failures raised while obtaining an image from the gallery or the camera.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("{0} permission is required for this feature")]
    PermissionDenied(Capability),
    #[error("could not read gallery {path}")]
    Gallery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not open image {path}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("no camera command configured")]
    CameraNotConfigured,
    #[error("camera capture failed: {0}")]
    Camera(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Problems found while resolving `config.toml` and environment overrides.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate home directory")]
    NoHomeDirectory,
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid TOML in {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}
