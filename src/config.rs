//! Runtime configuration.
//!
//! Resolution order, highest priority first:
//! 1. Environment variables (`INJURY_LENS_*`)
//! 2. `~/.injury-lens/config.toml`
//! 3. Compiled defaults
//!
//! Every section is optional in the file; missing keys fall back to the
//! defaults computed from the user's home directory.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use directories::{BaseDirs, UserDirs};
use serde::Deserialize;

use crate::error::ConfigError;

/// Folder name used beneath the user's home directory for application data.
pub const DATA_DIR_NAME: &str = ".injury-lens";
const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "predictions.sqlite";
const MODEL_FILE_NAME: &str = "injury_model.onnx";

const ENV_DB: &str = "INJURY_LENS_DB";
const ENV_MODEL: &str = "INJURY_LENS_MODEL";
const ENV_GALLERY: &str = "INJURY_LENS_GALLERY";
const ENV_LOG: &str = "INJURY_LENS_LOG";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Root for the database, captures and logs unless overridden.
    pub data_dir: PathBuf,
    pub storage: StorageConfig,
    pub model: ModelConfig,
    pub capture: CaptureConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    pub database: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub gallery_dir: PathBuf,
    /// Device node whose presence counts as the camera permission.
    pub camera_device: PathBuf,
    /// Program plus arguments; `{output}` is replaced by the target file.
    pub camera_command: Vec<String>,
    /// Where camera captures are written.
    pub captures_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: PathBuf,
}

/// On-disk shape of `config.toml`. Everything is optional so partial files
/// merge over the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    storage: FileStorage,
    model: FileModel,
    capture: FileCapture,
    logging: FileLogging,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileStorage {
    database: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileModel {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileCapture {
    gallery_dir: Option<PathBuf>,
    camera_device: Option<PathBuf>,
    camera_command: Option<Vec<String>>,
    captures_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileLogging {
    level: Option<String>,
    directory: Option<PathBuf>,
}

impl AppConfig {
    /// Defaults rooted at `data_dir`, with the gallery pointing at `gallery_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>, gallery_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            storage: StorageConfig {
                database: data_dir.join(DB_FILE_NAME),
            },
            model: ModelConfig {
                path: data_dir.join(MODEL_FILE_NAME),
            },
            capture: CaptureConfig {
                gallery_dir: gallery_dir.into(),
                camera_device: PathBuf::from("/dev/video0"),
                camera_command: ["fswebcam", "--no-banner", "-r", "640x480", "{output}"]
                    .iter()
                    .map(|part| part.to_string())
                    .collect(),
                captures_dir: data_dir.join("captures"),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                directory: data_dir.join("logs"),
            },
            data_dir,
        }
    }

    /// Resolve the full configuration for this user.
    pub fn load() -> Result<Self, ConfigError> {
        let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
        let home = base_dirs.home_dir();
        let gallery = UserDirs::new()
            .and_then(|dirs| dirs.picture_dir().map(Path::to_path_buf))
            .unwrap_or_else(|| home.to_path_buf());

        let mut config = Self::with_data_dir(home.join(DATA_DIR_NAME), gallery);
        let file = config.data_dir.join(CONFIG_FILE_NAME);
        if file.exists() {
            let raw = fs::read_to_string(&file).map_err(|source| ConfigError::Read {
                path: file.clone(),
                source,
            })?;
            config.merge_toml(&raw, &file)?;
        }

        config.apply_env_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from a TOML document.
    pub fn merge_toml(&mut self, raw: &str, origin: &Path) -> Result<(), ConfigError> {
        let file: FileConfig = toml::from_str(raw).map_err(|err| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: err.to_string(),
        })?;

        if let Some(database) = file.storage.database {
            self.storage.database = database;
        }
        if let Some(path) = file.model.path {
            self.model.path = path;
        }
        if let Some(dir) = file.capture.gallery_dir {
            self.capture.gallery_dir = dir;
        }
        if let Some(device) = file.capture.camera_device {
            self.capture.camera_device = device;
        }
        if let Some(command) = file.capture.camera_command {
            self.capture.camera_command = command;
        }
        if let Some(dir) = file.capture.captures_dir {
            self.capture.captures_dir = dir;
        }
        if let Some(level) = file.logging.level {
            self.logging.level = level;
        }
        if let Some(dir) = file.logging.directory {
            self.logging.directory = dir;
        }
        Ok(())
    }

    /// Apply `INJURY_LENS_*` overrides. The lookup is injected so tests do not
    /// have to mutate the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = non_empty(ENV_DB) {
            self.storage.database = PathBuf::from(value);
        }
        if let Some(value) = non_empty(ENV_MODEL) {
            self.model.path = PathBuf::from(value);
        }
        if let Some(value) = non_empty(ENV_GALLERY) {
            self.capture.gallery_dir = PathBuf::from(value);
        }
        if let Some(value) = non_empty(ENV_LOG) {
            self.logging.level = value;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "logging.level".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self
            .capture
            .camera_command
            .first()
            .is_some_and(|program| program.trim().is_empty())
        {
            return Err(ConfigError::Invalid {
                field: "capture.camera_command".to_string(),
                message: "program name must not be blank".to_string(),
            });
        }
        Ok(())
    }
}
