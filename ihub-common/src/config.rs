//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "IHUB_ROOT_FOLDER";

/// Directory name used under the platform config/data directories
const APP_DIR: &str = "insight-hub";

/// TOML configuration file contents
///
/// Every section is optional; missing sections take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding uploaded and annotated images
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub annotation: AnnotationConfig,
    /// Model passes, run in the listed order
    #[serde(default)]
    pub detectors: Vec<DetectorConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for the analyze request body
    pub max_upload_bytes: usize,
    /// Origins allowed by CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_upload_bytes: 10 * 1024 * 1024,
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

/// Bounds on the in-memory analysis store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Oldest results are evicted beyond this count
    pub max_entries: usize,
    /// Results older than this are evicted by the sweep task; `None` keeps them
    pub max_age_secs: Option<u64>,
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            max_age_secs: Some(24 * 60 * 60),
            sweep_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// TrueType font for box labels; the bundled DejaVu Sans is used when unset
    pub font_path: Option<PathBuf>,
    pub box_color: [u8; 3],
    pub line_thickness: u32,
    pub font_size: f32,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            box_color: [0, 255, 0],
            line_thickness: 2,
            font_size: 16.0,
        }
    }
}

/// One model pass served by an inference endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub name: String,
    pub endpoint: String,
    /// Failures of an optional pass are logged and skipped
    #[serde(default)]
    pub optional: bool,
    #[serde(default = "default_detector_timeout")]
    pub timeout_secs: u64,
    /// Detections below this confidence are discarded
    #[serde(default)]
    pub min_confidence: f64,
}

fn default_detector_timeout() -> u64 {
    30
}

impl TomlConfig {
    /// Load configuration from a TOML file
    ///
    /// A missing file is not an error: a warning is logged and defaults are
    /// returned. A file that exists but does not parse is a `Config` error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
        config.validate()?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from an explicit path, or from the first platform config file found
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => match find_config_file() {
                Some(p) => Self::load(&p),
                None => {
                    info!("No config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.retention.max_entries == 0 {
            return Err(Error::Config(
                "retention.max_entries must be at least 1".to_string(),
            ));
        }
        if self.retention.sweep_interval_secs == 0 {
            return Err(Error::Config(
                "retention.sweep_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.annotation.line_thickness == 0 {
            return Err(Error::Config(
                "annotation.line_thickness must be at least 1".to_string(),
            ));
        }
        for detector in &self.detectors {
            if detector.name.trim().is_empty() {
                return Err(Error::Config("detector name must not be empty".to_string()));
            }
            if !(detector.endpoint.starts_with("http://")
                || detector.endpoint.starts_with("https://"))
            {
                return Err(Error::Config(format!(
                    "detector '{}' endpoint must be an http(s) URL: {}",
                    detector.name, detector.endpoint
                )));
            }
            if !(0.0..=1.0).contains(&detector.min_confidence) {
                return Err(Error::Config(format!(
                    "detector '{}' min_confidence out of range [0, 1]: {}",
                    detector.name, detector.min_confidence
                )));
            }
        }
        Ok(())
    }
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. `IHUB_ROOT_FOLDER` environment variable
/// 3. `root_folder` from the TOML config
/// 4. OS-dependent default
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// First existing config file among the platform locations
fn find_config_file() -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join(APP_DIR).join("config.toml"));
    }
    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc").join(APP_DIR).join("config.toml"));
    }

    candidates.into_iter().find(|p| p.exists())
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("./insight_hub_data"))
}
