use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::vision::DEFAULT_MIN_CONFIDENCE;

/// Environment variable consulted when `vision.api_key` is empty.
pub const API_KEY_ENV: &str = "GOOGLE_VISION_API_KEY";

/// Top-level configuration.
///
/// Every section has defaults, so a config file only needs the values that
/// differ, typically just the API key:
///
/// ```json
/// { "vision": { "api_key": "AIza..." } }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Recognition service settings.
    pub vision: VisionConfig,
    /// How labels become keywords.
    pub labels: LabelConfig,
    /// Which files the directory walk picks up.
    pub walk: WalkConfig,
}

/// Google Cloud Vision settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub api_key: String,
    pub endpoint: String,
    /// `maxResults` of the label detection feature.
    pub max_results: u32,
    /// Largest base64 payload sent; bigger images are skipped as too large.
    pub max_request_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Labels scoring strictly above this are preferred.
    pub min_confidence: f32,
}

/// File selection for the directory walk.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// Image extensions, compared case-insensitively.
    pub extensions: Vec<String>,
    /// Directory names that are never entered (e.g. Synology `@eaDir`).
    pub excluded_dirs: Vec<String>,
    /// Files whose name contains one of these are skipped.
    pub excluded_substrings: Vec<String>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: "https://vision.googleapis.com/v1/images:annotate".to_string(),
            max_results: 10,
            max_request_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["jpg".to_string(), "jpeg".to_string()],
            excluded_dirs: vec!["@eaDir".to_string()],
            excluded_substrings: vec!["SYNOPHOTO_THUMB".to_string()],
        }
    }
}

impl VisionConfig {
    /// The configured key, or the one from [`API_KEY_ENV`].
    pub fn resolved_api_key(&self) -> String {
        if self.api_key.is_empty() {
            std::env::var(API_KEY_ENV).unwrap_or_default()
        } else {
            self.api_key.clone()
        }
    }
}

impl WalkConfig {
    pub fn is_image(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.excluded_dirs.iter().any(|d| d == name)
    }

    pub fn is_excluded_file(&self, name: &str) -> bool {
        self.excluded_substrings.iter().any(|s| name.contains(s.as_str()))
    }
}

impl Config {
    /// `config.json` next to the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        log::debug!("Loaded config from {}", config_path.display());
        Ok(config)
    }
}
