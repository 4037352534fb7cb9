use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;
use vlmapi::GenerationConfig;

use crate::constants::{API_KEY_ENV, DEFAULT_GEMINI_ENDPOINT, DEFAULT_MODEL, UPLOAD_DIR_NAME};
use crate::error::{AppError, Result};

/// Application configuration, stored as JSON next to the binary. Every field
/// has a default so a partial (or absent) file is fine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the generation endpoint. The GEMINI_API_KEY environment
    /// variable takes precedence over this field.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Folder that selected images are copied into before being sent.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub generation: GenerationSettings,
}

/// Sampling knobs, mirrored into the request's generation config.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_GEMINI_ENDPOINT.to_string()
}

fn default_upload_dir() -> String {
    UPLOAD_DIR_NAME.to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_temperature() -> f64 {
    0.4
}

fn default_top_p() -> f64 {
    1.0
}

fn default_top_k() -> u32 {
    32
}

fn default_max_output_tokens() -> u32 {
    4096
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            endpoint: default_endpoint(),
            upload_dir: default_upload_dir(),
            timeout_secs: default_timeout_secs(),
            generation: GenerationSettings::default(),
        }
    }
}

impl From<GenerationSettings> for GenerationConfig {
    fn from(settings: GenerationSettings) -> Self {
        Self {
            temperature: settings.temperature,
            top_p: settings.top_p,
            top_k: settings.top_k,
            max_output_tokens: settings.max_output_tokens,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            info!("Config file not found at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Environment variable first, config field second. Blank values count as
    /// unset either way.
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .or_else(|| {
                self.api_key
                    .as_deref()
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
            })
    }
}
