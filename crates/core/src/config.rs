//! Runtime configuration.
//!
//! A [`Config`] is built once at start-up (TOML file, then environment
//! overrides) and handed to the pipeline and server constructors. Nothing
//! below reads the process environment at call time.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::currency::CurrencyCode;
use crate::split::SplitMode;

pub const ENV_OCR_API_KEY: &str = "MISTRAL_API_KEY";
pub const ENV_RATE_API_KEY: &str = "EXCHANGE_API_KEY";
pub const ENV_BIND: &str = "SPLITTY_BIND";
pub const ENV_TARGET_CURRENCY: &str = "SPLITTY_TARGET_CURRENCY";
pub const ENV_SPLIT_MODE: &str = "SPLITTY_SPLIT_MODE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("OCR API key not configured (set MISTRAL_API_KEY or [ocr].api_key)")]
    MissingOcrKey,
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ocr: OcrSettings,
    pub rates: RateSettings,
    pub split: SplitSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.mistral.ai/v1/ocr".to_string(),
            model: "mistral-ocr-latest".to_string(),
        }
    }
}

impl OcrSettings {
    /// The OCR key is mandatory: without it no receipt can be read at all.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingOcrKey)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateSettings {
    /// Optional. Without it conversion is skipped and source amounts are kept.
    pub api_key: Option<String>,
    pub endpoint: String,
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.exchangerate.host/convert".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SplitSettings {
    pub mode: SplitMode,
    pub target_currency: CurrencyCode,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            mode: SplitMode::default(),
            target_currency: CurrencyCode::usd(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub body_limit_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// File (when given) overlaid with the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        base.with_env(|key| std::env::var(key).ok())
    }

    /// Overlays values from `lookup`; empty values are ignored.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_OCR_API_KEY) {
            self.ocr.api_key = Some(key);
        }
        if let Some(key) = get(ENV_RATE_API_KEY) {
            self.rates.api_key = Some(key);
        }
        if let Some(bind) = get(ENV_BIND) {
            self.server.bind = bind;
        }
        if let Some(code) = get(ENV_TARGET_CURRENCY) {
            self.split.target_currency =
                CurrencyCode::new(&code).map_err(|e| ConfigError::InvalidValue {
                    key: ENV_TARGET_CURRENCY,
                    message: e.to_string(),
                })?;
        }
        if let Some(mode) = get(ENV_SPLIT_MODE) {
            self.split.mode = mode
                .parse()
                .map_err(|message| ConfigError::InvalidValue { key: ENV_SPLIT_MODE, message })?;
        }
        Ok(self)
    }
}
