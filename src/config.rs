//! Engine Configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::print::{Orientation, PaperSize};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub blank: BlankConfig,
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: u64,
    #[serde(default)]
    pub paper: PaperSize,
    #[serde(default)]
    pub orientation: Orientation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderConfig {
    /// Render calls allowed in flight at once.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlankConfig {
    #[serde(default = "default_blank_width")]
    pub width: u32,
    #[serde(default = "default_blank_height")]
    pub height: u32,
}

fn default_batch_size() -> usize { 2 }
fn default_scale() -> f32 { 1.5 }
fn default_jpeg_quality() -> u8 { 90 }
fn default_blank_width() -> u32 { 1000 }
fn default_blank_height() -> u32 { 1400 }
fn default_max_document_bytes() -> u64 { 250 * 1024 * 1024 }

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            scale: default_scale(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Default for BlankConfig {
    fn default() -> Self {
        Self {
            width: default_blank_width(),
            height: default_blank_height(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            render: RenderConfig::default(),
            blank: BlankConfig::default(),
            max_document_bytes: default_max_document_bytes(),
            paper: PaperSize::default(),
            orientation: Orientation::default(),
        }
    }
}

impl EngineConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render.batch_size == 0 {
            return Err(ConfigError::Invalid("render.batchSize must be at least 1".into()));
        }
        if !(1..=100).contains(&self.render.jpeg_quality) {
            return Err(ConfigError::Invalid("render.jpegQuality must be between 1 and 100".into()));
        }
        if !(self.render.scale > 0.0) {
            return Err(ConfigError::Invalid("render.scale must be positive".into()));
        }
        if self.blank.width == 0 || self.blank.height == 0 {
            return Err(ConfigError::Invalid("blank page dimensions must be non-zero".into()));
        }
        Ok(())
    }
}
