use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelConfigError {
    #[error("invalid geometry for model '{name}': {reason}")]
    InvalidGeometry { name: String, reason: String },
    #[error("model config list is empty")]
    Empty,
    #[error("failed to read model config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse model config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Fixed input geometry of one model and how its outputs map back to the
/// source image.
///
/// With `org_resize` the model saw the whole image stretched to
/// `width` × `height`; otherwise it saw a square scaled by `scale` and offset
/// by (`shift_x`, `shift_y`). Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "ModelConfigFields")]
pub struct ModelConfig {
    scale: f32,
    shift_x: f32,
    shift_y: f32,
    height: u32,
    width: u32,
    name: String,
    org_resize: bool,
}

/// Unvalidated wire form of [`ModelConfig`], as found in config JSON.
#[derive(Clone, Debug, Deserialize)]
pub struct ModelConfigFields {
    pub scale: f32,
    #[serde(default)]
    pub shift_x: f32,
    #[serde(default)]
    pub shift_y: f32,
    pub height: u32,
    pub width: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub org_resize: bool,
}

impl ModelConfig {
    pub fn new(fields: ModelConfigFields) -> Result<Self, ModelConfigError> {
        let invalid = |reason: &str| ModelConfigError::InvalidGeometry {
            name: fields.name.clone(),
            reason: reason.to_string(),
        };
        if fields.width == 0 || fields.height == 0 {
            return Err(invalid("width and height must be positive"));
        }
        if !fields.scale.is_finite() || fields.scale <= 0.0 {
            return Err(invalid("scale must be a positive finite number"));
        }
        if !fields.shift_x.is_finite() || !fields.shift_y.is_finite() {
            return Err(invalid("shifts must be finite"));
        }
        Ok(Self {
            scale: fields.scale,
            shift_x: fields.shift_x,
            shift_y: fields.shift_y,
            height: fields.height,
            width: fields.width,
            name: fields.name,
            org_resize: fields.org_resize,
        })
    }

    /// Model fed the whole image resized to `width` × `height`.
    pub fn direct(name: &str, width: u32, height: u32) -> Result<Self, ModelConfigError> {
        Self::new(ModelConfigFields {
            scale: 1.0,
            shift_x: 0.0,
            shift_y: 0.0,
            height,
            width,
            name: name.to_string(),
            org_resize: true,
        })
    }

    /// Model fed a scaled, shifted square of the image.
    pub fn letterbox(
        name: &str,
        width: u32,
        height: u32,
        scale: f32,
        shift_x: f32,
        shift_y: f32,
    ) -> Result<Self, ModelConfigError> {
        Self::new(ModelConfigFields {
            scale,
            shift_x,
            shift_y,
            height,
            width,
            name: name.to_string(),
            org_resize: false,
        })
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn shift_x(&self) -> f32 {
        self.shift_x
    }

    pub fn shift_y(&self) -> f32 {
        self.shift_y
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Identifier used in logs and for resolving the model file.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn org_resize(&self) -> bool {
        self.org_resize
    }
}

impl TryFrom<ModelConfigFields> for ModelConfig {
    type Error = ModelConfigError;

    fn try_from(fields: ModelConfigFields) -> Result<Self, Self::Error> {
        Self::new(fields)
    }
}

/// Parse a JSON array of model configs. An empty array is an error.
pub fn parse_model_configs(json: &str) -> Result<Vec<ModelConfig>, ModelConfigError> {
    let configs: Vec<ModelConfig> = serde_json::from_str(json)?;
    if configs.is_empty() {
        return Err(ModelConfigError::Empty);
    }
    Ok(configs)
}

/// Read a JSON array of model configs from disk.
pub fn load_model_configs(path: &Path) -> Result<Vec<ModelConfig>, ModelConfigError> {
    let json = fs::read_to_string(path).map_err(|source| ModelConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let configs = parse_model_configs(&json)?;
    log::debug!(
        "Loaded {} model configs from {}",
        configs.len(),
        path.display()
    );
    Ok(configs)
}

/// Read a single model config object from disk.
pub fn load_model_config(path: &Path) -> Result<ModelConfig, ModelConfigError> {
    let json = fs::read_to_string(path).map_err(|source| ModelConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&json)?)
}
