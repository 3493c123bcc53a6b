use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::{network::LayerType, stats::DEFAULT_PRECISION};

/// Magnification and formatting knobs for the layer report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Pixels per cell for spatial layers.
    pub grid_scale: u32,
    /// Pixels per cell for `fc` and `softmax` layers, which are usually 1x1.
    pub dense_scale: u32,
    pub filter_scale: u32,
    /// Conv filters this wide or narrower are not drawn.
    pub max_hidden_filter_size: usize,
    /// Decimals kept in the min/max lines.
    pub precision: i32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            grid_scale: 2,
            dense_scale: 10,
            filter_scale: 2,
            max_hidden_filter_size: 3,
            precision: DEFAULT_PRECISION,
        }
    }
}

impl RenderOptions {
    pub fn activation_scale(&self, layer_type: LayerType) -> u32 {
        match layer_type {
            LayerType::Fc | LayerType::Softmax => self.dense_scale,
            LayerType::Input
            | LayerType::Conv
            | LayerType::Pool
            | LayerType::Regression
            | LayerType::Local => self.grid_scale,
        }
    }
}

/// Load a JSON configuration from disk, writing the initializer's value there first if missing.
pub fn load_or_init<T, F>(path: &Path, initializer: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> T,
{
    if path.exists() {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let value = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;
        debug!(path = %path.display(), "loaded config");
        return Ok(value);
    }

    let value = initializer();
    save(path, &value)?;
    debug!(path = %path.display(), "initialized config with defaults");
    Ok(value)
}

pub fn save<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(path, serialized)
        .with_context(|| format!("failed to write config to {}", path.display()))
}
