use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, ResultExt};
use crate::texture::{ColorCompression, NormalCompression};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub sampler: SamplerConfig,
    pub image: ImageConfig,
    pub geometry: GeometryConfig,
    pub shadow: ShadowConfig,
}

impl LoadConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::parse(format!("config: {e}")))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::parse(format!("config: {e}")))
            .with_context(|| format!("read {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parse {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Anisotropy clamp, applied only to fully linear samplers.
    pub anisotropy: Option<u16>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            anisotropy: Some(4),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub color_mode: ColorCompression,
    pub normal_mode: NormalCompression,
    /// Whether the device can sample `Rg16Unorm`. Without it 16-bit normal
    /// maps are narrowed to 8 bits before the mode applies.
    pub supports_rg16: bool,
    /// Decode/compress threads. `None` uses the available parallelism.
    pub worker_count: Option<usize>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            color_mode: ColorCompression::Rgba8Bc7,
            normal_mode: NormalCompression::RgBc5,
            supports_rg16: true,
            worker_count: None,
        }
    }
}

impl ImageConfig {
    pub fn workers(&self) -> usize {
        self.worker_count
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
            .max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Minimum cosine between normals (and tangents) for two vertices to merge.
    pub normal_similarity: f32,
    /// A box whose smallest extent is below `degenerate_ratio * largest` is inflated.
    pub degenerate_ratio: f32,
    /// Half-thickness added to degenerate boxes, relative to the largest extent.
    pub inflation_ratio: f32,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            normal_similarity: 0.9999,
            degenerate_ratio: 0.0001,
            inflation_ratio: 0.0005,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// 0 = logarithmic cascade splits, 1 = linear.
    pub linear_blend_ratio: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            linear_blend_ratio: 0.5,
        }
    }
}
