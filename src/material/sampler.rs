use serde::{Deserialize, Serialize};

use crate::config::SamplerConfig;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum MipmapFilterMode {
    Nearest,
    Linear,
    /// Sample the base level only.
    None,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

/// Sampler state as declared by the document.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct Sampler {
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: MipmapFilterMode,
    pub wrap_u: WrapMode,
    pub wrap_v: WrapMode,
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: MipmapFilterMode::Linear,
            wrap_u: WrapMode::Repeat,
            wrap_v: WrapMode::Repeat,
        }
    }
}

/// Sampler state handed to the device, with load-time configuration applied.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct SamplerDesc {
    pub sampler: Sampler,
    /// 1 disables anisotropic filtering.
    pub anisotropy: u16,
}

impl SamplerDesc {
    pub fn new(sampler: Sampler, config: &SamplerConfig) -> Self {
        let all_linear = sampler.mag_filter == FilterMode::Linear
            && sampler.min_filter == FilterMode::Linear
            && sampler.mipmap_filter == MipmapFilterMode::Linear;

        let anisotropy = match config.anisotropy {
            Some(n) if all_linear => n.max(1),
            _ => 1,
        };

        Self { sampler, anisotropy }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anisotropy_needs_linear_filtering() {
        let config = SamplerConfig { anisotropy: Some(8) };

        assert_eq!(SamplerDesc::new(Sampler::default(), &config).anisotropy, 8);

        let nearest = Sampler {
            mag_filter: FilterMode::Nearest,
            ..Default::default()
        };
        assert_eq!(SamplerDesc::new(nearest, &config).anisotropy, 1);

        let disabled = SamplerConfig { anisotropy: None };
        assert_eq!(SamplerDesc::new(Sampler::default(), &disabled).anisotropy, 1);
    }
}
