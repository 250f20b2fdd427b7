//! The device seam. Everything that allocates GPU memory goes through
//! [`RenderDevice`], so loading and pooling can run against wgpu or a
//! recording stand-in.

pub mod wgpu_device;

use crate::error::Result;
use crate::material::sampler::SamplerDesc;
use crate::material::{MaterialParams, MaterialTextures};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferUsage {
    pub vertex: bool,
    pub index: bool,
    pub uniform: bool,
    pub storage: bool,
}

impl BufferUsage {
    pub const VERTEX: Self = Self {
        vertex: true,
        index: false,
        uniform: false,
        storage: false,
    };
    pub const INDEX: Self = Self {
        vertex: false,
        index: true,
        uniform: false,
        storage: false,
    };
    pub const UNIFORM: Self = Self {
        vertex: false,
        index: false,
        uniform: true,
        storage: false,
    };
    pub const STORAGE: Self = Self {
        vertex: false,
        index: false,
        uniform: false,
        storage: true,
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureUsage {
    pub sampled: bool,
    pub render_target: bool,
    pub storage: bool,
}

impl TextureUsage {
    pub const SAMPLED: Self = Self {
        sampled: true,
        render_target: false,
        storage: false,
    };
    pub const RENDER_TARGET: Self = Self {
        sampled: true,
        render_target: true,
        storage: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureFormat {
    R8Unorm,
    Rg8Unorm,
    Rg16Unorm,
    Rgba8Unorm,
    Rgba16Float,
    Rgba32Float,
    Depth32Float,
    Bc3RgbaUnorm,
    Bc5RgUnorm,
    Bc7RgbaUnorm,
}

impl TextureFormat {
    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            TextureFormat::Bc3RgbaUnorm | TextureFormat::Bc5RgUnorm | TextureFormat::Bc7RgbaUnorm
        )
    }

    /// Edge length of one addressable block in texels.
    pub fn block_dim(self) -> u32 {
        if self.is_compressed() { 4 } else { 1 }
    }

    /// Bytes per block (per texel for uncompressed formats).
    pub fn block_bytes(self) -> usize {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::Rg8Unorm => 2,
            TextureFormat::Rg16Unorm | TextureFormat::Rgba8Unorm | TextureFormat::Depth32Float => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float
            | TextureFormat::Bc3RgbaUnorm
            | TextureFormat::Bc5RgUnorm
            | TextureFormat::Bc7RgbaUnorm => 16,
        }
    }

    /// Tightly packed byte size of one `width` x `height` level.
    pub fn level_size(self, width: u32, height: u32) -> usize {
        let dim = self.block_dim();
        let blocks_x = width.div_ceil(dim) as usize;
        let blocks_y = height.div_ceil(dim) as usize;
        blocks_x * blocks_y * self.block_bytes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureDesc {
    pub format: TextureFormat,
    pub usage: TextureUsage,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
}

/// CPU-side texture contents, one tightly packed byte vector per mip level.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub mips: Vec<Vec<u8>>,
}

impl TextureData {
    /// 1x1 RGBA8 texture of a constant color.
    pub fn solid(color: [f32; 4]) -> Self {
        let texel = color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        Self {
            format: TextureFormat::Rgba8Unorm,
            width: 1,
            height: 1,
            mips: vec![texel.to_vec()],
        }
    }

    pub fn level_extent(&self, level: usize) -> (u32, u32) {
        ((self.width >> level).max(1), (self.height >> level).max(1))
    }
}

pub trait RenderDevice {
    type Buffer;
    type Texture;
    type Sampler;
    type MaterialGroup;

    fn create_buffer(&self, usage: BufferUsage, size: u64) -> Result<Self::Buffer>;

    fn create_buffer_init(&self, usage: BufferUsage, contents: &[u8]) -> Result<Self::Buffer>;

    /// Empty texture for render targets and pooled attachments.
    fn create_texture(&self, desc: &TextureDesc) -> Result<Self::Texture>;

    /// Sampled texture filled with every mip level of `data`.
    fn upload_texture(&self, data: &TextureData) -> Result<Self::Texture>;

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Self::Sampler>;

    fn create_material_group(
        &self,
        textures: &MaterialTextures<Self>,
        params: &MaterialParams,
    ) -> Result<Self::MaterialGroup>
    where
        Self: Sized;
}
