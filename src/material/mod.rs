pub mod list;
pub mod sampler;

use std::sync::Arc;

use glam::{Vec3, Vec4};

use crate::document;
use crate::gpu::RenderDevice;
use crate::pipeline::PipelineKey;

pub use list::MaterialList;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlphaMode {
    Opaque,
    Mask,
    Blend,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialFactors {
    pub base_color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub normal_scale: f32,
    pub occlusion_strength: f32,
    pub emissive: Vec3,
    pub alpha_cutoff: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialParams {
    pub factors: MaterialFactors,
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self::from(&document::Material::default())
    }
}

impl From<&document::Material> for MaterialParams {
    fn from(material: &document::Material) -> Self {
        Self {
            factors: MaterialFactors {
                base_color: material.base_color_factor,
                metallic: material.metallic_factor,
                roughness: material.roughness_factor,
                normal_scale: material.normal_scale,
                occlusion_strength: material.occlusion_strength,
                emissive: material.emissive_factor,
                alpha_cutoff: material.alpha_cutoff,
            },
            alpha_mode: material.alpha_mode,
            double_sided: material.double_sided,
        }
    }
}

impl MaterialParams {
    pub fn pipeline_key(&self, rigged: bool) -> PipelineKey {
        PipelineKey {
            alpha_mode: self.alpha_mode,
            double_sided: self.double_sided,
            rigged,
        }
    }
}

pub struct TextureBinding<D: RenderDevice> {
    pub texture: Arc<D::Texture>,
    pub sampler: Arc<D::Sampler>,
}

impl<D: RenderDevice> Clone for TextureBinding<D> {
    fn clone(&self) -> Self {
        Self {
            texture: self.texture.clone(),
            sampler: self.sampler.clone(),
        }
    }
}

impl<D: RenderDevice> TextureBinding<D> {
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.texture, &other.texture) && Arc::ptr_eq(&self.sampler, &other.sampler)
    }
}

pub struct MaterialTextures<D: RenderDevice> {
    pub base_color: TextureBinding<D>,
    pub metallic_roughness: TextureBinding<D>,
    pub normal: TextureBinding<D>,
    pub occlusion: TextureBinding<D>,
    pub emissive: TextureBinding<D>,
}

impl<D: RenderDevice> Clone for MaterialTextures<D> {
    fn clone(&self) -> Self {
        Self {
            base_color: self.base_color.clone(),
            metallic_roughness: self.metallic_roughness.clone(),
            normal: self.normal.clone(),
            occlusion: self.occlusion.clone(),
            emissive: self.emissive.clone(),
        }
    }
}

impl<D: RenderDevice> MaterialTextures<D> {
    pub fn slots(&self) -> [&TextureBinding<D>; 5] {
        [
            &self.base_color,
            &self.metallic_roughness,
            &self.normal,
            &self.occlusion,
            &self.emissive,
        ]
    }
}

/// Everything a draw needs to bind for one material.
pub struct MaterialBinding<D: RenderDevice> {
    pub params: MaterialParams,
    pub textures: MaterialTextures<D>,
    pub group: D::MaterialGroup,
}

/// Resolved bindings for every material of a model plus the placeholder
/// entry. Immutable once built; shared through `Arc` by every drawdata.
pub struct MaterialCache<D: RenderDevice> {
    bindings: Vec<MaterialBinding<D>>,
    default: MaterialBinding<D>,
}

impl<D: RenderDevice> MaterialCache<D> {
    pub(crate) fn new(bindings: Vec<MaterialBinding<D>>, default: MaterialBinding<D>) -> Self {
        Self { bindings, default }
    }

    /// `None`, or an index past the end, resolves to the placeholder binding.
    pub fn resolve(&self, index: Option<usize>) -> &MaterialBinding<D> {
        index
            .and_then(|i| self.bindings.get(i))
            .unwrap_or(&self.default)
    }

    pub fn default_binding(&self) -> &MaterialBinding<D> {
        &self.default
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
