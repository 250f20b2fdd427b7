use std::sync::Arc;

use crate::config::{ImageConfig, LoadConfig};
use crate::document::{self, Document};
use crate::error::{Error, ErrorKind, Result, ResultExt};
use crate::gpu::{RenderDevice, TextureData};
use crate::job_system::worker_pool;
use crate::progress::{self, LoadStage, ProgressCell};
use crate::texture::{self, DecodedImage};

use super::sampler::{Sampler, SamplerDesc};
use super::{MaterialBinding, MaterialCache, MaterialParams, MaterialTextures, TextureBinding};

struct ImageEntry<D: RenderDevice> {
    color: Option<Arc<D::Texture>>,
    normal: Option<Arc<D::Texture>>,
}

struct Placeholders<D: RenderDevice> {
    base_color: Arc<D::Texture>,
    occlusion_metallic_roughness: Arc<D::Texture>,
    emissive: Arc<D::Texture>,
    normal: Arc<D::Texture>,
}

impl<D: RenderDevice> Placeholders<D> {
    fn create(device: &D) -> Result<Self> {
        let solid = |color: [f32; 4]| -> Result<Arc<D::Texture>> {
            device.upload_texture(&TextureData::solid(color)).map(Arc::new)
        };

        Ok(Self {
            base_color: solid([1.0; 4])?,
            // occlusion 1, roughness 1, metalness 0
            occlusion_metallic_roughness: solid([1.0, 1.0, 0.0, 1.0])?,
            emissive: solid([0.0; 4])?,
            normal: solid([0.5, 0.5, 1.0, 1.0])?,
        })
    }
}

#[derive(Clone, Copy)]
enum SlotKind {
    Color,
    Normal,
}

/// GPU-side materials, textures and samplers of one document, from which
/// the [`MaterialCache`] is resolved.
pub struct MaterialList<D: RenderDevice> {
    materials: Vec<document::Material>,
    textures: Vec<document::Texture>,
    samplers: Vec<Arc<D::Sampler>>,
    images: Vec<ImageEntry<D>>,
    default_sampler: Arc<D::Sampler>,
    placeholders: Placeholders<D>,
}

impl<D: RenderDevice> MaterialList<D> {
    pub fn load(
        device: &D,
        doc: &Document,
        config: &LoadConfig,
        progress: Option<&ProgressCell>,
    ) -> Result<Self> {
        progress::report(progress, LoadStage::Material, None);

        let placeholders = Placeholders::create(device).context("create placeholder textures")?;

        let default_sampler = device
            .create_sampler(&SamplerDesc::new(Sampler::default(), &config.sampler))
            .map(Arc::new)
            .context("create default sampler")?;

        let samplers = doc
            .samplers
            .iter()
            .enumerate()
            .map(|(i, sampler)| {
                device
                    .create_sampler(&SamplerDesc::new(*sampler, &config.sampler))
                    .map(Arc::new)
                    .with_context(|| format!("create sampler {i}"))
            })
            .collect::<Result<Vec<_>>>()
            .context("load samplers")?;

        check_texture_references(doc).context("load materials")?;

        let images = load_images(device, doc, &config.image, progress).context("load images")?;

        log::info!(
            "loaded {} materials, {} textures, {} images, {} samplers",
            doc.materials.len(),
            doc.textures.len(),
            images.len(),
            samplers.len()
        );

        Ok(Self {
            materials: doc.materials.clone(),
            textures: doc.textures.clone(),
            samplers,
            images,
            default_sampler,
            placeholders,
        })
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Resolves every material once, plus the placeholder entry for `None`.
    pub fn build_cache(&self, device: &D) -> Result<MaterialCache<D>> {
        let bindings = (0..self.materials.len())
            .map(|i| self.binding(device, Some(i)).with_context(|| format!("resolve material {i}")))
            .collect::<Result<Vec<_>>>()?;

        let default = self.binding(device, None).context("resolve default material")?;

        Ok(MaterialCache::new(bindings, default))
    }

    pub fn binding(&self, device: &D, index: Option<usize>) -> Result<MaterialBinding<D>> {
        let (material, params) = match index {
            Some(i) => {
                let material = self.materials.get(i).ok_or_else(|| {
                    Error::new(ErrorKind::InvalidMaterialIndex(format!(
                        "material {i}, only {} exist",
                        self.materials.len()
                    )))
                })?;
                (Some(material), MaterialParams::from(material))
            }
            None => (None, MaterialParams::default()),
        };

        let slot = |pick: fn(&document::Material) -> Option<usize>| material.and_then(pick);
        let p = &self.placeholders;

        let textures = MaterialTextures {
            base_color: self
                .texture_binding(slot(|m| m.base_color_texture), &p.base_color, SlotKind::Color)
                .context("base color")?,
            metallic_roughness: self
                .texture_binding(
                    slot(|m| m.metallic_roughness_texture),
                    &p.occlusion_metallic_roughness,
                    SlotKind::Color,
                )
                .context("metallic roughness")?,
            normal: self
                .texture_binding(slot(|m| m.normal_texture), &p.normal, SlotKind::Normal)
                .context("normal")?,
            occlusion: self
                .texture_binding(
                    slot(|m| m.occlusion_texture),
                    &p.occlusion_metallic_roughness,
                    SlotKind::Color,
                )
                .context("occlusion")?,
            emissive: self
                .texture_binding(slot(|m| m.emissive_texture), &p.emissive, SlotKind::Color)
                .context("emissive")?,
        };

        let group = device
            .create_material_group(&textures, &params)
            .context("create material group")?;

        Ok(MaterialBinding {
            params,
            textures,
            group,
        })
    }

    fn texture_binding(
        &self,
        texture: Option<usize>,
        placeholder: &Arc<D::Texture>,
        kind: SlotKind,
    ) -> Result<TextureBinding<D>> {
        let Some(texture_index) = texture else {
            return Ok(TextureBinding {
                texture: placeholder.clone(),
                sampler: self.default_sampler.clone(),
            });
        };

        let entry = self.textures.get(texture_index).ok_or_else(|| {
            Error::new(ErrorKind::InvalidMaterialIndex(format!(
                "texture {texture_index}, only {} exist",
                self.textures.len()
            )))
        })?;

        let sampler = entry
            .sampler
            .and_then(|s| self.samplers.get(s))
            .unwrap_or(&self.default_sampler)
            .clone();

        let image = self.images.get(entry.image);
        let variant = match kind {
            SlotKind::Color => image.and_then(|i| i.color.as_ref()),
            SlotKind::Normal => image.and_then(|i| i.normal.as_ref()),
        };
        let texture = variant.cloned().ok_or_else(|| {
            Error::new(ErrorKind::MissingImageData(format!(
                "image {} of texture {texture_index}",
                entry.image
            )))
        })?;

        Ok(TextureBinding { texture, sampler })
    }
}

fn check_texture_references(doc: &Document) -> Result<()> {
    for (i, material) in doc.materials.iter().enumerate() {
        let slots = [
            material.base_color_texture,
            material.metallic_roughness_texture,
            material.normal_texture,
            material.occlusion_texture,
            material.emissive_texture,
        ];
        if let Some(bad) = slots.into_iter().flatten().find(|&t| t >= doc.textures.len()) {
            return Err(Error::new(ErrorKind::InvalidMaterialIndex(format!(
                "material {i} references texture {bad}, only {} exist",
                doc.textures.len()
            ))));
        }
    }
    Ok(())
}

/// Decodes on the worker pool, uploads on the calling thread. The first
/// failure in document order wins.
fn load_images<D: RenderDevice>(
    device: &D,
    doc: &Document,
    config: &ImageConfig,
    progress: Option<&ProgressCell>,
) -> Result<Vec<ImageEntry<D>>> {
    let refcounts = texture::compute_refcounts(doc);
    let inputs: Vec<_> = doc.images.iter().zip(refcounts).enumerate().collect();

    progress::report(progress, LoadStage::Material, Some(0.0));

    let decoded = worker_pool::run_ordered(
        inputs,
        config.workers(),
        |(i, (image, refcount))| {
            log::debug!("decoding image {i} ({}x{}, {:?})", image.width, image.height, refcount);
            texture::decode_image(image, refcount, config).with_context(|| format!("image {i}"))
        },
        |done, total| {
            progress::report(progress, LoadStage::Material, Some(done as f32 / total as f32));
        },
    );

    decoded
        .into_iter()
        .enumerate()
        .map(|(i, result)| {
            let DecodedImage { color, normal } = result?;
            let upload = |data: Option<TextureData>| -> Result<Option<Arc<D::Texture>>> {
                data.map(|d| device.upload_texture(&d).map(Arc::new)).transpose()
            };
            Ok(ImageEntry {
                color: upload(color).with_context(|| format!("upload color image {i}"))?,
                normal: upload(normal).with_context(|| format!("upload normal image {i}"))?,
            })
        })
        .collect()
}
