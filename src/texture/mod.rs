//! Decoded document images to upload-ready texture data: channel layout,
//! block compression and mip chains, chosen per image.

mod mipmap;

use block_compression::{BC7Settings, CompressionVariant};
use image::{ImageBuffer, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::config::ImageConfig;
use crate::document::{Document, Image};
use crate::error::{Error, ErrorKind, Result, ResultExt};
use crate::gpu::{TextureData, TextureFormat};

pub use mipmap::mip_chain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorCompression {
    Rgba8Raw,
    Rgba8Bc3,
    Rgba8Bc7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalCompression {
    RgRaw,
    RgBc5,
    /// 16-bit sources stay raw, 8-bit sources become BC5.
    Rg16RawRg8Bc5,
}

/// How many material slots sample an image as color data versus as a
/// normal map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageRefcount {
    pub color: u32,
    pub normal: u32,
}

pub fn compute_refcounts(doc: &Document) -> Vec<ImageRefcount> {
    let mut counts = vec![ImageRefcount::default(); doc.images.len()];
    let image_of = |texture: usize| doc.textures.get(texture).map(|t| t.image);

    for material in &doc.materials {
        for image in material.color_textures().filter_map(image_of) {
            counts[image].color += 1;
        }
        if let Some(image) = material.normal_texture.and_then(image_of) {
            counts[image].normal += 1;
        }
    }

    counts
}

/// CPU results for one image; a variant is present only when referenced.
#[derive(Debug, Clone, Default)]
pub struct DecodedImage {
    pub color: Option<TextureData>,
    pub normal: Option<TextureData>,
}

pub fn decode_image(image: &Image, refcount: ImageRefcount, config: &ImageConfig) -> Result<DecodedImage> {
    let color = if refcount.color > 0 {
        Some(convert_color(image, config.color_mode).context("convert color image")?)
    } else {
        None
    };

    let normal = if refcount.normal > 0 {
        Some(convert_normal(image, config.normal_mode, config.supports_rg16).context("convert normal image")?)
    } else {
        None
    };

    Ok(DecodedImage { color, normal })
}

struct LevelPlan {
    compress: bool,
    min_mip: Option<u32>,
}

impl LevelPlan {
    fn new(width: u32, height: u32, wants_compression: bool) -> Self {
        let aligned = width % 4 == 0 && height % 4 == 0;
        let power_of_two = width.is_power_of_two() && height.is_power_of_two();
        let compress = wants_compression && aligned;

        let min_mip = power_of_two.then_some(if compress { 4 } else { 1 });
        Self { compress, min_mip }
    }

    fn levels<P>(&self, base: ImageBuffer<P, Vec<P::Subpixel>>) -> Vec<ImageBuffer<P, Vec<P::Subpixel>>>
    where
        P: image::Pixel + 'static,
        P::Subpixel: 'static,
    {
        match self.min_mip {
            Some(min_size) => mip_chain(base, min_size),
            None => vec![base],
        }
    }
}

pub fn convert_color(image: &Image, mode: ColorCompression) -> Result<TextureData> {
    let base = color_rgba8(image)?;
    let variant = match mode {
        ColorCompression::Rgba8Raw => None,
        ColorCompression::Rgba8Bc3 => Some(CompressionVariant::BC3),
        ColorCompression::Rgba8Bc7 => Some(CompressionVariant::BC7(BC7Settings::alpha_fast())),
    };

    let plan = LevelPlan::new(image.width, image.height, variant.is_some());
    let levels = plan.levels(base);

    let (format, mips) = match variant.filter(|_| plan.compress) {
        Some(variant) => {
            let format = match variant {
                CompressionVariant::BC3 => TextureFormat::Bc3RgbaUnorm,
                _ => TextureFormat::Bc7RgbaUnorm,
            };
            (format, levels.iter().map(|l| compress_level(variant, l)).collect())
        }
        None => (
            TextureFormat::Rgba8Unorm,
            levels.into_iter().map(|l| l.into_raw()).collect(),
        ),
    };

    Ok(TextureData {
        format,
        width: image.width,
        height: image.height,
        mips,
    })
}

pub fn convert_normal(image: &Image, mode: NormalCompression, supports_rg16: bool) -> Result<TextureData> {
    if image.channels < 2 {
        return Err(unsupported(image));
    }

    let keep_16 = image.bit_depth == 16
        && supports_rg16
        && matches!(mode, NormalCompression::RgRaw | NormalCompression::Rg16RawRg8Bc5);
    let wants_bc5 = !keep_16 && mode != NormalCompression::RgRaw;

    let plan = LevelPlan::new(image.width, image.height, wants_bc5);

    let (format, mips) = if keep_16 {
        let levels = plan.levels(normal_rg16(image)?);
        let mips = levels
            .iter()
            .map(|level| {
                let rg: Vec<u16> = level.pixels().flat_map(|p| [p.0[0], p.0[1]]).collect();
                bytemuck::cast_slice::<u16, u8>(&rg).to_vec()
            })
            .collect();
        (TextureFormat::Rg16Unorm, mips)
    } else {
        let levels = plan.levels(normal_rg8(image)?);
        if plan.compress {
            let mips = levels
                .iter()
                .map(|l| compress_level(CompressionVariant::BC5, l))
                .collect();
            (TextureFormat::Bc5RgUnorm, mips)
        } else {
            let mips = levels
                .iter()
                .map(|level| level.pixels().flat_map(|p| [p.0[0], p.0[1]]).collect())
                .collect();
            (TextureFormat::Rg8Unorm, mips)
        }
    };

    Ok(TextureData {
        format,
        width: image.width,
        height: image.height,
        mips,
    })
}

fn compress_level(variant: CompressionVariant, level: &RgbaImage) -> Vec<u8> {
    let (width, height) = level.dimensions();
    let mut blocks = vec![0u8; variant.blocks_byte_size(width, height)];
    block_compression::encode::compress_rgba8(
        variant,
        level.as_raw(),
        &mut blocks,
        width,
        height,
        width * 4,
    );
    blocks
}

fn unsupported(image: &Image) -> Error {
    Error::new(ErrorKind::UnsupportedImageFormat(format!(
        "{} channels at {} bits",
        image.channels, image.bit_depth
    )))
}

fn samples_u16(pixels: &[u8]) -> impl Iterator<Item = u16> + '_ {
    pixels
        .chunks_exact(2)
        .map(|c| u16::from_ne_bytes([c[0], c[1]]))
}

/// Expands to RGBA8, narrowing 16-bit channels. Missing alpha becomes opaque.
fn color_rgba8(image: &Image) -> Result<RgbaImage> {
    let channels = image.channels as usize;
    if !matches!(channels, 3 | 4) {
        return Err(unsupported(image));
    }

    let samples: Vec<u8> = match image.bit_depth {
        8 => image.pixels.clone(),
        16 => samples_u16(&image.pixels).map(|s| (s >> 8) as u8).collect(),
        _ => return Err(unsupported(image)),
    };

    let rgba = samples
        .chunks_exact(channels)
        .flat_map(|p| [p[0], p[1], p[2], if channels == 4 { p[3] } else { u8::MAX }])
        .collect();

    RgbaImage::from_raw(image.width, image.height, rgba).ok_or_else(|| unsupported(image))
}

/// RG of the source in an RGBA8 buffer, the layout the BC5 encoder reads.
fn normal_rg8(image: &Image) -> Result<RgbaImage> {
    let channels = image.channels as usize;
    let samples: Vec<u8> = match image.bit_depth {
        8 => image.pixels.clone(),
        16 => samples_u16(&image.pixels).map(|s| (s >> 8) as u8).collect(),
        _ => return Err(unsupported(image)),
    };

    let rgba = samples
        .chunks_exact(channels)
        .flat_map(|p| [p[0], p[1], 0, u8::MAX])
        .collect();

    RgbaImage::from_raw(image.width, image.height, rgba).ok_or_else(|| unsupported(image))
}

fn normal_rg16(image: &Image) -> Result<ImageBuffer<Rgba<u16>, Vec<u16>>> {
    let channels = image.channels as usize;
    let samples: Vec<u16> = samples_u16(&image.pixels).collect();

    let rgba = samples
        .chunks_exact(channels)
        .flat_map(|p| [p[0], p[1], 0, u16::MAX])
        .collect();

    ImageBuffer::from_raw(image.width, image.height, rgba).ok_or_else(|| unsupported(image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Material, Texture};

    fn image(width: u32, height: u32, channels: u8, bit_depth: u8) -> Image {
        let len = (width * height) as usize * channels as usize * (bit_depth as usize / 8);
        Image {
            width,
            height,
            channels,
            bit_depth,
            pixels: (0..len).map(|i| (i * 37 % 251) as u8).collect(),
        }
    }

    #[test]
    fn power_of_two_color_gets_compressed_chain() {
        let data = convert_color(&image(8, 8, 4, 8), ColorCompression::Rgba8Bc7).unwrap();
        assert_eq!(data.format, TextureFormat::Bc7RgbaUnorm);
        assert_eq!(data.mips.len(), 2);
        assert_eq!(data.mips[0].len(), 64);
        assert_eq!(data.mips[1].len(), 16);
    }

    #[test]
    fn aligned_non_power_of_two_compresses_single_level() {
        let data = convert_color(&image(12, 12, 3, 8), ColorCompression::Rgba8Bc3).unwrap();
        assert_eq!(data.format, TextureFormat::Bc3RgbaUnorm);
        assert_eq!(data.mips.len(), 1);
        assert_eq!(data.mips[0].len(), 9 * 16);
    }

    #[test]
    fn misaligned_image_stays_raw() {
        let data = convert_color(&image(6, 6, 4, 8), ColorCompression::Rgba8Bc7).unwrap();
        assert_eq!(data.format, TextureFormat::Rgba8Unorm);
        assert_eq!(data.mips.len(), 1);
        assert_eq!(data.mips[0].len(), 6 * 6 * 4);
    }

    #[test]
    fn small_power_of_two_raw_chain_reaches_one_texel() {
        let data = convert_color(&image(2, 2, 4, 8), ColorCompression::Rgba8Bc7).unwrap();
        assert_eq!(data.format, TextureFormat::Rgba8Unorm);
        assert_eq!(data.mips.len(), 2);
    }

    #[test]
    fn rgb16_is_narrowed_and_made_opaque() {
        let mut src = image(1, 1, 3, 16);
        src.pixels = [0x1234u16, 0xff00, 0x0080]
            .iter()
            .flat_map(|s| s.to_ne_bytes())
            .collect();

        let data = convert_color(&src, ColorCompression::Rgba8Raw).unwrap();
        assert_eq!(data.mips[0], vec![0x12, 0xff, 0x00, 0xff]);
    }

    #[test]
    fn normal_modes_pick_formats() {
        let rg8 = image(8, 8, 3, 8);
        let rg16 = image(8, 8, 2, 16);

        let f = |img: &Image, mode| convert_normal(img, mode, true).unwrap().format;
        assert_eq!(f(&rg8, NormalCompression::RgRaw), TextureFormat::Rg8Unorm);
        assert_eq!(f(&rg8, NormalCompression::RgBc5), TextureFormat::Bc5RgUnorm);
        assert_eq!(f(&rg8, NormalCompression::Rg16RawRg8Bc5), TextureFormat::Bc5RgUnorm);
        assert_eq!(f(&rg16, NormalCompression::RgRaw), TextureFormat::Rg16Unorm);
        assert_eq!(f(&rg16, NormalCompression::RgBc5), TextureFormat::Bc5RgUnorm);
        assert_eq!(f(&rg16, NormalCompression::Rg16RawRg8Bc5), TextureFormat::Rg16Unorm);
    }

    #[test]
    fn sixteen_bit_normals_narrow_without_rg16_support() {
        let mut src = image(1, 1, 2, 16);
        src.pixels = [0xab12u16, 0x3400].iter().flat_map(|s| s.to_ne_bytes()).collect();

        let raw = convert_normal(&src, NormalCompression::RgRaw, false).unwrap();
        assert_eq!(raw.format, TextureFormat::Rg8Unorm);
        assert_eq!(raw.mips[0], vec![0xab, 0x34]);

        let rg16 = image(8, 8, 2, 16);
        let mixed = convert_normal(&rg16, NormalCompression::Rg16RawRg8Bc5, false).unwrap();
        assert_eq!(mixed.format, TextureFormat::Bc5RgUnorm);
    }

    #[test]
    fn raw_rg_keeps_two_channels() {
        let data = convert_normal(&image(3, 3, 4, 8), NormalCompression::RgBc5, true).unwrap();
        assert_eq!(data.format, TextureFormat::Rg8Unorm);
        assert_eq!(data.mips[0].len(), 3 * 3 * 2);
    }

    #[test]
    fn unsupported_layouts_are_rejected() {
        let gray = convert_color(&image(4, 4, 1, 8), ColorCompression::Rgba8Raw).unwrap_err();
        assert!(matches!(gray.kind, ErrorKind::UnsupportedImageFormat(_)));

        let float = convert_color(&image(4, 4, 4, 32), ColorCompression::Rgba8Raw).unwrap_err();
        assert!(matches!(float.kind, ErrorKind::UnsupportedImageFormat(_)));

        let single = convert_normal(&image(4, 4, 1, 8), NormalCompression::RgRaw, true).unwrap_err();
        assert!(matches!(single.kind, ErrorKind::UnsupportedImageFormat(_)));
    }

    #[test]
    fn refcounts_split_color_and_normal_usage() {
        let doc = Document {
            images: vec![image(1, 1, 4, 8), image(1, 1, 4, 8)],
            textures: vec![
                Texture { image: 0, sampler: None },
                Texture { image: 1, sampler: None },
            ],
            materials: vec![
                Material {
                    base_color_texture: Some(0),
                    occlusion_texture: Some(0),
                    normal_texture: Some(1),
                    ..Default::default()
                },
                Material {
                    emissive_texture: Some(1),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let counts = compute_refcounts(&doc);
        assert_eq!(counts[0], ImageRefcount { color: 2, normal: 0 });
        assert_eq!(counts[1], ImageRefcount { color: 1, normal: 1 });
    }

    #[test]
    fn unreferenced_variants_are_skipped() {
        let decoded = decode_image(
            &image(4, 4, 4, 8),
            ImageRefcount { color: 0, normal: 1 },
            &ImageConfig::default(),
        )
        .unwrap();
        assert!(decoded.color.is_none());
        assert!(decoded.normal.is_some());
    }
}
