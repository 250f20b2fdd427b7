use pollster::FutureExt as _;
use wgpu::util::DeviceExt as _;

use super::{BufferUsage, RenderDevice, TextureData, TextureDesc, TextureFormat, TextureUsage};
use crate::error::{Error, ErrorKind, Result};
use crate::material::sampler::{FilterMode, MipmapFilterMode, SamplerDesc, WrapMode};
use crate::material::{MaterialParams, MaterialTextures};

fn align_to_256(n: usize) -> usize {
    (n + 255) & !255
}

pub struct WgpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl WgpuTexture {
    fn new(texture: wgpu::Texture) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

pub struct WgpuMaterialGroup {
    pub bind_group: wgpu::BindGroup,
    pub factors: wgpu::Buffer,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct MaterialUniform {
    base_color: [f32; 4],
    emissive: [f32; 3],
    metallic: f32,
    roughness: f32,
    normal_scale: f32,
    occlusion_strength: f32,
    alpha_cutoff: f32,
}

impl From<&MaterialParams> for MaterialUniform {
    fn from(params: &MaterialParams) -> Self {
        let f = &params.factors;
        Self {
            base_color: f.base_color.to_array(),
            emissive: f.emissive.to_array(),
            metallic: f.metallic,
            roughness: f.roughness,
            normal_scale: f.normal_scale,
            occlusion_strength: f.occlusion_strength,
            alpha_cutoff: f.alpha_cutoff,
        }
    }
}

/// [`RenderDevice`] over a wgpu device and queue. Out-of-memory and
/// validation failures during creation come back as `AllocationFailed`.
pub struct WgpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    material_layout: wgpu::BindGroupLayout,
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material Bind Group Layout"),
            entries: &material_layout_entries(),
        });
        Self {
            device,
            queue,
            material_layout,
        }
    }

    /// Bind group layout of every material group, for pipeline layouts.
    pub fn material_layout(&self) -> &wgpu::BindGroupLayout {
        &self.material_layout
    }

    fn scoped<T>(&self, what: &str, create: impl FnOnce(&wgpu::Device) -> T) -> Result<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let value = create(&self.device);

        let validation = self.device.pop_error_scope().block_on();
        let out_of_memory = self.device.pop_error_scope().block_on();

        match out_of_memory.or(validation) {
            Some(err) => Err(Error::allocation(format!("{what}: {err}"))),
            None => Ok(value),
        }
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

// binding 0: factors
// bindings 1..=10: base color, metallic roughness, normal, occlusion, emissive (texture, sampler)
fn material_layout_entries() -> [wgpu::BindGroupLayoutEntry; 11] {
    [
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        },
        texture_entry(1),
        sampler_entry(2),
        texture_entry(3),
        sampler_entry(4),
        texture_entry(5),
        sampler_entry(6),
        texture_entry(7),
        sampler_entry(8),
        texture_entry(9),
        sampler_entry(10),
    ]
}

fn buffer_usages(usage: BufferUsage) -> wgpu::BufferUsages {
    let mut usages = wgpu::BufferUsages::COPY_DST;
    if usage.vertex {
        usages |= wgpu::BufferUsages::VERTEX;
    }
    if usage.index {
        usages |= wgpu::BufferUsages::INDEX;
    }
    if usage.uniform {
        usages |= wgpu::BufferUsages::UNIFORM;
    }
    if usage.storage {
        usages |= wgpu::BufferUsages::STORAGE;
    }
    usages
}

fn texture_usages(format: TextureFormat, usage: TextureUsage) -> wgpu::TextureUsages {
    // Depth targets are never written by copies.
    let mut usages = if format == TextureFormat::Depth32Float {
        wgpu::TextureUsages::empty()
    } else {
        wgpu::TextureUsages::COPY_DST
    };
    if usage.sampled {
        usages |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    if usage.render_target {
        usages |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    if usage.storage {
        usages |= wgpu::TextureUsages::STORAGE_BINDING;
    }
    usages
}

pub fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
        TextureFormat::Rg8Unorm => wgpu::TextureFormat::Rg8Unorm,
        TextureFormat::Rg16Unorm => wgpu::TextureFormat::Rg16Unorm,
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        TextureFormat::Bc3RgbaUnorm => wgpu::TextureFormat::Bc3RgbaUnorm,
        TextureFormat::Bc5RgUnorm => wgpu::TextureFormat::Bc5RgUnorm,
        TextureFormat::Bc7RgbaUnorm => wgpu::TextureFormat::Bc7RgbaUnorm,
    }
}

impl FilterMode {
    fn to_wgpu(self) -> wgpu::FilterMode {
        match self {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }
}

impl MipmapFilterMode {
    fn to_wgpu(self) -> wgpu::FilterMode {
        match self {
            MipmapFilterMode::Nearest | MipmapFilterMode::None => wgpu::FilterMode::Nearest,
            MipmapFilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }
}

impl WrapMode {
    fn to_wgpu(self) -> wgpu::AddressMode {
        match self {
            WrapMode::Repeat => wgpu::AddressMode::Repeat,
            WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }
}

impl RenderDevice for WgpuDevice {
    type Buffer = wgpu::Buffer;
    type Texture = WgpuTexture;
    type Sampler = wgpu::Sampler;
    type MaterialGroup = WgpuMaterialGroup;

    fn create_buffer(&self, usage: BufferUsage, size: u64) -> Result<wgpu::Buffer> {
        self.scoped("create buffer", |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: None,
                size,
                usage: buffer_usages(usage),
                mapped_at_creation: false,
            })
        })
    }

    fn create_buffer_init(&self, usage: BufferUsage, contents: &[u8]) -> Result<wgpu::Buffer> {
        self.scoped("create buffer", |device| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: None,
                contents,
                usage: buffer_usages(usage),
            })
        })
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<WgpuTexture> {
        self.scoped("create texture", |device| {
            WgpuTexture::new(device.create_texture(&wgpu::TextureDescriptor {
                label: None,
                size: wgpu::Extent3d {
                    width: desc.width,
                    height: desc.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: desc.mip_levels.max(1),
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu_format(desc.format),
                usage: texture_usages(desc.format, desc.usage),
                view_formats: &[],
            }))
        })
    }

    fn upload_texture(&self, data: &TextureData) -> Result<WgpuTexture> {
        let dim = data.format.block_dim();

        for (level, bytes) in data.mips.iter().enumerate() {
            let (width, height) = data.level_extent(level);
            let expected = data.format.level_size(width, height);
            if bytes.len() != expected {
                return Err(Error::new(ErrorKind::UnsupportedImageFormat(format!(
                    "mip {level} of {:?} has {} bytes, expected {expected}",
                    data.format,
                    bytes.len()
                ))));
            }
        }

        let texture = self.create_texture(&TextureDesc {
            format: data.format,
            usage: TextureUsage::SAMPLED,
            width: data.width,
            height: data.height,
            mip_levels: data.mips.len() as u32,
        })?;

        for (level, bytes) in data.mips.iter().enumerate() {
            let (width, height) = data.level_extent(level);
            let blocks_x = width.div_ceil(dim) as usize;
            let blocks_y = height.div_ceil(dim) as usize;

            let row_size = blocks_x * data.format.block_bytes();
            let padded_row_size = align_to_256(row_size);

            let mut padded = vec![0u8; padded_row_size * blocks_y];
            for row in 0..blocks_y {
                padded[row * padded_row_size..row * padded_row_size + row_size]
                    .copy_from_slice(&bytes[row * row_size..(row + 1) * row_size]);
            }

            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture.texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &padded,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row_size as u32),
                    rows_per_image: Some(blocks_y as u32),
                },
                wgpu::Extent3d {
                    width: blocks_x as u32 * dim,
                    height: blocks_y as u32 * dim,
                    depth_or_array_layers: 1,
                },
            );
        }

        Ok(texture)
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<wgpu::Sampler> {
        let s = &desc.sampler;
        let lod_max_clamp = match s.mipmap_filter {
            MipmapFilterMode::None => 0.0,
            _ => 32.0,
        };

        self.scoped("create sampler", |device| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: None,
                address_mode_u: s.wrap_u.to_wgpu(),
                address_mode_v: s.wrap_v.to_wgpu(),
                address_mode_w: wgpu::AddressMode::Repeat,
                mag_filter: s.mag_filter.to_wgpu(),
                min_filter: s.min_filter.to_wgpu(),
                mipmap_filter: s.mipmap_filter.to_wgpu(),
                lod_min_clamp: 0.0,
                lod_max_clamp,
                anisotropy_clamp: desc.anisotropy.max(1),
                ..Default::default()
            })
        })
    }

    fn create_material_group(
        &self,
        textures: &MaterialTextures<Self>,
        params: &MaterialParams,
    ) -> Result<WgpuMaterialGroup> {
        let factors = self.create_buffer_init(
            BufferUsage::UNIFORM,
            bytemuck::bytes_of(&MaterialUniform::from(params)),
        )?;

        let [base_color, metallic_roughness, normal, occlusion, emissive] = textures.slots();

        let bind_group = self.scoped("create material bind group", |device| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Material Bind Group"),
                layout: &self.material_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: factors.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&base_color.texture.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&base_color.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(&metallic_roughness.texture.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::Sampler(&metallic_roughness.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: wgpu::BindingResource::TextureView(&normal.texture.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: wgpu::BindingResource::Sampler(&normal.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 7,
                        resource: wgpu::BindingResource::TextureView(&occlusion.texture.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 8,
                        resource: wgpu::BindingResource::Sampler(&occlusion.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 9,
                        resource: wgpu::BindingResource::TextureView(&emissive.texture.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 10,
                        resource: wgpu::BindingResource::Sampler(&emissive.sampler),
                    },
                ],
            })
        })?;

        Ok(WgpuMaterialGroup { bind_group, factors })
    }
}
