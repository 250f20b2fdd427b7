use std::path::Path;

use glam::{Mat4, Vec2, Vec3, Vec4};

use super::{Document, Image, Material, Mesh, Node, Primitive, Texture, Topology};
use crate::error::{Error, Result, ResultExt};
use crate::material::AlphaMode;
use crate::material::sampler::{FilterMode, MipmapFilterMode, Sampler, WrapMode};

impl Document {
    pub fn import(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (doc, buffers, images) =
            gltf::import(path)
                .map_err(|e| Error::parse(e.to_string()))
                .with_context(|| format!("import {}", path.display()))?;
        Self::from_gltf(&doc, &buffers, images)
    }

    /// Parses a `.gltf` (with embedded data URIs) or `.glb` held in memory.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let (doc, buffers, images) = gltf::import_slice(bytes)
            .map_err(|e| Error::parse(e.to_string()))
            .context("import from memory")?;
        Self::from_gltf(&doc, &buffers, images)
    }

    pub fn from_gltf(
        doc: &gltf::Document,
        buffers: &[gltf::buffer::Data],
        images: Vec<gltf::image::Data>,
    ) -> Result<Self> {
        let nodes = doc.nodes().map(convert_node).collect();

        let meshes = doc
            .meshes()
            .map(|mesh| convert_mesh(&mesh, buffers))
            .collect();

        let materials = doc.materials().map(|m| convert_material(&m)).collect();

        let textures = doc
            .textures()
            .map(|t| Texture {
                image: t.source().index(),
                sampler: t.sampler().index(),
            })
            .collect();

        let samplers = doc.samplers().map(|s| convert_sampler(&s)).collect();

        let images = images.into_iter().map(convert_image).collect();

        let root_nodes = root_nodes(doc);

        let document = Document {
            nodes,
            meshes,
            materials,
            textures,
            images,
            samplers,
            root_nodes,
        };
        document.validate()?;

        log::debug!(
            "parsed document: {} nodes, {} meshes, {} materials, {} images",
            document.nodes.len(),
            document.meshes.len(),
            document.materials.len(),
            document.images.len()
        );

        Ok(document)
    }
}

fn root_nodes(doc: &gltf::Document) -> Vec<usize> {
    if let Some(scene) = doc.default_scene().or_else(|| doc.scenes().next()) {
        return scene.nodes().map(|n| n.index()).collect();
    }

    let mut has_parent = vec![false; doc.nodes().len()];
    for node in doc.nodes() {
        for child in node.children() {
            has_parent[child.index()] = true;
        }
    }
    (0..has_parent.len()).filter(|&i| !has_parent[i]).collect()
}

fn convert_node(node: gltf::Node) -> Node {
    Node {
        name: node.name().map(str::to_owned),
        transform: Mat4::from_cols_array_2d(&node.transform().matrix()),
        mesh: node.mesh().map(|m| m.index()),
        children: node.children().map(|c| c.index()).collect(),
    }
}

fn convert_mesh(mesh: &gltf::Mesh, buffers: &[gltf::buffer::Data]) -> Mesh {
    let primitives = mesh
        .primitives()
        .map(|primitive| {
            let reader = primitive.reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()));

            let topology = match primitive.mode() {
                gltf::mesh::Mode::Points => Topology::Points,
                gltf::mesh::Mode::Lines => Topology::Lines,
                gltf::mesh::Mode::LineLoop => Topology::LineLoop,
                gltf::mesh::Mode::LineStrip => Topology::LineStrip,
                gltf::mesh::Mode::Triangles => Topology::Triangles,
                gltf::mesh::Mode::TriangleStrip => Topology::TriangleStrip,
                gltf::mesh::Mode::TriangleFan => Topology::TriangleFan,
            };

            Primitive {
                topology,
                indices: reader.read_indices().map(|i| i.into_u32().collect()),
                positions: reader
                    .read_positions()
                    .map(|p| p.map(Vec3::from_array).collect()),
                normals: reader.read_normals().map(|n| n.map(Vec3::from_array).collect()),
                texcoords: reader
                    .read_tex_coords(0)
                    .map(|t| t.into_f32().map(Vec2::from_array).collect()),
                skinned: primitive.get(&gltf::Semantic::Joints(0)).is_some()
                    && primitive.get(&gltf::Semantic::Weights(0)).is_some(),
                material: primitive.material().index(),
            }
        })
        .collect();

    Mesh {
        name: mesh.name().map(str::to_owned),
        primitives,
    }
}

fn convert_material(material: &gltf::Material) -> Material {
    let pbr = material.pbr_metallic_roughness();

    Material {
        name: material.name().map(str::to_owned),
        alpha_mode: match material.alpha_mode() {
            gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
            gltf::material::AlphaMode::Mask => AlphaMode::Mask,
            gltf::material::AlphaMode::Blend => AlphaMode::Blend,
        },
        alpha_cutoff: material.alpha_cutoff().unwrap_or(0.5),
        double_sided: material.double_sided(),
        base_color_factor: Vec4::from_array(pbr.base_color_factor()),
        metallic_factor: pbr.metallic_factor(),
        roughness_factor: pbr.roughness_factor(),
        normal_scale: material.normal_texture().map_or(1.0, |t| t.scale()),
        occlusion_strength: material.occlusion_texture().map_or(1.0, |t| t.strength()),
        emissive_factor: Vec3::from_array(material.emissive_factor()),
        base_color_texture: pbr.base_color_texture().map(|t| t.texture().index()),
        metallic_roughness_texture: pbr
            .metallic_roughness_texture()
            .map(|t| t.texture().index()),
        normal_texture: material.normal_texture().map(|t| t.texture().index()),
        occlusion_texture: material.occlusion_texture().map(|t| t.texture().index()),
        emissive_texture: material.emissive_texture().map(|t| t.texture().index()),
    }
}

fn convert_sampler(sampler: &gltf::texture::Sampler) -> Sampler {
    use gltf::texture::{MagFilter, MinFilter, WrappingMode};

    let mag_filter = match sampler.mag_filter().unwrap_or(MagFilter::Linear) {
        MagFilter::Linear => FilterMode::Linear,
        MagFilter::Nearest => FilterMode::Nearest,
    };

    let min_filter = match sampler.min_filter().unwrap_or(MinFilter::LinearMipmapLinear) {
        MinFilter::Nearest | MinFilter::NearestMipmapNearest | MinFilter::NearestMipmapLinear => {
            FilterMode::Nearest
        }
        MinFilter::Linear | MinFilter::LinearMipmapNearest | MinFilter::LinearMipmapLinear => {
            FilterMode::Linear
        }
    };

    let mipmap_filter = match sampler.min_filter() {
        Some(MinFilter::NearestMipmapNearest | MinFilter::LinearMipmapNearest) => {
            MipmapFilterMode::Nearest
        }
        Some(MinFilter::NearestMipmapLinear | MinFilter::LinearMipmapLinear) | None => {
            MipmapFilterMode::Linear
        }
        Some(MinFilter::Nearest | MinFilter::Linear) => MipmapFilterMode::None,
    };

    let wrap = |mode: WrappingMode| match mode {
        WrappingMode::Repeat => WrapMode::Repeat,
        WrappingMode::ClampToEdge => WrapMode::ClampToEdge,
        WrappingMode::MirroredRepeat => WrapMode::MirroredRepeat,
    };

    Sampler {
        mag_filter,
        min_filter,
        mipmap_filter,
        wrap_u: wrap(sampler.wrap_s()),
        wrap_v: wrap(sampler.wrap_t()),
    }
}

fn convert_image(data: gltf::image::Data) -> Image {
    use gltf::image::Format;

    let (channels, bit_depth) = match data.format {
        Format::R8 => (1, 8),
        Format::R8G8 => (2, 8),
        Format::R8G8B8 => (3, 8),
        Format::R8G8B8A8 => (4, 8),
        Format::R16 => (1, 16),
        Format::R16G16 => (2, 16),
        Format::R16G16B16 => (3, 16),
        Format::R16G16B16A16 => (4, 16),
        Format::R32G32B32FLOAT => (3, 32),
        Format::R32G32B32A32FLOAT => (4, 32),
    };

    Image {
        width: data.width,
        height: data.height,
        channels,
        bit_depth,
        pixels: data.pixels,
    }
}
