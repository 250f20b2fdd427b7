//! In-memory scene document, decoded from glTF and validated before any GPU
//! work happens. Owned by the load step and dropped once the model is built.

mod import;

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::error::{Error, Result};
use crate::material::AlphaMode;
use crate::material::sampler::Sampler;

#[derive(Debug, Clone, Default)]
pub struct Document {
    pub nodes: Vec<Node>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    pub images: Vec<Image>,
    pub samplers: Vec<Sampler>,
    pub root_nodes: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: Option<String>,
    pub transform: Mat4,
    pub mesh: Option<usize>,
    pub children: Vec<usize>,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            name: None,
            transform: Mat4::IDENTITY,
            mesh: None,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

#[derive(Debug, Clone)]
pub struct Primitive {
    pub topology: Topology,
    pub indices: Option<Vec<u32>>,
    pub positions: Option<Vec<Vec3>>,
    pub normals: Option<Vec<Vec3>>,
    pub texcoords: Option<Vec<Vec2>>,
    /// JOINTS_0 and WEIGHTS_0 are both present.
    pub skinned: bool,
    pub material: Option<usize>,
}

impl Default for Primitive {
    fn default() -> Self {
        Self {
            topology: Topology::Triangles,
            indices: None,
            positions: None,
            normals: None,
            texcoords: None,
            skinned: false,
            material: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
    pub base_color_factor: Vec4,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub normal_scale: f32,
    pub occlusion_strength: f32,
    pub emissive_factor: Vec3,
    pub base_color_texture: Option<usize>,
    pub metallic_roughness_texture: Option<usize>,
    pub normal_texture: Option<usize>,
    pub occlusion_texture: Option<usize>,
    pub emissive_texture: Option<usize>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            double_sided: false,
            base_color_factor: Vec4::ONE,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            normal_scale: 1.0,
            occlusion_strength: 1.0,
            emissive_factor: Vec3::ZERO,
            base_color_texture: None,
            metallic_roughness_texture: None,
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
        }
    }
}

impl Material {
    /// Texture indices sampled as color data.
    pub fn color_textures(&self) -> impl Iterator<Item = usize> + '_ {
        [
            self.base_color_texture,
            self.metallic_roughness_texture,
            self.occlusion_texture,
            self.emissive_texture,
        ]
        .into_iter()
        .flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texture {
    pub image: usize,
    pub sampler: Option<usize>,
}

/// Decoded pixels, tightly packed, native-endian for 16-bit channels.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub bit_depth: u8,
    pub pixels: Vec<u8>,
}

impl Image {
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize * (self.bit_depth as usize / 8)
    }
}

impl Document {
    /// Checks every structural cross-reference. Material and texture
    /// references are left to the material resolver.
    pub fn validate(&self) -> Result<()> {
        let check = |what: &str, owner: usize, index: usize, len: usize| -> Result<()> {
            if index >= len {
                return Err(Error::parse(format!(
                    "{what} {owner} references index {index}, only {len} exist"
                )));
            }
            Ok(())
        };

        for (i, node) in self.nodes.iter().enumerate() {
            for &child in &node.children {
                check("node", i, child, self.nodes.len())?;
            }
            if let Some(mesh) = node.mesh {
                check("node", i, mesh, self.meshes.len())?;
            }
        }

        for (i, &root) in self.root_nodes.iter().enumerate() {
            check("root", i, root, self.nodes.len())?;
        }

        for (i, texture) in self.textures.iter().enumerate() {
            check("texture", i, texture.image, self.images.len())?;
            if let Some(sampler) = texture.sampler {
                check("texture", i, sampler, self.samplers.len())?;
            }
        }

        for (i, image) in self.images.iter().enumerate() {
            if !matches!(image.bit_depth, 8 | 16 | 32) || image.channels == 0 {
                return Err(Error::parse(format!(
                    "image {i} has {} channels at {} bits",
                    image.channels, image.bit_depth
                )));
            }
            if image.pixels.len() != image.expected_len() {
                return Err(Error::parse(format!(
                    "image {i} holds {} bytes, {}x{} needs {}",
                    image.pixels.len(),
                    image.width,
                    image.height,
                    image.expected_len()
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn dangling_child_is_rejected() {
        let doc = Document {
            nodes: vec![Node {
                children: vec![4],
                ..Default::default()
            }],
            root_nodes: vec![0],
            ..Default::default()
        };

        let err = doc.validate().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Parse(_)));
    }

    #[test]
    fn short_image_buffer_is_rejected() {
        let doc = Document {
            images: vec![Image {
                width: 2,
                height: 2,
                channels: 4,
                bit_depth: 8,
                pixels: vec![0; 15],
            }],
            ..Default::default()
        };

        assert!(doc.validate().is_err());
    }

    #[test]
    fn color_textures_skip_normal_slot() {
        let material = Material {
            base_color_texture: Some(0),
            normal_texture: Some(1),
            emissive_texture: Some(2),
            ..Default::default()
        };
        assert_eq!(material.color_textures().collect::<Vec<_>>(), vec![0, 2]);
    }
}
