#![allow(dead_code)]

use std::cell::Cell;

use glam::{Mat4, Vec3};
use gltf_scene::document::{Document, Mesh, Node, Primitive};
use gltf_scene::error::{Error, Result};
use gltf_scene::gpu::{BufferUsage, RenderDevice, TextureData, TextureDesc, TextureFormat};
use gltf_scene::material::sampler::SamplerDesc;
use gltf_scene::material::{MaterialParams, MaterialTextures};

/// One triangle at (0,0,0), (1,0,0), (0,1,0) with no material, embedded
/// as a data URI.
pub const TRIANGLE_GLTF: &str = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [ { "nodes": [0] } ],
  "nodes": [ { "name": "triangle", "mesh": 0 } ],
  "meshes": [ { "primitives": [ { "attributes": { "POSITION": 0 } } ] } ],
  "buffers": [
    {
      "byteLength": 36,
      "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA"
    }
  ],
  "bufferViews": [ { "buffer": 0, "byteOffset": 0, "byteLength": 36 } ],
  "accessors": [
    {
      "bufferView": 0,
      "componentType": 5126,
      "count": 3,
      "type": "VEC3",
      "min": [0.0, 0.0, 0.0],
      "max": [1.0, 1.0, 0.0]
    }
  ]
}"#;

#[derive(Debug)]
pub struct MockBuffer {
    pub id: usize,
    pub usage: BufferUsage,
    pub size: u64,
}

#[derive(Debug)]
pub struct MockTexture {
    pub id: usize,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    /// Level 0 bytes of an uploaded texture; empty for created targets.
    pub texels: Vec<u8>,
}

#[derive(Debug)]
pub struct MockSampler {
    pub id: usize,
    pub desc: SamplerDesc,
}

#[derive(Debug)]
pub struct MockGroup {
    pub id: usize,
    pub base_color_texture: usize,
}

/// Records allocations instead of touching a GPU. Once `fail_after`
/// allocations have succeeded every further one fails.
#[derive(Default)]
pub struct MockDevice {
    allocations: Cell<usize>,
    fail_after: Cell<Option<usize>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(allocations: usize) -> Self {
        let device = Self::default();
        device.fail_after.set(Some(allocations));
        device
    }

    pub fn allocations(&self) -> usize {
        self.allocations.get()
    }

    fn allocate(&self, what: &str) -> Result<usize> {
        let id = self.allocations.get();
        if self.fail_after.get().is_some_and(|limit| id >= limit) {
            return Err(Error::allocation(format!("mock {what} #{id}")));
        }
        self.allocations.set(id + 1);
        Ok(id)
    }
}

impl RenderDevice for MockDevice {
    type Buffer = MockBuffer;
    type Texture = MockTexture;
    type Sampler = MockSampler;
    type MaterialGroup = MockGroup;

    fn create_buffer(&self, usage: BufferUsage, size: u64) -> Result<MockBuffer> {
        Ok(MockBuffer {
            id: self.allocate("buffer")?,
            usage,
            size,
        })
    }

    fn create_buffer_init(&self, usage: BufferUsage, contents: &[u8]) -> Result<MockBuffer> {
        self.create_buffer(usage, contents.len() as u64)
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<MockTexture> {
        Ok(MockTexture {
            id: self.allocate("texture")?,
            format: desc.format,
            width: desc.width,
            height: desc.height,
            mip_levels: desc.mip_levels,
            texels: Vec::new(),
        })
    }

    fn upload_texture(&self, data: &TextureData) -> Result<MockTexture> {
        Ok(MockTexture {
            id: self.allocate("texture")?,
            format: data.format,
            width: data.width,
            height: data.height,
            mip_levels: data.mips.len() as u32,
            texels: data.mips.first().cloned().unwrap_or_default(),
        })
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<MockSampler> {
        Ok(MockSampler {
            id: self.allocate("sampler")?,
            desc: *desc,
        })
    }

    fn create_material_group(
        &self,
        textures: &MaterialTextures<Self>,
        _params: &MaterialParams,
    ) -> Result<MockGroup> {
        Ok(MockGroup {
            id: self.allocate("material group")?,
            base_color_texture: textures.base_color.texture.id,
        })
    }
}

pub fn triangle(offset: Vec3) -> Primitive {
    Primitive {
        positions: Some(vec![offset, offset + Vec3::X, offset + Vec3::Y]),
        ..Default::default()
    }
}

pub fn mesh(primitives: Vec<Primitive>) -> Mesh {
    Mesh {
        name: None,
        primitives,
    }
}

pub fn node(mesh: Option<usize>, children: &[usize]) -> Node {
    Node {
        name: None,
        transform: Mat4::IDENTITY,
        mesh,
        children: children.to_vec(),
    }
}

/// Root node 0 with `children` as its direct children, each holding the
/// single triangle mesh.
pub fn triangle_scene(children: usize) -> Document {
    let mut nodes = vec![node(None, &(1..=children).collect::<Vec<_>>())];
    nodes.extend((0..children).map(|_| node(Some(0), &[])));
    Document {
        nodes,
        meshes: vec![mesh(vec![triangle(Vec3::ZERO)])],
        root_nodes: vec![0],
        ..Default::default()
    }
}

/// Reverse-Z camera at `eye` looking at the origin.
pub fn camera(eye: Vec3) -> Mat4 {
    let projection = Mat4::perspective_infinite_reverse_rh(60f32.to_radians(), 1.0, 0.1);
    projection * Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y)
}
