//! Document primitives to compact, cache-ordered vertex and index lists,
//! plus the position+UV variant used by shadow passes.

pub mod optimize;
pub mod unpack;

use glam::{Vec2, Vec3};

use crate::config::GeometryConfig;
use crate::document;
use crate::error::{Error, ErrorKind, Result, ResultExt};
use optimize::Dedup;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub texcoord: Vec2,
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x3,
        3 => Float32x2,
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

fn similar(a: Vec3, b: Vec3, threshold: f32) -> bool {
    a == b || a.dot(b) >= threshold
}

impl Dedup for Vertex {
    type Key = [u32; 5];

    fn key(&self) -> [u32; 5] {
        [
            self.position.x.to_bits(),
            self.position.y.to_bits(),
            self.position.z.to_bits(),
            self.texcoord.x.to_bits(),
            self.texcoord.y.to_bits(),
        ]
    }

    fn matches(&self, other: &Self, similarity: f32) -> bool {
        self.position == other.position
            && self.texcoord == other.texcoord
            && similar(self.normal, other.normal, similarity)
            && similar(self.tangent, other.tangent, similarity)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowVertex {
    pub position: Vec3,
    pub texcoord: Vec2,
}

impl ShadowVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x2,
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ShadowVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

impl From<&Vertex> for ShadowVertex {
    fn from(v: &Vertex) -> Self {
        Self {
            position: v.position,
            texcoord: v.texcoord,
        }
    }
}

impl Dedup for ShadowVertex {
    type Key = [u32; 5];

    fn key(&self) -> [u32; 5] {
        [
            self.position.x.to_bits(),
            self.position.y.to_bits(),
            self.position.z.to_bits(),
            self.texcoord.x.to_bits(),
            self.texcoord.y.to_bits(),
        ]
    }

    fn matches(&self, other: &Self, _: f32) -> bool {
        self == other
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Aabb { min: p, max: p },
                Some(b) => Aabb {
                    min: b.min.min(p),
                    max: b.max.max(p),
                },
            })
        })
    }

    /// Gives flat boxes a small thickness so volume tests never see zero extent.
    pub fn inflate_degenerate(self, config: &GeometryConfig) -> Self {
        let size = self.max - self.min;
        let max_dim = size.max_element();
        let min_dim = size.min_element();

        if min_dim >= config.degenerate_ratio * max_dim {
            return self;
        }

        let center = (self.min + self.max) * 0.5;
        let half = Vec3::splat(config.inflation_ratio * max_dim);
        Aabb {
            min: self.min.min(center - half),
            max: self.max.max(center + half),
        }
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }
}

/// A converted primitive, ready for upload.
#[derive(Debug, Clone)]
pub struct PrimitiveData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub shadow_vertices: Vec<ShadowVertex>,
    pub shadow_indices: Vec<u32>,
    pub material: Option<usize>,
    pub bounds: Aabb,
    pub rigged: bool,
}

pub fn convert_primitive(primitive: &document::Primitive, config: &GeometryConfig) -> Result<PrimitiveData> {
    if !matches!(
        primitive.topology,
        document::Topology::Triangles
            | document::Topology::TriangleFan
            | document::Topology::TriangleStrip
    ) {
        return Err(Error::new(ErrorKind::UnsupportedTopology(format!(
            "{:?}",
            primitive.topology
        ))));
    }

    let indices = primitive.indices.as_deref();
    let topology = primitive.topology;

    let source_positions = primitive
        .positions
        .as_deref()
        .ok_or(Error::new(ErrorKind::MissingAttribute("POSITION")))?;
    let positions = unpack::unpack(source_positions, indices, topology).context("unpack POSITION")?;
    if positions.is_empty() {
        return Err(Error::new(ErrorKind::AttributeCountMismatch("no triangles".into())));
    }

    let normals = match primitive.normals.as_deref() {
        Some(normals) => unpack::unpack(normals, indices, topology).context("unpack NORMAL")?,
        None => unpack::flat_normals(&positions),
    };

    let texcoords = match primitive.texcoords.as_deref() {
        Some(uvs) => unpack::unpack(uvs, indices, topology).context("unpack TEXCOORD_0")?,
        None => vec![Vec2::ZERO; positions.len()],
    };

    let tangents = unpack::compute_tangents(&positions, &texcoords);

    let count = positions.len();
    if normals.len() != count || texcoords.len() != count || tangents.len() != count {
        return Err(Error::new(ErrorKind::AttributeCountMismatch(format!(
            "POSITION {count}, NORMAL {}, TEXCOORD_0 {}, TANGENT {}",
            normals.len(),
            texcoords.len(),
            tangents.len()
        ))));
    }

    let raw: Vec<Vertex> = (0..count)
        .map(|i| Vertex {
            position: positions[i],
            normal: normals[i],
            tangent: tangents[i],
            texcoord: texcoords[i],
        })
        .collect();
    let sequential: Vec<u32> = (0..count as u32).collect();

    let (vertices, indices) = optimize::deduplicate(&raw, &sequential, config.normal_similarity);
    let indices = optimize::reorder(&indices, &vertices).context("reorder indices")?;

    let shadow_raw: Vec<ShadowVertex> = raw.iter().map(ShadowVertex::from).collect();
    let (shadow_vertices, shadow_indices) = optimize::deduplicate(&shadow_raw, &sequential, 0.0);
    let shadow_indices = optimize::reorder(&shadow_indices, &shadow_vertices).context("reorder shadow indices")?;

    let bounds = Aabb::from_points(shadow_vertices.iter().map(|v| v.position))
        .ok_or_else(|| Error::new(ErrorKind::AttributeCountMismatch("no triangles".into())))?
        .inflate_degenerate(config);

    log::debug!(
        "primitive: {} -> {} vertices, {} shadow vertices, {} triangles",
        count,
        vertices.len(),
        shadow_vertices.len(),
        indices.len() / 3
    );

    Ok(PrimitiveData {
        vertices,
        indices,
        shadow_vertices,
        shadow_indices,
        material: primitive.material,
        bounds,
        rigged: primitive.skinned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use document::{Primitive, Topology};

    fn quad() -> Primitive {
        Primitive {
            indices: Some(vec![0, 1, 2, 2, 1, 3]),
            positions: Some(vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
            ]),
            texcoords: Some(vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0)]),
            ..Default::default()
        }
    }

    #[test]
    fn shared_corners_are_merged() {
        let data = convert_primitive(&quad(), &GeometryConfig::default()).unwrap();
        assert_eq!(data.vertices.len(), 4);
        assert_eq!(data.indices.len(), 6);
        assert_eq!(data.shadow_vertices.len(), 4);
        assert!(data.vertices.iter().all(|v| v.normal == Vec3::Z));
        assert!(data.vertices.iter().all(|v| v.tangent.abs_diff_eq(Vec3::X, 1e-6)));
    }

    #[test]
    fn flat_plane_bounds_are_inflated() {
        let data = convert_primitive(&quad(), &GeometryConfig::default()).unwrap();
        assert!(data.bounds.max.z > data.bounds.min.z);
        assert!((data.bounds.max.z - 0.0005).abs() < 1e-6);
        assert_eq!(data.bounds.max.x, 1.0);
    }

    #[test]
    fn missing_position_is_reported() {
        let err = convert_primitive(&Primitive::default(), &GeometryConfig::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingAttribute("POSITION"));
    }

    #[test]
    fn primitive_without_triangles_is_a_count_mismatch() {
        let strip = Primitive {
            topology: Topology::TriangleStrip,
            indices: None,
            positions: Some(vec![Vec3::ZERO, Vec3::X]),
            texcoords: None,
            ..quad()
        };
        let err = convert_primitive(&strip, &GeometryConfig::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AttributeCountMismatch("no triangles".into()));

        let empty = Primitive {
            indices: Some(Vec::new()),
            ..quad()
        };
        let err = convert_primitive(&empty, &GeometryConfig::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AttributeCountMismatch("no triangles".into()));
    }

    #[test]
    fn point_primitives_are_rejected() {
        let primitive = Primitive {
            topology: Topology::Points,
            ..quad()
        };
        let err = convert_primitive(&primitive, &GeometryConfig::default()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnsupportedTopology(_)));
    }

    #[test]
    fn short_normal_stream_is_a_count_mismatch() {
        let primitive = Primitive {
            indices: None,
            normals: Some(vec![Vec3::Z; 2]),
            ..quad()
        };
        let positions = Primitive {
            positions: Some(vec![Vec3::ZERO, Vec3::X, Vec3::Y]),
            texcoords: None,
            ..primitive
        };
        let err = convert_primitive(&positions, &GeometryConfig::default()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::AttributeCountMismatch(_)));
    }

    #[test]
    fn uv_seams_split_the_main_mesh_only_by_uv() {
        // Same position, different UVs: both variants keep two vertices.
        let primitive = Primitive {
            indices: None,
            positions: Some(vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::ZERO, Vec3::Y, Vec3::new(-1.0, 0.0, 0.0)]),
            texcoords: Some(vec![Vec2::ZERO, Vec2::X, Vec2::Y, Vec2::ONE, Vec2::Y, Vec2::X]),
            ..Default::default()
        };
        let data = convert_primitive(&primitive, &GeometryConfig::default()).unwrap();
        assert_eq!(data.shadow_vertices.len(), 5);
        assert!(data.vertices.len() >= data.shadow_vertices.len());
    }
}
