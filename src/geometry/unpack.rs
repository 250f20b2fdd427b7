use glam::{Vec2, Vec3};

use crate::document::Topology;
use crate::error::{Error, ErrorKind, Result};

/// Reads `values` through the optional index list and expands fans and
/// strips, so every three consecutive entries form one triangle.
pub fn unpack<T: Copy>(values: &[T], indices: Option<&[u32]>, topology: Topology) -> Result<Vec<T>> {
    let sequence: Vec<T> = match indices {
        Some(indices) => indices
            .iter()
            .map(|&i| {
                values.get(i as usize).copied().ok_or_else(|| {
                    Error::new(ErrorKind::AttributeCountMismatch(format!(
                        "index {i} out of range for {} vertices",
                        values.len()
                    )))
                })
            })
            .collect::<Result<_>>()?,
        None => values.to_vec(),
    };

    match topology {
        Topology::Triangles => {
            if sequence.len() % 3 != 0 {
                return Err(Error::new(ErrorKind::AttributeCountMismatch(format!(
                    "triangle list of {} vertices",
                    sequence.len()
                ))));
            }
            Ok(sequence)
        }
        Topology::TriangleStrip => Ok((0..sequence.len().saturating_sub(2))
            .flat_map(|i| {
                let odd = i % 2;
                [sequence[i], sequence[i + 1 + odd], sequence[i + 2 - odd]]
            })
            .collect()),
        Topology::TriangleFan => Ok((0..sequence.len().saturating_sub(2))
            .flat_map(|i| [sequence[i + 1], sequence[i + 2], sequence[0]])
            .collect()),
        other => Err(Error::new(ErrorKind::UnsupportedTopology(format!("{other:?}")))),
    }
}

pub fn flat_normals(positions: &[Vec3]) -> Vec<Vec3> {
    positions
        .chunks_exact(3)
        .flat_map(|tri| {
            let cross = (tri[1] - tri[0]).cross(tri[2] - tri[0]);
            let normal = if cross.length_squared() < f32::EPSILON {
                Vec3::Y
            } else {
                cross.normalize()
            };
            [normal; 3]
        })
        .collect()
}

/// Per-triangle tangent from position and UV deltas. Triangles whose UV
/// mapping is degenerate get a zero tangent.
pub fn compute_tangents(positions: &[Vec3], texcoords: &[Vec2]) -> Vec<Vec3> {
    let mut degenerate = 0usize;

    let tangents: Vec<Vec3> = positions
        .chunks_exact(3)
        .zip(texcoords.chunks_exact(3))
        .flat_map(|(p, uv)| {
            let e1 = p[1] - p[0];
            let e2 = p[2] - p[0];
            let d1 = uv[1] - uv[0];
            let d2 = uv[2] - uv[0];

            let det = d1.x * d2.y - d2.x * d1.y;
            let tangent = if det.abs() > f32::EPSILON {
                ((e1 * d2.y - e2 * d1.y) / det).normalize_or_zero()
            } else {
                Vec3::ZERO
            };

            if tangent == Vec3::ZERO {
                degenerate += 1;
            }
            [tangent; 3]
        })
        .collect();

    if degenerate > 0 {
        log::debug!("{degenerate} triangles have a degenerate tangent basis");
    }

    tangents
}
