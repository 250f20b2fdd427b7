use std::collections::HashMap;
use std::hash::Hash;

use crate::error::{Error, ErrorKind, Result};

/// Vertices that can be merged. `key` must be equal for any two vertices
/// that `matches` accepts.
pub trait Dedup: Copy {
    type Key: Hash + Eq;

    fn key(&self) -> Self::Key;

    fn matches(&self, other: &Self, similarity: f32) -> bool;
}

/// Merges equivalent vertices in first-occurrence order and rewrites
/// `indices` to point into the compacted list.
pub fn deduplicate<V: Dedup>(vertices: &[V], indices: &[u32], similarity: f32) -> (Vec<V>, Vec<u32>) {
    let mut buckets: HashMap<V::Key, Vec<u32>> = HashMap::new();
    let mut unique: Vec<V> = Vec::new();

    let remap: Vec<u32> = vertices
        .iter()
        .map(|vertex| {
            let bucket = buckets.entry(vertex.key()).or_default();
            let found = bucket
                .iter()
                .copied()
                .find(|&i| unique[i as usize].matches(vertex, similarity));

            found.unwrap_or_else(|| {
                let index = unique.len() as u32;
                unique.push(*vertex);
                bucket.push(index);
                index
            })
        })
        .collect();

    let indices = indices.iter().map(|&i| remap[i as usize]).collect();
    (unique, indices)
}

const OVERDRAW_THRESHOLD: f32 = 1.05;

/// Orders triangles for the post-transform cache, then regroups them to cut
/// overdraw while staying within `OVERDRAW_THRESHOLD` of the cache-optimal
/// ACMR. `V` must begin with its position as three `f32`s.
pub fn reorder<V: bytemuck::Pod>(indices: &[u32], vertices: &[V]) -> Result<Vec<u32>> {
    let mut indices = meshopt::optimize_vertex_cache(indices, vertices.len());

    let positions = meshopt::VertexDataAdapter::new(bytemuck::cast_slice(vertices), std::mem::size_of::<V>(), 0)
        .map_err(|err| Error::new(ErrorKind::AttributeCountMismatch(format!("vertex stream: {err:?}"))))?;
    meshopt::optimize_overdraw_in_place(&mut indices, &positions, OVERDRAW_THRESHOLD);

    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, PartialEq, Debug)]
    struct P(i32);

    impl Dedup for P {
        type Key = i32;
        fn key(&self) -> i32 {
            self.0
        }
        fn matches(&self, other: &Self, _: f32) -> bool {
            self == other
        }
    }

    fn canonical(indices: &[u32]) -> Vec<[u32; 3]> {
        let mut tris: Vec<[u32; 3]> = indices
            .chunks_exact(3)
            .map(|t| {
                let r = t.iter().enumerate().min_by_key(|(_, v)| **v).map_or(0, |(i, _)| i);
                [t[r], t[(r + 1) % 3], t[(r + 2) % 3]]
            })
            .collect();
        tris.sort();
        tris
    }

    fn grid(n: u32) -> (Vec<[f32; 3]>, Vec<u32>) {
        let positions = (0..=n)
            .flat_map(|y| (0..=n).map(move |x| [x as f32, y as f32, 0.0]))
            .collect();
        let mut indices = Vec::new();
        for y in 0..n {
            for x in 0..n {
                let i = y * (n + 1) + x;
                indices.extend_from_slice(&[i, i + 1, i + n + 1, i + 1, i + n + 2, i + n + 1]);
            }
        }
        (positions, indices)
    }

    #[test]
    fn merges_in_first_occurrence_order() {
        let vertices = [P(5), P(7), P(5), P(9), P(7)];
        let (unique, indices) = deduplicate(&vertices, &[0, 1, 2, 3, 4], 0.0);
        assert_eq!(unique, vec![P(5), P(7), P(9)]);
        assert_eq!(indices, vec![0, 1, 0, 2, 1]);
    }

    #[test]
    fn deduplicate_is_idempotent() {
        let vertices = [P(1), P(2), P(1), P(3), P(2), P(4)];
        let (v1, i1) = deduplicate(&vertices, &[0, 1, 2, 3, 4, 5], 0.0);
        let (v2, i2) = deduplicate(&v1, &i1, 0.0);
        assert_eq!(v1, v2);
        assert_eq!(i1, i2);
    }

    #[test]
    fn reorder_preserves_triangles_and_winding() {
        let (positions, indices) = grid(8);
        let reordered = reorder(&indices, &positions).unwrap();
        assert_eq!(reordered.len(), indices.len());
        assert_eq!(canonical(&reordered), canonical(&indices));
    }

    #[test]
    fn reorder_handles_disjoint_and_degenerate_triangles() {
        let positions: Vec<[f32; 3]> = (0..8).map(|i| [i as f32, (i % 3) as f32, 1.0]).collect();
        let indices = [0, 1, 2, 3, 4, 5, 6, 6, 7, 0, 2, 1];
        let reordered = reorder(&indices, &positions).unwrap();
        assert_eq!(canonical(&reordered), canonical(&indices));
    }
}
