//! Culled, pipeline-grouped drawcalls for the main view and for each
//! shadow cascade. Several models can be appended to one frame; each
//! keeps its own material cache.

use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};

use crate::culling::{self, Frustum, SmallestBound};
use crate::gpu::RenderDevice;
use crate::material::{MaterialBinding, MaterialCache};
use crate::model::{Drawcall, Drawdata};
use crate::pipeline::PipelineKey;

pub const CASCADE_COUNT: usize = 3;

/// A drawcall plus the index of the material cache it resolves against.
pub struct GroupedDrawcall<'m, D: RenderDevice> {
    pub drawcall: Drawcall<'m, D>,
    pub material_set: usize,
}

/// Drawcalls bucketed by pipeline key, iterated in key order.
pub struct DrawGroups<'m, D: RenderDevice> {
    groups: Vec<Vec<GroupedDrawcall<'m, D>>>,
}

impl<'m, D: RenderDevice> DrawGroups<'m, D> {
    fn new() -> Self {
        Self {
            groups: (0..PipelineKey::COUNT).map(|_| Vec::new()).collect(),
        }
    }

    fn push(&mut self, key: PipelineKey, drawcall: Drawcall<'m, D>, material_set: usize) {
        self.groups[key.index()].push(GroupedDrawcall {
            drawcall,
            material_set,
        });
    }

    /// Non-empty groups only.
    pub fn iter(&self) -> impl Iterator<Item = (PipelineKey, &[GroupedDrawcall<'m, D>])> {
        PipelineKey::all()
            .zip(self.groups.iter())
            .filter(|(_, group)| !group.is_empty())
            .map(|(key, group)| (key, group.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn pipeline_key<D: RenderDevice>(cache: &MaterialCache<D>, drawcall: &Drawcall<'_, D>) -> PipelineKey {
    cache
        .resolve(drawcall.material_index)
        .params
        .pipeline_key(drawcall.primitive.rigged)
}

pub struct MainViewDrawdata<'m, D: RenderDevice> {
    view_projection: Mat4,
    frustum: Frustum,
    eye: Vec3,
    eye_to_near: Vec3,
    near_distance: f32,
    min_z: f32,
    material_sets: Vec<Arc<MaterialCache<D>>>,
    groups: DrawGroups<'m, D>,
}

impl<'m, D: RenderDevice> MainViewDrawdata<'m, D> {
    /// `view_projection` uses reverse-Z, so the near plane sits at clip depth 1.
    pub fn new(view_projection: Mat4, eye: Vec3) -> Self {
        let near_point = view_projection.inverse().project_point3(Vec3::new(0.0, 0.0, 1.0));
        let eye_to_near = near_point - eye;

        Self {
            view_projection,
            frustum: Frustum::from_matrix(view_projection),
            eye,
            eye_to_near: eye_to_near.normalize_or_zero(),
            near_distance: eye_to_near.length(),
            min_z: 1.0,
            material_sets: Vec::new(),
            groups: DrawGroups::new(),
        }
    }

    /// Replaces the frustum used for culling, keeping the projection used
    /// for depth tracking.
    pub fn with_frustum(mut self, frustum: Frustum) -> Self {
        self.frustum = frustum;
        self
    }

    fn beyond_near_plane(&self, p: Vec3) -> bool {
        (p - self.eye).dot(self.eye_to_near) > self.near_distance
    }

    pub fn append(&mut self, drawdata: &Drawdata<'m, D>) {
        self.material_sets.push(drawdata.material_cache.clone());
        let set = self.material_sets.len() - 1;
        let cache = &drawdata.material_cache;

        for drawcall in &drawdata.drawcalls {
            let bounds = &drawcall.world_bounds;
            if !self.frustum.contains(bounds) {
                continue;
            }

            for corner in bounds.corners() {
                if self.beyond_near_plane(corner) {
                    let z = self.view_projection.project_point3(corner).z;
                    self.min_z = self.min_z.min(z);
                }
            }

            self.groups.push(pipeline_key(cache, drawcall), *drawcall, set);
        }
    }

    /// Smallest clip depth among visible geometry, the far end of the
    /// range the shadow cascades have to cover.
    pub fn min_z(&self) -> f32 {
        self.min_z.clamp(0.0, 1.0)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.view_projection
    }

    pub fn groups(&self) -> &DrawGroups<'m, D> {
        &self.groups
    }

    pub fn material(&self, grouped: &GroupedDrawcall<'m, D>) -> &MaterialBinding<D> {
        self.material_sets[grouped.material_set].resolve(grouped.drawcall.material_index)
    }

    pub fn material_sets(&self) -> &[Arc<MaterialCache<D>>] {
        &self.material_sets
    }
}

pub struct CascadeLevel<'m, D: RenderDevice> {
    bound: SmallestBound,
    side_planes: [Vec4; 4],
    near: f32,
    far: f32,
    groups: DrawGroups<'m, D>,
}

impl<'m, D: RenderDevice> CascadeLevel<'m, D> {
    fn new(corners: &[Vec3; 8], light_direction: Vec3) -> Self {
        let bound = culling::find_smallest_bound(corners, light_direction);
        let cull_matrix =
            Mat4::orthographic_rh(bound.left, bound.right, bound.bottom, bound.top, 0.0, 1.0) * bound.view_matrix;
        let planes = Frustum::from_matrix(cull_matrix).planes;

        Self {
            bound,
            side_planes: [planes[0], planes[1], planes[2], planes[3]],
            near: f32::MAX,
            far: f32::MIN,
            groups: DrawGroups::new(),
        }
    }

    fn append(&mut self, cache: &MaterialCache<D>, drawcall: &Drawcall<'m, D>, set: usize) {
        let bounds = &drawcall.world_bounds;
        if !culling::box_in_frustum(bounds.min, bounds.max, &self.side_planes) {
            return;
        }

        // Light view looks down -Z.
        for corner in bounds.corners() {
            let z = self.bound.view_matrix.transform_point3(corner).z;
            self.near = self.near.min(-z);
            self.far = self.far.max(-z);
        }

        self.groups.push(pipeline_key(cache, drawcall), *drawcall, set);
    }

    pub fn bound(&self) -> &SmallestBound {
        &self.bound
    }

    /// Orthographic projection fitted to the casters in this cascade.
    pub fn vp_matrix(&self) -> Mat4 {
        let (near, far) = if self.near <= self.far {
            (self.near, self.far.max(self.near + 1e-4))
        } else {
            (0.0, 1.0)
        };
        let b = &self.bound;
        let right = b.right.max(b.left + 1e-4);
        let top = b.top.max(b.bottom + 1e-4);
        Mat4::orthographic_rh(b.left, right, b.bottom, top, near, far) * b.view_matrix
    }

    pub fn groups(&self) -> &DrawGroups<'m, D> {
        &self.groups
    }
}

pub struct ShadowDrawdata<'m, D: RenderDevice> {
    split_depths: [f32; CASCADE_COUNT + 1],
    levels: Vec<CascadeLevel<'m, D>>,
    material_sets: Vec<Arc<MaterialCache<D>>>,
}

impl<'m, D: RenderDevice> ShadowDrawdata<'m, D> {
    /// Splits clip depth `1..min_z` into cascades, blending a split even in
    /// clip depth with one even in world distance by `linear_blend_ratio`.
    pub fn new(view_projection: Mat4, light_direction: Vec3, min_z: f32, linear_blend_ratio: f32) -> Self {
        // Depth 0 is at infinity for infinite reverse-Z projections.
        let min_z = min_z.clamp(1e-6, 1.0);
        let inverse = view_projection.inverse();
        let near_world = inverse.project_point3(Vec3::new(0.0, 0.0, 1.0));
        let far_world = inverse.project_point3(Vec3::new(0.0, 0.0, min_z));

        let split = |t: f32| {
            let linear = view_projection.project_point3(near_world.lerp(far_world, t)).z;
            let log = 1.0 + (min_z - 1.0) * t;
            log + (linear - log) * linear_blend_ratio
        };

        let split_depths = [1.0, split(0.3333), split(0.6667), min_z];

        let levels = split_depths
            .windows(2)
            .map(|pair| {
                let (z_near, z_far) = (pair[0], pair[1]);
                let corners = culling::transform_corners(
                    Vec3::new(-1.0, -1.0, z_far),
                    Vec3::new(1.0, 1.0, z_near),
                    &inverse,
                );
                CascadeLevel::new(&corners, light_direction)
            })
            .collect();

        Self {
            split_depths,
            levels,
            material_sets: Vec::new(),
        }
    }

    pub fn append(&mut self, drawdata: &Drawdata<'m, D>) {
        self.material_sets.push(drawdata.material_cache.clone());
        let set = self.material_sets.len() - 1;

        for level in &mut self.levels {
            for drawcall in &drawdata.drawcalls {
                level.append(&drawdata.material_cache, drawcall, set);
            }
        }
    }

    pub fn split_depths(&self) -> [f32; CASCADE_COUNT + 1] {
        self.split_depths
    }

    pub fn levels(&self) -> &[CascadeLevel<'m, D>] {
        &self.levels
    }

    pub fn vp_matrix(&self, level: usize) -> Mat4 {
        self.levels[level].vp_matrix()
    }

    pub fn material(&self, grouped: &GroupedDrawcall<'m, D>) -> &MaterialBinding<D> {
        self.material_sets[grouped.material_set].resolve(grouped.drawcall.material_index)
    }

    pub fn material_sets(&self) -> &[Arc<MaterialCache<D>>] {
        &self.material_sets
    }
}
