//! Frustum planes, conservative box tests and light-space fitting.
//!
//! Planes are `Vec4(nx, ny, nz, d)` with the inside where `n·p + d >= 0`.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::geometry::Aabb;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// left, right, bottom, top, then `z >= -w` and `z <= w`. Under reverse-Z
    /// the last plane is the near plane and `z >= -w` is a loose far bound.
    pub planes: [Vec4; 6],
}

impl Frustum {
    /// Extracts and normalizes the six planes of a view-projection matrix.
    pub fn from_matrix(m: Mat4) -> Self {
        let (r0, r1, r2, r3) = (m.row(0), m.row(1), m.row(2), m.row(3));
        Self {
            planes: [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r3 + r2, r3 - r2].map(normalize_plane),
        }
    }

    pub fn from_planes(planes: [Vec4; 6]) -> Self {
        Self { planes }
    }

    pub fn side_planes(&self) -> &[Vec4] {
        &self.planes[..4]
    }

    pub fn contains(&self, bounds: &Aabb) -> bool {
        box_in_frustum(bounds.min, bounds.max, &self.planes)
    }
}

/// Scales a plane to a unit normal. A zero plane is returned as is.
pub fn normalize_plane(plane: Vec4) -> Vec4 {
    let length = plane.truncate().length();
    if length > 0.0 { plane / length } else { plane }
}

/// False only when some plane has the whole box behind it.
pub fn box_in_frustum(min: Vec3, max: Vec3, planes: &[Vec4]) -> bool {
    planes.iter().all(|plane| {
        let normal = plane.truncate();
        let positive = Vec3::select(normal.cmpge(Vec3::ZERO), max, min);
        normal.dot(positive) + plane.w >= 0.0
    })
}

/// Transforms all eight corners and takes their bounds.
pub fn local_bound_to_world(bounds: &Aabb, world: &Mat4) -> Aabb {
    let corners = bounds.corners().map(|c| world.transform_point3(c));
    corners.iter().skip(1).fold(
        Aabb {
            min: corners[0],
            max: corners[0],
        },
        |acc, &c| Aabb {
            min: acc.min.min(c),
            max: acc.max.max(c),
        },
    )
}

/// Corners of the box `min..max` pushed through `m` with perspective divide.
pub fn transform_corners(min: Vec3, max: Vec3, m: &Mat4) -> [Vec3; 8] {
    Aabb { min, max }.corners().map(|c| m.project_point3(c))
}

/// Light-space view and the tightest orthographic rectangle around a set
/// of points, seen along the light direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmallestBound {
    pub view_matrix: Mat4,
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

impl SmallestBound {
    pub fn area(&self) -> f32 {
        (self.right - self.left) * (self.top - self.bottom)
    }
}

fn cross2(o: Vec2, a: Vec2, b: Vec2) -> f32 {
    (a - o).perp_dot(b - o)
}

fn half_hull(points: impl Iterator<Item = Vec2>) -> Vec<Vec2> {
    let mut chain: Vec<Vec2> = Vec::new();
    for p in points {
        while chain.len() >= 2 && cross2(chain[chain.len() - 2], chain[chain.len() - 1], p) <= 0.0 {
            chain.pop();
        }
        chain.push(p);
    }
    chain.pop();
    chain
}

/// Andrew's monotone chain, counter-clockwise, no collinear points.
fn convex_hull(mut points: Vec<Vec2>) -> Vec<Vec2> {
    points.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    points.dedup();
    if points.len() < 3 {
        return points;
    }

    let mut hull = half_hull(points.iter().copied());
    hull.extend(half_hull(points.iter().rev().copied()));
    hull
}

/// Rotating calipers over the convex hull of the projected points: one of
/// the minimum-area rectangles has a side collinear with a hull edge.
pub fn find_smallest_bound(points: &[Vec3], light_direction: Vec3) -> SmallestBound {
    let direction = light_direction.normalize_or(Vec3::NEG_Y);
    let up = if direction.y.abs() > 0.99 { Vec3::Z } else { Vec3::Y };
    let base_view = Mat4::look_to_rh(Vec3::ZERO, direction, up);

    let projected: Vec<Vec2> = points
        .iter()
        .map(|&p| base_view.transform_point3(p).truncate())
        .collect();

    let hull = convex_hull(projected.clone());

    let mut axes: Vec<Vec2> = (0..hull.len())
        .filter_map(|i| (hull[(i + 1) % hull.len()] - hull[i]).try_normalize())
        .collect();
    if axes.is_empty() {
        axes.push(Vec2::X);
    }

    let extent = |axis: Vec2| -> (f32, f32, f32, f32) {
        let perp = axis.perp();
        projected.iter().fold(
            (f32::MAX, f32::MIN, f32::MAX, f32::MIN),
            |(l, r, b, t), p| {
                let u = p.dot(axis);
                let v = p.dot(perp);
                (l.min(u), r.max(u), b.min(v), t.max(v))
            },
        )
    };

    let (axis, (left, right, bottom, top)) = axes
        .into_iter()
        .map(|axis| (axis, extent(axis)))
        .min_by(|(_, a), (_, b)| {
            let area = |e: &(f32, f32, f32, f32)| (e.1 - e.0) * (e.3 - e.2);
            area(a).total_cmp(&area(b))
        })
        .unwrap_or((Vec2::X, extent(Vec2::X)));

    // Rotating by -angle(axis) maps (x, y) to (dot(p, axis), dot(p, perp(axis))).
    let rotation = Mat4::from_rotation_z(-axis.y.atan2(axis.x));

    SmallestBound {
        view_matrix: rotation * base_view,
        left,
        right,
        bottom,
        top,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn camera() -> Mat4 {
        let projection = Mat4::perspective_infinite_reverse_rh(60f32.to_radians(), 1.0, 0.1);
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        projection * view
    }

    #[test]
    fn zero_planes_accept_everything() {
        let frustum = Frustum::from_planes([Vec4::ZERO; 6]);
        let far_away = Aabb {
            min: Vec3::splat(1e6),
            max: Vec3::splat(1e6 + 1.0),
        };
        assert!(frustum.contains(&far_away));
    }

    #[test]
    fn reverse_z_near_plane_is_last() {
        let planes = Frustum::from_matrix(camera()).planes;
        let side = |plane: Vec4, p: Vec3| plane.truncate().dot(p) + plane.w;

        // 0.05 in front of the eye, inside the 0.1 near distance.
        let too_close = Vec3::new(0.0, 0.0, 4.95);
        assert!(side(planes[5], too_close) < 0.0);
        assert!(side(planes[4], too_close) >= 0.0);

        let ahead = Vec3::new(0.0, 0.0, 4.0);
        assert!(side(planes[5], ahead) >= 0.0);
        assert!(side(planes[4], ahead) >= 0.0);
    }

    #[test]
    fn box_in_front_is_visible() {
        let frustum = Frustum::from_matrix(camera());
        assert!(frustum.contains(&Aabb {
            min: Vec3::splat(-0.5),
            max: Vec3::splat(0.5),
        }));
    }

    #[test]
    fn box_behind_camera_is_rejected() {
        let frustum = Frustum::from_matrix(camera());
        assert!(!frustum.contains(&Aabb {
            min: Vec3::new(-0.5, -0.5, 9.0),
            max: Vec3::new(0.5, 0.5, 10.0),
        }));
    }

    #[test]
    fn box_off_to_the_side_is_rejected() {
        let frustum = Frustum::from_matrix(camera());
        assert!(!frustum.contains(&Aabb {
            min: Vec3::new(50.0, -0.5, -0.5),
            max: Vec3::new(51.0, 0.5, 0.5),
        }));
    }

    #[test]
    fn straddling_box_is_kept() {
        let frustum = Frustum::from_matrix(camera());
        assert!(frustum.contains(&Aabb {
            min: Vec3::new(-100.0, -0.5, -0.5),
            max: Vec3::new(0.0, 0.5, 0.5),
        }));
    }

    #[test]
    fn world_bound_contains_rotated_corners() {
        let local = Aabb {
            min: Vec3::splat(-1.0),
            max: Vec3::splat(1.0),
        };
        let world = Mat4::from_rotation_translation(Quat::from_rotation_y(45f32.to_radians()), Vec3::X * 10.0);
        let bound = local_bound_to_world(&local, &world);
        let half_diagonal = 2f32.sqrt();
        assert!((bound.max.x - (10.0 + half_diagonal)).abs() < 1e-4);
        assert!((bound.min.z + half_diagonal).abs() < 1e-4);
        assert!((bound.max.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn smallest_bound_follows_rotated_footprint() {
        let rotation = Mat4::from_rotation_y(30f32.to_radians());
        let points = transform_corners(Vec3::new(-2.0, -1.0, -0.5), Vec3::new(2.0, 1.0, 0.5), &rotation);

        let bound = find_smallest_bound(&points, Vec3::NEG_Y);
        // Footprint seen from above is 4 x 1.
        assert!((bound.area() - 4.0).abs() < 1e-3, "area {}", bound.area());

        for p in points {
            let v = bound.view_matrix.transform_point3(p);
            assert!(v.x >= bound.left - 1e-4 && v.x <= bound.right + 1e-4);
            assert!(v.y >= bound.bottom - 1e-4 && v.y <= bound.top + 1e-4);
        }
    }

    #[test]
    fn hull_drops_interior_points() {
        let hull = convex_hull(vec![
            Vec2::ZERO,
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(0.5, 0.5),
        ]);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&Vec2::new(0.5, 0.5)));
    }
}
