//! Frustum culling for view-dependent rendering.
//!
//! Extracts the six frustum planes from the view-projection matrix and
//! tests points and boxes against them. Planes point inward: a positive
//! signed distance is inside.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// A plane in 3D space (Ax + By + Cz + D = 0).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Plane {
    /// Normal X component.
    pub a: f32,
    /// Normal Y component.
    pub b: f32,
    /// Normal Z component.
    pub c: f32,
    /// Distance from origin.
    pub d: f32,
}

impl Plane {
    /// Creates a new plane.
    #[must_use]
    pub const fn new(a: f32, b: f32, c: f32, d: f32) -> Self {
        Self { a, b, c, d }
    }

    fn from_vec4(v: Vec4) -> Self {
        Self::new(v.x, v.y, v.z, v.w)
    }

    /// Returns the plane with a unit-length normal.
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = self.normal().length();
        if len > 0.0 {
            Self::new(self.a / len, self.b / len, self.c / len, self.d / len)
        } else {
            self
        }
    }

    /// The (possibly non-unit) plane normal.
    #[inline]
    #[must_use]
    pub fn normal(&self) -> Vec3 {
        Vec3::new(self.a, self.b, self.c)
    }

    /// Signed distance from `point` to the plane.
    #[inline]
    #[must_use]
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal().dot(point) + self.d
    }
}

/// How instance bounds are tested against the frustum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CullMode {
    /// Visible if any of the eight box corners is inside the frustum.
    ///
    /// Cheap, but a box straddling the frustum with every corner outside
    /// is culled.
    #[default]
    AnyCorner,
    /// Culled only if every corner lies behind one plane. Never culls a
    /// box that overlaps the frustum.
    PlaneOverlap,
    /// Nothing is culled.
    Disabled,
}

/// View frustum.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far planes.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Left plane index.
    pub const LEFT: usize = 0;
    /// Right plane index.
    pub const RIGHT: usize = 1;
    /// Bottom plane index.
    pub const BOTTOM: usize = 2;
    /// Top plane index.
    pub const TOP: usize = 3;
    /// Near plane index.
    pub const NEAR: usize = 4;
    /// Far plane index.
    pub const FAR: usize = 5;

    /// Extracts the planes of a view-projection matrix (Gribb/Hartmann).
    ///
    /// Clip-space depth is `0..=1`, the convention of
    /// [`Mat4::perspective_rh`], so the near plane is row 2 alone.
    #[must_use]
    pub fn from_view_projection(m: &Mat4) -> Self {
        let (r0, r1, r2, r3) = (m.row(0), m.row(1), m.row(2), m.row(3));

        let mut planes = [Plane::default(); 6];
        planes[Self::LEFT] = Plane::from_vec4(r3 + r0).normalized();
        planes[Self::RIGHT] = Plane::from_vec4(r3 - r0).normalized();
        planes[Self::BOTTOM] = Plane::from_vec4(r3 + r1).normalized();
        planes[Self::TOP] = Plane::from_vec4(r3 - r1).normalized();
        planes[Self::NEAR] = Plane::from_vec4(r2).normalized();
        planes[Self::FAR] = Plane::from_vec4(r3 - r2).normalized();

        Self { planes }
    }

    /// Whether `point` is inside or on the boundary of every plane.
    #[must_use]
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(point) >= 0.0)
    }

    /// Whether any of `corners` is inside the frustum.
    #[must_use]
    pub fn any_corner_inside(&self, corners: &[Vec3; 8]) -> bool {
        corners.iter().any(|&corner| self.contains_point(corner))
    }

    /// Whether no single plane has all of `corners` behind it.
    #[must_use]
    pub fn overlaps_corners(&self, corners: &[Vec3; 8]) -> bool {
        self.planes.iter().all(|plane| {
            corners
                .iter()
                .any(|&corner| plane.distance_to_point(corner) >= 0.0)
        })
    }

    /// Planes as `[a, b, c, d]` arrays for GPU upload.
    #[must_use]
    pub fn as_arrays(&self) -> [[f32; 4]; 6] {
        self.planes.map(|p| [p.a, p.b, p.c, p.d])
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Creates a box from its extreme corners.
    #[must_use]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box of the given half size centred on the origin.
    #[must_use]
    pub fn from_half_extents(half: Vec3) -> Self {
        Self::new(-half, half)
    }

    /// Centre of the box.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half size along each axis.
    #[must_use]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Whether `min <= max` on every axis and all values are finite.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min.cmple(self.max).all()
    }

    /// The eight corners, transformed by `transform`.
    #[must_use]
    pub fn corners(&self, transform: &Mat4) -> [Vec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
        .map(|c| transform.transform_point3(c))
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::from_half_extents(Vec3::splat(0.5))
    }
}

/// Frustum culler for per-instance visibility testing.
#[derive(Debug, Clone, Default)]
pub struct FrustumCuller {
    frustum: Frustum,
    mode: CullMode,
}

impl FrustumCuller {
    /// Creates a culler using `mode` for box tests.
    #[must_use]
    pub fn new(mode: CullMode) -> Self {
        Self {
            frustum: Frustum::default(),
            mode,
        }
    }

    /// Updates the frustum from a view-projection matrix.
    pub fn update(&mut self, view_projection: &Mat4) {
        self.frustum = Frustum::from_view_projection(view_projection);
    }

    /// The current frustum.
    #[must_use]
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// The box test in use.
    #[must_use]
    pub fn mode(&self) -> CullMode {
        self.mode
    }

    /// Changes the box test.
    pub fn set_mode(&mut self, mode: CullMode) {
        self.mode = mode;
    }

    /// Boundary-inclusive point test.
    #[inline]
    #[must_use]
    pub fn test_point(&self, point: Vec3) -> bool {
        self.frustum.contains_point(point)
    }

    /// Tests a sphere.
    #[must_use]
    pub fn test_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.frustum
            .planes
            .iter()
            .all(|plane| plane.distance_to_point(center) >= -radius)
    }

    /// Tests `bounds` placed in the world by `transform`, using the
    /// configured [`CullMode`].
    #[must_use]
    pub fn test_bounds(&self, bounds: &Aabb, transform: &Mat4) -> bool {
        match self.mode {
            CullMode::Disabled => true,
            CullMode::AnyCorner => self.frustum.any_corner_inside(&bounds.corners(transform)),
            CullMode::PlaneOverlap => self.frustum.overlaps_corners(&bounds.corners(transform)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unit cube frustum: x, y in [-1, 1], z in [-10, 0] looking down -Z.
    fn box_frustum() -> Frustum {
        Frustum::from_view_projection(&Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, 0.0, 10.0))
    }

    #[test]
    fn test_plane_normalization() {
        let plane = Plane::new(3.0, 4.0, 0.0, 10.0).normalized();

        // 3-4-5 triangle, so length is 5
        assert!((plane.a - 0.6).abs() < 0.001);
        assert!((plane.b - 0.8).abs() < 0.001);
        assert!((plane.d - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_point_on_boundary_is_inside() {
        let frustum = box_frustum();
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -5.0)));
        assert!(frustum.contains_point(Vec3::new(1.0, 0.0, -5.0)));
        assert!(frustum.contains_point(Vec3::new(0.0, -1.0, -5.0)));
        assert!(!frustum.contains_point(Vec3::new(1.001, 0.0, -5.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_perspective_planes() {
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let frustum = Frustum::from_view_projection(&(proj * view));

        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -50.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 50.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -150.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -0.01)));
        // 90 degree fov: the side planes are the diagonals.
        assert!(frustum.contains_point(Vec3::new(9.0, 0.0, -10.0)));
        assert!(!frustum.contains_point(Vec3::new(11.0, 0.0, -10.0)));
    }

    #[test]
    fn test_any_corner_misses_straddling_box() {
        let frustum = box_frustum();
        // Much wider than the frustum; every corner is outside.
        let big = Aabb::from_half_extents(Vec3::new(5.0, 5.0, 1.0));
        let corners = big.corners(&Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)));

        assert!(!frustum.any_corner_inside(&corners));
        assert!(frustum.overlaps_corners(&corners));
    }

    #[test]
    fn test_culler_modes() {
        let mut culler = FrustumCuller::new(CullMode::AnyCorner);
        culler.update(&Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, 0.0, 10.0));

        let small = Aabb::default();
        let inside = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let outside = Mat4::from_translation(Vec3::new(20.0, 0.0, -5.0));
        assert!(culler.test_bounds(&small, &inside));
        assert!(!culler.test_bounds(&small, &outside));

        culler.set_mode(CullMode::PlaneOverlap);
        assert!(culler.test_bounds(&small, &inside));
        assert!(!culler.test_bounds(&small, &outside));

        culler.set_mode(CullMode::Disabled);
        assert!(culler.test_bounds(&small, &outside));
    }

    #[test]
    fn test_sphere() {
        let mut culler = FrustumCuller::default();
        culler.update(&Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, 0.0, 10.0));
        assert!(culler.test_sphere(Vec3::new(1.5, 0.0, -5.0), 0.6));
        assert!(!culler.test_sphere(Vec3::new(1.5, 0.0, -5.0), 0.4));
    }

    #[test]
    fn test_aabb_helpers() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::splat(32.0));
        assert_eq!(aabb.center(), Vec3::splat(16.0));
        assert_eq!(aabb.half_extents(), Vec3::splat(16.0));
        assert!(aabb.is_valid());
        assert!(!Aabb::new(Vec3::ONE, Vec3::ZERO).is_valid());
    }
}
