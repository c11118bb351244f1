//! Perspective camera.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// A right-handed perspective camera with `0..=1` clip depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Eye position.
    pub eye: Vec3,
    /// Point looked at.
    pub target: Vec3,
    /// Up direction.
    pub up: Vec3,
    /// Vertical field of view, in radians.
    pub fov_y: f32,
    /// Width over height.
    pub aspect: f32,
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
}

impl Camera {
    /// World-to-view matrix.
    #[must_use]
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// View-to-clip matrix.
    #[must_use]
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    /// World-to-clip matrix; frustum planes are extracted from this.
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Sets the aspect ratio from a viewport size. Zero-sized viewports
    /// (a minimised window) are ignored.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            #[allow(clippy::cast_precision_loss)]
            let aspect = width as f32 / height as f32;
            self.aspect = aspect;
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 5.0, 20.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: 60f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_sets_aspect() {
        let mut camera = Camera::default();
        camera.set_viewport(800, 400);
        assert!((camera.aspect - 2.0).abs() < f32::EPSILON);

        camera.set_viewport(0, 400);
        assert!((camera.aspect - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_target_projects_to_centre() {
        let camera = Camera::default();
        let clip = camera.view_projection().project_point3(camera.target);
        assert!(clip.x.abs() < 1e-5 && clip.y.abs() < 1e-5);
        assert!((0.0..=1.0).contains(&clip.z));
    }
}
