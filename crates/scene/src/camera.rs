use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Perspective camera looking down its local -Z axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub fov_degrees: f32,
    /// Fixed aspect ratio; not derived from any surface size.
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            fov_degrees: 50.0,
            aspect: 1.0,
            near: 0.1,
            far: 2000.0,
        }
    }
}

impl PerspectiveCamera {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, Vec3::NEG_Z, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_projects_to_center() {
        let cam = PerspectiveCamera::at(Vec3::new(0.0, 0.0, 10.0));
        let clip = cam.view_projection() * Vec3::ZERO.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-6 && ndc.y.abs() < 1e-6);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn point_behind_camera_is_clipped() {
        let cam = PerspectiveCamera::at(Vec3::new(0.0, 0.0, 10.0));
        let clip = cam.view_projection() * Vec3::new(0.0, 0.0, 20.0).extend(1.0);
        assert!(clip.w < 0.0);
    }
}
