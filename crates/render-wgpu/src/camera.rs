use glam::{Mat4, Vec3};

/// Camera orbiting a target point: drag to rotate, scroll to zoom.
/// Camera motion is host state and never part of the scene.
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    /// Rotation about the Y axis, radians.
    pub yaw: f32,
    /// Elevation above the target's horizontal plane, radians.
    pub pitch: f32,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub sensitivity: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 5.8,
            yaw: -0.26,
            pitch: 0.17,
            fov: 45.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 100.0,
            sensitivity: 0.005,
            min_distance: 1.0,
            max_distance: 25.0,
        }
    }
}

impl OrbitCamera {
    /// World-space camera position.
    pub fn eye(&self) -> Vec3 {
        let offset = Vec3::new(
            self.distance * self.pitch.cos() * self.yaw.sin(),
            self.distance * self.pitch.sin(),
            self.distance * self.pitch.cos() * self.yaw.cos(),
        );
        self.target + offset
    }

    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw -= dx * self.sensitivity;
        self.pitch += dy * self.sensitivity;
        self.pitch = self.pitch.clamp(-85.0_f32.to_radians(), 85.0_f32.to_radians());
    }

    /// Positive steps move closer.
    pub fn zoom(&mut self, steps: f32) {
        self.distance =
            (self.distance * 0.9_f32.powf(steps)).clamp(self.min_distance, self.max_distance);
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera() {
        let cam = OrbitCamera::default();
        assert!(((cam.eye() - cam.target).length() - cam.distance).abs() < 1e-5);
        assert!(cam.eye().y > 0.0);
        let vp = cam.view_projection();
        assert!(!vp.col(0).x.is_nan());
    }

    #[test]
    fn rotation_keeps_distance_and_clamps_pitch() {
        let mut cam = OrbitCamera::default();
        let start = cam.eye();
        cam.rotate(100.0, 0.0);
        assert_ne!(cam.eye(), start);
        assert!(((cam.eye() - cam.target).length() - cam.distance).abs() < 1e-4);
        cam.rotate(0.0, 1e6);
        assert!(cam.pitch <= 85.0_f32.to_radians());
    }

    #[test]
    fn zoom_is_clamped() {
        let mut cam = OrbitCamera::default();
        cam.zoom(1000.0);
        assert_eq!(cam.distance, cam.min_distance);
        cam.zoom(-1000.0);
        assert_eq!(cam.distance, cam.max_distance);
    }
}
