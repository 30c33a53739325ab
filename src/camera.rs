use glam::{Mat4, Vec3};

/// A perspective camera looking at a target point.
///
/// The projection matrix is cached; call [`PerspectiveCamera::update_projection`]
/// after changing `fov`, `aspect`, `near` or `far` directly. [`set_aspect`]
/// does it for you.
///
/// [`set_aspect`]: PerspectiveCamera::set_aspect
#[derive(Clone, Debug)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    projection: Mat4,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self::new(50.0, 1.0, 0.1, 2000.0)
    }
}

impl PerspectiveCamera {
    pub fn new(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov,
            aspect,
            near,
            far,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection();
        camera
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn looking_at(mut self, target: Vec3) -> Self {
        self.target = target;
        self
    }

    /// Set the aspect ratio and refresh the projection.
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.update_projection();
    }

    pub fn update_projection(&mut self) {
        self.projection =
            Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far);
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view()
    }

    /// Unit vector from the camera toward its target.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_aspect_refreshes_projection() {
        let mut camera = PerspectiveCamera::new(45.0, 1.0, 0.25, 3000.0);
        let before = camera.projection();
        camera.set_aspect(2.0);
        assert_eq!(camera.aspect, 2.0);
        assert_ne!(camera.projection(), before);
        let expected = Mat4::perspective_rh(45f32.to_radians(), 2.0, 0.25, 3000.0);
        assert_eq!(camera.projection(), expected);
    }

    #[test]
    fn target_projects_to_screen_center() {
        let camera = PerspectiveCamera::new(45.0, 1.5, 0.25, 3000.0)
            .at(Vec3::new(-38.0, 39.0, -61.0))
            .looking_at(Vec3::new(0.0, 10.0, 0.0));
        let clip = camera.view_projection() * camera.target.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4);
        assert!(ndc.y.abs() < 1e-4);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}
