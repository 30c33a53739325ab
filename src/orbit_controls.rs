use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};
use winit::event::MouseButton;

use crate::camera::PerspectiveCamera;
use crate::config::OrbitConfig;
use crate::input::Input;

const MIN_POLAR: f32 = 1e-4;

/// Pointer-driven orbit navigation around a target point.
///
/// Left drag rotates, right or middle drag pans the target, the wheel
/// dollies toward or away from the target. The camera distance always stays
/// within `[min_distance, max_distance]`.
///
/// # Example
/// ```ignore
/// let mut controls = OrbitControls::new(OrbitConfig::default());
/// controls.target = Vec3::new(0.0, 10.0, 0.0);
///
/// // Each frame:
/// controls.update(&mut camera, &input, viewport_height);
/// ```
#[derive(Clone, Debug)]
pub struct OrbitControls {
    /// Point the camera orbits around.
    pub target: Vec3,
    pub min_distance: f32,
    pub max_distance: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    /// Ignore input while false, for example while the panel owns the pointer.
    pub enabled: bool,
}

impl OrbitControls {
    pub fn new(config: OrbitConfig) -> Self {
        Self {
            target: Vec3::ZERO,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
            enabled: true,
        }
    }

    /// Apply this frame's pointer input and write the new pose into `camera`.
    ///
    /// Returns true if the camera moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera, input: &Input, height: f32) -> bool {
        let mut rotate = Vec2::ZERO;
        let mut pan = Vec2::ZERO;
        let mut dolly = 1.0;

        if self.enabled {
            let delta = input.mouse_delta();
            let height = height.max(1.0);
            if input.mouse_down(MouseButton::Left) {
                rotate = TAU * delta / height * self.rotate_speed;
            } else if input.mouse_down(MouseButton::Right) || input.mouse_down(MouseButton::Middle)
            {
                pan = delta / height;
            }

            let scroll = input.scroll_delta().y;
            if scroll != 0.0 {
                dolly = 0.95f32.powf(self.zoom_speed * scroll);
            }
        }

        self.apply(camera, rotate, pan, dolly)
    }

    /// Rotate by `rotate` radians (x: azimuth, y: polar), pan by `pan` in
    /// viewport heights, and scale the distance by `dolly`.
    pub fn apply(
        &mut self,
        camera: &mut PerspectiveCamera,
        rotate: Vec2,
        pan: Vec2,
        dolly: f32,
    ) -> bool {
        let before = (camera.position, self.target);

        let offset = camera.position - self.target;
        let mut radius = offset.length();
        let mut azimuth = offset.x.atan2(offset.z);
        let mut polar = if radius > 0.0 {
            (offset.y / radius).clamp(-1.0, 1.0).acos()
        } else {
            PI * 0.5
        };

        azimuth -= rotate.x;
        polar = (polar - rotate.y).clamp(MIN_POLAR, PI - MIN_POLAR);
        radius = (radius * dolly).clamp(self.min_distance, self.max_distance);

        if pan != Vec2::ZERO {
            let forward = camera.forward();
            let right = forward.cross(camera.up).normalize_or_zero();
            let up = right.cross(forward).normalize_or_zero();
            let world_height = 2.0 * radius * (camera.fov.to_radians() * 0.5).tan();
            self.target += (-right * pan.x + up * pan.y) * world_height;
        }

        let offset = Vec3::new(
            radius * polar.sin() * azimuth.sin(),
            radius * polar.cos(),
            radius * polar.sin() * azimuth.cos(),
        );
        camera.position = self.target + offset;
        camera.target = self.target;

        before != (camera.position, self.target)
    }

    /// Distance from the camera to the target.
    pub fn distance(&self, camera: &PerspectiveCamera) -> f32 {
        camera.position.distance(self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (OrbitControls, PerspectiveCamera) {
        let mut controls = OrbitControls::new(OrbitConfig::default());
        controls.target = Vec3::new(0.0, 10.0, 0.0);
        let camera = PerspectiveCamera::new(45.0, 1.0, 0.25, 3000.0)
            .at(Vec3::new(-38.0, 39.0, -61.0))
            .looking_at(controls.target);
        (controls, camera)
    }

    #[test]
    fn idle_update_keeps_the_pose() {
        let (mut controls, mut camera) = setup();
        let start = camera.position;
        controls.update(&mut camera, &Input::new(), 720.0);
        assert!((camera.position - start).length() < 1e-3);
        assert_eq!(camera.target, controls.target);
    }

    #[test]
    fn zoom_is_clamped_to_limits() {
        let (mut controls, mut camera) = setup();
        for _ in 0..500 {
            controls.apply(&mut camera, Vec2::ZERO, Vec2::ZERO, 0.5);
        }
        assert!((controls.distance(&camera) - 2.0).abs() < 1e-3);

        for _ in 0..500 {
            controls.apply(&mut camera, Vec2::ZERO, Vec2::ZERO, 2.0);
        }
        assert!((controls.distance(&camera) - 5000.0).abs() < 0.5);
    }

    #[test]
    fn left_drag_rotates_around_target() {
        let (mut controls, mut camera) = setup();
        let distance = controls.distance(&camera);
        let mut input = Input::new();
        input.move_to(Vec2::new(100.0, 100.0));
        input.press(MouseButton::Left);
        input.move_to(Vec2::new(160.0, 100.0));

        assert!(controls.update(&mut camera, &input, 720.0));
        assert!((controls.distance(&camera) - distance).abs() < 1e-2);
        assert_eq!(controls.target, Vec3::new(0.0, 10.0, 0.0));
    }

    #[test]
    fn disabled_controls_ignore_input() {
        let (mut controls, mut camera) = setup();
        controls.enabled = false;
        let start = camera.position;
        let mut input = Input::new();
        input.scroll(Vec2::new(0.0, 10.0));
        controls.update(&mut camera, &input, 720.0);
        assert!((camera.position - start).length() < 1e-3);
    }

    #[test]
    fn polar_angle_never_flips_over_the_pole() {
        let (mut controls, mut camera) = setup();
        controls.apply(&mut camera, Vec2::new(0.0, 10.0), Vec2::ZERO, 1.0);
        assert!(camera.position.y > controls.target.y);
        let horizontal = Vec2::new(
            camera.position.x - controls.target.x,
            camera.position.z - controls.target.z,
        );
        assert!(horizontal.length() < 0.1);
    }
}
