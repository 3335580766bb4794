//! Perspective camera, orbit controls and viewport bookkeeping.

use glam::{Mat4, Vec2, Vec3, Vec4};
use std::f32::consts::{PI, TAU};

use crate::input::{Input, MouseButton};
use crate::raycast::Ray;

/// Perspective camera looking from `position` toward `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl PerspectiveCamera {
    pub fn new(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov_y,
            aspect,
            near,
            far,
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    /// World position of a normalized device coordinate at `depth`
    /// (0 = near plane, 1 = far plane).
    pub fn unproject(&self, ndc: Vec2, depth: f32) -> Vec3 {
        let p = self.view_projection().inverse() * Vec4::new(ndc.x, ndc.y, depth, 1.0);
        p.truncate() / p.w
    }

    /// Ray from the camera through a normalized pointer position.
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Ray {
        let far = self.unproject(ndc, 1.0);
        Ray::new(self.position, far - self.position)
    }
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self::new(90.0, 1.0, 0.1, 1000.0)
    }
}

/// Spherical orbit around a target point.
///
/// Left drag rotates, right drag pans, the wheel zooms. With damping enabled
/// input keeps easing out over the following frames.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub enabled: bool,
    pub target: Vec3,
    /// Fraction of the pending motion applied per frame, e.g. `0.05`.
    pub damping: Option<f32>,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Horizontal angle around +Y in radians.
    yaw: f32,
    /// Elevation above the XZ plane in radians.
    pitch: f32,
    distance: f32,
    yaw_delta: f32,
    pitch_delta: f32,
    pan_delta: Vec3,
    zoom_scale: f32,
}

const PITCH_LIMIT: f32 = PI / 2.0 - 0.01;

impl OrbitControls {
    /// Start orbiting from wherever the camera currently is.
    pub fn from_camera(camera: &PerspectiveCamera) -> Self {
        let offset = camera.position - camera.target;
        let distance = offset.length().max(1e-3);
        Self {
            enabled: true,
            target: camera.target,
            damping: None,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            yaw: offset.x.atan2(offset.z),
            pitch: (offset.y / distance).clamp(-1.0, 1.0).asin(),
            distance,
            yaw_delta: 0.0,
            pitch_delta: 0.0,
            pan_delta: Vec3::ZERO,
            zoom_scale: 1.0,
        }
    }

    pub fn with_damping(mut self, factor: f32) -> Self {
        self.damping = Some(factor.clamp(0.0, 1.0));
        self
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Queue a rotation from a pointer drag of `delta` pixels.
    pub fn rotate(&mut self, delta: Vec2, viewport_height: f32) {
        let h = viewport_height.max(1.0);
        self.yaw_delta -= TAU * delta.x / h * self.rotate_speed;
        self.pitch_delta += TAU * delta.y / h * self.rotate_speed;
    }

    /// Queue a zoom; positive `scroll` moves closer.
    pub fn zoom(&mut self, scroll: f32) {
        self.zoom_scale *= 0.95_f32.powf(scroll * self.zoom_speed);
    }

    /// Queue a pan of `delta` pixels in the camera's screen plane.
    pub fn pan(&mut self, delta: Vec2, camera: &PerspectiveCamera, viewport_height: f32) {
        let forward = camera.forward();
        let right = forward.cross(camera.up).normalize_or_zero();
        let up = right.cross(forward);
        let world_per_px =
            2.0 * self.distance * (camera.fov_y.to_radians() * 0.5).tan() / viewport_height.max(1.0);
        self.pan_delta += (-right * delta.x + up * delta.y) * world_per_px * self.pan_speed;
    }

    /// Translate held buttons, drags and wheel motion from this frame's input.
    pub fn handle_input(&mut self, input: &Input, camera: &PerspectiveCamera, viewport_height: f32) {
        if !self.enabled {
            return;
        }
        let drag = input.mouse_delta();
        if input.mouse_held(MouseButton::Left) && drag != Vec2::ZERO {
            self.rotate(drag, viewport_height);
        }
        if input.mouse_held(MouseButton::Right) && drag != Vec2::ZERO {
            self.pan(drag, camera, viewport_height);
        }
        if input.scroll_delta() != 0.0 {
            self.zoom(input.scroll_delta());
        }
    }

    /// Move the orbit centre without touching angles or distance.
    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
    }

    /// Apply pending motion and write the result into `camera`.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) {
        let f = self.damping.unwrap_or(1.0);

        self.yaw += self.yaw_delta * f;
        self.pitch = (self.pitch + self.pitch_delta * f).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.target += self.pan_delta * f;
        let zoom = 1.0 + (self.zoom_scale - 1.0) * f;
        self.distance = (self.distance * zoom).clamp(self.min_distance.max(1e-3), self.max_distance);

        if self.damping.is_some() {
            self.yaw_delta *= 1.0 - f;
            self.pitch_delta *= 1.0 - f;
            self.pan_delta *= 1.0 - f;
            self.zoom_scale = 1.0 + (self.zoom_scale - 1.0) * (1.0 - f);
        } else {
            self.yaw_delta = 0.0;
            self.pitch_delta = 0.0;
            self.pan_delta = Vec3::ZERO;
            self.zoom_scale = 1.0;
        }

        camera.target = self.target;
        camera.position = self.target + self.offset();
    }

    fn offset(&self) -> Vec3 {
        Vec3::new(
            self.distance * self.pitch.cos() * self.yaw.sin(),
            self.distance * self.pitch.sin(),
            self.distance * self.pitch.cos() * self.yaw.cos(),
        )
    }
}

/// Surface size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Record a new size. Returns `false` and changes nothing when the size is
    /// unchanged or degenerate (minimized windows report 0).
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 || (width == self.width && height == self.height) {
            return false;
        }
        self.width = width;
        self.height = height;
        true
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orbit_roundtrips_camera_position() {
        let mut camera = PerspectiveCamera::default();
        camera.position = Vec3::new(7.0, 7.0, 7.0);
        let mut orbit = OrbitControls::from_camera(&camera);
        let before = camera.position;
        orbit.update(&mut camera);
        assert!((camera.position - before).length() < 1e-4);
    }

    #[test]
    fn test_rotate_keeps_distance() {
        let mut camera = PerspectiveCamera::default();
        let mut orbit = OrbitControls::from_camera(&camera);
        orbit.rotate(Vec2::new(120.0, -40.0), 600.0);
        orbit.update(&mut camera);
        assert!((camera.position.length() - 5.0).abs() < 1e-4);
        assert!(camera.position.x.abs() > 0.1);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = PerspectiveCamera::default();
        let mut orbit = OrbitControls::from_camera(&camera);
        orbit.rotate(Vec2::new(0.0, 10_000.0), 100.0);
        orbit.update(&mut camera);
        assert!(orbit.pitch() <= PITCH_LIMIT);
        assert!(camera.position.is_finite());
    }

    #[test]
    fn test_damping_eases_out() {
        let mut camera = PerspectiveCamera::default();
        let mut orbit = OrbitControls::from_camera(&camera).with_damping(0.05);
        orbit.rotate(Vec2::new(100.0, 0.0), 600.0);
        orbit.update(&mut camera);
        let first = orbit.yaw();
        orbit.update(&mut camera);
        let second = orbit.yaw();
        assert!(first < 0.0);
        assert!(second < first);
    }

    #[test]
    fn test_zoom_respects_limits() {
        let mut camera = PerspectiveCamera::default();
        let mut orbit = OrbitControls::from_camera(&camera);
        orbit.min_distance = 2.0;
        orbit.zoom(1000.0);
        orbit.update(&mut camera);
        assert!((orbit.distance() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_viewport_resize_is_idempotent() {
        let mut viewport = Viewport::new(800, 600);
        assert!(viewport.resize(1024, 768));
        assert!(!viewport.resize(1024, 768));
        assert!(!viewport.resize(0, 768));
        assert_eq!(viewport, Viewport::new(1024, 768));
    }

    #[test]
    fn test_ray_through_center_follows_view_direction() {
        let mut camera = PerspectiveCamera::new(75.0, 16.0 / 9.0, 0.1, 100.0);
        camera.position = Vec3::new(7.0, 7.0, 7.0);
        let ray = camera.ray_from_ndc(Vec2::ZERO);
        assert!((ray.direction - camera.forward()).length() < 1e-4);
    }
}
