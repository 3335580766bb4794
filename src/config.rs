//! Static options an experiment boots with.
//!
//! ```ignore
//! ExperimentConfig::new("Galaxy")
//!     .with_orbit_controls(true)
//!     .with_bloom(BloomParams { threshold: 0.0, strength: 2.8, radius: 0.6, exposure: 0.5 })
//!     .with_camera(CameraOptions::default().position(Vec3::new(0.0, 2.0, 5.0)))
//! ```

use glam::{Vec3, Vec4};

/// Bloom pass parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomParams {
    /// Luminance above which pixels bloom.
    pub threshold: f32,
    pub strength: f32,
    /// Spread across the blur mip chain, `0..=1`.
    pub radius: f32,
    /// Tone-mapping exposure before the power curve.
    pub exposure: f32,
}

impl Default for BloomParams {
    fn default() -> Self {
        Self {
            threshold: 0.4,
            strength: 1.7,
            radius: 0.84,
            exposure: 1.1,
        }
    }
}

/// Screen-space ambient occlusion parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AoParams {
    pub bias: f32,
    pub intensity: f32,
    pub scale: f32,
    /// Sampling radius in pixels.
    pub kernel_radius: f32,
    pub min_resolution: f32,
    pub blur: bool,
    pub blur_radius: f32,
    pub blur_std_dev: f32,
    pub blur_depth_cutoff: f32,
}

impl Default for AoParams {
    fn default() -> Self {
        Self {
            bias: 0.5,
            intensity: 0.18,
            scale: 1.0,
            kernel_radius: 100.0,
            min_resolution: 0.0,
            blur: true,
            blur_radius: 8.0,
            blur_std_dev: 4.0,
            blur_depth_cutoff: 0.01,
        }
    }
}

/// Afterimage motion blur.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionBlurParams {
    /// How much of the previous frame survives, `0..1`.
    pub damp: f32,
}

impl Default for MotionBlurParams {
    fn default() -> Self {
        Self { damp: 0.96 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToneMapping {
    None,
    #[default]
    AcesFilmic,
}

/// Perspective camera setup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraOptions {
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
}

impl CameraOptions {
    pub fn fov(mut self, fov_y: f32) -> Self {
        self.fov_y = fov_y;
        self
    }

    pub fn far(mut self, far: f32) -> Self {
        self.far = far;
        self
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn target(mut self, target: Vec3) -> Self {
        self.target = target;
        self
    }
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            fov_y: 90.0,
            near: 0.1,
            far: 1000.0,
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
        }
    }
}

/// Gradient stops for the ico-sphere background, bottom to top.
pub const ICO_BACKGROUND_STOPS: [(f32, u32); 3] = [(0.4, 0xFFCC70), (0.6, 0xC850C0), (0.75, 0x4158D0)];

/// Everything an experiment decides once, before the first frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub orbit_controls: bool,
    /// Orbit damping factor, when orbit controls are on.
    pub orbit_damping: Option<f32>,
    pub bloom: Option<BloomParams>,
    pub ambient_occlusion: Option<AoParams>,
    pub motion_blur: Option<MotionBlurParams>,
    pub ico_background: bool,
    pub show_fps: bool,
    pub camera: CameraOptions,
    pub clear_color: Vec4,
    pub tone_mapping: ToneMapping,
}

impl ExperimentConfig {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_orbit_controls(mut self, enabled: bool) -> Self {
        self.orbit_controls = enabled;
        self
    }

    pub fn with_orbit_damping(mut self, factor: f32) -> Self {
        self.orbit_controls = true;
        self.orbit_damping = Some(factor);
        self
    }

    pub fn with_bloom(mut self, params: BloomParams) -> Self {
        self.bloom = Some(params);
        self
    }

    pub fn with_ambient_occlusion(mut self, params: AoParams) -> Self {
        self.ambient_occlusion = Some(params);
        self
    }

    pub fn with_motion_blur(mut self, params: MotionBlurParams) -> Self {
        self.motion_blur = Some(params);
        self
    }

    pub fn with_ico_background(mut self, enabled: bool) -> Self {
        self.ico_background = enabled;
        self
    }

    pub fn with_fps_counter(mut self, enabled: bool) -> Self {
        self.show_fps = enabled;
        self
    }

    pub fn with_camera(mut self, camera: CameraOptions) -> Self {
        self.camera = camera;
        self
    }

    /// Clear colour as `0xRRGGBB`.
    pub fn with_clear_color(mut self, rgb: u32) -> Self {
        self.clear_color = crate::geometry::hex(rgb);
        self
    }

    pub fn with_tone_mapping(mut self, tone_mapping: ToneMapping) -> Self {
        self.tone_mapping = tone_mapping;
        self
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            title: "vislab".to_string(),
            width: 1280,
            height: 720,
            orbit_controls: false,
            orbit_damping: None,
            bloom: None,
            ambient_occlusion: None,
            motion_blur: None,
            ico_background: false,
            show_fps: false,
            camera: CameraOptions::default(),
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            tone_mapping: ToneMapping::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_stock_setup() {
        let config = ExperimentConfig::default();
        assert_eq!(config.camera.fov_y, 90.0);
        assert_eq!(config.camera.near, 0.1);
        assert_eq!(config.camera.far, 1000.0);
        assert!(config.bloom.is_none());

        let bloom = BloomParams::default();
        assert_eq!((bloom.threshold, bloom.strength, bloom.radius, bloom.exposure), (0.4, 1.7, 0.84, 1.1));
    }

    #[test]
    fn test_builder_chain() {
        let config = ExperimentConfig::new("Gravity")
            .with_orbit_damping(0.05)
            .with_bloom(BloomParams::default())
            .with_motion_blur(MotionBlurParams::default())
            .with_camera(CameraOptions::default().far(10_000.0));
        assert!(config.orbit_controls);
        assert_eq!(config.camera.far, 10_000.0);
        assert_eq!(config.motion_blur.map(|m| m.damp), Some(0.96));
        assert!(config.ambient_occlusion.is_none());
    }
}
