//! Noise-displaced water surface under a simple sky.

use glam::{Quat, Vec3, Vec4};
use noise::{NoiseFn, OpenSimplex, Perlin};
use rand::Rng;
use std::f32::consts::FRAC_PI_2;

use crate::config::{CameraOptions, ExperimentConfig, ToneMapping};
use crate::controls::{Controls, ParamValue, Tweakable};
use crate::experiment::{Experiment, FrameInfo, RenderContext};
use crate::geometry::{hex, sample_gradient, Geometry};
use crate::scene::{Fog, GeometryId, Light, Material, Mesh, Transform};

/// Height at which the surface reaches the top colour.
const COLOR_HEIGHT: f32 = 14.0;
const SKY_RADIUS: f32 = 4000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoiseKind {
    #[default]
    Simplex,
    Perlin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaterParams {
    pub size: f32,
    pub subdivisions: u32,
    pub speed: f32,
    pub amplitude: f32,
    pub noise_size: f32,
    pub noise: NoiseKind,
    pub top_color: Vec3,
    pub bottom_color: Vec3,
}

impl Default for WaterParams {
    fn default() -> Self {
        Self {
            size: 400.0,
            subdivisions: 400,
            speed: 0.5,
            amplitude: 7.0,
            noise_size: 32.0,
            noise: NoiseKind::Simplex,
            top_color: hex(0xff0000).truncate(),
            bottom_color: hex(0x090909).truncate(),
        }
    }
}

impl Tweakable for WaterParams {
    fn register(&self, controls: &mut Controls) {
        let noise = match self.noise {
            NoiseKind::Simplex => 0,
            NoiseKind::Perlin => 1,
        };
        controls
            .folder("Water")
            .add_float("speed", "speed", self.speed, 0.0, 10.0, 0.01)
            .add_float("amplitude", "amplitude", self.amplitude, 0.0, 50.0, 0.01)
            .add_float("noiseSize", "noise size", self.noise_size, 0.01, 100.0, 0.01)
            .add_choice("noiseType", "noise", &["Simplex", "Perlin"], noise)
            .add_color("bottomColor", "bottom", self.bottom_color)
            .add_color("topColor", "top", self.top_color);
    }

    fn apply(&mut self, key: &str, value: &ParamValue) -> bool {
        let f = value.as_f32();
        match key {
            "speed" => f.map(|v| self.speed = v).is_some(),
            "amplitude" => f.map(|v| self.amplitude = v).is_some(),
            "noiseSize" => f.map(|v| self.noise_size = v.max(0.01)).is_some(),
            "noiseType" => value
                .as_choice()
                .map(|i| self.noise = if i == 1 { NoiseKind::Perlin } else { NoiseKind::Simplex })
                .is_some(),
            "bottomColor" => value.as_color().map(|c| self.bottom_color = c).is_some(),
            "topColor" => value.as_color().map(|c| self.top_color = c).is_some(),
            _ => false,
        }
    }
}

/// Sky look and sun placement. Angles in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyParams {
    pub turbidity: f32,
    pub rayleigh: f32,
    pub mie_coefficient: f32,
    pub mie_directional_g: f32,
    pub elevation: f32,
    pub azimuth: f32,
    pub exposure: f32,
}

impl Default for SkyParams {
    fn default() -> Self {
        Self {
            turbidity: 10.0,
            rayleigh: 3.0,
            mie_coefficient: 0.005,
            mie_directional_g: 0.9,
            elevation: 3.5,
            azimuth: -180.0,
            exposure: 0.14,
        }
    }
}

impl SkyParams {
    /// Unit vector toward the sun, `phi = 90° - elevation`, `theta = azimuth`.
    pub fn sun_direction(&self) -> Vec3 {
        let phi = (90.0 - self.elevation).to_radians();
        let theta = self.azimuth.to_radians();
        Vec3::new(phi.sin() * theta.sin(), phi.cos(), phi.sin() * theta.cos())
    }

    /// Vertical colour ramp for the sky dome.
    ///
    /// Rayleigh sets how blue the zenith is, turbidity and Mie scattering
    /// wash out the horizon, and a low sun warms it.
    pub fn gradient_stops(&self) -> Vec<(f32, Vec4)> {
        let sun_height = self.sun_direction().y.clamp(0.0, 1.0);
        let brightness = (self.exposure * 4.0).sqrt();

        let zenith = Vec3::new(0.16, 0.34, 0.72) * (self.rayleigh / 3.0).clamp(0.0, 1.5) * (0.5 + 0.5 * sun_height);
        let haze = ((self.turbidity / 20.0) + self.mie_coefficient * 10.0).clamp(0.0, 1.0);
        let sunset = Vec3::new(1.0, 0.55, 0.3).lerp(Vec3::new(0.9, 0.9, 0.95), sun_height.sqrt());
        let horizon = sunset.lerp(Vec3::splat(0.85), haze * 0.5) * (0.6 + 0.4 * self.mie_directional_g);
        let ground = horizon * 0.25;

        [(0.0, ground), (0.5, horizon), (0.62, horizon.lerp(zenith, 0.5)), (1.0, zenith)]
            .into_iter()
            .map(|(t, c)| (t, (c * brightness).extend(1.0)))
            .collect()
    }
}

impl Tweakable for SkyParams {
    fn register(&self, controls: &mut Controls) {
        controls
            .folder("Sky")
            .add_float("turbidity", "turbidity", self.turbidity, 0.0, 20.0, 0.1)
            .add_float("rayleigh", "rayleigh", self.rayleigh, 0.0, 4.0, 0.001)
            .add_float("mieCoefficient", "mie coefficient", self.mie_coefficient, 0.0, 0.1, 0.001)
            .add_float("mieDirectionalG", "mie directional g", self.mie_directional_g, 0.0, 1.0, 0.001)
            .add_float("elevation", "elevation", self.elevation, 0.0, 90.0, 0.1)
            .add_float("azimuth", "azimuth", self.azimuth, -180.0, 180.0, 0.1)
            .add_float("skyExposure", "exposure", self.exposure, 0.0, 1.0, 0.0001);
    }

    fn apply(&mut self, key: &str, value: &ParamValue) -> bool {
        let Some(v) = value.as_f32() else { return false };
        match key {
            "turbidity" => self.turbidity = v,
            "rayleigh" => self.rayleigh = v,
            "mieCoefficient" => self.mie_coefficient = v,
            "mieDirectionalG" => self.mie_directional_g = v,
            "elevation" => self.elevation = v,
            "azimuth" => self.azimuth = v,
            "skyExposure" => self.exposure = v,
            _ => return false,
        }
        true
    }
}

/// Noise generators seeded once per run.
struct NoiseField {
    simplex: OpenSimplex,
    perlin: Perlin,
}

impl NoiseField {
    fn new(seed: u32) -> Self {
        Self {
            simplex: OpenSimplex::new(seed),
            perlin: Perlin::new(seed),
        }
    }

    fn sample(&self, kind: NoiseKind, p: [f64; 3]) -> f32 {
        match kind {
            NoiseKind::Simplex => self.simplex.get(p) as f32,
            NoiseKind::Perlin => self.perlin.get(p) as f32,
        }
    }
}

/// Displace a plane's vertices (in its local XY) along local Z and colour
/// them by height.
fn displace(geometry: &mut Geometry, field: &NoiseField, params: &WaterParams, elapsed: f32) {
    let t = (elapsed * params.speed) as f64;
    let size = params.noise_size.max(0.01) as f64;
    let bottom = params.bottom_color.extend(1.0);
    let top = params.top_color.extend(1.0);
    for v in &mut geometry.vertices {
        let [x, y, _] = v.position;
        let h = field.sample(params.noise, [x as f64 / size + t, y as f64 / size + t, t]) * params.amplitude;
        v.position[2] = h;
        v.color = bottom.lerp(top, (h / COLOR_HEIGHT).clamp(0.0, 1.0)).to_array();
    }
    geometry.recompute_normals();
}

pub struct WaterExperiment {
    pub params: WaterParams,
    pub sky: SkyParams,
    field: NoiseField,
    surface: Option<GeometryId>,
    dome: Option<GeometryId>,
    sun_light: Option<usize>,
}

impl WaterExperiment {
    pub fn new() -> Self {
        Self::with_params(WaterParams::default(), rand::thread_rng().gen())
    }

    pub fn with_params(params: WaterParams, seed: u32) -> Self {
        Self {
            params,
            sky: SkyParams::default(),
            field: NoiseField::new(seed),
            surface: None,
            dome: None,
            sun_light: None,
        }
    }

    pub fn surface(&self) -> Option<GeometryId> {
        self.surface
    }

    fn update_sky(&mut self, ctx: &mut RenderContext) {
        let sun = self.sky.sun_direction();
        if let Some(light) = self.sun_light.and_then(|i| ctx.scene.lights.get_mut(i)) {
            *light = Light::Directional {
                direction: sun,
                color: Vec3::new(1.0, 0.9, 0.8),
                intensity: sun.y.max(0.0).sqrt(),
            };
        }
        let stops = self.sky.gradient_stops();
        if let Some(dome) = self.dome.and_then(|id| ctx.scene.geometry_mut(id)) {
            for v in &mut dome.vertices {
                let t = (v.position[1] / SKY_RADIUS + 1.0) * 0.5;
                v.color = sample_gradient(&stops, t).to_array();
            }
        }
    }
}

impl Default for WaterExperiment {
    fn default() -> Self {
        Self::new()
    }
}

impl Experiment for WaterExperiment {
    fn config(&self) -> ExperimentConfig {
        ExperimentConfig::new("Water")
            .with_orbit_controls(true)
            .with_fps_counter(true)
            .with_tone_mapping(ToneMapping::AcesFilmic)
            .with_camera(
                CameraOptions::default()
                    .far(10_000.0)
                    .position(Vec3::new(0.0, 30.0, 180.0))
                    .target(Vec3::ZERO),
            )
    }

    fn init(&mut self, ctx: &mut RenderContext) {
        ctx.scene.fog = Some(Fog {
            color: hex(0x565b5e).truncate(),
            near: 0.0,
            far: 1000.0,
        });
        ctx.scene.add_light(Light::Directional {
            direction: Vec3::new(0.0, 2.0, 1.0),
            color: Vec3::ONE,
            intensity: 1.0,
        });
        self.sun_light = Some(ctx.scene.add_light(Light::Directional {
            direction: Vec3::Y,
            color: Vec3::ONE,
            intensity: 0.0,
        }));

        let root = ctx.scene.root();
        let dome = ctx
            .scene
            .add_geometry(Geometry::gradient_dome(SKY_RADIUS, &self.sky.gradient_stops()));
        ctx.scene.add_mesh(
            root,
            Transform::IDENTITY,
            Mesh {
                geometry: dome,
                material: Material::background(),
            },
        );
        self.dome = Some(dome);

        let p = &self.params;
        let mut plane = Geometry::plane(p.size, p.size, p.subdivisions, p.subdivisions);
        displace(&mut plane, &self.field, p, 0.0);
        let surface = ctx.scene.add_geometry(plane);
        ctx.scene.add_mesh(
            root,
            Transform::IDENTITY.with_rotation(Quat::from_rotation_x(-FRAC_PI_2)),
            Mesh {
                geometry: surface,
                material: Material::lit(Vec4::ONE),
            },
        );
        self.surface = Some(surface);

        self.update_sky(ctx);
        self.params.register(&mut ctx.controls);
        self.sky.register(&mut ctx.controls);
        log::info!(
            "Water surface with {} vertices",
            (self.params.subdivisions + 1).pow(2)
        );
    }

    fn on_frame(&mut self, ctx: &mut RenderContext, frame: &FrameInfo) {
        if let Some(surface) = self.surface.and_then(|id| ctx.scene.geometry_mut(id)) {
            displace(surface, &self.field, &self.params, frame.elapsed);
        }
    }

    fn on_control(&mut self, ctx: &mut RenderContext, key: &str, value: &ParamValue) {
        if self.params.apply(key, value) {
            return;
        }
        if self.sky.apply(key, value) {
            self.update_sky(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::advance_frame;
    use crate::time::Clock;

    fn small() -> WaterParams {
        WaterParams {
            size: 40.0,
            subdivisions: 16,
            ..WaterParams::default()
        }
    }

    #[test]
    fn test_displacement_is_bounded_and_coloured() {
        let params = small();
        let field = NoiseField::new(3);
        let mut plane = Geometry::plane(params.size, params.size, params.subdivisions, params.subdivisions);
        displace(&mut plane, &field, &params, 1.5);

        let bottom = params.bottom_color.extend(1.0);
        let top = params.top_color.extend(1.0);
        for v in &plane.vertices {
            let h = v.position[2];
            assert!(h.abs() <= params.amplitude * 1.5, "{}", h);
            let expected = bottom.lerp(top, (h / COLOR_HEIGHT).clamp(0.0, 1.0));
            assert!((Vec4::from_array(v.color) - expected).length() < 1e-5);
        }
    }

    #[test]
    fn test_surface_changes_over_time() {
        let params = small();
        let field = NoiseField::new(9);
        let mut a = Geometry::plane(params.size, params.size, params.subdivisions, params.subdivisions);
        let mut b = a.clone();
        displace(&mut a, &field, &params, 0.0);
        displace(&mut b, &field, &params, 2.0);
        assert!(a.vertices.iter().zip(&b.vertices).any(|(p, q)| p.position[2] != q.position[2]));
    }

    #[test]
    fn test_sun_direction_follows_spherical_coords() {
        let overhead = SkyParams {
            elevation: 90.0,
            ..SkyParams::default()
        };
        assert!(overhead.sun_direction().distance(Vec3::Y) < 1e-5);

        let horizon = SkyParams {
            elevation: 0.0,
            azimuth: 90.0,
            ..SkyParams::default()
        };
        assert!(horizon.sun_direction().distance(Vec3::X) < 1e-5);

        // default azimuth -180 puts the sun behind the camera's view (-Z)
        let sun = SkyParams::default().sun_direction();
        assert!(sun.z < -0.9 && sun.y > 0.0);
    }

    #[test]
    fn test_frame_bumps_surface_version() {
        let mut experiment = WaterExperiment::with_params(small(), 1);
        let mut ctx = RenderContext::new(&experiment.config(), 640, 480);
        ctx.clock = Clock::fixed(1.0 / 60.0);
        experiment.init(&mut ctx);

        let id = experiment.surface().unwrap();
        let before = ctx.scene.geometry(id).unwrap().version;
        advance_frame(&mut experiment, &mut ctx);
        assert!(ctx.scene.geometry(id).unwrap().version > before);
    }

    #[test]
    fn test_sky_controls_move_the_sun() {
        let mut experiment = WaterExperiment::with_params(small(), 1);
        let mut ctx = RenderContext::new(&experiment.config(), 640, 480);
        experiment.init(&mut ctx);

        ctx.controls.set("elevation", ParamValue::Float(90.0)).unwrap();
        advance_frame(&mut experiment, &mut ctx);
        let Some(Light::Directional { direction, .. }) = experiment.sun_light.map(|i| ctx.scene.lights[i]) else {
            panic!("sun light missing");
        };
        assert!(direction.distance(Vec3::Y) < 1e-4);
    }
}
