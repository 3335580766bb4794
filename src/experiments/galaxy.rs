//! Spiral galaxy point cloud over a field of background stars.

use glam::{Quat, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{BloomParams, CameraOptions, ExperimentConfig};
use crate::controls::{Controls, ParamValue, Tweakable};
use crate::experiment::{Experiment, FrameInfo, RenderContext};
use crate::geometry::hex;
use crate::scene::{Light, NodeId, PointCloud, Transform};

/// Radians per 60 Hz frame.
const GALAXY_SPIN: f32 = 0.005;
const STARS_SPIN: f32 = 0.004;
const STAR_FIELD: Vec3 = Vec3::new(50.0, 15.0, 50.0);
const LIFT: Vec3 = Vec3::new(0.0, 1.0, 0.0);
const TILT: f32 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct GalaxyParams {
    pub count: usize,
    pub stars_count: usize,
    pub branches: u32,
    pub radius: f32,
    pub spin: f32,
    pub randomness: f32,
    pub randomness_power: f32,
    pub inside_color: Vec3,
    pub outside_color: Vec3,
    pub star_colors: [Vec3; 4],
    pub point_size: f32,
    pub star_size: f32,
}

impl Default for GalaxyParams {
    fn default() -> Self {
        Self {
            count: 9000,
            stars_count: 16000,
            branches: 7,
            radius: 5.0,
            spin: 1.15,
            randomness: 0.29,
            randomness_power: 4.8,
            inside_color: hex(0xff6030).truncate(),
            outside_color: hex(0x1b3984).truncate(),
            star_colors: [0xffffff, 0xc300ff, 0xefff00, 0xff0e00].map(|c| hex(c).truncate()),
            point_size: 0.03,
            star_size: 0.08,
        }
    }
}

const STAR_KEYS: [&str; 4] = ["starColorA", "starColorB", "starColorC", "starColorD"];

impl Tweakable for GalaxyParams {
    fn register(&self, controls: &mut Controls) {
        controls
            .folder("Galaxy")
            .add_float("count", "count", self.count as f32, 0.0, 100_000.0, 1.0)
            .add_float("starsCount", "stars", self.stars_count as f32, 0.0, 100_000.0, 1.0)
            .add_float("branches", "branches", self.branches as f32, 1.0, 30.0, 1.0)
            .add_float("radius", "radius", self.radius, 1.0, 50.0, 0.01)
            .add_float("spin", "spin", self.spin, 0.0, 10.0, 0.005)
            .add_float("randomness", "randomness", self.randomness, 0.0, 1.0, 0.01)
            .add_float("randomnessPower", "randomness power", self.randomness_power, 1.0, 10.0, 0.001)
            .add_color("insideColor", "inside", self.inside_color)
            .add_color("outsideColor", "outside", self.outside_color);
        for (key, color) in STAR_KEYS.iter().zip(self.star_colors) {
            controls.add_color(key, key, color);
        }
    }

    fn apply(&mut self, key: &str, value: &ParamValue) -> bool {
        let f = value.as_f32();
        let c = value.as_color();
        match key {
            "count" => f.map(|v| self.count = v as usize).is_some(),
            "starsCount" => f.map(|v| self.stars_count = v as usize).is_some(),
            "branches" => f.map(|v| self.branches = (v as u32).max(1)).is_some(),
            "radius" => f.map(|v| self.radius = v).is_some(),
            "spin" => f.map(|v| self.spin = v).is_some(),
            "randomness" => f.map(|v| self.randomness = v).is_some(),
            "randomnessPower" => f.map(|v| self.randomness_power = v).is_some(),
            "insideColor" => c.map(|v| self.inside_color = v).is_some(),
            "outsideColor" => c.map(|v| self.outside_color = v).is_some(),
            _ => match STAR_KEYS.iter().position(|k| *k == key) {
                Some(i) => c.map(|v| self.star_colors[i] = v).is_some(),
                None => false,
            },
        }
    }
}

/// Signed random offset, biased toward zero by `power`.
fn scatter<R: Rng>(rng: &mut R, power: f32, scale: f32) -> f32 {
    let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
    rng.gen::<f32>().powf(power) * sign * scale
}

/// Spiral arm positions and colours, lifted and tilted into place.
pub fn generate_galaxy<R: Rng>(params: &GalaxyParams, rng: &mut R) -> (Vec<Vec3>, Vec<Vec4>) {
    let tilt = Quat::from_rotation_z(TILT);
    let branches = params.branches.max(1);
    let mut positions = Vec::with_capacity(params.count);
    let mut colors = Vec::with_capacity(params.count);

    for i in 0..params.count {
        let radius = rng.gen::<f32>() * params.radius;
        let spin_angle = radius * params.spin;
        let branch_angle = (i as u32 % branches) as f32 / branches as f32 * std::f32::consts::TAU;
        let spread = params.randomness * radius;
        let jitter = Vec3::new(
            scatter(rng, params.randomness_power, spread),
            scatter(rng, params.randomness_power, spread),
            scatter(rng, params.randomness_power, spread),
        );
        let angle = branch_angle + spin_angle;
        let p = Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius) + jitter;
        positions.push(tilt * (p + LIFT));

        let t = if params.radius > 0.0 { radius / params.radius } else { 0.0 };
        colors.push(params.inside_color.lerp(params.outside_color, t).extend(1.0));
    }
    (positions, colors)
}

/// Uniform star field, each star one of the four star colours.
pub fn generate_stars<R: Rng>(params: &GalaxyParams, rng: &mut R) -> (Vec<Vec3>, Vec<Vec4>) {
    (0..params.stars_count)
        .map(|_| {
            let unit = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
            let color = params.star_colors[rng.gen_range(0..params.star_colors.len())];
            (unit * STAR_FIELD + LIFT, color.extend(1.0))
        })
        .unzip()
}

pub struct GalaxyExperiment {
    pub params: GalaxyParams,
    rng: StdRng,
    galaxy: Option<NodeId>,
    stars: Option<NodeId>,
}

impl GalaxyExperiment {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            params: GalaxyParams::default(),
            rng,
            galaxy: None,
            stars: None,
        }
    }

    pub fn galaxy_node(&self) -> Option<NodeId> {
        self.galaxy
    }

    pub fn stars_node(&self) -> Option<NodeId> {
        self.stars
    }

    /// Rebuild both clouds from the current parameters.
    fn regenerate(&mut self, ctx: &mut RenderContext) {
        let (positions, colors) = generate_galaxy(&self.params, &mut self.rng);
        if let Some(cloud) = self.galaxy.and_then(|n| ctx.scene.points_mut(n)) {
            cloud.positions = positions;
            cloud.colors = colors;
            cloud.size = self.params.point_size;
            cloud.version += 1;
        }
        let (positions, colors) = generate_stars(&self.params, &mut self.rng);
        if let Some(cloud) = self.stars.and_then(|n| ctx.scene.points_mut(n)) {
            cloud.positions = positions;
            cloud.colors = colors;
            cloud.size = self.params.star_size;
            cloud.version += 1;
        }
        log::debug!(
            "Galaxy regenerated: {} points, {} stars",
            self.params.count,
            self.params.stars_count
        );
    }
}

impl Default for GalaxyExperiment {
    fn default() -> Self {
        Self::new()
    }
}

impl Experiment for GalaxyExperiment {
    fn config(&self) -> ExperimentConfig {
        ExperimentConfig::new("Galaxy")
            .with_orbit_controls(true)
            .with_orbit_damping(0.05)
            .with_bloom(BloomParams {
                threshold: 0.0,
                strength: 2.8,
                radius: 0.6,
                exposure: 0.5,
            })
            .with_camera(CameraOptions::default().position(Vec3::new(0.0, 2.0, 5.0)))
            .with_clear_color(0x000000)
    }

    fn init(&mut self, ctx: &mut RenderContext) {
        ctx.scene.add_light(Light::Point {
            position: Vec3::new(0.0, 0.0, 10.0),
            color: Vec3::ONE,
            intensity: 1.0,
            range: 100.0,
        });

        let root = ctx.scene.root();
        let mut galaxy = PointCloud::new(Vec::new(), Vec::new(), self.params.point_size);
        galaxy.additive = true;
        self.galaxy = Some(ctx.scene.add_points(root, Transform::IDENTITY, galaxy));
        let stars = PointCloud::new(Vec::new(), Vec::new(), self.params.star_size);
        self.stars = Some(ctx.scene.add_points(root, Transform::IDENTITY, stars));
        self.regenerate(ctx);

        self.params.register(&mut ctx.controls);
    }

    fn on_frame(&mut self, ctx: &mut RenderContext, frame: &FrameInfo) {
        let steps = frame.delta * 60.0;
        for (node, speed) in [(self.galaxy, GALAXY_SPIN), (self.stars, STARS_SPIN)] {
            if let Some(t) = node.and_then(|n| ctx.scene.transform_mut(n)) {
                t.rotation = Quat::from_rotation_y(speed * steps) * t.rotation;
            }
        }
    }

    fn on_control(&mut self, ctx: &mut RenderContext, key: &str, value: &ParamValue) {
        if self.params.apply(key, value) {
            self.regenerate(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::advance_frame;
    use crate::scene::Renderable;
    use crate::time::Clock;

    #[test]
    fn test_galaxy_counts_and_colors() {
        let params = GalaxyParams::default();
        let mut rng = StdRng::seed_from_u64(1);
        let (positions, colors) = generate_galaxy(&params, &mut rng);
        assert_eq!(positions.len(), 9000);
        assert_eq!(colors.len(), 9000);

        // every colour lies on the inside→outside segment
        for c in &colors {
            let d = params.outside_color - params.inside_color;
            let t = (c.truncate() - params.inside_color).dot(d) / d.length_squared();
            assert!((-1e-4..=1.0 + 1e-4).contains(&t));
        }
    }

    #[test]
    fn test_galaxy_stays_within_radius() {
        let params = GalaxyParams::default();
        let mut rng = StdRng::seed_from_u64(2);
        let (positions, _) = generate_galaxy(&params, &mut rng);
        let untilt = Quat::from_rotation_z(-TILT);
        let limit = params.radius * (1.0 + params.randomness * 3f32.sqrt()) + 1e-3;
        for p in positions {
            let local = untilt * p - LIFT;
            assert!(local.length() <= limit, "{:?}", local);
        }
    }

    #[test]
    fn test_stars_fill_the_box() {
        let params = GalaxyParams::default();
        let mut rng = StdRng::seed_from_u64(3);
        let (positions, colors) = generate_stars(&params, &mut rng);
        assert_eq!(positions.len(), 16000);
        for (p, c) in positions.iter().zip(&colors) {
            let local = *p - LIFT;
            assert!(local.abs().cmple(STAR_FIELD).all());
            assert!(params.star_colors.contains(&c.truncate()));
        }
    }

    #[test]
    fn test_parameter_change_regenerates() {
        let mut experiment = GalaxyExperiment::with_rng(StdRng::seed_from_u64(4));
        let mut ctx = RenderContext::new(&experiment.config(), 640, 480);
        ctx.clock = Clock::fixed(1.0 / 60.0);
        experiment.init(&mut ctx);

        ctx.controls.set("count", ParamValue::Float(120.0)).unwrap();
        advance_frame(&mut experiment, &mut ctx);

        let node = experiment.galaxy_node().unwrap();
        let Some(Renderable::Points(cloud)) = ctx.scene.renderable(node) else {
            panic!("galaxy is not a point cloud");
        };
        assert_eq!(cloud.positions.len(), 120);
        assert!(cloud.version > 1);

        let spun = ctx.scene.transform(node).unwrap().rotation;
        assert!(spun.angle_between(Quat::IDENTITY) > 0.0);
    }
}
