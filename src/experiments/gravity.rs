//! Gravity wells placed by clicking, pulling drifting particles and each
//! other. A well that comes close to a smaller one swallows it and grows.
//!
//! Forces and velocities are expressed per 60 Hz frame, as in the classic
//! version of this sketch; [`GravitySim::step`] scales them by real time.

use glam::{Quat, Vec2, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{BloomParams, CameraOptions, ExperimentConfig, MotionBlurParams};
use crate::controls::{Controls, ParamValue, Tweakable};
use crate::experiment::{Experiment, FrameInfo, RenderContext};
use crate::geometry::Geometry;
use crate::input::MouseButton;
use crate::raycast::pointer_on_plane;
use crate::scene::{GeometryId, Light, Material, Mesh, NodeId, Transform};
use crate::tween::{Ease, Tween};

const MAX_PARTICLE_SPEED: f32 = 0.1;
const ABSORB_DISTANCE: f32 = 0.5;
const GROWTH: f32 = 1.4;
const GROWTH_DURATION: f32 = 2.0;
const BASE_GRAVITY: f32 = 0.00001;
const PARTICLE_PULL: f32 = 100.0;
const SPIN: f32 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct GravityParams {
    pub particles_count: usize,
}

impl Default for GravityParams {
    fn default() -> Self {
        Self { particles_count: 10 }
    }
}

impl Tweakable for GravityParams {
    fn register(&self, controls: &mut Controls) {
        controls
            .folder("Gravity")
            .add_float("particlesCount", "particles", self.particles_count as f32, 0.0, 1000.0, 1.0);
    }

    fn apply(&mut self, key: &str, value: &ParamValue) -> bool {
        match key {
            "particlesCount" => value.as_f32().map(|v| self.particles_count = v as usize).is_some(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub scale: f32,
    pub color: Vec4,
}

#[derive(Debug, Clone)]
pub struct GravityPoint {
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation: Quat,
    pub scale: Tween<f32>,
    pub gravity: f32,
}

impl GravityPoint {
    pub fn new(position: Vec3, scale: f32) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Tween::new(scale, scale, 0.0),
            gravity: BASE_GRAVITY,
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale.value()
    }
}

fn random_unit<R: Rng>(rng: &mut R) -> Vec3 {
    Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)).normalize_or_zero()
}

/// Particle and well state, independent of the scene.
#[derive(Debug, Default)]
pub struct GravitySim {
    pub particles: Vec<Particle>,
    pub points: Vec<GravityPoint>,
}

impl GravitySim {
    pub fn spawn_particles<R: Rng>(&mut self, count: usize, rng: &mut R) {
        self.particles = (0..count)
            .map(|_| Particle {
                position: Vec3::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0)),
                velocity: random_unit(rng) * 0.01,
                scale: rng.gen_range(0.3..0.7),
                color: Vec4::new(rng.gen::<f32>() * 0.5, rng.gen::<f32>() * 0.5, rng.gen::<f32>() * 0.5, 0.5),
            })
            .collect();
    }

    pub fn add_point(&mut self, point: GravityPoint) {
        self.points.push(point);
    }

    /// Advance by `dt` seconds. Returns the indices (before removal) of
    /// wells swallowed this step.
    pub fn step<R: Rng>(&mut self, dt: f32, elapsed: f32, rng: &mut R) -> Vec<usize> {
        let frames = dt * 60.0;

        for point in &self.points {
            for particle in &mut self.particles {
                let pull = (point.position - particle.position).normalize_or_zero();
                particle.velocity += pull * point.gravity * PARTICLE_PULL * frames;
            }
        }

        let snapshot: Vec<(Vec3, f32)> = self.points.iter().map(|p| (p.position, p.gravity)).collect();
        for point in &mut self.points {
            for (source, gravity) in &snapshot {
                point.velocity += (*source - point.position).normalize_or_zero() * *gravity * frames;
            }
        }

        let absorbed = self.absorb();

        let bob = (elapsed * 0.1).sin() * 0.001 * frames;
        let spin = Quat::from_euler(glam::EulerRot::XYZ, SPIN * frames, SPIN * frames, SPIN * frames);
        for point in &mut self.points {
            point.scale.advance(dt);
            point.position.y += bob;
            point.rotation = (point.rotation * spin).normalize();
            point.position += point.velocity * frames;
        }

        for particle in &mut self.particles {
            if particle.velocity.length() > MAX_PARTICLE_SPEED {
                particle.velocity = particle.velocity.normalize() * random_unit(rng) * MAX_PARTICLE_SPEED;
            }
            particle.position += particle.velocity * frames;
        }

        absorbed
    }

    /// Larger wells swallow no-larger ones within reach.
    fn absorb(&mut self) -> Vec<usize> {
        let mut gone = vec![false; self.points.len()];
        for i in 0..self.points.len() {
            if gone[i] {
                continue;
            }
            for j in 0..self.points.len() {
                if i == j || gone[j] {
                    continue;
                }
                let (a, b) = (&self.points[i], &self.points[j]);
                if b.scale() > a.scale() || a.position.distance(b.position) >= ABSORB_DISTANCE {
                    continue;
                }
                gone[j] = true;
                let eater = &mut self.points[i];
                let current = eater.scale();
                eater.scale = Tween::new(current, current * GROWTH, GROWTH_DURATION).with_ease(Ease::Power4Out);
                eater.gravity *= 2.0;
                eater.velocity = Vec3::ZERO;
            }
        }
        let absorbed: Vec<usize> = (0..gone.len()).filter(|i| gone[*i]).collect();
        let mut index = 0;
        self.points.retain(|_| {
            let keep = !gone[index];
            index += 1;
            keep
        });
        absorbed
    }
}

pub struct GravityExperiment {
    pub params: GravityParams,
    sim: GravitySim,
    rng: StdRng,
    particle_nodes: Vec<NodeId>,
    point_nodes: Vec<NodeId>,
    particle_geometry: Option<GeometryId>,
    point_geometry: Option<GeometryId>,
}

impl GravityExperiment {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            params: GravityParams::default(),
            sim: GravitySim::default(),
            rng,
            particle_nodes: Vec::new(),
            point_nodes: Vec::new(),
            particle_geometry: None,
            point_geometry: None,
        }
    }

    pub fn sim(&self) -> &GravitySim {
        &self.sim
    }

    fn respawn_particles(&mut self, ctx: &mut RenderContext) {
        for node in self.particle_nodes.drain(..) {
            ctx.scene.remove(node);
        }
        self.sim.spawn_particles(self.params.particles_count, &mut self.rng);
        let Some(geometry) = self.particle_geometry else { return };
        let root = ctx.scene.root();
        for particle in &self.sim.particles {
            let node = ctx.scene.add_mesh(
                root,
                Transform::from_translation(particle.position).with_scale(Vec3::splat(particle.scale)),
                Mesh {
                    geometry,
                    material: Material::lit(particle.color),
                },
            );
            self.particle_nodes.push(node);
        }
    }

    /// Drop a well where the pointer meets the `z = 0` plane.
    pub fn spawn_point(&mut self, ctx: &mut RenderContext, pointer: Vec2) -> bool {
        let Some(position) = pointer_on_plane(&ctx.camera, pointer, Vec3::ZERO, Vec3::Z) else {
            return false;
        };
        let Some(geometry) = self.point_geometry else { return false };
        let point = GravityPoint::new(position, self.rng.gen_range(0.9..1.1));
        let root = ctx.scene.root();
        let node = ctx.scene.add_mesh(
            root,
            Transform::from_translation(position).with_scale(Vec3::splat(point.scale())),
            Mesh {
                geometry,
                material: Material::normal(),
            },
        );
        self.sim.add_point(point);
        self.point_nodes.push(node);
        log::debug!("Gravity point at {:?}", position);
        true
    }
}

impl Default for GravityExperiment {
    fn default() -> Self {
        Self::new()
    }
}

impl Experiment for GravityExperiment {
    fn config(&self) -> ExperimentConfig {
        ExperimentConfig::new("Gravity")
            .with_orbit_controls(true)
            .with_bloom(BloomParams::default())
            .with_motion_blur(MotionBlurParams::default())
            .with_camera(CameraOptions::default().far(10_000.0).position(Vec3::new(0.0, 5.0, 8.0)))
            .with_clear_color(0x3b3b3b)
    }

    fn init(&mut self, ctx: &mut RenderContext) {
        ctx.scene.add_light(Light::Directional {
            direction: Vec3::new(0.0, 2.0, 1.0),
            color: Vec3::ONE,
            intensity: 5.0,
        });
        self.particle_geometry = Some(ctx.scene.add_geometry(Geometry::uv_sphere(0.1, 6, 6)));
        self.point_geometry = Some(ctx.scene.add_geometry(Geometry::octahedron(0.5)));
        self.respawn_particles(ctx);
        self.params.register(&mut ctx.controls);
    }

    fn on_frame(&mut self, ctx: &mut RenderContext, frame: &FrameInfo) {
        let absorbed = self.sim.step(frame.delta, frame.elapsed, &mut self.rng);
        for index in absorbed.into_iter().rev() {
            let node = self.point_nodes.remove(index);
            ctx.scene.remove(node);
        }

        for (point, node) in self.sim.points.iter().zip(&self.point_nodes) {
            ctx.scene.set_transform(
                *node,
                Transform::from_translation(point.position)
                    .with_rotation(point.rotation)
                    .with_scale(Vec3::splat(point.scale())),
            );
        }
        for (particle, node) in self.sim.particles.iter().zip(&self.particle_nodes) {
            if let Some(t) = ctx.scene.transform_mut(*node) {
                t.translation = particle.position;
            }
        }
    }

    fn on_pointer_down(&mut self, ctx: &mut RenderContext, button: MouseButton, pointer: Vec2) {
        if button == MouseButton::Left {
            self.spawn_point(ctx, pointer);
        }
    }

    fn on_control(&mut self, ctx: &mut RenderContext, key: &str, value: &ParamValue) {
        if self.params.apply(key, value) {
            self.respawn_particles(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    #[test]
    fn test_particles_are_pulled_toward_point() {
        let mut sim = GravitySim::default();
        sim.particles.push(Particle {
            position: Vec3::new(3.0, 0.0, 0.0),
            velocity: Vec3::ZERO,
            scale: 0.5,
            color: Vec4::ONE,
        });
        sim.add_point(GravityPoint::new(Vec3::ZERO, 1.0));
        sim.step(1.0 / 60.0, 0.0, &mut rng());
        assert!(sim.particles[0].velocity.x < 0.0);
        assert!(sim.particles[0].position.x < 3.0);
    }

    #[test]
    fn test_particle_speed_is_limited() {
        let mut sim = GravitySim::default();
        sim.particles.push(Particle {
            position: Vec3::ZERO,
            velocity: Vec3::new(5.0, 0.0, 0.0),
            scale: 0.5,
            color: Vec4::ONE,
        });
        sim.step(1.0 / 60.0, 0.0, &mut rng());
        assert!(sim.particles[0].velocity.length() <= MAX_PARTICLE_SPEED + 1e-5);
    }

    #[test]
    fn test_larger_point_absorbs_smaller() {
        let mut sim = GravitySim::default();
        sim.add_point(GravityPoint::new(Vec3::ZERO, 1.0));
        sim.add_point(GravityPoint::new(Vec3::new(0.2, 0.0, 0.0), 0.9));
        let absorbed = sim.step(1.0 / 60.0, 0.0, &mut rng());
        assert_eq!(absorbed, vec![1]);
        assert_eq!(sim.points.len(), 1);

        let survivor = &sim.points[0];
        assert_eq!(survivor.gravity, BASE_GRAVITY * 2.0);
        assert_eq!(survivor.scale.to, GROWTH);

        let mut survivor = survivor.clone();
        survivor.scale.advance(GROWTH_DURATION);
        assert!((survivor.scale() - GROWTH).abs() < 1e-5);
    }

    #[test]
    fn test_far_points_attract_without_merging() {
        let mut sim = GravitySim::default();
        sim.add_point(GravityPoint::new(Vec3::new(-2.0, 0.0, 0.0), 1.0));
        sim.add_point(GravityPoint::new(Vec3::new(2.0, 0.0, 0.0), 1.0));
        let absorbed = sim.step(1.0 / 60.0, 0.0, &mut rng());
        assert!(absorbed.is_empty());
        assert!(sim.points[0].velocity.x > 0.0);
        assert!(sim.points[1].velocity.x < 0.0);
    }

    #[test]
    fn test_click_spawns_point_on_plane() {
        let mut experiment = GravityExperiment::with_rng(rng());
        let mut ctx = RenderContext::new(&experiment.config(), 800, 600);
        experiment.init(&mut ctx);
        assert_eq!(experiment.sim().particles.len(), 10);

        assert!(experiment.spawn_point(&mut ctx, Vec2::ZERO));
        let p = experiment.sim().points[0].position;
        assert!(p.z.abs() < 1e-4, "{:?}", p);
    }
}
