//! Thousands of small primitives bobbing in place, lit by a fixed red light
//! and a blue light that follows the pointer.

use glam::{EulerRot, Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{BloomParams, CameraOptions, ExperimentConfig};
use crate::experiment::{Experiment, FrameInfo, RenderContext};
use crate::geometry::{hex, Geometry};
use crate::raycast::pointer_on_plane;
use crate::scene::{GeometryId, Light, Material, Mesh, NodeId, Transform};
use crate::tween::follow_factor;

const BOB: f32 = 0.005;
const LIGHT_FOLLOW: f32 = 0.1;
const LIGHT_RANGE: f32 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FloatingParams {
    pub count: usize,
    /// Edge length of the cube the objects are scattered in.
    pub extent: f32,
    pub max_scale: f32,
}

impl Default for FloatingParams {
    fn default() -> Self {
        Self {
            count: 2000,
            extent: 20.0,
            max_scale: 0.4,
        }
    }
}

/// The six shapes objects are drawn from.
pub fn primitives() -> [Geometry; 6] {
    [
        Geometry::cuboid(1.0, 1.0, 1.0),
        Geometry::uv_sphere(1.0, 12, 12),
        Geometry::cylinder(1.0, 1.0, 32),
        Geometry::torus(1.0, 0.3, 32, 100),
        Geometry::octahedron(1.0),
        Geometry::icosahedron(1.0),
    ]
}

#[derive(Debug, Clone)]
struct Floater {
    node: NodeId,
    phase: f32,
}

pub struct FloatingExperiment {
    pub params: FloatingParams,
    rng: StdRng,
    floaters: Vec<Floater>,
    pointer_light: Option<usize>,
    light_position: Vec3,
}

impl FloatingExperiment {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            params: FloatingParams::default(),
            rng,
            floaters: Vec::new(),
            pointer_light: None,
            light_position: Vec3::new(0.0, 0.0, 5.0),
        }
    }

    pub fn light_position(&self) -> Vec3 {
        self.light_position
    }

    pub fn object_count(&self) -> usize {
        self.floaters.len()
    }

    fn scatter(&mut self, ctx: &mut RenderContext, shapes: &[GeometryId]) {
        let root = ctx.scene.root();
        let half = self.params.extent / 2.0;
        for _ in 0..self.params.count {
            let geometry = shapes[self.rng.gen_range(0..shapes.len())];
            let position = Vec3::new(
                self.rng.gen_range(-half..half),
                self.rng.gen_range(-half..half),
                self.rng.gen_range(-half..half),
            );
            let rotation = Quat::from_euler(
                EulerRot::XYZ,
                self.rng.gen_range(0.0..std::f32::consts::TAU),
                self.rng.gen_range(0.0..std::f32::consts::TAU),
                0.0,
            );
            let scale = self.rng.gen_range(0.0..self.params.max_scale);
            let node = ctx.scene.add_mesh(
                root,
                Transform::from_translation(position)
                    .with_rotation(rotation)
                    .with_scale(Vec3::splat(scale)),
                Mesh {
                    geometry,
                    material: Material::lit(glam::Vec4::ONE),
                },
            );
            self.floaters.push(Floater {
                node,
                phase: self.rng.gen_range(0.0..10.0),
            });
        }
    }
}

impl Default for FloatingExperiment {
    fn default() -> Self {
        Self::new()
    }
}

impl Experiment for FloatingExperiment {
    fn config(&self) -> ExperimentConfig {
        ExperimentConfig::new("Floating")
            .with_orbit_controls(true)
            .with_bloom(BloomParams::default())
            .with_camera(CameraOptions::default().position(Vec3::new(0.0, 0.0, 7.0)))
    }

    fn init(&mut self, ctx: &mut RenderContext) {
        ctx.scene.add_light(Light::Point {
            position: Vec3::splat(5.0),
            color: hex(0xe30056).truncate(),
            intensity: 1.0,
            range: LIGHT_RANGE,
        });
        self.pointer_light = Some(ctx.scene.add_light(Light::Point {
            position: self.light_position,
            color: hex(0x00aff2).truncate(),
            intensity: 1.0,
            range: LIGHT_RANGE,
        }));

        let shapes: Vec<GeometryId> = primitives()
            .into_iter()
            .map(|g| ctx.scene.add_geometry(g))
            .collect();
        self.scatter(ctx, &shapes);
        log::info!("Scattered {} objects", self.floaters.len());
    }

    fn on_frame(&mut self, ctx: &mut RenderContext, frame: &FrameInfo) {
        let frames = frame.delta * 60.0;
        for floater in &self.floaters {
            if let Some(t) = ctx.scene.transform_mut(floater.node) {
                t.translation.y += (floater.phase + frame.elapsed).sin() * BOB * frames;
            }
        }

        if let Some(goal) = pointer_on_plane(&ctx.camera, frame.pointer, Vec3::ZERO, Vec3::Z) {
            self.light_position = self.light_position.lerp(goal, follow_factor(LIGHT_FOLLOW, frame.delta));
        }
        if let Some(Light::Point { position, .. }) = self.pointer_light.and_then(|i| ctx.scene.lights.get_mut(i)) {
            *position = self.light_position;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::advance_frame;
    use crate::time::Clock;

    fn boot(count: usize) -> (FloatingExperiment, RenderContext) {
        let mut experiment = FloatingExperiment::with_rng(StdRng::seed_from_u64(21));
        experiment.params.count = count;
        let mut ctx = RenderContext::new(&experiment.config(), 800, 600);
        ctx.clock = Clock::fixed(1.0 / 60.0);
        experiment.init(&mut ctx);
        (experiment, ctx)
    }

    #[test]
    fn test_objects_fill_the_cube() {
        let (experiment, ctx) = boot(300);
        assert_eq!(experiment.object_count(), 300);
        for floater in &experiment.floaters {
            let t = ctx.scene.transform(floater.node).unwrap();
            assert!(t.translation.abs().max_element() <= 10.0);
            assert!(t.scale.x < 0.4);
        }
    }

    #[test]
    fn test_pointer_light_eases_toward_pointer() {
        let (mut experiment, mut ctx) = boot(10);
        // pointer centre projects to the origin on z = 0
        ctx.input.move_pointer(glam::Vec2::new(400.0, 300.0));

        let start = experiment.light_position().distance(Vec3::ZERO);
        advance_frame(&mut experiment, &mut ctx);
        let after_one = experiment.light_position().distance(Vec3::ZERO);
        assert!((after_one - start * 0.9).abs() < 1e-4);

        for _ in 0..200 {
            advance_frame(&mut experiment, &mut ctx);
        }
        assert!(experiment.light_position().length() < 1e-3);
        let Light::Point { position, .. } = ctx.scene.lights[experiment.pointer_light.unwrap()] else {
            panic!("pointer light is not a point light");
        };
        assert_eq!(position, experiment.light_position());
    }
}
