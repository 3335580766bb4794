//! Fibonacci sphere sampling and its stereographic projection.
//!
//! Small cubes fly out to evenly spread points on a unit sphere, flatten onto
//! the projection plane, then return to the sphere. On the way back a surface
//! appears over the points, meshed by a Delaunay triangulation of their
//! projection.

use glam::{Vec2, Vec3, Vec4};

use crate::config::{BloomParams, CameraOptions, ExperimentConfig};
use crate::controls::{Controls, ParamValue, Tweakable};
use crate::experiment::{Experiment, FrameInfo, RenderContext};
use crate::geometry::{Geometry, Vertex};
use crate::scene::{Light, Material, Mesh, NodeId, Transform};
use crate::tween::Tween;

/// Offset applied to every sphere point.
pub const LIFT: Vec3 = Vec3::new(0.0, 2.0, 0.0);

#[derive(Debug, Clone, PartialEq)]
pub struct SphereParams {
    pub samples: usize,
    /// Multiplies the per-cube start delay.
    pub animation_speed: f32,
    /// Start delay between consecutive cubes at speed 1.
    pub stagger: f32,
    pub duration: f32,
    pub cube_size: f32,
}

impl Default for SphereParams {
    fn default() -> Self {
        Self {
            samples: 700,
            animation_speed: 1.0,
            stagger: 0.003,
            duration: 0.1,
            cube_size: 0.03,
        }
    }
}

impl Tweakable for SphereParams {
    fn register(&self, controls: &mut Controls) {
        controls
            .folder("Sphere")
            .add_float("animationSpeed", "animation speed", self.animation_speed, 0.01, 10.0, 0.01)
            .add_float("samples", "samples", self.samples as f32, 10.0, 2000.0, 1.0)
            .add_button("restart", "restart");
    }

    fn apply(&mut self, key: &str, value: &ParamValue) -> bool {
        match key {
            "animationSpeed" => value.as_f32().map(|v| self.animation_speed = v).is_some(),
            "samples" => value.as_f32().map(|v| self.samples = v as usize).is_some(),
            _ => false,
        }
    }
}

/// `samples` points spread over the unit sphere along a golden-angle spiral,
/// from the north pole down.
pub fn fibonacci_sphere(samples: usize) -> Vec<Vec3> {
    let golden = std::f32::consts::PI * (3.0 - 5f32.sqrt());
    let last = samples.saturating_sub(1).max(1) as f32;
    (0..samples)
        .map(|i| {
            let y = 1.0 - (i as f32 / last) * 2.0;
            let radius = (1.0 - y * y).max(0.0).sqrt();
            let theta = golden * i as f32;
            Vec3::new(theta.cos() * radius, y, theta.sin() * radius)
        })
        .collect()
}

/// Project a unit-sphere point from the north pole onto the `y = 0` plane.
///
/// The pole itself has no image.
pub fn stereographic(point: Vec3) -> Option<Vec2> {
    let denom = 1.0 - point.y;
    if denom.abs() < 1e-6 {
        return None;
    }
    Some(Vec2::new(point.x / denom, point.z / denom))
}

/// Mesh over lifted unit-sphere `points`, triangulated in the stereographic
/// plane. Points without a projection are left out of the triangulation but
/// keep their vertex, so indices match `points`.
pub fn sphere_mesh(points: &[Vec3]) -> Geometry {
    let (sources, projected): (Vec<usize>, Vec<delaunator::Point>) = points
        .iter()
        .enumerate()
        .filter_map(|(i, p)| {
            let q = stereographic(*p)?;
            let point = delaunator::Point {
                x: q.x as f64,
                y: q.y as f64,
            };
            (q.x.is_finite() && q.y.is_finite()).then_some((i, point))
        })
        .unzip();
    let triangulation = delaunator::triangulate(&projected);

    let mut geometry = Geometry {
        vertices: points
            .iter()
            .map(|p| Vertex::new(*p + LIFT, *p, Vec4::ONE))
            .collect(),
        indices: triangulation
            .triangles
            .iter()
            .map(|&i| sources[i] as u32)
            .collect(),
        version: 0,
    };
    geometry.recompute_normals();
    geometry
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Gather,
    Project,
    Restore,
    Done,
}

pub struct SphereExperiment {
    pub params: SphereParams,
    points: Vec<Vec3>,
    cubes: Vec<NodeId>,
    moves: Vec<Tween<Vec3>>,
    surface: Option<NodeId>,
    phase: Phase,
}

impl SphereExperiment {
    pub fn new() -> Self {
        Self {
            params: SphereParams::default(),
            points: Vec::new(),
            cubes: Vec::new(),
            moves: Vec::new(),
            surface: None,
            phase: Phase::Done,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cubes(&self) -> &[NodeId] {
        &self.cubes
    }

    /// Triangulated sphere surface, present from the restore phase on.
    pub fn surface(&self) -> Option<NodeId> {
        self.surface
    }

    /// Sphere positions, lifted.
    pub fn sphere_positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.points.iter().map(|p| *p + LIFT)
    }

    fn delay(&self, i: usize) -> f32 {
        i as f32 * self.params.stagger * self.params.animation_speed
    }

    /// Remove any cubes and start over from the origin.
    fn rebuild(&mut self, ctx: &mut RenderContext) {
        for node in self.cubes.drain(..).chain(self.surface.take()) {
            ctx.scene.remove(node);
        }
        self.points = fibonacci_sphere(self.params.samples);

        let geometry = ctx.scene.add_geometry(Geometry::cuboid(1.0, 1.0, 1.0));
        let root = ctx.scene.root();
        let scale = Vec3::splat(self.params.cube_size);
        self.cubes = (0..self.points.len())
            .map(|_| {
                ctx.scene.add_mesh(
                    root,
                    Transform::from_translation(Vec3::ZERO).with_scale(scale),
                    Mesh {
                        geometry,
                        material: Material::normal(),
                    },
                )
            })
            .collect();

        self.moves = self
            .sphere_positions()
            .enumerate()
            .map(|(i, to)| Tween::new(Vec3::ZERO, to, self.params.duration).with_delay(self.delay(i)))
            .collect();
        self.phase = Phase::Gather;
        log::info!("Sampling {} sphere points", self.points.len());
    }

    fn retarget_all(&mut self, targets: Vec<Vec3>) {
        for (i, target) in targets.into_iter().enumerate() {
            let delay = self.delay(i);
            if let Some(tween) = self.moves.get_mut(i) {
                tween.retarget(target);
                tween.duration = self.params.duration;
                tween.delay = delay;
            }
        }
    }

    fn add_surface(&mut self, ctx: &mut RenderContext) {
        let mesh = sphere_mesh(&self.points);
        log::debug!("Triangulated sphere into {} faces", mesh.indices.len() / 3);
        let geometry = ctx.scene.add_geometry(mesh);
        let root = ctx.scene.root();
        self.surface = Some(ctx.scene.add_mesh(
            root,
            Transform::IDENTITY,
            Mesh {
                geometry,
                material: Material::normal(),
            },
        ));
    }

    fn next_phase(&mut self, ctx: &mut RenderContext) {
        self.phase = match self.phase {
            Phase::Gather => {
                let flat = self
                    .points
                    .iter()
                    .map(|p| match stereographic(*p) {
                        Some(q) => Vec3::new(q.x, 0.0, q.y),
                        None => *p + LIFT,
                    })
                    .collect();
                self.retarget_all(flat);
                Phase::Project
            }
            Phase::Project => {
                let back = self.sphere_positions().collect();
                self.retarget_all(back);
                self.add_surface(ctx);
                Phase::Restore
            }
            Phase::Restore | Phase::Done => Phase::Done,
        };
        log::debug!("Sphere phase {:?}", self.phase);
    }
}

impl Default for SphereExperiment {
    fn default() -> Self {
        Self::new()
    }
}

impl Experiment for SphereExperiment {
    fn config(&self) -> ExperimentConfig {
        ExperimentConfig::new("Fibonacci Sphere")
            .with_orbit_controls(true)
            .with_ico_background(true)
            .with_fps_counter(true)
            .with_bloom(BloomParams {
                threshold: 0.7,
                ..BloomParams::default()
            })
            .with_camera(
                CameraOptions::default()
                    .far(10000.0)
                    .position(Vec3::new(0.0, 5.0, 5.0))
                    .target(Vec3::ZERO),
            )
    }

    fn init(&mut self, ctx: &mut RenderContext) {
        ctx.scene.add_light(Light::Point {
            position: Vec3::new(0.0, 5.0, 5.0),
            color: Vec3::ONE,
            intensity: 1.0,
            range: 100.0,
        });
        self.params.register(&mut ctx.controls);
        self.rebuild(ctx);
    }

    fn on_frame(&mut self, ctx: &mut RenderContext, frame: &FrameInfo) {
        if self.phase == Phase::Done {
            return;
        }
        let mut finished = true;
        for (tween, node) in self.moves.iter_mut().zip(&self.cubes) {
            let position = tween.advance(frame.delta);
            finished &= tween.is_finished();
            if let Some(t) = ctx.scene.transform_mut(*node) {
                t.translation = position;
            }
        }
        if finished {
            self.next_phase(ctx);
        }
    }

    fn on_control(&mut self, ctx: &mut RenderContext, key: &str, value: &ParamValue) {
        if key == "restart" {
            self.rebuild(ctx);
            return;
        }
        let resample = key == "samples";
        if self.params.apply(key, value) && resample {
            self.rebuild(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::advance_frame;
    use crate::time::Clock;

    #[test]
    fn test_points_lie_on_unit_sphere() {
        let points = fibonacci_sphere(700);
        assert_eq!(points.len(), 700);
        assert!((points[0] - Vec3::Y).length() < 1e-5);
        assert!((points[699] - Vec3::NEG_Y).length() < 1e-5);
        for p in &points {
            assert!((p.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_points_are_spread_evenly() {
        let points = fibonacci_sphere(500);
        let north = points.iter().filter(|p| p.y > 0.0).count();
        assert!((north as i32 - 250).abs() <= 2);
        let east = points.iter().filter(|p| p.x > 0.0).count();
        assert!((east as i32 - 250).abs() < 25);
    }

    #[test]
    fn test_stereographic_projection() {
        assert_eq!(stereographic(Vec3::NEG_Y), Some(Vec2::ZERO));
        assert_eq!(stereographic(Vec3::X), Some(Vec2::new(1.0, 0.0)));
        assert_eq!(stereographic(Vec3::Y), None);
        // upper hemisphere lands outside the unit circle
        let p = Vec3::new(0.6, 0.8, 0.0);
        assert!(stereographic(p).unwrap().length() > 1.0);
    }

    #[test]
    fn test_cubes_fly_out_flatten_and_return() {
        let mut experiment = SphereExperiment::new();
        experiment.params.samples = 20;
        let mut ctx = RenderContext::new(&experiment.config(), 640, 480);
        ctx.clock = Clock::fixed(1.0 / 60.0);
        experiment.init(&mut ctx);
        assert_eq!(experiment.phase(), Phase::Gather);

        let mut saw_flat = false;
        for _ in 0..300 {
            advance_frame(&mut experiment, &mut ctx);
            if experiment.phase() == Phase::Restore && !saw_flat {
                // the projection phase just ended; every cube but the pole is flat
                saw_flat = experiment.cubes()[1..]
                    .iter()
                    .all(|n| ctx.scene.transform(*n).unwrap().translation.y.abs() < 1e-4);
            }
        }
        assert!(saw_flat);
        assert_eq!(experiment.phase(), Phase::Done);
        let surface = experiment.surface().unwrap();
        assert!(ctx.scene.transform(surface).is_some());

        let targets: Vec<Vec3> = experiment.sphere_positions().collect();
        for (node, target) in experiment.cubes().iter().zip(targets) {
            let at = ctx.scene.transform(*node).unwrap().translation;
            assert!((at - target).length() < 1e-4);
        }
    }

    #[test]
    fn test_surface_indexes_sphere_points() {
        let points = fibonacci_sphere(200);
        let mesh = sphere_mesh(&points);
        assert_eq!(mesh.vertices.len(), 200);
        assert!(mesh.indices.len() / 3 > 0);
        assert_eq!(mesh.indices.len() % 3, 0);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < 200));
        // the north pole has no projection
        assert!(!mesh.indices.contains(&0));
        assert!((mesh.vertices[1].position() - (points[1] + LIFT)).length() < 1e-6);
    }

    #[test]
    fn test_speed_scales_stagger() {
        let mut experiment = SphereExperiment::new();
        experiment.params.animation_speed = 2.0;
        assert!((experiment.delay(10) - 0.06).abs() < 1e-6);
    }

    #[test]
    fn test_restart_resamples() {
        let mut experiment = SphereExperiment::new();
        experiment.params.samples = 30;
        let mut ctx = RenderContext::new(&experiment.config(), 640, 480);
        ctx.clock = Clock::fixed(1.0 / 60.0);
        experiment.init(&mut ctx);
        let before = ctx.scene.len();

        ctx.controls.set("samples", ParamValue::Float(50.0)).unwrap();
        advance_frame(&mut experiment, &mut ctx);
        assert_eq!(experiment.cubes().len(), 50);
        assert_eq!(ctx.scene.len(), before + 20);
        assert_eq!(experiment.phase(), Phase::Gather);
    }
}
