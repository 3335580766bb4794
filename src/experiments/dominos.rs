//! Draw a path on the floor, get a domino run along it, watch it topple.
//!
//! Left click adds a path point on the floor, right click lays dominos along
//! a Catmull-Rom curve through the points and pushes the first one.
//!
//! Toppling is kinematic: a falling domino pivots on its front bottom edge
//! under `ω' = (g / h) sin θ` until its top touches the next domino, where it
//! comes to rest and hands its momentum on. The last domino falls flat.

use glam::{Quat, Vec2, Vec3, Vec4};
use std::f32::consts::FRAC_PI_2;

use crate::config::{CameraOptions, ExperimentConfig};
use crate::experiment::{Experiment, FrameInfo, RenderContext};
use crate::geometry::{hex, Geometry};
use crate::input::MouseButton;
use crate::raycast::pointer_on_plane;
use crate::scene::{Fog, GeometryId, Light, Material, Mesh, NodeId, Polyline, Transform};
use crate::tween::{follow_factor, Ease, Tween};

pub const MAX_PATH_POINTS: usize = 500;
pub const DOMINO_SPACING: f32 = 2.0;
pub const DOMINO_SIZE: Vec3 = Vec3::new(1.2, 2.0, 0.5);
const GRAVITY: f32 = 9.82;
const FIRST_COLOR: u32 = 0xdd283c;
const LAST_COLOR: u32 = 0x3fa652;
/// Angular speed given to the first domino.
const PUSH_SPEED: f32 = 1.5;
/// Share of angular speed passed on at impact.
const TRANSFER: f32 = 0.8;
/// Dominos turning faster than this count as moving for the camera.
const MOVING_SPEED: f32 = 0.5;
/// Share of the distance to its goal the camera covers per 60 Hz frame.
const CAMERA_FOLLOW: f32 = 0.1;
const APPEAR_STAGGER: f32 = 0.1;
const APPEAR_DURATION: f32 = 0.5;
const PUSH_DELAY: f32 = 1.0;
const ARC_DIVISIONS: usize = 200;

/// Uniform Catmull-Rom spline through a list of points.
#[derive(Debug, Clone, Default)]
pub struct CatmullRom {
    pub points: Vec<Vec3>,
}

impl CatmullRom {
    pub fn new(points: Vec<Vec3>) -> Self {
        Self { points }
    }

    /// Point at `t` in `[0, 1]` along the whole curve (not arc-length).
    pub fn point(&self, t: f32) -> Vec3 {
        let n = self.points.len();
        match n {
            0 => return Vec3::ZERO,
            1 => return self.points[0],
            _ => {}
        }
        let scaled = t.clamp(0.0, 1.0) * (n - 1) as f32;
        let i = (scaled.floor() as usize).min(n - 2);
        let u = scaled - i as f32;

        let p1 = self.points[i];
        let p2 = self.points[i + 1];
        let p0 = if i > 0 { self.points[i - 1] } else { p1 * 2.0 - p2 };
        let p3 = if i + 2 < n { self.points[i + 2] } else { p2 * 2.0 - p1 };

        let u2 = u * u;
        let u3 = u2 * u;
        0.5 * ((2.0 * p1)
            + (p2 - p0) * u
            + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * u2
            + (3.0 * p1 - p0 - 3.0 * p2 + p3) * u3)
    }

    /// Cumulative chord lengths over `ARC_DIVISIONS` samples.
    fn arc_lengths(&self) -> Vec<f32> {
        let mut lengths = Vec::with_capacity(ARC_DIVISIONS + 1);
        let mut total = 0.0;
        let mut last = self.point(0.0);
        lengths.push(0.0);
        for i in 1..=ARC_DIVISIONS {
            let p = self.point(i as f32 / ARC_DIVISIONS as f32);
            total += p.distance(last);
            lengths.push(total);
            last = p;
        }
        lengths
    }

    pub fn length(&self) -> f32 {
        self.arc_lengths().last().copied().unwrap_or(0.0)
    }

    /// `divisions + 1` points evenly spaced by arc length.
    pub fn spaced_points(&self, divisions: usize) -> Vec<Vec3> {
        let lengths = self.arc_lengths();
        let total = lengths.last().copied().unwrap_or(0.0);
        let divisions = divisions.max(1);
        (0..=divisions)
            .map(|d| {
                let target = total * d as f32 / divisions as f32;
                let i = lengths.partition_point(|l| *l < target).clamp(1, ARC_DIVISIONS);
                let (a, b) = (lengths[i - 1], lengths[i]);
                let frac = if b > a { (target - a) / (b - a) } else { 0.0 };
                self.point((i as f32 - 1.0 + frac) / ARC_DIVISIONS as f32)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DominoState {
    Standing,
    Falling,
    Resting,
}

#[derive(Debug, Clone)]
pub struct Domino {
    /// Centre of the footprint on the floor.
    pub base: Vec3,
    pub yaw: f32,
    pub tilt: f32,
    pub omega: f32,
    pub state: DominoState,
    pub color: Vec4,
    pub appear: Tween<f32>,
}

impl Domino {
    pub fn forward(&self) -> Vec3 {
        Vec3::new(self.yaw.sin(), 0.0, self.yaw.cos())
    }

    /// World pose: pivot on the front bottom edge, tipped by `tilt`.
    pub fn transform(&self) -> Transform {
        let half = DOMINO_SIZE * 0.5;
        let rotation = Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(self.tilt);
        let pivot = self.base + self.forward() * half.z;
        let centre = pivot + rotation * Vec3::new(0.0, half.y, -half.z);
        Transform::from_translation(centre)
            .with_rotation(rotation)
            .with_scale(Vec3::splat(self.appear.value()))
    }
}

/// A line of dominos and their toppling state.
#[derive(Debug, Clone, Default)]
pub struct DominoRun {
    pub dominos: Vec<Domino>,
}

impl DominoRun {
    /// One domino per sample, each facing the next one.
    pub fn from_samples(samples: &[Vec3]) -> Self {
        let count = samples.len();
        let red = hex(FIRST_COLOR);
        let green = hex(LAST_COLOR);
        let mut yaw = 0.0;
        let dominos = samples
            .iter()
            .enumerate()
            .map(|(i, p)| {
                if let Some(next) = samples.get(i + 1) {
                    let d = *next - *p;
                    yaw = d.x.atan2(d.z);
                }
                Domino {
                    base: Vec3::new(p.x, 0.0, p.z),
                    yaw,
                    tilt: 0.0,
                    omega: 0.0,
                    state: DominoState::Standing,
                    color: red.lerp(green, i as f32 / count as f32),
                    appear: Tween::new(0.1, 1.0, APPEAR_DURATION)
                        .with_ease(Ease::Power1InOut)
                        .with_delay(i as f32 * APPEAR_STAGGER),
                }
            })
            .collect();
        Self { dominos }
    }

    pub fn len(&self) -> usize {
        self.dominos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dominos.is_empty()
    }

    /// Seconds until every domino has appeared.
    pub fn appear_time(&self) -> f32 {
        self.dominos
            .last()
            .map(|d| d.appear.delay + d.appear.duration)
            .unwrap_or(0.0)
    }

    pub fn push(&mut self, index: usize) {
        if let Some(d) = self.dominos.get_mut(index) {
            if d.state == DominoState::Standing {
                d.state = DominoState::Falling;
                d.omega = PUSH_SPEED;
            }
        }
    }

    /// Tilt at which domino `index` touches its successor, if it can reach it.
    pub fn contact_tilt(&self, index: usize) -> Option<f32> {
        let d = self.dominos.get(index)?;
        let next = self.dominos.get(index + 1)?;
        let gap = ((next.base - d.base).dot(d.forward()) - DOMINO_SIZE.z).max(0.0);
        (gap < DOMINO_SIZE.y).then(|| (gap / DOMINO_SIZE.y).asin())
    }

    pub fn step(&mut self, dt: f32) {
        for d in &mut self.dominos {
            d.appear.advance(dt);
        }
        for i in 0..self.dominos.len() {
            if self.dominos[i].state != DominoState::Falling {
                continue;
            }
            let limit = self.contact_tilt(i);
            let d = &mut self.dominos[i];
            d.omega += GRAVITY / DOMINO_SIZE.y * d.tilt.sin() * dt;
            d.tilt += d.omega * dt;

            let rest = limit.unwrap_or(FRAC_PI_2).min(FRAC_PI_2);
            if d.tilt < rest {
                continue;
            }
            d.tilt = rest;
            let handed = d.omega * TRANSFER;
            d.omega = 0.0;
            d.state = DominoState::Resting;
            if limit.is_some() {
                if let Some(next) = self.dominos.get_mut(i + 1) {
                    if next.state == DominoState::Standing {
                        next.state = DominoState::Falling;
                        next.omega = handed.max(PUSH_SPEED * 0.5);
                    }
                }
            }
        }
    }

    /// Whether a run was started and nothing is falling any more.
    pub fn is_settled(&self) -> bool {
        !self.dominos.iter().any(|d| d.state == DominoState::Falling)
            && self.dominos.iter().any(|d| d.state == DominoState::Resting)
    }

    /// Index of the fastest moving domino above the motion threshold.
    pub fn fastest(&self) -> Option<usize> {
        self.dominos
            .iter()
            .enumerate()
            .filter(|(_, d)| d.state == DominoState::Falling && d.omega > MOVING_SPEED)
            .max_by(|a, b| a.1.omega.total_cmp(&b.1.omega))
            .map(|(i, _)| i)
    }

    pub fn centroid(&self) -> Option<Vec3> {
        if self.dominos.is_empty() {
            return None;
        }
        let sum: Vec3 = self.dominos.iter().map(|d| d.transform().translation).sum();
        Some(sum / self.dominos.len() as f32)
    }
}

pub struct DominosExperiment {
    path: Vec<Vec3>,
    run: DominoRun,
    nodes: Vec<NodeId>,
    domino_geometry: Option<GeometryId>,
    path_line: Option<NodeId>,
    curve_line: Option<NodeId>,
    finished_path: bool,
    /// Seconds until the first domino is pushed.
    push_in: Option<f32>,
    run_started: bool,
    camera_target: Vec3,
}

impl DominosExperiment {
    pub fn new() -> Self {
        Self {
            path: Vec::new(),
            run: DominoRun::default(),
            nodes: Vec::new(),
            domino_geometry: None,
            path_line: None,
            curve_line: None,
            finished_path: false,
            push_in: None,
            run_started: false,
            camera_target: Vec3::ZERO,
        }
    }

    pub fn path(&self) -> &[Vec3] {
        &self.path
    }

    pub fn run(&self) -> &DominoRun {
        &self.run
    }

    pub fn camera_target(&self) -> Vec3 {
        self.camera_target
    }

    /// Append a path point where the pointer meets the floor.
    pub fn add_path_point(&mut self, ctx: &mut RenderContext, pointer: Vec2) -> bool {
        if self.path.len() >= MAX_PATH_POINTS {
            log::warn!("Path is full ({} points)", MAX_PATH_POINTS);
            return false;
        }
        let Some(hit) = pointer_on_plane(&ctx.camera, pointer, Vec3::ZERO, Vec3::Y) else {
            return false;
        };
        if self.path.last().is_some_and(|p| p.distance(hit) < 1e-3) {
            return false;
        }
        self.path.push(hit);

        let curve = CatmullRom::new(self.path.clone());
        if let Some(line) = self.path_line.and_then(|n| ctx.scene.line_mut(n)) {
            line.points = self.path.iter().map(|p| *p + Vec3::Y * 0.02).collect();
        }
        if let Some(line) = self.curve_line.and_then(|n| ctx.scene.line_mut(n)) {
            line.points = if self.path.len() > 1 {
                curve
                    .spaced_points(self.path.len() * 8)
                    .into_iter()
                    .map(|p| p + Vec3::Y * 0.2)
                    .collect()
            } else {
                Vec::new()
            };
        }
        true
    }

    /// Lay dominos along the path and schedule the push.
    pub fn finish_path(&mut self, ctx: &mut RenderContext) {
        self.finished_path = true;
        if let Some(orbit) = ctx.orbit.as_mut() {
            orbit.enabled = true;
        }
        if self.path.len() < 2 {
            log::info!("Need at least two path points for a domino run");
            return;
        }
        let curve = CatmullRom::new(self.path.clone());
        let divisions = (curve.length() / DOMINO_SPACING).floor().max(1.0) as usize;
        self.run = DominoRun::from_samples(&curve.spaced_points(divisions));

        let Some(geometry) = self.domino_geometry else { return };
        let root = ctx.scene.root();
        for domino in &self.run.dominos {
            let node = ctx.scene.add_mesh(
                root,
                domino.transform(),
                Mesh {
                    geometry,
                    material: Material::lit(domino.color),
                },
            );
            self.nodes.push(node);
        }
        self.push_in = Some(self.run.appear_time() + PUSH_DELAY);
        log::info!("Placed {} dominos", self.run.len());
    }

    fn follow(&mut self, ctx: &mut RenderContext, delta: f32) {
        let goal = if self.run_started {
            self.run
                .fastest()
                .map(|i| self.run.dominos[i].transform().translation)
        } else {
            self.run.centroid()
        };
        let Some(goal) = goal else { return };
        self.camera_target = self.camera_target.lerp(goal, follow_factor(CAMERA_FOLLOW, delta));
        ctx.camera.target = self.camera_target;
        if let Some(orbit) = ctx.orbit.as_mut() {
            orbit.set_target(self.camera_target);
        }
    }
}

impl Default for DominosExperiment {
    fn default() -> Self {
        Self::new()
    }
}

impl Experiment for DominosExperiment {
    fn config(&self) -> ExperimentConfig {
        ExperimentConfig::new("Dominos")
            .with_orbit_controls(true)
            .with_ico_background(true)
            .with_camera(CameraOptions::default().far(10_000.0).position(Vec3::splat(10.0)))
    }

    fn init(&mut self, ctx: &mut RenderContext) {
        ctx.scene.fog = Some(Fog {
            color: hex(0x565b5e).truncate(),
            near: 0.0,
            far: 100.0,
        });
        ctx.scene.add_light(Light::Ambient {
            color: hex(0x3d4143).truncate(),
            intensity: 1.0,
        });
        ctx.scene.add_light(Light::Directional {
            direction: Vec3::new(300.0, 1000.0, 500.0),
            color: Vec3::ONE,
            intensity: 1.0,
        });

        let root = ctx.scene.root();
        let floor = ctx.scene.add_geometry(Geometry::plane(400.0, 400.0, 1, 1));
        ctx.scene.add_mesh(
            root,
            Transform::IDENTITY.with_rotation(Quat::from_rotation_x(-FRAC_PI_2)),
            Mesh {
                geometry: floor,
                material: Material::lit(hex(0x777777)),
            },
        );
        self.domino_geometry = Some(ctx.scene.add_geometry(Geometry::cuboid(
            DOMINO_SIZE.x,
            DOMINO_SIZE.y,
            DOMINO_SIZE.z,
        )));
        self.path_line = Some(ctx.scene.add_line(
            root,
            Polyline {
                points: Vec::new(),
                color: hex(0xff0000),
            },
        ));
        self.curve_line = Some(ctx.scene.add_line(
            root,
            Polyline {
                points: Vec::new(),
                color: Vec4::new(1.0, 1.0, 1.0, 0.5),
            },
        ));

        // left drags would otherwise orbit while placing points
        if let Some(orbit) = ctx.orbit.as_mut() {
            orbit.enabled = false;
        }
    }

    fn on_frame(&mut self, ctx: &mut RenderContext, frame: &FrameInfo) {
        if let Some(remaining) = self.push_in.as_mut() {
            *remaining -= frame.delta;
            if *remaining <= 0.0 {
                self.push_in = None;
                self.run.push(0);
                self.run_started = true;
                log::debug!("Run started");
            }
        }

        self.run.step(frame.delta);
        for (domino, node) in self.run.dominos.iter().zip(&self.nodes) {
            ctx.scene.set_transform(*node, domino.transform());
        }
        self.follow(ctx, frame.delta);
    }

    fn on_pointer_down(&mut self, ctx: &mut RenderContext, button: MouseButton, pointer: Vec2) {
        if self.finished_path {
            return;
        }
        match button {
            MouseButton::Left => {
                self.add_path_point(ctx, pointer);
            }
            MouseButton::Right => self.finish_path(ctx),
            MouseButton::Middle => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(count: usize, spacing: f32) -> Vec<Vec3> {
        (0..count).map(|i| Vec3::new(0.0, 0.0, i as f32 * spacing)).collect()
    }

    fn settle(run: &mut DominoRun) {
        for _ in 0..60 * 30 {
            run.step(1.0 / 60.0);
            if run.is_settled() {
                return;
            }
        }
        panic!("run never settled");
    }

    #[test]
    fn test_curve_passes_through_points() {
        let curve = CatmullRom::new(vec![Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 4.0)]);
        assert!(curve.point(0.0).distance(Vec3::ZERO) < 1e-5);
        assert!(curve.point(0.5).distance(Vec3::new(4.0, 0.0, 0.0)) < 1e-5);
        assert!(curve.point(1.0).distance(Vec3::new(4.0, 0.0, 4.0)) < 1e-5);
    }

    #[test]
    fn test_spaced_points_are_even() {
        let curve = CatmullRom::new(vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)]);
        assert!((curve.length() - 10.0).abs() < 1e-3);
        let points = curve.spaced_points(5);
        assert_eq!(points.len(), 6);
        for pair in points.windows(2) {
            assert!((pair[0].distance(pair[1]) - 2.0).abs() < 1e-2);
        }
    }

    #[test]
    fn test_dominos_face_the_next_one() {
        let run = DominoRun::from_samples(&[Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 0.0)]);
        for d in &run.dominos {
            assert!(d.forward().distance(Vec3::X) < 1e-5);
        }
        assert_eq!(run.dominos[0].color, hex(FIRST_COLOR));
    }

    #[test]
    fn test_standing_domino_rests_on_floor() {
        let mut run = DominoRun::from_samples(&[Vec3::ZERO]);
        run.dominos[0].appear.advance(10.0);
        let t = run.dominos[0].transform();
        assert!((t.translation.y - DOMINO_SIZE.y / 2.0).abs() < 1e-5);
        assert!(t.translation.distance(Vec3::new(0.0, 1.0, 0.0)) < 1e-5);
    }

    #[test]
    fn test_chain_topples_in_order() {
        let mut run = DominoRun::from_samples(&line(6, DOMINO_SPACING));
        run.push(0);
        settle(&mut run);

        let lean = run.contact_tilt(0).unwrap();
        assert!((lean - (1.5f32 / 2.0).asin()).abs() < 1e-5);
        for d in &run.dominos[..5] {
            assert_eq!(d.state, DominoState::Resting);
            assert!((d.tilt - lean).abs() < 1e-5);
        }
        let last = &run.dominos[5];
        assert_eq!(last.state, DominoState::Resting);
        assert!((last.tilt - FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_out_of_reach_domino_stays_up() {
        let mut run = DominoRun::from_samples(&line(2, 5.0));
        assert!(run.contact_tilt(0).is_none());
        run.push(0);
        settle(&mut run);
        assert!((run.dominos[0].tilt - FRAC_PI_2).abs() < 1e-5);
        assert_eq!(run.dominos[1].state, DominoState::Standing);
    }

    #[test]
    fn test_right_click_lays_run() {
        let mut experiment = DominosExperiment::new();
        let mut ctx = RenderContext::new(&experiment.config(), 800, 600);
        experiment.init(&mut ctx);
        assert!(!ctx.orbit.as_ref().unwrap().enabled);

        for pointer in [Vec2::new(-0.5, -0.3), Vec2::new(0.0, -0.2), Vec2::new(0.5, -0.3)] {
            assert!(experiment.add_path_point(&mut ctx, pointer));
        }
        experiment.finish_path(&mut ctx);
        assert!(ctx.orbit.as_ref().unwrap().enabled);
        assert!(!experiment.run().is_empty());
        for d in &experiment.run().dominos {
            assert!(d.base.y.abs() < 1e-5);
        }
    }

    #[test]
    fn test_camera_follow_ignores_frame_rate() {
        let laid = || {
            let mut experiment = DominosExperiment::new();
            let mut ctx = RenderContext::new(&experiment.config(), 800, 600);
            experiment.init(&mut ctx);
            for pointer in [Vec2::new(-0.5, -0.3), Vec2::new(0.5, -0.3)] {
                experiment.add_path_point(&mut ctx, pointer);
            }
            experiment.finish_path(&mut ctx);
            for d in &mut experiment.run.dominos {
                d.appear.advance(100.0);
            }
            (experiment, ctx)
        };

        let (mut fast, mut fast_ctx) = laid();
        for _ in 0..6 {
            fast.follow(&mut fast_ctx, 1.0 / 60.0);
        }
        let (mut slow, mut slow_ctx) = laid();
        for _ in 0..3 {
            slow.follow(&mut slow_ctx, 1.0 / 30.0);
        }

        let goal = fast.run().centroid().unwrap();
        assert!(fast.camera_target().distance(goal) > 1e-3);
        assert!(fast.camera_target().distance(slow.camera_target()) < 1e-4);
        assert_eq!(slow_ctx.camera.target, slow.camera_target());
    }
}
