//! Interactive 4×4×4 Rubik's cube.
//!
//! [`CubeEngine`] owns the cube poses and the move log; this module mirrors
//! them onto render meshes every frame and wires up the panel, keyboard and
//! click picking.

pub mod engine;

pub use engine::{
    resolve, shuffle, Axis, CubeConfig, CubeEngine, CubeId, Direction, Move, Phase, RotationTask, Snapshot,
    FACE_COLORS,
};

use glam::{Vec2, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::config::{CameraOptions, ExperimentConfig};
use crate::controls::ParamValue;
use crate::experiment::{Experiment, FrameInfo, RenderContext};
use crate::geometry::{hex, Geometry};
use crate::input::{KeyCode, MouseButton};
use crate::scene::{Fog, Light, Material, Mesh, NodeId, Transform};
use crate::tween::{Ease, Tween};

/// Seconds between two cubes starting their fly-in.
const INTRO_STAGGER: f32 = 0.005;
const INTRO_FLIGHT: f32 = 1.0;
const INTRO_GROW: f32 = 0.5;
const INTRO_START_SCALE: f32 = 0.1;

/// Fly-in of one cube from the origin to its lattice slot.
#[derive(Debug, Clone, Copy)]
struct Intro {
    position: Tween<Vec3>,
    scale: Tween<f32>,
}

impl Intro {
    fn new(index: usize, target: Vec3) -> Self {
        let delay = index as f32 * INTRO_STAGGER;
        Self {
            position: Tween::new(Vec3::ZERO, target, INTRO_FLIGHT)
                .with_ease(Ease::Power3InOut)
                .with_delay(delay),
            scale: Tween::new(INTRO_START_SCALE, 1.0, INTRO_GROW)
                .with_ease(Ease::Power4Out)
                .with_delay(delay + INTRO_FLIGHT),
        }
    }

    fn advance(&mut self, dt: f32) -> Transform {
        let position = self.position.advance(dt);
        let scale = self.scale.advance(dt);
        Transform::from_translation(position).with_scale(Vec3::splat(scale))
    }

    fn is_finished(&self) -> bool {
        self.position.is_finished() && self.scale.is_finished()
    }
}

/// Rubik's cube experiment.
pub struct RubiksExperiment {
    engine: Rc<RefCell<CubeEngine>>,
    meshes: Vec<NodeId>,
    intro: Vec<Intro>,
    /// Set while a shuffle or resolve sequence owns the engine.
    sequence: Rc<Cell<bool>>,
    seed: Option<u64>,
}

impl RubiksExperiment {
    pub fn new() -> Self {
        Self::with_config(CubeConfig::default())
    }

    pub fn with_config(config: CubeConfig) -> Self {
        Self {
            engine: Rc::new(RefCell::new(CubeEngine::new(config))),
            meshes: Vec::new(),
            intro: Vec::new(),
            sequence: Rc::new(Cell::new(false)),
            seed: None,
        }
    }

    /// Use a fixed seed for shuffles.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn engine(&self) -> Rc<RefCell<CubeEngine>> {
        Rc::clone(&self.engine)
    }

    /// Render node of each cube, indexed by [`CubeId`].
    pub fn meshes(&self) -> &[NodeId] {
        &self.meshes
    }

    pub fn intro_finished(&self) -> bool {
        self.intro.is_empty()
    }

    /// Whether user moves are accepted right now.
    pub fn accepts_moves(&self) -> bool {
        self.intro_finished() && !self.sequence.get() && !self.engine.borrow().is_rotating()
    }

    fn start_sequence(&mut self, ctx: &mut RenderContext, shuffle_moves: bool) {
        if !self.intro_finished() || self.sequence.get() {
            log::debug!("Ignoring sequence request while the cube is busy");
            return;
        }
        let engine = Rc::clone(&self.engine);
        let busy = Rc::clone(&self.sequence);
        busy.set(true);

        if shuffle_moves {
            let rng = match self.seed.take() {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            ctx.tasks.spawn(async move {
                if let Err(e) = shuffle(engine, rng).await {
                    log::warn!("Shuffle stopped: {}", e);
                }
                busy.set(false);
            });
        } else {
            ctx.tasks.spawn(async move {
                if let Err(e) = resolve(engine).await {
                    log::warn!("Resolve stopped: {}", e);
                }
                busy.set(false);
            });
        }
    }

    fn undo(&mut self) {
        if !self.accepts_moves() {
            return;
        }
        match self.engine.borrow_mut().undo() {
            None => log::debug!("Nothing to undo"),
            Some(Ok(_task)) => {}
            Some(Err(e)) => log::warn!("Undo rejected: {}", e),
        }
    }

    fn cube_at(&self, node: NodeId) -> Option<CubeId> {
        self.meshes.iter().position(|n| *n == node).map(CubeId)
    }

    fn sync_meshes(&mut self, ctx: &mut RenderContext, dt: f32) {
        if !self.intro.is_empty() {
            for (intro, node) in self.intro.iter_mut().zip(&self.meshes) {
                ctx.scene.set_transform(*node, intro.advance(dt));
            }
            if self.intro.iter().all(Intro::is_finished) {
                self.intro.clear();
                log::debug!("Intro finished");
            } else {
                return;
            }
        }
        let engine = self.engine.borrow();
        for (id, node) in engine.cube_ids().zip(&self.meshes) {
            if let Some(t) = engine.world_transform(id) {
                ctx.scene.set_transform(*node, t);
            }
        }
    }
}

impl Default for RubiksExperiment {
    fn default() -> Self {
        Self::new()
    }
}

impl Experiment for RubiksExperiment {
    fn config(&self) -> ExperimentConfig {
        ExperimentConfig::new("Rubik's Cube")
            .with_orbit_controls(true)
            .with_ico_background(true)
            .with_camera(
                CameraOptions::default()
                    .fov(75.0)
                    .far(1000.0)
                    .position(Vec3::splat(7.0))
                    .target(Vec3::ZERO),
            )
    }

    fn init(&mut self, ctx: &mut RenderContext) {
        ctx.scene.fog = Some(Fog {
            color: hex(0x565B5E).truncate(),
            near: 0.0,
            far: 100.0,
        });
        ctx.scene.add_light(Light::Ambient {
            color: hex(0x3D4143).truncate(),
            intensity: 1.0,
        });
        ctx.scene.add_light(Light::Directional {
            direction: Vec3::new(300.0, 1000.0, 500.0),
            color: Vec3::ONE,
            intensity: 1.0,
        });

        let faces = FACE_COLORS.map(hex);
        let geometry = ctx.scene.add_geometry(Geometry::colored_cuboid(Vec3::ONE, faces));
        let root = ctx.scene.root();

        let engine = self.engine.borrow();
        self.meshes.clear();
        self.intro.clear();
        for id in engine.cube_ids() {
            let target = engine.world_position(id).unwrap_or(Vec3::ZERO);
            let intro = Intro::new(id.0, target);
            let node = ctx.scene.add_mesh(
                root,
                Transform::IDENTITY.with_scale(Vec3::splat(INTRO_START_SCALE)),
                Mesh {
                    geometry,
                    material: Material::unlit(Vec4::ONE),
                },
            );
            self.meshes.push(node);
            self.intro.push(intro);
        }
        drop(engine);

        ctx.controls
            .folder("Rubik's Cube")
            .add_button("shuffle", "Shuffle")
            .add_button("resolve", "Resolve")
            .add_button("undo", "Undo");

        log::info!("Built {} cubes", self.meshes.len());
    }

    fn on_frame(&mut self, ctx: &mut RenderContext, frame: &FrameInfo) {
        self.engine.borrow_mut().tick(frame.delta);
        self.sync_meshes(ctx, frame.delta);
    }

    fn on_pointer_down(&mut self, ctx: &mut RenderContext, button: MouseButton, _pointer: Vec2) {
        if !self.accepts_moves() {
            return;
        }
        let axis = if ctx.input.key_held(KeyCode::Shift) {
            Axis::Z
        } else {
            match button {
                MouseButton::Left => Axis::Y,
                MouseButton::Right => Axis::X,
                MouseButton::Middle => return,
            }
        };
        let ray = ctx.pointer_ray();
        let meshes = &self.meshes;
        let Some(hit) = ctx.scene.raycast_filtered(&ray, |n| meshes.contains(&n)) else {
            return;
        };
        let Some(cube) = self.cube_at(hit.node) else {
            return;
        };
        if let Err(e) = self.engine.borrow_mut().rotate(cube, axis, Direction::Positive) {
            log::warn!("Move rejected: {}", e);
        }
    }

    fn on_key(&mut self, ctx: &mut RenderContext, key: KeyCode) {
        match key {
            KeyCode::S => self.start_sequence(ctx, true),
            KeyCode::R => self.start_sequence(ctx, false),
            KeyCode::U => self.undo(),
            _ => {}
        }
    }

    fn on_control(&mut self, ctx: &mut RenderContext, key: &str, _value: &ParamValue) {
        match key {
            "shuffle" => self.start_sequence(ctx, true),
            "resolve" => self.start_sequence(ctx, false),
            "undo" => self.undo(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::advance_frame;
    use crate::time::Clock;

    fn boot(experiment: &mut RubiksExperiment) -> RenderContext {
        let mut ctx = RenderContext::new(&experiment.config(), 800, 600);
        ctx.clock = Clock::fixed(1.0 / 60.0);
        experiment.init(&mut ctx);
        ctx
    }

    fn finish_intro(experiment: &mut RubiksExperiment, ctx: &mut RenderContext) {
        for _ in 0..600 {
            advance_frame(experiment, ctx);
            if experiment.intro_finished() {
                return;
            }
        }
        panic!("intro never finished");
    }

    #[test]
    fn test_intro_lands_on_lattice() {
        let mut experiment = RubiksExperiment::new();
        let mut ctx = boot(&mut experiment);
        assert_eq!(experiment.meshes().len(), 64);
        assert!(!experiment.accepts_moves());

        finish_intro(&mut experiment, &mut ctx);
        let engine = experiment.engine();
        for (id, node) in engine.borrow().cube_ids().zip(experiment.meshes()) {
            let expected = engine.borrow().world_position(id).unwrap();
            let t = ctx.scene.transform(*node).unwrap();
            assert!((t.translation - expected).length() < 1e-4);
            assert!((t.scale - Vec3::ONE).length() < 1e-4);
        }
    }

    #[test]
    fn test_shuffle_then_resolve_from_keys() {
        let mut experiment = RubiksExperiment::new().with_seed(7);
        let mut ctx = boot(&mut experiment);
        finish_intro(&mut experiment, &mut ctx);
        let start = experiment.engine().borrow().snapshot();

        ctx.input.press_key(KeyCode::S);
        for _ in 0..5000 {
            advance_frame(&mut experiment, &mut ctx);
            ctx.end_frame();
            if experiment.accepts_moves() {
                break;
            }
        }
        let moves = experiment.engine().borrow().history().len();
        assert!((20..=30).contains(&moves), "{} moves", moves);

        ctx.input.press_key(KeyCode::R);
        for _ in 0..5000 {
            advance_frame(&mut experiment, &mut ctx);
            ctx.end_frame();
            if experiment.accepts_moves() {
                break;
            }
        }
        let engine = experiment.engine();
        assert!(engine.borrow().history().is_empty());
        assert!(engine.borrow().matches(&start, 1e-3));
    }

    #[test]
    fn test_click_turns_picked_slice() {
        let mut experiment = RubiksExperiment::new();
        let mut ctx = boot(&mut experiment);
        finish_intro(&mut experiment, &mut ctx);

        // pointer at the centre looks straight at the cube
        ctx.input.move_pointer(Vec2::new(400.0, 300.0));
        ctx.input.press_button(MouseButton::Left);
        advance_frame(&mut experiment, &mut ctx);

        let engine = experiment.engine();
        let history = engine.borrow().history().to_vec();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].axis, Axis::Y);
    }
}
