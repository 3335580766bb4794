//! Face-slice rotation engine for an N×N×N cube.
//!
//! The engine owns a small scene graph of its own: a root, one reusable
//! pivot, and the N³ cube nodes. A move runs through a fixed cycle:
//!
//! 1. select every cube whose coordinate on the move axis is within
//!    `epsilon` of the reference cube's,
//! 2. attach those cubes to the pivot (world transforms preserved),
//! 3. animate the pivot through a quarter turn over `duration` seconds,
//! 4. attach the cubes back to the root, snapping them onto the lattice,
//!    and reset the pivot.
//!
//! Only one move can hold the pivot. [`CubeEngine::rotate`] returns
//! [`RotationError::Busy`] while another is in flight; sequences await each
//! [`RotationTask`] before issuing the next move (see [`shuffle`] and
//! [`resolve`]).

use futures::channel::oneshot;
use glam::{Mat3, Quat, Vec3};
use rand::Rng;
use std::cell::RefCell;
use std::f32::consts::FRAC_PI_2;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::error::RotationError;
use crate::scene::{NodeId, SceneGraph, Transform};
use crate::tween::{Ease, Tween};

/// Rotation axis of a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn unit(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }

    pub fn component(self, v: Vec3) -> f32 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
            Axis::Z => v.z,
        }
    }
}

/// Quarter-turn direction, counter-clockwise looking down the positive axis
/// for `Positive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Positive,
    Negative,
}

impl Direction {
    pub fn sign(self) -> f32 {
        match self {
            Direction::Positive => 1.0,
            Direction::Negative => -1.0,
        }
    }

    pub fn inverse(self) -> Self {
        match self {
            Direction::Positive => Direction::Negative,
            Direction::Negative => Direction::Positive,
        }
    }
}

/// Index of a cube in the grid. Stable for the engine's lifetime; it names
/// the physical cube, not a lattice slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CubeId(pub usize);

/// One quarter turn of the slice containing `cube`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub cube: CubeId,
    pub axis: Axis,
    pub direction: Direction,
}

impl Move {
    pub fn new(cube: CubeId, axis: Axis, direction: Direction) -> Self {
        Self {
            cube,
            axis,
            direction,
        }
    }

    pub fn inverse(self) -> Self {
        Self {
            direction: self.direction.inverse(),
            ..self
        }
    }
}

/// Grid and animation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeConfig {
    /// Cubes per edge.
    pub size: usize,
    /// Distance between neighbouring cube centres.
    pub spacing: f32,
    /// Tolerance for slice membership.
    pub epsilon: f32,
    /// Seconds per quarter turn.
    pub duration: f32,
    pub ease: Ease,
}

impl CubeConfig {
    /// Offset that centres the lattice on the origin, `(size - 1) / 2`.
    pub fn offset(&self) -> f32 {
        (self.size as f32 - 1.0) / 2.0
    }

    /// Lattice position of grid index `(i, j, k)`.
    pub fn lattice_position(&self, i: usize, j: usize, k: usize) -> Vec3 {
        (Vec3::new(i as f32, j as f32, k as f32) - Vec3::splat(self.offset())) * self.spacing
    }

    /// Nearest lattice point to `p`.
    pub fn snap(&self, p: Vec3) -> Vec3 {
        let off = Vec3::splat(self.offset());
        ((p / self.spacing + off).round() - off) * self.spacing
    }
}

impl Default for CubeConfig {
    fn default() -> Self {
        Self {
            size: 4,
            spacing: 1.1,
            epsilon: 0.001,
            duration: 0.3,
            ease: Ease::Power3Out,
        }
    }
}

/// Sticker colours, one per face in `+X, -X, +Y, -Y, +Z, -Z` order.
pub const FACE_COLORS: [u32; 6] = [0xC41E3A, 0x009E60, 0x0051BA, 0xFF5800, 0xFFD500, 0xFFFFFF];

/// Where the engine is in its move cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    Idle,
    /// A move holds the pivot; `progress` is linear in `[0, 1]`.
    Rotating { progress: f32 },
}

type Completion = oneshot::Sender<Result<Move, RotationError>>;

struct ActiveRotation {
    mv: Move,
    slice: Vec<CubeId>,
    angle: Tween<f32>,
    done: Option<Completion>,
}

/// Resolves when a move has finished and its cubes are back on the lattice.
#[must_use = "a rotation task does nothing unless awaited or polled"]
pub struct RotationTask {
    rx: oneshot::Receiver<Result<Move, RotationError>>,
}

impl Future for RotationTask {
    type Output = Result<Move, RotationError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(RotationError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Per-cube world pose, for comparing configurations.
pub type Snapshot = Vec<(Vec3, Quat)>;

/// The cube grid, its pivot and its move log.
pub struct CubeEngine {
    config: CubeConfig,
    scene: SceneGraph,
    pivot: NodeId,
    cubes: Vec<NodeId>,
    history: Vec<Move>,
    active: Option<ActiveRotation>,
}

impl CubeEngine {
    pub fn new(config: CubeConfig) -> Self {
        let mut scene = SceneGraph::new();
        let root = scene.root();
        let pivot = scene.add(root, Transform::IDENTITY);
        let n = config.size;
        let mut cubes = Vec::with_capacity(n * n * n);
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    let position = config.lattice_position(i, j, k);
                    cubes.push(scene.add(root, Transform::from_translation(position)));
                }
            }
        }
        Self {
            config,
            scene,
            pivot,
            cubes,
            history: Vec::new(),
            active: None,
        }
    }

    pub fn config(&self) -> &CubeConfig {
        &self.config
    }

    pub fn cube_count(&self) -> usize {
        self.cubes.len()
    }

    pub fn cube_ids(&self) -> impl Iterator<Item = CubeId> {
        (0..self.cubes.len()).map(CubeId)
    }

    fn node(&self, cube: CubeId) -> Result<NodeId, RotationError> {
        self.cubes
            .get(cube.0)
            .copied()
            .ok_or(RotationError::UnknownCube(cube.0))
    }

    /// Current world pose of a cube, including an in-flight rotation.
    pub fn world_transform(&self, cube: CubeId) -> Option<Transform> {
        let node = self.cubes.get(cube.0)?;
        Some(Transform::from_matrix(self.scene.world_matrix(*node)))
    }

    pub fn world_position(&self, cube: CubeId) -> Option<Vec3> {
        self.cubes.get(cube.0).map(|n| self.scene.world_position(*n))
    }

    /// Number of cubes currently attached to the pivot.
    pub fn pivot_children(&self) -> usize {
        self.scene.children(self.pivot).len()
    }

    pub fn phase(&self) -> Phase {
        match &self.active {
            None => Phase::Idle,
            Some(a) => Phase::Rotating {
                progress: a.angle.progress(),
            },
        }
    }

    pub fn is_rotating(&self) -> bool {
        self.active.is_some()
    }

    /// Recorded moves, oldest first.
    pub fn history(&self) -> &[Move] {
        &self.history
    }

    /// Cube whose centre is closest to `point`. Ties go to the lower index.
    pub fn nearest_cube(&self, point: Vec3) -> Option<CubeId> {
        self.cube_ids()
            .filter_map(|id| self.world_position(id).map(|p| (id, p.distance_squared(point))))
            .fold(None, |best: Option<(CubeId, f32)>, (id, d)| match best {
                Some((_, bd)) if bd <= d => best,
                _ => Some((id, d)),
            })
            .map(|(id, _)| id)
    }

    /// Cubes sharing `cube`'s coordinate on `axis`.
    pub fn select_slice(&self, cube: CubeId, axis: Axis) -> Result<Vec<CubeId>, RotationError> {
        let reference = axis.component(self.scene.world_position(self.node(cube)?));
        Ok(self
            .cube_ids()
            .filter(|id| {
                self.world_position(*id)
                    .is_some_and(|p| (axis.component(p) - reference).abs() < self.config.epsilon)
            })
            .collect())
    }

    /// Start a recorded move.
    pub fn rotate(&mut self, cube: CubeId, axis: Axis, direction: Direction) -> Result<RotationTask, RotationError> {
        let mv = Move::new(cube, axis, direction);
        let task = self.start(mv)?;
        self.history.push(mv);
        Ok(task)
    }

    /// Start a move without recording it.
    pub fn replay(&mut self, mv: Move) -> Result<RotationTask, RotationError> {
        self.start(mv)
    }

    /// Pop the newest recorded move and start its inverse.
    ///
    /// Returns `None` when the log is empty. A busy engine keeps the log intact.
    pub fn undo(&mut self) -> Option<Result<RotationTask, RotationError>> {
        if self.active.is_some() {
            return Some(Err(RotationError::Busy));
        }
        let mv = self.history.pop()?;
        match self.start(mv.inverse()) {
            Ok(task) => Some(Ok(task)),
            Err(e) => {
                self.history.push(mv);
                Some(Err(e))
            }
        }
    }

    fn start(&mut self, mv: Move) -> Result<RotationTask, RotationError> {
        if self.active.is_some() {
            log::warn!("Rejected {:?}: a rotation already holds the pivot", mv);
            return Err(RotationError::Busy);
        }
        let slice = self.select_slice(mv.cube, mv.axis)?;

        self.scene.set_transform(self.pivot, Transform::IDENTITY);
        for id in &slice {
            self.scene.attach(self.cubes[id.0], self.pivot);
        }
        log::debug!("Rotating {} cubes around {:?} ({:?})", slice.len(), mv.axis, mv.direction);

        let (tx, rx) = oneshot::channel();
        self.active = Some(ActiveRotation {
            mv,
            slice,
            angle: Tween::new(0.0, FRAC_PI_2 * mv.direction.sign(), self.config.duration)
                .with_ease(self.config.ease),
            done: Some(tx),
        });
        Ok(RotationTask { rx })
    }

    /// Advance the in-flight rotation by `dt` seconds.
    ///
    /// Returns the move that completed during this tick, if any.
    pub fn tick(&mut self, dt: f32) -> Option<Move> {
        let active = self.active.as_mut()?;
        let angle = active.angle.advance(dt);
        let axis = active.mv.axis.unit();
        if let Some(pivot) = self.scene.transform_mut(self.pivot) {
            pivot.rotation = Quat::from_axis_angle(axis, angle);
        }
        if !active.angle.is_finished() {
            return None;
        }

        let mut finished = self.active.take()?;
        self.flatten(&finished.slice);
        if let Some(done) = finished.done.take() {
            // the receiver may have been dropped; the move still happened
            let _ = done.send(Ok(finished.mv));
        }
        Some(finished.mv)
    }

    /// Return the slice to the root and snap it onto the lattice.
    fn flatten(&mut self, slice: &[CubeId]) {
        let root = self.scene.root();
        for id in slice {
            let node = self.cubes[id.0];
            self.scene.attach(node, root);
            if let Some(t) = self.scene.transform_mut(node) {
                t.translation = self.config.snap(t.translation);
                t.rotation = snap_rotation(t.rotation);
                t.scale = Vec3::ONE;
            }
        }
        self.scene.set_transform(self.pivot, Transform::IDENTITY);
    }

    /// Largest distance of any cube from its nearest lattice point.
    pub fn lattice_error(&self) -> f32 {
        self.cube_ids()
            .filter_map(|id| self.world_position(id))
            .map(|p| (p - self.config.snap(p)).abs().max_element())
            .fold(0.0, f32::max)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.cube_ids()
            .filter_map(|id| self.world_transform(id))
            .map(|t| (t.translation, t.rotation))
            .collect()
    }

    /// Whether every cube matches `snapshot` within `epsilon`.
    pub fn matches(&self, snapshot: &Snapshot, epsilon: f32) -> bool {
        let now = self.snapshot();
        now.len() == snapshot.len()
            && now.iter().zip(snapshot).all(|((p, q), (sp, sq))| {
                (*p - *sp).abs().max_element() < epsilon && q.dot(*sq).abs() > 1.0 - epsilon
            })
    }
}

/// Round a rotation to the nearest axis-aligned orientation.
fn snap_rotation(q: Quat) -> Quat {
    let m = Mat3::from_quat(q);
    let round = |v: Vec3| v.round();
    Quat::from_mat3(&Mat3::from_cols(round(m.x_axis), round(m.y_axis), round(m.z_axis))).normalize()
}

/// Issue 20 to 30 random recorded moves, one after another.
///
/// Returns the number of moves performed.
pub async fn shuffle<R: Rng>(engine: Rc<RefCell<CubeEngine>>, mut rng: R) -> Result<usize, RotationError> {
    let count = rng.gen_range(20..=30);
    let cubes = engine.borrow().cube_count();
    for _ in 0..count {
        let cube = CubeId(rng.gen_range(0..cubes));
        let axis = Axis::ALL[rng.gen_range(0..3)];
        let direction = if rng.gen_bool(0.5) {
            Direction::Positive
        } else {
            Direction::Negative
        };
        let task = engine.borrow_mut().rotate(cube, axis, direction)?;
        task.await?;
    }
    log::info!("Shuffled with {} moves", count);
    Ok(count)
}

/// Undo every recorded move, newest first, without recording.
///
/// Returns the number of moves undone. The log is empty afterwards.
pub async fn resolve(engine: Rc<RefCell<CubeEngine>>) -> Result<usize, RotationError> {
    let mut undone = 0;
    loop {
        let next = engine.borrow_mut().undo();
        match next {
            None => break,
            Some(task) => {
                task?.await?;
                undone += 1;
            }
        }
    }
    log::info!("Resolved {} moves", undone);
    Ok(undone)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(engine: &mut CubeEngine) -> Move {
        loop {
            if let Some(mv) = engine.tick(1.0 / 60.0) {
                return mv;
            }
        }
    }

    #[test]
    fn test_lattice_layout() {
        let engine = CubeEngine::new(CubeConfig::default());
        assert_eq!(engine.cube_count(), 64);
        assert!(engine.lattice_error() < 1e-6);
        let p = engine.world_position(CubeId(0)).unwrap();
        assert!((p - Vec3::splat(-1.5 * 1.1)).length() < 1e-5);
    }

    #[test]
    fn test_slice_of_every_cube_is_a_full_layer() {
        let engine = CubeEngine::new(CubeConfig::default());
        for id in engine.cube_ids() {
            for axis in Axis::ALL {
                assert_eq!(engine.select_slice(id, axis).unwrap().len(), 16);
            }
        }
    }

    #[test]
    fn test_unknown_cube() {
        let mut engine = CubeEngine::new(CubeConfig::default());
        assert_eq!(
            engine.rotate(CubeId(64), Axis::X, Direction::Positive).err(),
            Some(RotationError::UnknownCube(64))
        );
        assert!(engine.history().is_empty());
    }

    #[test]
    fn test_pivot_holds_slice_only_while_rotating() {
        let mut engine = CubeEngine::new(CubeConfig::default());
        let _task = engine.rotate(CubeId(0), Axis::Y, Direction::Positive).unwrap();
        assert_eq!(engine.pivot_children(), 16);
        assert!(matches!(engine.phase(), Phase::Rotating { .. }));

        engine.tick(0.1);
        assert!(engine.lattice_error() > 0.01);

        run(&mut engine);
        assert_eq!(engine.pivot_children(), 0);
        assert_eq!(engine.phase(), Phase::Idle);
        assert!(engine.lattice_error() < 1e-4);
    }

    #[test]
    fn test_quarter_turn_moves_corner() {
        let mut engine = CubeEngine::new(CubeConfig::default());
        let _task = engine.rotate(CubeId(0), Axis::Y, Direction::Positive).unwrap();
        run(&mut engine);
        // (-x, -z) corner turns to (-x, +z) under +90° about Y
        let p = engine.world_position(CubeId(0)).unwrap();
        let e = 1.5 * 1.1;
        assert!((p - Vec3::new(-e, -e, e)).length() < 1e-4, "{:?}", p);
    }

    #[test]
    fn test_busy_rejects_without_recording() {
        let mut engine = CubeEngine::new(CubeConfig::default());
        let _task = engine.rotate(CubeId(0), Axis::X, Direction::Positive).unwrap();
        assert_eq!(
            engine.rotate(CubeId(5), Axis::Y, Direction::Negative).err(),
            Some(RotationError::Busy)
        );
        assert!(matches!(engine.undo(), Some(Err(RotationError::Busy))));
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn test_undo_restores() {
        let mut engine = CubeEngine::new(CubeConfig::default());
        let start = engine.snapshot();
        let _a = engine.rotate(CubeId(3), Axis::Z, Direction::Negative).unwrap();
        run(&mut engine);
        assert!(!engine.matches(&start, 1e-3));

        let _b = engine.undo().unwrap().unwrap();
        run(&mut engine);
        assert!(engine.matches(&start, 1e-3));
        assert!(engine.history().is_empty());
        assert!(engine.undo().is_none());
    }

    #[test]
    fn test_zero_duration_move_turns_on_first_tick() {
        let mut engine = CubeEngine::new(CubeConfig {
            duration: 0.0,
            ..CubeConfig::default()
        });
        let before = engine.world_position(CubeId(0)).unwrap();
        let _task = engine.rotate(CubeId(0), Axis::Y, Direction::Positive).unwrap();
        assert!(engine.tick(0.0).is_some());

        let e = 1.5 * 1.1;
        let after = engine.world_position(CubeId(0)).unwrap();
        assert!((before - Vec3::splat(-e)).length() < 1e-4);
        assert!((after - Vec3::new(-e, -e, e)).length() < 1e-4, "{:?}", after);
        assert_eq!(engine.history().len(), 1);

        let _undo = engine.undo().unwrap().unwrap();
        assert!(engine.tick(0.0).is_some());
        assert!((engine.world_position(CubeId(0)).unwrap() - before).length() < 1e-4);
    }

    #[test]
    fn test_cube_nearest_origin_selects_full_layer() {
        let engine = CubeEngine::new(CubeConfig::default());
        let centre = engine.nearest_cube(Vec3::ZERO).unwrap();
        assert_eq!(engine.select_slice(centre, Axis::Y).unwrap().len(), 16);

        let corner = engine.nearest_cube(Vec3::splat(-10.0)).unwrap();
        assert_eq!(corner, CubeId(0));
    }

    #[test]
    fn test_snap_rotation_removes_drift() {
        let drifted = Quat::from_axis_angle(Vec3::Y, FRAC_PI_2 + 0.0004);
        let snapped = snap_rotation(drifted);
        assert!(snapped.abs_diff_eq(Quat::from_rotation_y(FRAC_PI_2), 1e-6));
    }
}
