//! Conway's Game of Life on a grid of cubes.
//!
//! Generations are computed from a snapshot of the previous one; cell colours
//! tween between the live and dead colours whenever a cell flips.

use glam::{Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{BloomParams, CameraOptions, ExperimentConfig};
use crate::controls::{Controls, ParamValue, Tweakable};
use crate::experiment::{Experiment, FrameInfo, RenderContext};
use crate::geometry::{hex, Geometry};
use crate::scene::{Material, Mesh, NodeId, Transform};
use crate::tween::Tween;

pub const LIVE_COLOR: u32 = 0xba2025;
pub const DEAD_COLOR: u32 = 0x0f0000;

#[derive(Debug, Clone, PartialEq)]
pub struct LifeParams {
    pub width: usize,
    pub height: usize,
    pub cell_size: f32,
    /// Distance between neighbouring cell centres.
    pub cell_padding: f32,
    pub cell_transition_duration: f32,
    /// Seconds per generation.
    pub step_interval: f32,
    /// Chance of a cell starting alive when randomized.
    pub density: f64,
}

impl Default for LifeParams {
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
            cell_size: 0.5,
            cell_padding: 0.8,
            cell_transition_duration: 0.3,
            step_interval: 0.1,
            density: 0.1,
        }
    }
}

impl Tweakable for LifeParams {
    fn register(&self, controls: &mut Controls) {
        controls
            .folder("Life")
            .add_float(
                "cellTransitionDuration",
                "transition duration",
                self.cell_transition_duration,
                0.0,
                3.0,
                0.01,
            )
            .add_button("reset", "reset")
            .add_button("randomize", "randomize");
    }

    fn apply(&mut self, key: &str, value: &ParamValue) -> bool {
        match key {
            "cellTransitionDuration" => value.as_f32().map(|v| self.cell_transition_duration = v).is_some(),
            _ => false,
        }
    }
}

/// Row-major boolean grid without wraparound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifeGrid {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl LifeGrid {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        row < self.height && col < self.width && self.cells[row * self.width + col]
    }

    pub fn set(&mut self, row: usize, col: usize, alive: bool) {
        if row < self.height && col < self.width {
            self.cells[row * self.width + col] = alive;
        }
    }

    pub fn live_count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    pub fn live_neighbors(&self, row: usize, col: usize) -> usize {
        let mut count = 0;
        for dr in -1i64..=1 {
            for dc in -1i64..=1 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let r = row as i64 + dr;
                let c = col as i64 + dc;
                if r >= 0 && c >= 0 && self.get(r as usize, c as usize) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Advance one generation under B3/S23.
    ///
    /// Returns the indices of cells that flipped.
    pub fn step(&mut self) -> Vec<usize> {
        let previous = self.clone();
        let mut flipped = Vec::new();
        for row in 0..self.height {
            for col in 0..self.width {
                let alive = previous.get(row, col);
                let n = previous.live_neighbors(row, col);
                let next = matches!((alive, n), (true, 2) | (true, 3) | (false, 3));
                if next != alive {
                    let i = row * self.width + col;
                    self.cells[i] = next;
                    flipped.push(i);
                }
            }
        }
        flipped
    }

    /// Revive cells at random without killing any. Returns the newly live
    /// indices.
    pub fn randomize<R: Rng>(&mut self, rng: &mut R, density: f64) -> Vec<usize> {
        let mut revived = Vec::new();
        for (i, cell) in self.cells.iter_mut().enumerate() {
            if !*cell && rng.gen_bool(density) {
                *cell = true;
                revived.push(i);
            }
        }
        revived
    }

    /// Kill every cell. Returns the indices that were alive.
    pub fn clear(&mut self) -> Vec<usize> {
        let live = (0..self.cells.len()).filter(|i| self.cells[*i]).collect();
        self.cells.fill(false);
        live
    }
}

pub struct LifeExperiment {
    pub params: LifeParams,
    grid: LifeGrid,
    rng: StdRng,
    cells: Vec<NodeId>,
    colors: Vec<Tween<Vec4>>,
    since_step: f32,
    generation: u64,
}

impl LifeExperiment {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        let params = LifeParams::default();
        Self {
            grid: LifeGrid::new(params.width, params.height),
            params,
            rng,
            cells: Vec::new(),
            colors: Vec::new(),
            since_step: 0.0,
            generation: 0,
        }
    }

    pub fn grid(&self) -> &LifeGrid {
        &self.grid
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn recolor(&mut self, flipped: &[usize]) {
        let duration = self.params.cell_transition_duration;
        for &i in flipped {
            let target = if self.grid.cells[i] { LIVE_COLOR } else { DEAD_COLOR };
            if let Some(tween) = self.colors.get_mut(i) {
                tween.duration = duration;
                tween.retarget(hex(target));
            }
        }
    }

    fn randomize(&mut self) {
        let revived = self.grid.randomize(&mut self.rng, self.params.density);
        log::debug!("Revived {} cells", revived.len());
        self.recolor(&revived);
    }

    fn reset(&mut self) {
        let killed = self.grid.clear();
        self.recolor(&killed);
    }
}

impl Default for LifeExperiment {
    fn default() -> Self {
        Self::new()
    }
}

impl Experiment for LifeExperiment {
    fn config(&self) -> ExperimentConfig {
        ExperimentConfig::new("Game of Life")
            .with_orbit_controls(true)
            .with_fps_counter(true)
            .with_bloom(BloomParams {
                exposure: 0.8,
                threshold: 0.15,
                strength: 0.9,
                ..BloomParams::default()
            })
            .with_camera(CameraOptions::default().position(Vec3::new(15.0, 15.0, 0.0)))
    }

    fn init(&mut self, ctx: &mut RenderContext) {
        let p = &self.params;
        let size = p.cell_size;
        let geometry = ctx.scene.add_geometry(Geometry::cuboid(size, size, size));
        let root = ctx.scene.root();
        let start_x = -(p.width as f32) * p.cell_padding / 2.0;
        let start_z = -(p.height as f32) * p.cell_padding / 2.0;

        self.cells.clear();
        self.colors.clear();
        for row in 0..p.height {
            for col in 0..p.width {
                let position = Vec3::new(
                    start_x + col as f32 * p.cell_padding,
                    0.0,
                    start_z + row as f32 * p.cell_padding,
                );
                let node = ctx.scene.add_mesh(
                    root,
                    Transform::from_translation(position),
                    Mesh {
                        geometry,
                        material: Material::unlit(hex(DEAD_COLOR)),
                    },
                );
                self.cells.push(node);
                self.colors.push(Tween::new(hex(DEAD_COLOR), hex(DEAD_COLOR), 0.0));
            }
        }

        self.randomize();
        self.params.register(&mut ctx.controls);
        log::info!(
            "Life grid {}x{}, {} live",
            self.params.width,
            self.params.height,
            self.grid.live_count()
        );
    }

    fn on_frame(&mut self, ctx: &mut RenderContext, frame: &FrameInfo) {
        self.since_step += frame.delta;
        if self.since_step >= self.params.step_interval {
            self.since_step -= self.params.step_interval;
            let flipped = self.grid.step();
            self.generation += 1;
            self.recolor(&flipped);
        }

        for (tween, node) in self.colors.iter_mut().zip(&self.cells) {
            if tween.is_finished() {
                continue;
            }
            let color = tween.advance(frame.delta);
            if let Some(mesh) = ctx.scene.mesh_mut(*node) {
                mesh.material.color = color;
            }
        }
    }

    fn on_control(&mut self, _ctx: &mut RenderContext, key: &str, value: &ParamValue) {
        match key {
            "reset" => self.reset(),
            "randomize" => self.randomize(),
            _ => {
                self.params.apply(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::advance_frame;
    use crate::time::Clock;

    fn grid_with(width: usize, height: usize, live: &[(usize, usize)]) -> LifeGrid {
        let mut grid = LifeGrid::new(width, height);
        for &(r, c) in live {
            grid.set(r, c, true);
        }
        grid
    }

    #[test]
    fn test_blinker_oscillates() {
        let mut grid = grid_with(5, 5, &[(2, 1), (2, 2), (2, 3)]);
        let start = grid.clone();
        let flipped = grid.step();
        assert_eq!(flipped.len(), 4);
        assert!(grid.get(1, 2) && grid.get(2, 2) && grid.get(3, 2));
        assert!(!grid.get(2, 1) && !grid.get(2, 3));
        grid.step();
        assert_eq!(grid, start);
    }

    #[test]
    fn test_block_is_still_life() {
        let mut grid = grid_with(4, 4, &[(1, 1), (1, 2), (2, 1), (2, 2)]);
        assert!(grid.step().is_empty());
        assert_eq!(grid.live_count(), 4);
    }

    #[test]
    fn test_edges_do_not_wrap() {
        let grid = grid_with(3, 3, &[(0, 0), (2, 2)]);
        assert_eq!(grid.live_neighbors(0, 2), 0);
        assert_eq!(grid.live_neighbors(1, 1), 2);
    }

    #[test]
    fn test_glider_keeps_five_cells() {
        let mut grid = grid_with(10, 10, &[(0, 1), (1, 2), (2, 0), (2, 1), (2, 2)]);
        for _ in 0..4 {
            grid.step();
            assert_eq!(grid.live_count(), 5);
        }
        // one glider period moves it one cell down and right
        assert!(grid.get(1, 2) && grid.get(2, 3) && grid.get(3, 1) && grid.get(3, 2) && grid.get(3, 3));
    }

    #[test]
    fn test_generations_follow_elapsed_time() {
        let mut experiment = LifeExperiment::with_rng(StdRng::seed_from_u64(5));
        experiment.params.width = 20;
        experiment.params.height = 20;
        experiment.grid = LifeGrid::new(20, 20);

        let mut ctx = RenderContext::new(&experiment.config(), 640, 480);
        ctx.clock = Clock::fixed(0.05);
        experiment.init(&mut ctx);
        assert!(experiment.grid().live_count() > 0);

        for _ in 0..10 {
            advance_frame(&mut experiment, &mut ctx);
        }
        assert_eq!(experiment.generation(), 5);
    }

    #[test]
    fn test_reset_fades_cells_out() {
        let mut experiment = LifeExperiment::with_rng(StdRng::seed_from_u64(6));
        experiment.params.width = 10;
        experiment.params.height = 10;
        experiment.params.step_interval = 1000.0;
        experiment.grid = LifeGrid::new(10, 10);

        let mut ctx = RenderContext::new(&experiment.config(), 640, 480);
        ctx.clock = Clock::fixed(0.1);
        experiment.init(&mut ctx);

        ctx.controls.press("reset").unwrap();
        for _ in 0..10 {
            advance_frame(&mut experiment, &mut ctx);
        }
        assert_eq!(experiment.grid().live_count(), 0);
        for node in &experiment.cells {
            let mesh = ctx.scene.mesh_mut(*node).unwrap();
            assert!((mesh.material.color - hex(DEAD_COLOR)).length() < 1e-4);
        }
    }
}
