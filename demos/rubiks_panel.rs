//! # Rubik's Cube with Control Panel
//!
//! The cube experiment with the egui control panel: post-processing sliders
//! plus shuffle, resolve and undo buttons. The shuffle is seeded from the
//! first argument so a run can be replayed.
//!
//! Run with: `cargo run --example rubiks_panel --features egui -- 42`

use vislab::experiments::rubiks::RubiksExperiment;
use vislab::prelude::*;

fn main() -> Result<(), ExperimentError> {
    let experiment = match std::env::args().nth(1).and_then(|s| s.parse::<u64>().ok()) {
        Some(seed) => RubiksExperiment::new().with_seed(seed),
        None => RubiksExperiment::new(),
    };
    vislab::run(experiment)
}
