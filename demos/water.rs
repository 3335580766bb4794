//! # Procedural Water
//!
//! A noise-displaced plane under a gradient sky. Height drives the vertex
//! colour; sky controls move the sun.
//!
//! The surface is rebuilt on the CPU every frame, so this demo uses fewer
//! subdivisions than the experiment default.
//!
//! Run with: `cargo run --example water --release`

use vislab::experiments::water::{WaterExperiment, WaterParams};
use vislab::prelude::*;

fn main() -> Result<(), ExperimentError> {
    let params = WaterParams {
        subdivisions: 160,
        ..WaterParams::default()
    };
    vislab::run(WaterExperiment::with_params(params, rand::random()))
}
