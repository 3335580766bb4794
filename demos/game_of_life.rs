//! # Game of Life
//!
//! Conway's rules on a 100x100 grid of cubes. Cells fade between the live
//! and dead colours as they flip.
//!
//! Run with: `cargo run --example game_of_life --release`

use vislab::experiments::life::LifeExperiment;
use vislab::prelude::*;

fn main() -> Result<(), ExperimentError> {
    vislab::run(LifeExperiment::new())
}
