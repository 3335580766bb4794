//! # Galaxy
//!
//! A spiral galaxy of additive points inside a box of background stars.
//! Arms bend with distance from the centre; colours blend from the core
//! colour to the outer colour.
//!
//! Run with: `cargo run --example galaxy --release`

use vislab::experiments::galaxy::GalaxyExperiment;
use vislab::prelude::*;

fn main() -> Result<(), ExperimentError> {
    vislab::run(GalaxyExperiment::new())
}
