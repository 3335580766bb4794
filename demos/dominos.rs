//! # Domino Run
//!
//! Left-click on the floor to lay out a path, right-click to finish it.
//! Dominos appear along the smoothed curve and the first one is pushed over.
//!
//! Run with: `cargo run --example dominos --release`

use vislab::experiments::dominos::DominosExperiment;
use vislab::prelude::*;

fn main() -> Result<(), ExperimentError> {
    vislab::run(DominosExperiment::new())
}
