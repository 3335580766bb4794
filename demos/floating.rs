//! # Floating Primitives
//!
//! Two thousand small shapes drifting up and down. A blue light follows the
//! pointer across the `z = 0` plane.
//!
//! Run with: `cargo run --example floating --release`

use vislab::experiments::floating::FloatingExperiment;
use vislab::prelude::*;

fn main() -> Result<(), ExperimentError> {
    vislab::run(FloatingExperiment::new())
}
