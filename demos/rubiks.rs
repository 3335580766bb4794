//! # Rubik's Cube
//!
//! A 3x3x3 cube built from 27 unit cubes that fly into place.
//!
//! ## Controls
//!
//! - Click a cube to turn its slice (Left: Y axis, Right: X axis, Shift: Z axis)
//! - `S` shuffle, `R` resolve, `U` undo the last move
//!
//! Run with: `cargo run --example rubiks --release`

use vislab::experiments::rubiks::RubiksExperiment;
use vislab::prelude::*;

fn main() -> Result<(), ExperimentError> {
    vislab::run(RubiksExperiment::new())
}
