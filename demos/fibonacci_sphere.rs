//! # Fibonacci Sphere
//!
//! Cubes gather on a golden-angle spiral over a sphere, flatten onto its
//! stereographic projection, then return.
//!
//! Run with: `cargo run --example fibonacci_sphere --release`

use vislab::experiments::sphere::SphereExperiment;
use vislab::prelude::*;

fn main() -> Result<(), ExperimentError> {
    vislab::run(SphereExperiment::new())
}
