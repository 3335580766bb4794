//! # Gravity Points
//!
//! Click to drop a gravity point on the `z = 0` plane. Points pull the
//! particles around them and absorb the ones that come too close, growing
//! with every particle they swallow.
//!
//! Run with: `cargo run --example gravity --release`

use vislab::experiments::gravity::GravityExperiment;
use vislab::prelude::*;

fn main() -> Result<(), ExperimentError> {
    vislab::run(GravityExperiment::new())
}
