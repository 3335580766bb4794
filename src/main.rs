//! Launch one experiment by name.
//!
//! ```text
//! cargo run --release -- galaxy
//! ```

use vislab::experiments::{
    dominos::DominosExperiment, floating::FloatingExperiment, galaxy::GalaxyExperiment,
    gravity::GravityExperiment, life::LifeExperiment, rubiks::RubiksExperiment,
    sphere::SphereExperiment, water::WaterExperiment, NAMES,
};
use vislab::error::ExperimentError;

fn main() -> Result<(), ExperimentError> {
    let name = std::env::args().nth(1).unwrap_or_else(|| NAMES[0].to_string());
    match name.as_str() {
        "rubiks" => vislab::run(RubiksExperiment::new()),
        "galaxy" => vislab::run(GalaxyExperiment::new()),
        "life" => vislab::run(LifeExperiment::new()),
        "gravity" => vislab::run(GravityExperiment::new()),
        "dominos" => vislab::run(DominosExperiment::new()),
        "water" => vislab::run(WaterExperiment::new()),
        "floating" => vislab::run(FloatingExperiment::new()),
        "sphere" => vislab::run(SphereExperiment::new()),
        other => {
            eprintln!("Unknown experiment '{}'. Available: {}", other, NAMES.join(", "));
            std::process::exit(2);
        }
    }
}
