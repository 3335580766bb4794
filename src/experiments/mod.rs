//! The bundled experiments.
//!
//! Each one is a plain struct holding its own simulation state and
//! implementing [`Experiment`](crate::experiment::Experiment). The `demos/`
//! directory has one runnable entry point per experiment; the `vislab`
//! binary picks one by name.

pub mod dominos;
pub mod floating;
pub mod galaxy;
pub mod gravity;
pub mod life;
pub mod rubiks;
pub mod sphere;
pub mod water;

/// Names accepted by the `vislab` launcher, in menu order.
pub const NAMES: [&str; 8] = [
    "rubiks",
    "galaxy",
    "life",
    "gravity",
    "dominos",
    "water",
    "floating",
    "sphere",
];
