//! # vislab - real-time 3D visual experiments
//!
//! A small native framework for self-contained visual experiments: a galaxy
//! of particles, Conway's life on a voxel grid, a domino run, gravity wells,
//! procedural water, floating primitives, a Fibonacci sphere and a Rubik's
//! cube with an exact move log.
//!
//! vislab handles the window, the wgpu renderer, camera and orbit controls,
//! the post-processing chain (bloom, ambient occlusion, motion blur) and the
//! render loop. An experiment only builds its scene and updates it per frame.
//!
//! ## Quick Start
//!
//! ```ignore
//! use vislab::prelude::*;
//!
//! struct Spinner {
//!     cube: Option<NodeId>,
//! }
//!
//! impl Experiment for Spinner {
//!     fn config(&self) -> ExperimentConfig {
//!         ExperimentConfig::new("Spinner")
//!             .with_orbit_controls(true)
//!             .with_bloom(BloomParams::default())
//!     }
//!
//!     fn init(&mut self, ctx: &mut RenderContext) {
//!         let geometry = ctx.scene.add_geometry(Geometry::cuboid(1.0, 1.0, 1.0));
//!         let root = ctx.scene.root();
//!         self.cube = Some(ctx.scene.add_mesh(
//!             root,
//!             Transform::IDENTITY,
//!             Mesh { geometry, material: Material::normal() },
//!         ));
//!     }
//!
//!     fn on_frame(&mut self, ctx: &mut RenderContext, frame: &FrameInfo) {
//!         if let Some(t) = self.cube.and_then(|c| ctx.scene.transform_mut(c)) {
//!             t.rotation = Quat::from_rotation_y(frame.elapsed);
//!         }
//!     }
//! }
//!
//! fn main() -> Result<(), ExperimentError> {
//!     vislab::run(Spinner { cube: None })
//! }
//! ```
//!
//! ## Frame order
//!
//! Every frame: tick the clock, apply queued control changes, dispatch
//! pointer and key events, update orbit controls, call
//! [`Experiment::on_frame`], poll spawned tasks, render. See
//! [`experiment::advance_frame`].
//!
//! ## Pointer convention
//!
//! [`Input::pointer`](input::Input::pointer) is normalized against the
//! rendering surface: top-left is `(-1, 1)`, bottom-right `(1, -1)`. Together
//! with the camera it is the only input to picking
//! ([`RenderContext::pointer_ray`](experiment::RenderContext::pointer_ray)).
//!
//! ## Headless use
//!
//! Everything except [`gpu`] and [`run`] works without a window, so scene
//! logic, the cube engine and the frame driver can be tested directly.

pub mod camera;
pub mod config;
pub mod controls;
pub mod error;
pub mod experiment;
pub mod experiments;
pub mod geometry;
pub mod gpu;
pub mod input;
#[cfg(feature = "egui")]
pub mod panel;
pub mod post;
pub mod raycast;
mod runner;
pub mod scene;
pub mod tasks;
pub mod time;
pub mod tween;

pub use glam::{Quat, Vec2, Vec3, Vec4};
pub use runner::run;

/// Convenient re-exports for writing experiments.
///
/// ```ignore
/// use vislab::prelude::*;
/// ```
pub mod prelude {
    pub use crate::camera::{OrbitControls, PerspectiveCamera, Viewport};
    pub use crate::config::{AoParams, BloomParams, CameraOptions, ExperimentConfig, MotionBlurParams, ToneMapping};
    pub use crate::controls::{Controls, ParamValue, Tweakable};
    pub use crate::error::{ExperimentError, RotationError};
    pub use crate::experiment::{Experiment, FrameInfo, RenderContext};
    pub use crate::geometry::{hex, Geometry};
    pub use crate::input::{KeyCode, MouseButton};
    pub use crate::raycast::{pointer_on_plane, Ray};
    pub use crate::scene::{Fog, Light, Material, Mesh, NodeId, PointCloud, Polyline, SceneGraph, Shading, Transform};
    pub use crate::time::Clock;
    pub use crate::tween::{Ease, Tween};
    pub use crate::{Quat, Vec2, Vec3, Vec4};
    #[cfg(feature = "egui")]
    pub use egui;
}
