//! The experiment capability interface and the context it runs against.
//!
//! An experiment is any value implementing [`Experiment`]. The render loop
//! owns a [`RenderContext`] (scene, camera, clock, pointer, post settings,
//! controls, tasks) and hands it to the experiment explicitly; experiments
//! keep all of their own simulation state as fields.
//!
//! Each frame runs [`advance_frame`] and then composites:
//!
//! 1. tick the clock,
//! 2. apply queued control changes (post settings first, then the experiment),
//! 3. dispatch pointer-down and key-down events,
//! 4. update the orbit controls,
//! 5. call [`Experiment::on_frame`],
//! 6. poll spawned tasks,
//! 7. render (in the runner).
//!
//! The hook therefore always sees this frame's pointer and camera, and
//! anything it changes is drawn the same frame.

use glam::{Vec2, Vec3};

use crate::camera::{OrbitControls, PerspectiveCamera, Viewport};
use crate::config::{ExperimentConfig, ICO_BACKGROUND_STOPS};
use crate::controls::{Controls, ParamValue, Tweakable};
use crate::geometry::{hex, Geometry};
use crate::input::{Input, InputEvent, KeyCode, MouseButton, SurfaceRect};
use crate::post::{PassPlan, PostSettings};
use crate::raycast::Ray;
use crate::scene::{Material, Mesh, NodeId, SceneGraph, Transform};
use crate::tasks::Tasks;
use crate::time::Clock;

/// Per-frame values handed to [`Experiment::on_frame`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub elapsed: f32,
    pub delta: f32,
    pub frame: u64,
    /// Normalized pointer, see [`Input::pointer`].
    pub pointer: Vec2,
}

/// A self-contained visual experiment.
pub trait Experiment {
    /// Static boot options. Read once, before [`init`](Self::init).
    fn config(&self) -> ExperimentConfig;

    /// Build scene content and register controls.
    fn init(&mut self, ctx: &mut RenderContext);

    /// Per-frame update. Runs after controls and before rendering.
    fn on_frame(&mut self, _ctx: &mut RenderContext, _frame: &FrameInfo) {}

    fn on_pointer_down(&mut self, _ctx: &mut RenderContext, _button: MouseButton, _pointer: Vec2) {}

    fn on_key(&mut self, _ctx: &mut RenderContext, _key: KeyCode) {}

    /// A control registered by this experiment changed.
    fn on_control(&mut self, _ctx: &mut RenderContext, _key: &str, _value: &ParamValue) {}
}

/// Everything an experiment reads and writes while running.
#[derive(Debug)]
pub struct RenderContext {
    pub scene: SceneGraph,
    pub camera: PerspectiveCamera,
    pub orbit: Option<OrbitControls>,
    pub clock: Clock,
    pub input: Input,
    pub viewport: Viewport,
    pub plan: PassPlan,
    pub post: PostSettings,
    pub controls: Controls,
    pub tasks: Tasks,
    /// Gradient dome added for `ico_background`.
    pub background: Option<NodeId>,
}

impl RenderContext {
    /// Headless part of bootstrap: scene, camera sized to the viewport,
    /// optional orbit controls and background, post settings and their
    /// controls.
    pub fn new(config: &ExperimentConfig, width: u32, height: u32) -> Self {
        let viewport = Viewport::new(width, height);

        let mut camera = PerspectiveCamera::new(
            config.camera.fov_y,
            viewport.aspect(),
            config.camera.near,
            config.camera.far,
        );
        camera.position = config.camera.position;
        camera.target = config.camera.target;

        let orbit = config.orbit_controls.then(|| {
            let orbit = OrbitControls::from_camera(&camera);
            match config.orbit_damping {
                Some(f) => orbit.with_damping(f),
                None => orbit,
            }
        });

        let mut scene = SceneGraph::new();
        scene.clear_color = config.clear_color;
        let background = config.ico_background.then(|| {
            let stops: Vec<_> = ICO_BACKGROUND_STOPS
                .iter()
                .map(|&(offset, rgb)| (offset, hex(rgb)))
                .collect();
            let radius = config.camera.far * 0.5;
            let geometry = scene.add_geometry(Geometry::gradient_dome(radius, &stops));
            let root = scene.root();
            scene.add_mesh(
                root,
                Transform::IDENTITY,
                Mesh {
                    geometry,
                    material: Material::background(),
                },
            )
        });

        let post = PostSettings::from_config(config);
        let mut controls = Controls::new();
        post.register(&mut controls);

        Self {
            scene,
            camera,
            orbit,
            clock: Clock::new(),
            input: Input::new(SurfaceRect::new(0.0, 0.0, viewport.width as f32, viewport.height as f32)),
            viewport,
            plan: PassPlan::from_config(config),
            post,
            controls,
            tasks: Tasks::new(),
            background,
        }
    }

    /// Apply a viewport size. Camera aspect and pointer rectangle follow;
    /// nothing changes when the size is the same as before.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if !self.viewport.resize(width, height) {
            return false;
        }
        self.camera.set_aspect(self.viewport.aspect());
        self.input
            .set_surface_rect(SurfaceRect::new(0.0, 0.0, width as f32, height as f32));
        log::debug!("Viewport resized to {}x{}", width, height);
        true
    }

    /// Ray from the camera through the current pointer.
    pub fn pointer_ray(&self) -> Ray {
        self.camera.ray_from_ndc(self.input.pointer())
    }

    /// Move the camera, keeping orbit controls in sync.
    pub fn set_camera(&mut self, position: Vec3, target: Vec3) {
        self.camera.position = position;
        self.camera.target = target;
        if let Some(orbit) = self.orbit.as_mut() {
            let damping = orbit.damping;
            let enabled = orbit.enabled;
            *orbit = OrbitControls::from_camera(&self.camera);
            orbit.damping = damping;
            orbit.enabled = enabled;
        }
    }

    /// Clear per-frame input. The runner calls this after rendering.
    pub fn end_frame(&mut self) {
        self.input.end_frame();
    }
}

/// Run one frame of the update half of the loop.
pub fn advance_frame<E: Experiment + ?Sized>(experiment: &mut E, ctx: &mut RenderContext) -> FrameInfo {
    let (elapsed, delta) = ctx.clock.tick();

    for change in ctx.controls.drain() {
        if !ctx.post.apply(&change.key, &change.value) {
            experiment.on_control(ctx, &change.key, &change.value);
        }
    }

    for event in ctx.input.drain_events() {
        match event {
            InputEvent::PointerDown { button, pointer } => experiment.on_pointer_down(ctx, button, pointer),
            InputEvent::KeyDown(key) => experiment.on_key(ctx, key),
        }
    }

    if let Some(orbit) = ctx.orbit.as_mut() {
        orbit.handle_input(&ctx.input, &ctx.camera, ctx.viewport.height as f32);
        orbit.update(&mut ctx.camera);
    }

    let frame = FrameInfo {
        elapsed,
        delta,
        frame: ctx.clock.frame(),
        pointer: ctx.input.pointer(),
    };
    experiment.on_frame(ctx, &frame);

    ctx.tasks.run_until_stalled();
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BloomParams, CameraOptions};

    #[derive(Default)]
    struct Probe {
        log: Vec<String>,
        camera_seen: Option<Vec3>,
    }

    impl Experiment for Probe {
        fn config(&self) -> ExperimentConfig {
            ExperimentConfig::default()
                .with_orbit_controls(true)
                .with_bloom(BloomParams::default())
        }

        fn init(&mut self, ctx: &mut RenderContext) {
            ctx.controls.folder("Probe").add_bool("flag", "flag", false);
        }

        fn on_frame(&mut self, ctx: &mut RenderContext, frame: &FrameInfo) {
            self.log.push(format!("frame {}", frame.frame));
            self.camera_seen = Some(ctx.camera.position);
        }

        fn on_pointer_down(&mut self, _ctx: &mut RenderContext, button: MouseButton, _pointer: Vec2) {
            self.log.push(format!("down {:?}", button));
        }

        fn on_control(&mut self, _ctx: &mut RenderContext, key: &str, _value: &ParamValue) {
            self.log.push(format!("control {}", key));
        }
    }

    fn boot(probe: &mut Probe) -> RenderContext {
        let mut ctx = RenderContext::new(&probe.config(), 800, 600);
        ctx.clock.set_fixed_delta(Some(1.0 / 60.0));
        probe.init(&mut ctx);
        ctx
    }

    #[test]
    fn test_bootstrap_sizes_camera_to_viewport() {
        let config = ExperimentConfig::default().with_camera(CameraOptions::default().far(10_000.0));
        let ctx = RenderContext::new(&config, 1600, 900);
        assert!((ctx.camera.aspect - 16.0 / 9.0).abs() < 1e-6);
        assert_eq!(ctx.camera.far, 10_000.0);
        assert!(ctx.orbit.is_none());
        assert!(ctx.background.is_none());
    }

    #[test]
    fn test_controls_and_events_precede_hook() {
        let mut probe = Probe::default();
        let mut ctx = boot(&mut probe);
        ctx.controls.set("flag", ParamValue::Bool(true)).unwrap();
        ctx.controls.set("bloomStrength", ParamValue::Float(2.0)).unwrap();
        ctx.input.press_button(MouseButton::Left);

        advance_frame(&mut probe, &mut ctx);
        assert_eq!(probe.log, vec!["control flag", "down Left", "frame 1"]);
        assert_eq!(ctx.post.bloom.map(|b| b.strength), Some(2.0));
    }

    #[test]
    fn test_hook_sees_orbit_update() {
        let mut probe = Probe::default();
        let mut ctx = boot(&mut probe);
        ctx.input.move_pointer(Vec2::new(400.0, 300.0));
        ctx.input.press_button(MouseButton::Left);
        ctx.input.move_pointer(Vec2::new(500.0, 300.0));

        let before = ctx.camera.position;
        advance_frame(&mut probe, &mut ctx);
        let seen = probe.camera_seen.unwrap();
        assert!((seen - before).length() > 0.1);
        assert_eq!(seen, ctx.camera.position);
    }

    #[test]
    fn test_resize_is_idempotent() {
        let mut probe = Probe::default();
        let mut ctx = boot(&mut probe);
        assert!(ctx.resize(1024, 512));
        let aspect = ctx.camera.aspect;
        assert!(!ctx.resize(1024, 512));
        assert_eq!(ctx.camera.aspect, aspect);
        assert_eq!(ctx.viewport, Viewport::new(1024, 512));
    }
}
