//! Integration tests for the headless frame driver.
//!
//! Everything here runs without a window: a [`RenderContext`] is built from a
//! config and frames are advanced with [`advance_frame`].

use vislab::experiment::advance_frame;
use vislab::input::SurfaceRect;
use vislab::post::PassKind;
use vislab::prelude::*;

#[derive(Default)]
struct Recorder {
    events: Vec<String>,
}

impl Experiment for Recorder {
    fn config(&self) -> ExperimentConfig {
        ExperimentConfig::new("Recorder").with_bloom(BloomParams::default())
    }

    fn init(&mut self, ctx: &mut RenderContext) {
        ctx.controls.folder("Recorder").add_float("speed", "speed", 1.0, 0.0, 2.0, 0.5);
        self.events.push("init".into());
    }

    fn on_frame(&mut self, _ctx: &mut RenderContext, frame: &FrameInfo) {
        self.events.push(format!("frame {}", frame.frame));
    }

    fn on_pointer_down(&mut self, _ctx: &mut RenderContext, button: MouseButton, _pointer: Vec2) {
        self.events.push(format!("pointer {:?}", button));
    }

    fn on_key(&mut self, _ctx: &mut RenderContext, key: KeyCode) {
        self.events.push(format!("key {:?}", key));
    }

    fn on_control(&mut self, _ctx: &mut RenderContext, key: &str, value: &ParamValue) {
        self.events.push(format!("control {} {:?}", key, value.as_f32()));
    }
}

fn boot<E: Experiment>(mut experiment: E) -> (E, RenderContext) {
    let mut ctx = RenderContext::new(&experiment.config(), 800, 600);
    ctx.clock = Clock::fixed(1.0 / 60.0);
    experiment.init(&mut ctx);
    (experiment, ctx)
}

#[test]
fn test_frame_dispatch_order() {
    let (mut recorder, mut ctx) = boot(Recorder::default());

    ctx.controls.set("speed", ParamValue::Float(1.3)).unwrap();
    ctx.input.press_button(MouseButton::Left);
    ctx.input.press_key(KeyCode::S);
    advance_frame(&mut recorder, &mut ctx);
    ctx.end_frame();
    advance_frame(&mut recorder, &mut ctx);

    assert_eq!(
        recorder.events,
        vec![
            "init",
            "control speed Some(1.5)",
            "pointer Left",
            "key S",
            "frame 1",
            "frame 2",
        ]
    );
}

#[test]
fn test_post_controls_do_not_reach_experiment() {
    let (mut recorder, mut ctx) = boot(Recorder::default());
    ctx.controls.set("bloomStrength", ParamValue::Float(2.0)).unwrap();
    advance_frame(&mut recorder, &mut ctx);
    assert!(!recorder.events.iter().any(|e| e.starts_with("control")));
    assert!((ctx.post.bloom.unwrap().strength - 2.0).abs() < 1e-4);
}

#[test]
fn test_plan_follows_config() {
    let (_, ctx) = boot(Recorder::default());
    assert_eq!(ctx.plan.passes(), &[PassKind::Scene, PassKind::Bloom, PassKind::Output]);
}

#[test]
fn test_pointer_is_relative_to_surface() {
    let surface = SurfaceRect::new(100.0, 50.0, 800.0, 600.0);
    assert_eq!(surface.normalize(Vec2::new(100.0, 50.0)), Some(Vec2::new(-1.0, 1.0)));
    assert_eq!(surface.normalize(Vec2::new(900.0, 650.0)), Some(Vec2::new(1.0, -1.0)));
    assert_eq!(surface.normalize(Vec2::new(500.0, 350.0)), Some(Vec2::ZERO));
    assert_eq!(SurfaceRect::new(0.0, 0.0, 0.0, 600.0).normalize(Vec2::ZERO), None);
}

#[test]
fn test_resize_is_idempotent() {
    let (_, mut ctx) = boot(Recorder::default());
    assert!(!ctx.resize(800, 600));
    assert!(ctx.resize(1024, 512));
    assert!((ctx.camera.aspect - 2.0).abs() < 1e-6);
    assert!(!ctx.resize(1024, 512));

    ctx.input.move_pointer(Vec2::new(1024.0, 0.0));
    assert_eq!(ctx.input.pointer(), Vec2::new(1.0, 1.0));
}
