//! Window, event loop and the per-frame driver.
//!
//! [`run`] opens a window sized from the experiment's config, brings up the
//! renderer, calls [`Experiment::init`] once and then drives
//! [`advance_frame`] followed by a render on every redraw.

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::config::ExperimentConfig;
use crate::error::ExperimentError;
use crate::experiment::{advance_frame, Experiment, RenderContext};
#[cfg(feature = "egui")]
use crate::gpu::EguiIntegration;
use crate::gpu::Renderer;

/// Seconds between FPS reports.
const FPS_REPORT_INTERVAL: f32 = 1.0;

/// Run an experiment until its window closes.
///
/// Logging is initialized from `RUST_LOG` (default `info`) unless the host
/// already installed a logger.
pub fn run<E: Experiment + 'static>(experiment: E) -> Result<(), ExperimentError> {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();

    let config = experiment.config();
    log::info!("Starting '{}'", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(experiment, config);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct App<E: Experiment> {
    experiment: E,
    config: ExperimentConfig,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    ctx: Option<RenderContext>,
    #[cfg(feature = "egui")]
    egui: Option<EguiIntegration>,
    error: Option<ExperimentError>,
    next_fps_report: f32,
}

impl<E: Experiment> App<E> {
    fn new(experiment: E, config: ExperimentConfig) -> Self {
        Self {
            experiment,
            config,
            window: None,
            renderer: None,
            ctx: None,
            #[cfg(feature = "egui")]
            egui: None,
            error: None,
            next_fps_report: FPS_REPORT_INTERVAL,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), ExperimentError> {
        let window_attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(self.config.width, self.config.height));

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let size = window.inner_size();

        let mut ctx = RenderContext::new(&self.config, size.width, size.height);
        let renderer = pollster::block_on(Renderer::new(window.clone(), &self.config, &ctx.plan))?;

        #[cfg(feature = "egui")]
        {
            self.egui = Some(EguiIntegration::new(renderer.device(), renderer.surface_format(), &window));
        }

        self.experiment.init(&mut ctx);
        log::info!(
            "'{}' initialized with {} scene nodes and {} controls",
            self.config.title,
            ctx.scene.len(),
            ctx.controls.params().len()
        );

        self.window = Some(window);
        self.renderer = Some(renderer);
        self.ctx = Some(ctx);
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(window), Some(renderer), Some(ctx)) =
            (self.window.as_ref(), self.renderer.as_mut(), self.ctx.as_mut())
        else {
            return;
        };

        let frame = advance_frame(&mut self.experiment, ctx);

        if frame.elapsed >= self.next_fps_report {
            self.next_fps_report = frame.elapsed + FPS_REPORT_INTERVAL;
            let fps = ctx.clock.fps();
            if self.config.show_fps {
                log::info!("{:.1} fps", fps);
                window.set_title(&format!("{} - {:.0} fps", self.config.title, fps));
            } else {
                log::debug!("{:.1} fps, frame {}", fps, frame.frame);
            }
        }

        #[cfg(feature = "egui")]
        let result = match self.egui.as_mut() {
            Some(egui) => {
                egui.begin_frame(window);
                let fps = self.config.show_fps.then(|| ctx.clock.fps());
                crate::panel::show_controls(&egui.ctx, &mut ctx.controls, fps);
                let output = egui.end_frame(window);
                let size = [renderer.config.width, renderer.config.height];
                renderer.render_with(ctx, |device, queue, encoder, view| {
                    egui.paint(device, queue, encoder, view, size, &output);
                })
            }
            None => renderer.render(ctx),
        };
        #[cfg(not(feature = "egui"))]
        let result = renderer.render(ctx);

        match result {
            Ok(_) => {}
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => renderer.reconfigure(),
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("GPU out of memory, exiting");
                event_loop.exit();
            }
            Err(e) => log::warn!("Render error: {:?}", e),
        }

        ctx.end_frame();
        window.request_redraw();
    }
}

impl<E: Experiment + 'static> ApplicationHandler for App<E> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            log::error!("{}", e);
            self.error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        #[cfg(feature = "egui")]
        let consumed = match (self.egui.as_mut(), self.window.as_ref()) {
            (Some(egui), Some(window)) => egui.on_window_event(window, &event),
            _ => false,
        };
        #[cfg(not(feature = "egui"))]
        let consumed = false;

        if !consumed {
            if let Some(ctx) = self.ctx.as_mut() {
                ctx.input.handle_event(&event);
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(ctx) = self.ctx.as_mut() {
                    ctx.resize(physical_size.width, physical_size.height);
                }
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(physical_size);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}
