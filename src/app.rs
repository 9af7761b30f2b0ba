use std::sync::Arc;

use anyhow::{Context, Result};
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Transform};
use vigil_core::{Direction, FlankerPhase, Phase, PvtPhase};
use vigil_experiment::{FlankerEngine, FlankerTimer, PvtEngine, PvtTimer};
use vigil_render::{flanker_view, pvt_view, Scene, SkiaRenderer, View};
use vigil_store::JsonFileStore;
use vigil_timing::{HighPrecisionTimer, RealtimeScheduler};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Icon, Window, WindowId},
};

use crate::config::AppConfig;
use crate::session::{Session, Stage};

type Pvt = PvtEngine<RealtimeScheduler<PvtTimer>, StdRng>;
type Flanker = FlankerEngine<RealtimeScheduler<FlankerTimer>, StdRng>;

enum ActiveTask {
    Pvt(Box<Pvt>),
    Flanker(Box<Flanker>),
    Done,
}

impl ActiveTask {
    fn spawn(stage: Stage, config: &AppConfig, rng: &mut StdRng) -> Self {
        match stage {
            Stage::Pvt => ActiveTask::Pvt(Box::new(PvtEngine::new(
                config.pvt.clone(),
                RealtimeScheduler::new(),
                StdRng::from_rng(rng),
            ))),
            Stage::Flanker => ActiveTask::Flanker(Box::new(FlankerEngine::new(
                config.flanker.clone(),
                RealtimeScheduler::new(),
                StdRng::from_rng(rng),
            ))),
            Stage::Done => ActiveTask::Done,
        }
    }

    fn view(&self) -> View {
        match self {
            ActiveTask::Pvt(engine) => pvt_view(&**engine),
            ActiveTask::Flanker(engine) => flanker_view(&**engine),
            ActiveTask::Done => View::new(Scene::Finished),
        }
    }
}

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    icon: Option<Icon>,
    refresh_rate: Option<f64>,

    config: AppConfig,
    session: Session<JsonFileStore, StdRng>,
    task: ActiveTask,
    rng: StdRng,
    frame_timer: HighPrecisionTimer,

    should_exit: bool,
}

impl App {
    pub fn new(
        config: AppConfig,
        session: Session<JsonFileStore, StdRng>,
        mut rng: StdRng,
    ) -> Self {
        let task = ActiveTask::spawn(session.stage(), &config, &mut rng);
        let icon = match window_icon() {
            Ok(icon) => Some(icon),
            Err(e) => {
                tracing::warn!(error = %e, "window icon unavailable");
                None
            }
        };

        Self {
            window: None,
            pixels: None,
            renderer: None,
            icon,
            refresh_rate: None,
            config,
            session,
            task,
            rng,
            frame_timer: HighPrecisionTimer::new(),
            should_exit: false,
        }
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new().context("creating event loop")?;
        tracing::info!(
            platform = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            "press SPACE to start a task, ESC to quit"
        );
        event_loop.run_app(&mut self)?;
        Ok(())
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .context("no monitor available")?;
        self.refresh_rate = monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let attributes = Window::default_attributes()
            .with_title("Vigil")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))))
            .with_resizable(false)
            .with_window_icon(self.icon.clone());

        let window = Arc::new(event_loop.create_window(attributes)?);
        let size = window.inner_size();
        tracing::info!(
            width = size.width,
            height = size.height,
            scale = window.scale_factor(),
            refresh_hz = self.refresh_rate,
            "display configured"
        );

        let surface = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(Pixels::new(size.width, size.height, surface)?);
        self.renderer = Some(SkiaRenderer::new(size.width, size.height)?);

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    /// Fires due timers and moves to the next task once the current one is over.
    fn update(&mut self) -> Result<()> {
        let next = match &mut self.task {
            ActiveTask::Pvt(engine) => {
                engine.pump();
                match engine.result() {
                    Some(result) => Some(self.session.pvt_finished(result)?),
                    None => None,
                }
            }
            ActiveTask::Flanker(engine) => {
                engine.pump();
                match engine.result() {
                    Some(result) => Some(self.session.flanker_finished(result)?),
                    None => None,
                }
            }
            ActiveTask::Done => None,
        };

        if let Some(stage) = next {
            self.task = ActiveTask::spawn(stage, &self.config, &mut self.rng);
            if stage == Stage::Done && self.session.has_unsaved() {
                tracing::warn!("some results are not stored yet; press R to retry");
            }
        }
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pixels), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };
        let view = self.task.view();
        let stats = renderer.render_frame(&view, pixels.frame_mut(), &mut self.frame_timer)?;
        pixels.render().context("presenting frame")?;

        tracing::trace!(
            clear_us = stats.clear.as_micros() as u64,
            draw_us = stats.draw.as_micros() as u64,
            copy_us = stats.copy.as_micros() as u64,
            total_us = stats.total.as_micros() as u64,
            dirty = stats.dirty_count,
            "frame"
        );
        Ok(())
    }

    fn handle_key(&mut self, event: &KeyEvent, event_loop: &ActiveEventLoop) {
        if event.repeat {
            return;
        }
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        // timers that came due before the key press must run first
        if let Err(e) = self.update() {
            tracing::error!(error = %format!("{e:#}"), "task update failed");
        }

        if code == KeyCode::Escape {
            self.abort_and_exit(event_loop);
            return;
        }
        match &mut self.task {
            ActiveTask::Pvt(engine) => {
                if matches!(code, KeyCode::Space | KeyCode::Enter | KeyCode::NumpadEnter) {
                    if engine.phase() == PvtPhase::Ready {
                        engine.start();
                    } else {
                        engine.handle_response();
                    }
                }
            }
            ActiveTask::Flanker(engine) => match code {
                KeyCode::Space if engine.phase() == FlankerPhase::Ready => {
                    engine.start();
                }
                KeyCode::ArrowLeft => {
                    engine.handle_response(Direction::Left);
                }
                KeyCode::ArrowRight => {
                    engine.handle_response(Direction::Right);
                }
                _ => {}
            },
            ActiveTask::Done => match code {
                KeyCode::KeyR => self.session.retry(),
                KeyCode::Space | KeyCode::Enter => self.exit(event_loop),
                _ => {}
            },
        }
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(size.width, size.height) {
                tracing::error!(error = %e, "failed to resize surface");
            }
            if let Err(e) = pixels.resize_buffer(size.width, size.height) {
                tracing::error!(error = %e, "failed to resize buffer");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(size.width, size.height) {
                tracing::error!(error = %e, "failed to resize renderer");
            }
        }
        tracing::info!(width = size.width, height = size.height, "display resized");
    }

    fn abort_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        let aborted = match &mut self.task {
            ActiveTask::Pvt(engine) if engine.phase().is_running() => {
                engine.abort();
                true
            }
            ActiveTask::Flanker(engine) if engine.phase().is_running() => {
                engine.abort();
                true
            }
            _ => false,
        };
        if aborted {
            tracing::warn!("task aborted; its partial results are discarded");
            self.task = ActiveTask::Done;
        }
        self.exit(event_loop);
    }

    fn exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        self.should_exit = true;
        event_loop.exit();
    }

    fn log_timing(&self) {
        let stats = self.frame_timer.calibration_stats();
        tracing::info!(
            frames = self.frame_timer.frame_count(),
            avg_ms = stats.average_frame_time_ns / 1e6,
            jitter_ms = stats.jitter_ns / 1e6,
            min_ms = stats.min_frame_time_ns / 1e6,
            max_ms = stats.max_frame_time_ns / 1e6,
            fps = stats.effective_fps,
            "frame timing"
        );
        if let Some(renderer) = &self.renderer {
            for stage in ["clear", "draw", "copy"] {
                if let Some(s) = renderer.component_stats(stage) {
                    tracing::debug!(stage, avg_us = s.average_frame_time_ns / 1e3, "render stage");
                }
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                tracing::error!(error = %format!("{e:#}"), "failed to create window");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.abort_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.update().and_then(|()| self.render()) {
                    tracing::error!(error = %format!("{e:#}"), "frame failed");
                    self.exit(event_loop);
                    return;
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                self.handle_key(&event, event_loop);
            }
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    self.handle_resize(size);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.log_timing();
        tracing::info!(
            stored = self.session.saved().len(),
            unsaved = self.session.has_unsaved(),
            "session closed"
        );
    }
}

/// A small stimulus-red disc.
fn window_icon() -> Result<Icon> {
    const SIZE: u32 = 32;
    let mut pixmap = Pixmap::new(SIZE, SIZE).context("icon pixmap")?;
    let r = SIZE as f32 / 2.0;
    let path = PathBuilder::from_circle(r, r, r - 1.0).context("icon path")?;
    let mut paint = Paint::default();
    paint.set_color(Color::from_rgba8(230, 57, 70, 255));
    pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);

    let rgba = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    Icon::from_rgba(rgba, SIZE, SIZE).context("building window icon")
}
