//! Application runner and event loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use fractus_core::constants::{FRAME_SLOTS, MIN_WINDOW_HEIGHT, MIN_WINDOW_WIDTH};
use fractus_core::{
    ControlEvent, Error as CoreError, Extent, Lifecycle, LifecycleEvent, LifecycleHooks,
    LifecycleState, Residency, ViewChange, ViewConfig, ViewState,
};
use fractus_gpu::{GpuError, KernelSource};
use fractus_input::ControlMapper;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Fullscreen, Window, WindowId};

use crate::renderer::{Renderer, RendererSettings};
use crate::resize::ResizeCoordinator;
use crate::scheduler::{FrameOutcome, FrameScheduler};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Present with FIFO; otherwise allow tearing.
    pub vsync: bool,
    /// Start in borderless fullscreen.
    pub fullscreen: bool,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Run the kernels on a dedicated compute family when there is one.
    pub async_compute: bool,
    /// Where kernel bytecode is loaded from.
    pub kernels: KernelSource,
    /// Frames in flight.
    pub slots: usize,
    pub view: ViewConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Fractus".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            fullscreen: false,
            validation: cfg!(debug_assertions),
            async_compute: true,
            kernels: KernelSource::Embedded,
            slots: FRAME_SLOTS,
            view: ViewConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    #[must_use]
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Enable or disable vsync.
    #[must_use]
    pub const fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    #[must_use]
    pub const fn with_fullscreen(mut self, fullscreen: bool) -> Self {
        self.fullscreen = fullscreen;
        self
    }

    /// Enable or disable validation layers.
    #[must_use]
    pub const fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    #[must_use]
    pub const fn with_async_compute(mut self, async_compute: bool) -> Self {
        self.async_compute = async_compute;
        self
    }

    /// Load kernels from `dir` instead of the built-in ones.
    #[must_use]
    pub fn with_kernel_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.kernels = KernelSource::Directory(dir.into());
        self
    }

    /// Set the number of frames in flight.
    #[must_use]
    pub const fn with_slots(mut self, slots: usize) -> Self {
        self.slots = slots;
        self
    }

    #[must_use]
    pub fn with_view(mut self, view: ViewConfig) -> Self {
        self.view = view;
        self
    }

    /// Reject settings the viewer cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.slots == 0 {
            return Err(CoreError::InvalidConfig(
                "at least one frame slot is required".to_string(),
            ));
        }
        if self.width < MIN_WINDOW_WIDTH || self.height < MIN_WINDOW_HEIGHT {
            return Err(CoreError::InvalidConfig(format!(
                "window must be at least {MIN_WINDOW_WIDTH}x{MIN_WINDOW_HEIGHT}, got {}x{}",
                self.width, self.height
            )));
        }
        self.view.validate()
    }
}

/// Run the viewer with the given configuration.
///
/// Initializes logging, creates the window and GPU objects, and runs the
/// event loop until the user quits. Fatal errors end the loop and are
/// returned.
pub fn run_app(config: AppConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    config.validate()?;
    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner {
        config,
        lifecycle: Lifecycle::new(),
        mapper: ControlMapper::new(),
        state: None,
        error: None,
    };

    event_loop.run_app(&mut runner)?;

    match runner.error.take() {
        Some(e) => Err(e),
        None => {
            info!("Exited cleanly");
            Ok(())
        }
    }
}

/// Implements winit's `ApplicationHandler` and feeds the lifecycle state machine.
struct AppRunner {
    config: AppConfig,
    lifecycle: Lifecycle,
    mapper: ControlMapper,
    state: Option<AppState>,
    /// First fatal error, returned from [`run_app`].
    error: Option<anyhow::Error>,
}

impl ApplicationHandler for AppRunner {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        info!("Creating application state...");

        match AppState::create(&self.config, event_loop) {
            Ok(state) => {
                self.state = Some(state);
                self.dispatch(event_loop, LifecycleEvent::Initialized);
                info!("Application ready!");
            }
            Err(e) => self.fail(event_loop, e.context("Failed to initialize application")),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match &event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                self.dispatch(event_loop, LifecycleEvent::CloseRequested);
            }
            WindowEvent::RedrawRequested => {
                self.dispatch(event_loop, LifecycleEvent::RedrawRequested);
            }
            WindowEvent::Resized(size) => {
                self.dispatch(
                    event_loop,
                    LifecycleEvent::Resized(Extent::new(size.width, size.height)),
                );
            }
            WindowEvent::Occluded(occluded) => {
                let event = if *occluded {
                    LifecycleEvent::Minimized
                } else {
                    LifecycleEvent::Restored
                };
                self.dispatch(event_loop, event);
            }
            _ => {
                for control in self.mapper.process_window_event(&event) {
                    self.dispatch(event_loop, LifecycleEvent::Control(control));
                }
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.lifecycle.state() == LifecycleState::Ready {
            if let Some(state) = &self.state {
                state.window.request_redraw();
            }
        }
    }
}

impl AppRunner {
    fn dispatch(&mut self, event_loop: &ActiveEventLoop, event: LifecycleEvent) {
        let Some(state) = &mut self.state else {
            return;
        };

        match self.lifecycle.dispatch(state, &event) {
            Ok(LifecycleState::ShuttingDown) => {
                // Dropping the renderer releases every GPU object
                self.state = None;
                event_loop.exit();
            }
            Ok(_) => {}
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        match e.downcast_ref::<GpuError>() {
            Some(gpu) if gpu.is_device_lost() => error!("GPU device lost: {gpu}"),
            _ => error!("Fatal error: {e:#}"),
        }
        self.state = None;
        if self.error.is_none() {
            self.error = Some(e);
        }
        event_loop.exit();
    }
}

/// Min/max/average FPS over the whole run.
#[derive(Debug, Clone, Copy)]
struct FrameStats {
    min_fps: f64,
    max_fps: f64,
    fps_sum: f64,
    frames: u64,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self {
            min_fps: f64::MAX,
            max_fps: 0.0,
            fps_sum: 0.0,
            frames: 0,
        }
    }
}

impl FrameStats {
    fn record(&mut self, dt: f32) {
        if dt > 0.0 {
            let fps = 1.0 / f64::from(dt);
            self.min_fps = self.min_fps.min(fps);
            self.max_fps = self.max_fps.max(fps);
            self.fps_sum += fps;
            self.frames += 1;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn average(&self) -> Option<f64> {
        (self.frames > 0).then(|| self.fps_sum / self.frames as f64)
    }

    fn log(&self) {
        if let Some(avg_fps) = self.average() {
            info!("FPS Statistics:");
            info!("  Min: {:.1}", self.min_fps);
            info!("  Max: {:.1}", self.max_fps);
            info!("  Avg: {:.1}", avg_fps);
            info!("  Total frames: {}", self.frames);
        }
    }
}

/// Everything that exists while the window does.
struct AppState {
    // Declared before the window so GPU objects go first
    renderer: Renderer,
    window: Arc<Window>,
    scheduler: FrameScheduler,
    resize: ResizeCoordinator,
    view: ViewState,
    stats: FrameStats,
    last_frame_time: Instant,
}

impl AppState {
    fn create(config: &AppConfig, event_loop: &ActiveEventLoop) -> anyhow::Result<Self> {
        let window_attrs = Window::default_attributes()
            .with_title(&config.title)
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_min_inner_size(PhysicalSize::new(MIN_WINDOW_WIDTH, MIN_WINDOW_HEIGHT))
            .with_fullscreen(config.fullscreen.then_some(Fullscreen::Borderless(None)));

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let size = window.inner_size();
        let extent = Extent::new(size.width.max(1), size.height.max(1));

        let view = ViewState::new(config.view.clone(), extent)
            .with_display(config.vsync, config.fullscreen);
        let scheduler = FrameScheduler::new(config.slots, view.mode);

        let renderer = Renderer::new(
            &window,
            &RendererSettings {
                app_name: &config.title,
                validation: config.validation,
                async_compute: config.async_compute,
                kernels: &config.kernels,
                slots: scheduler.slot_count(),
                extent,
                minimap: Residency::for_mode(view.mode),
            },
        )?;
        info!("GPU: {}", renderer.gpu().capabilities().summary());

        Ok(Self {
            renderer,
            window,
            scheduler,
            resize: ResizeCoordinator::new(),
            view,
            stats: FrameStats::default(),
            last_frame_time: Instant::now(),
        })
    }

    fn window_extent(&self) -> Extent {
        let size = self.window.inner_size();
        Extent::new(size.width, size.height)
    }

    /// Apply a control event. While suspended the surface is left alone.
    fn apply_control(&mut self, event: ControlEvent, suspended: bool) -> anyhow::Result<()> {
        match self.view.apply(event) {
            ViewChange::FamilyChanged(family) => info!("Fractal family: {:?}", family),
            ViewChange::ModeChanged(mode) => info!("Render mode: {:?}", mode),
            ViewChange::VsyncChanged(_) if suspended => self.resize.defer_vsync(&self.view),
            ViewChange::VsyncChanged(_) => {
                self.resize
                    .set_vsync(&mut self.renderer, &self.scheduler, &self.view)?;
            }
            ViewChange::FullscreenChanged(fullscreen) => {
                self.window
                    .set_fullscreen(fullscreen.then_some(Fullscreen::Borderless(None)));
                info!("Fullscreen {}", if fullscreen { "on" } else { "off" });
            }
            ViewChange::Quit | ViewChange::None => {}
        }
        Ok(())
    }

    fn recreate_surface(&mut self) -> anyhow::Result<()> {
        let extent = self.window_extent();
        if extent.is_empty() {
            return Ok(());
        }
        self.resize
            .resize(&mut self.renderer, &self.scheduler, &mut self.view, extent)
    }
}

impl LifecycleHooks for AppState {
    type Error = anyhow::Error;

    fn initialize(&mut self) -> anyhow::Result<()> {
        let extent = self.view.extent();
        self.resize
            .resize(&mut self.renderer, &self.scheduler, &mut self.view, extent)?;
        self.last_frame_time = Instant::now();
        Ok(())
    }

    fn resize(&mut self, extent: Extent) -> anyhow::Result<()> {
        if extent == self.view.extent() {
            return Ok(());
        }
        self.resize
            .resize(&mut self.renderer, &self.scheduler, &mut self.view, extent)
    }

    fn suspend(&mut self) -> anyhow::Result<()> {
        self.scheduler.drain(&mut self.renderer)?;
        info!("Suspended");
        Ok(())
    }

    fn resume(&mut self) -> anyhow::Result<()> {
        self.resize
            .refresh_surface(&mut self.renderer, &self.scheduler, &self.view)?;
        // Time spent minimized does not count as held input
        self.last_frame_time = Instant::now();
        info!("Resumed");
        Ok(())
    }

    fn render_frame(&mut self) -> anyhow::Result<()> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;

        match self
            .scheduler
            .run_frame(&mut self.renderer, &mut self.view, dt)?
        {
            FrameOutcome::Presented { needs_recreate, .. } => {
                self.stats.record(dt);
                if needs_recreate {
                    debug!("Display surface suboptimal, recreating");
                    self.recreate_surface()?;
                }
            }
            FrameOutcome::OutOfDate => self.recreate_surface()?,
        }
        Ok(())
    }

    fn control(&mut self, event: ControlEvent) -> anyhow::Result<()> {
        self.apply_control(event, false)
    }

    fn defer_control(&mut self, event: ControlEvent) -> anyhow::Result<()> {
        self.apply_control(event, true)
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        self.stats.log();
        info!("Starting cleanup...");
        self.scheduler.drain(&mut self.renderer)?;
        info!(
            "Drained {} slots after {} frames",
            self.scheduler.slot_count(),
            self.scheduler.frames()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn config_builders() {
        let config = AppConfig::new("test")
            .with_size(800, 600)
            .with_vsync(false)
            .with_fullscreen(true)
            .with_slots(2)
            .with_kernel_dir("/tmp/kernels");

        assert_eq!(config.title, "test");
        assert_eq!((config.width, config.height), (800, 600));
        assert!(!config.vsync);
        assert!(config.fullscreen);
        assert_eq!(config.slots, 2);
        assert_eq!(
            config.kernels,
            KernelSource::Directory(PathBuf::from("/tmp/kernels"))
        );
    }

    #[test]
    fn kernels_default_to_built_in() {
        assert_eq!(AppConfig::default().kernels, KernelSource::Embedded);
    }

    #[test]
    fn config_rejects_small_windows_and_zero_slots() {
        let small = AppConfig::default().with_size(299, 200);
        assert!(matches!(small.validate(), Err(CoreError::InvalidConfig(_))));

        let no_slots = AppConfig::default().with_slots(0);
        assert!(matches!(no_slots.validate(), Err(CoreError::InvalidConfig(_))));

        assert!(AppConfig::default().with_size(300, 200).validate().is_ok());
    }

    #[test]
    fn frame_stats() {
        let mut stats = FrameStats::default();
        assert!(stats.average().is_none());

        stats.record(0.5);
        stats.record(0.25);
        stats.record(0.0);

        assert_eq!(stats.frames, 2);
        assert_relative_eq!(stats.min_fps, 2.0);
        assert_relative_eq!(stats.max_fps, 4.0);
        assert_relative_eq!(stats.average().unwrap(), 3.0);
    }
}
