//! View state and input integration.

use glam::Vec2;

use crate::config::ViewConfig;
use crate::controls::{ControlEvent, HeldControls};
use crate::fractal::{FractalFamily, RenderMode};
use crate::params::FractalParams;
use crate::plan::Extent;

/// Lower bound for the viewport center.
pub const MIN_CENTER: Vec2 = Vec2::new(-3.0, -1.8);
/// Upper bound for the viewport center.
pub const MAX_CENTER: Vec2 = Vec2::new(2.0, 1.8);
/// Smallest horizontal viewport extent. Below this f32 plane coordinates stop resolving pixels.
pub const MIN_SCALE: f32 = 1.0e-5;

/// Pan distance per integrated second, as a fraction of the viewport extent.
const PAN_RATE: f32 = 0.5;

/// Rectangle of the complex plane mapped onto the output image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Width and height in plane units.
    pub scale: Vec2,
    /// Plane coordinate at the image center.
    pub center: Vec2,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::from_config(&ViewConfig::default())
    }
}

impl Viewport {
    #[must_use]
    pub const fn new(scale: Vec2, center: Vec2) -> Self {
        Self { scale, center }
    }

    #[must_use]
    pub const fn from_config(config: &ViewConfig) -> Self {
        Self::new(config.scale, config.center)
    }

    /// Multiply both extents by `factor`, keeping the aspect ratio and the scale floor.
    pub fn zoom(&mut self, factor: f32) {
        let factor = factor.max(MIN_SCALE / self.scale.x);
        self.scale *= factor;
    }

    /// Move the center by `amount` viewport extents.
    pub fn pan(&mut self, amount: Vec2) {
        self.center += self.scale * amount;
    }

    /// Keep the center inside the region where the fractals live.
    pub fn clamp_center(&mut self) {
        self.center = self.center.clamp(MIN_CENTER, MAX_CENTER);
    }

    /// Map a pixel position (origin top-left, y down) to plane coordinates.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn pixel_to_plane(&self, pixel: Vec2, extent: Extent) -> Vec2 {
        let uv = Vec2::new(
            pixel.x / extent.width as f32 - 0.5,
            0.5 - pixel.y / extent.height as f32,
        );
        uv * self.scale + self.center
    }
}

/// Side effect requested by a control event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewChange {
    None,
    FamilyChanged(FractalFamily),
    ModeChanged(RenderMode),
    VsyncChanged(bool),
    FullscreenChanged(bool),
    Quit,
}

/// Free-running simulation state. Mutated by input, read once per frame.
#[derive(Debug, Clone)]
pub struct ViewState {
    /// The pannable, zoomable viewport.
    pub viewport: Viewport,
    pub max_iterations: f32,
    /// Detail (Julia) parameter picked with the pointer.
    pub target: Vec2,
    pub family: FractalFamily,
    pub mode: RenderMode,
    pub vsync: bool,
    pub fullscreen: bool,
    held: HeldControls,
    cursor: Vec2,
    extent: Extent,
    defaults: ViewConfig,
}

impl ViewState {
    /// Create a view at the configured defaults.
    #[must_use]
    pub fn new(config: ViewConfig, extent: Extent) -> Self {
        Self {
            viewport: Viewport::from_config(&config),
            max_iterations: config.max_iterations,
            target: Vec2::ZERO,
            family: config.family,
            mode: config.mode,
            vsync: true,
            fullscreen: false,
            held: HeldControls::empty(),
            cursor: Vec2::ZERO,
            extent,
            defaults: config,
        }
    }

    /// Set the presentation flags.
    #[must_use]
    pub const fn with_display(mut self, vsync: bool, fullscreen: bool) -> Self {
        self.vsync = vsync;
        self.fullscreen = fullscreen;
        self
    }

    /// Current output dimensions.
    #[must_use]
    pub const fn extent(&self) -> Extent {
        self.extent
    }

    /// Controls currently held.
    #[must_use]
    pub const fn held(&self) -> HeldControls {
        self.held
    }

    /// Record new output dimensions. Viewport values are untouched.
    pub fn set_extent(&mut self, extent: Extent) {
        self.extent = extent;
    }

    /// Apply one control event.
    pub fn apply(&mut self, event: ControlEvent) -> ViewChange {
        match event {
            ControlEvent::Press(control) => {
                self.held.insert(control.flag());
                ViewChange::None
            }
            ControlEvent::Release(control) => {
                self.held.remove(control.flag());
                ViewChange::None
            }
            ControlEvent::PointerDown => {
                if self.mode == RenderMode::DetailOnly {
                    self.reset_view();
                    self.target = Vec2::ZERO;
                }
                self.held.insert(HeldControls::POINTER);
                ViewChange::None
            }
            ControlEvent::PointerUp => {
                self.held.remove(HeldControls::POINTER);
                ViewChange::None
            }
            ControlEvent::CursorMoved(position) => {
                self.cursor = position;
                ViewChange::None
            }
            ControlEvent::SelectFamily(family) => {
                if family == self.family {
                    return ViewChange::None;
                }
                self.family = family;
                ViewChange::FamilyChanged(family)
            }
            ControlEvent::ToggleMode => {
                self.mode = self.mode.toggled();
                if self.mode == RenderMode::DetailOnly {
                    self.reset_view();
                }
                ViewChange::ModeChanged(self.mode)
            }
            ControlEvent::ToggleVsync => {
                self.vsync = !self.vsync;
                ViewChange::VsyncChanged(self.vsync)
            }
            ControlEvent::ToggleFullscreen => {
                self.fullscreen = !self.fullscreen;
                ViewChange::FullscreenChanged(self.fullscreen)
            }
            ControlEvent::Quit => ViewChange::Quit,
        }
    }

    /// Advance the view by `dt` wall-clock seconds of held input.
    ///
    /// Nothing changes while no control is held.
    pub fn integrate(&mut self, dt: f32) {
        if self.held.is_empty() {
            return;
        }

        let elapsed = dt * self.defaults.time_scale;
        let zoom = self.held.zoom_axis();
        self.viewport
            .zoom(zoom.mul_add(self.defaults.scale_speed * elapsed, 1.0));
        self.viewport.pan(self.held.pan_axis() * elapsed * PAN_RATE);
        self.viewport.clamp_center();

        if self.held.contains(HeldControls::POINTER) {
            self.target = self.viewport.pixel_to_plane(self.cursor, self.extent);
        }
    }

    /// Parameters for the movable (user-driven) view.
    #[must_use]
    pub fn movable_params(&self) -> FractalParams {
        FractalParams::new(self.extent, self.max_iterations, &self.viewport, self.target)
    }

    /// Parameters for the minimap: the default viewport with the current click target.
    #[must_use]
    pub fn stationary_params(&self) -> FractalParams {
        FractalParams::new(
            self.extent,
            self.defaults.max_iterations,
            &Viewport::from_config(&self.defaults),
            self.target,
        )
    }

    /// Restore viewport and iteration cap. The click target is kept.
    fn reset_view(&mut self) {
        self.viewport = Viewport::from_config(&self.defaults);
        self.max_iterations = self.defaults.max_iterations;
    }
}
