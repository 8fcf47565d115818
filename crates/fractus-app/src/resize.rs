//! Surface and render target recreation.

use fractus_core::{Extent, ViewState};
use tracing::{debug, info};

use crate::scheduler::{FrameBackend, FrameScheduler};

/// Rebuilds size-dependent state under a full drain.
#[derive(Debug, Default)]
pub struct ResizeCoordinator {
    initialized: bool,
    /// Presentation settings changed while the surface could not be rebuilt.
    surface_stale: bool,
}

impl ResizeCoordinator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initialized: false,
            surface_stale: false,
        }
    }

    /// Whether the initial sizing has happened.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether the display surface awaits a rebuild.
    #[must_use]
    pub const fn is_surface_stale(&self) -> bool {
        self.surface_stale
    }

    /// Resize everything to `extent`.
    ///
    /// The first call only creates the display surface images; Main and
    /// Minimap were created with the backend at that size.
    pub fn resize<B: FrameBackend>(
        &mut self,
        backend: &mut B,
        scheduler: &FrameScheduler,
        view: &mut ViewState,
        extent: Extent,
    ) -> Result<(), B::Error> {
        view.set_extent(extent);
        scheduler.drain(backend)?;

        backend.recreate_surface(extent, view.vsync)?;
        if self.initialized {
            backend.recreate_targets(extent, scheduler.residency())?;
        }
        scheduler.write_all_params(backend, view)?;
        backend.rebuild_bindings(scheduler.residency())?;

        info!(
            "{} to {}x{}",
            if self.initialized { "Resized" } else { "Sized" },
            extent.width,
            extent.height
        );
        self.initialized = true;
        self.surface_stale = false;
        Ok(())
    }

    /// Recreate the display surface with a new presentation mode.
    pub fn set_vsync<B: FrameBackend>(
        &mut self,
        backend: &mut B,
        scheduler: &FrameScheduler,
        view: &ViewState,
    ) -> Result<(), B::Error> {
        scheduler.drain(backend)?;
        backend.recreate_surface(view.extent(), view.vsync)?;
        self.surface_stale = false;
        info!("Vsync {}", if view.vsync { "on" } else { "off" });
        Ok(())
    }

    /// Record a presentation change made while suspended.
    ///
    /// A minimized window has no usable surface size, so the rebuild waits
    /// for [`ResizeCoordinator::refresh_surface`].
    pub fn defer_vsync(&mut self, view: &ViewState) {
        self.surface_stale = true;
        debug!(
            "Vsync {} once restored",
            if view.vsync { "on" } else { "off" }
        );
    }

    /// Rebuild the surface if a deferred change is pending.
    pub fn refresh_surface<B: FrameBackend>(
        &mut self,
        backend: &mut B,
        scheduler: &FrameScheduler,
        view: &ViewState,
    ) -> Result<(), B::Error> {
        if self.surface_stale {
            self.set_vsync(backend, scheduler, view)?;
        }
        Ok(())
    }
}
