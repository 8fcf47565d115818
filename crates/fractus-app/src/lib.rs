//! Application layer for the Fractus fractal viewer.
//!
//! Ties the pieces together:
//! - [`FrameScheduler`] runs the per-slot frame protocol against a [`FrameBackend`]
//! - [`ResizeCoordinator`] handles initial sizing, resizes and vsync changes
//! - [`Renderer`] is the Vulkan backend (resources, bindings, command recording)
//! - [`run_app`] owns the winit event loop and drives the lifecycle state machine
//!
//! # Example
//!
//! ```ignore
//! use fractus_app::{run_app, AppConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app(AppConfig::new("Fractus").with_vsync(false))
//! }
//! ```

pub mod bindings;
pub mod recorder;
pub mod renderer;
pub mod resize;
pub mod resources;
pub mod runner;
pub mod scheduler;

pub use renderer::Renderer;
pub use resize::ResizeCoordinator;
pub use runner::{run_app, AppConfig};
pub use scheduler::{AcquiredImage, FrameBackend, FrameOutcome, FrameScheduler, Submission};

// Re-export commonly used types
pub use fractus_core::{FractalFamily, RenderMode, ViewConfig};
pub use fractus_gpu::KernelSource;
pub use winit;
