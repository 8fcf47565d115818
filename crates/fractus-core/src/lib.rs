//! Core types for the Fractus fractal viewer.
//!
//! This crate holds everything that does not touch the GPU:
//! - View state, input integration and the viewport transform
//! - The parameter record shared with the compute kernels
//! - Per-slot fence bookkeeping for the compute and present queues
//! - Ordered frame plans (barriers, dispatches, copies) for both queues
//! - The window lifecycle state machine
//! - Configuration and error types

pub mod config;
pub mod controls;
pub mod error;
pub mod fractal;
pub mod lifecycle;
pub mod params;
pub mod plan;
pub mod residency;
pub mod timeline;
pub mod view;

pub use config::ViewConfig;
pub use controls::{ControlEvent, HeldControls, MoveControl};
pub use error::{Error, Result};
pub use fractal::{FractalFamily, KernelId, KernelVariant, RenderMode};
pub use lifecycle::{Lifecycle, LifecycleEvent, LifecycleHooks, LifecycleState};
pub use params::FractalParams;
pub use plan::{
    BindingKey, Dispatch, Extent, FramePlan, ImageState, ImageStates, Op, ParamsKind, QueueRole,
    Target, Transition,
};
pub use residency::{MinimapResidency, Residency, ResidencyChange};
pub use timeline::{FenceFamily, FenceSignal, FenceWait, Timeline};
pub use view::{ViewChange, ViewState, Viewport};

/// Viewer-wide constants
pub mod constants {
    /// Default number of frame slots (frames in flight)
    pub const FRAME_SLOTS: usize = 3;
    /// Edge length of a compute workgroup, in invocations
    pub const WORKGROUP_EDGE: u32 = 32;
    /// Default iteration cap handed to the kernels
    pub const DEFAULT_MAX_ITERATIONS: f32 = 700.0;
    /// Smallest window width the viewer accepts
    pub const MIN_WINDOW_WIDTH: u32 = 300;
    /// Smallest window height the viewer accepts
    pub const MIN_WINDOW_HEIGHT: u32 = 200;
}
