//! Vulkan layer for the Fractus fractal viewer.
//!
//! This crate provides:
//! - Instance and device creation with separate compute and present queues
//! - GPU capability detection
//! - Memory allocation via gpu-allocator
//! - Command pools and `vkQueueSubmit2` helpers
//! - Timeline-semaphore fences per frame slot
//! - Swapchain handling
//! - Compute pipelines, descriptor sets and kernel loading
//! - Encoding of frame plan transitions into image barriers

pub mod barrier;
pub mod capabilities;
pub mod command;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod instance;
pub mod kernels;
pub mod memory;
pub mod pipeline;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use capabilities::{GpuCapabilities, GpuVendor};
pub use context::{GpuContext, GpuContextBuilder};
pub use descriptors::{
    write_sampled_image, write_storage_image, write_uniform_buffer, DescriptorPool,
    DescriptorSetLayoutBuilder,
};
pub use error::{GpuError, Result, VkResultExt};
pub use kernels::{KernelLibrary, KernelSource};
pub use memory::{GpuAllocator, GpuBuffer, GpuImage};
pub use pipeline::ComputePipeline;
pub use surface::{SurfaceCapabilities, SurfaceContext};
pub use swapchain::Swapchain;
pub use sync::{create_semaphore, create_timeline_semaphore, FenceTracker, SemaphoreRing};
