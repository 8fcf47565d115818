//! GPU error types.

use std::panic::Location;
use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
///
/// None of these are recovered from. The runner logs them and exits.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error without call context.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// A Vulkan call failed.
    #[error("{operation} failed: {result} ({code}) at {location}", code = result.as_raw())]
    Call {
        operation: &'static str,
        result: vk::Result,
        location: &'static Location<'static>,
    },

    /// The logical device was lost.
    #[error("Device lost during {operation} at {location}")]
    DeviceLost {
        operation: &'static str,
        location: &'static Location<'static>,
    },

    /// No suitable GPU found.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// Memory allocation failed.
    #[error("Memory allocation failed: {0}")]
    AllocationFailed(String),

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// Pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// Kernel bytecode could not be read.
    #[error("Failed to load kernel {path}: {source}")]
    KernelLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Copy into a parameter buffer failed.
    #[error("Parameter buffer write failed: {0}")]
    ParamsWrite(String),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl GpuError {
    /// Classify a failed call, separating device loss from other failures.
    #[must_use]
    pub fn call(
        operation: &'static str,
        result: vk::Result,
        location: &'static Location<'static>,
    ) -> Self {
        if result == vk::Result::ERROR_DEVICE_LOST {
            Self::DeviceLost {
                operation,
                location,
            }
        } else {
            Self::Call {
                operation,
                result,
                location,
            }
        }
    }

    /// Whether this error reports a lost device.
    #[must_use]
    pub const fn is_device_lost(&self) -> bool {
        matches!(
            self,
            Self::DeviceLost { .. } | Self::Vulkan(vk::Result::ERROR_DEVICE_LOST)
        )
    }
}

/// Attach the failing operation and caller location to a raw Vulkan result.
pub trait VkResultExt<T> {
    fn context(self, operation: &'static str) -> Result<T>;
}

impl<T> VkResultExt<T> for std::result::Result<T, vk::Result> {
    #[track_caller]
    fn context(self, operation: &'static str) -> Result<T> {
        let location = Location::caller();
        self.map_err(|result| GpuError::call(operation, result, location))
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_loss_is_classified() {
        let failed: std::result::Result<(), vk::Result> = Err(vk::Result::ERROR_DEVICE_LOST);
        let err = failed.context("vkQueueSubmit2").unwrap_err();
        assert!(err.is_device_lost());
        assert!(err.to_string().starts_with("Device lost during vkQueueSubmit2"));
    }

    #[test]
    fn call_error_reports_operation_and_code() {
        let failed: std::result::Result<(), vk::Result> =
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        let err = failed.context("vkCreateImage").unwrap_err();
        assert!(!err.is_device_lost());

        let message = err.to_string();
        assert!(message.contains("vkCreateImage"));
        assert!(message.contains("-2"));
        assert!(message.contains("error.rs"));
    }
}
