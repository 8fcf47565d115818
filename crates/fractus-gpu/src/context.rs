//! GPU context management.

use crate::capabilities::GpuCapabilities;
use crate::error::{GpuError, Result, VkResultExt};
use crate::instance::{create_instance, select_physical_device};
use crate::memory::GpuAllocator;
use ash::vk;
use fractus_core::QueueRole;
use parking_lot::Mutex;
use std::ffi::CStr;
use std::sync::Arc;

/// Main GPU context holding the device and its two queues.
///
/// The compute queue runs the fractal kernels. The present queue copies the
/// finished image into the swapchain and presents it. On hardware without a
/// separate compute family both roles share one family but keep distinct
/// submissions.
pub struct GpuContext {
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: Arc<ash::Device>,
    pub(crate) capabilities: GpuCapabilities,
    pub(crate) allocator: Mutex<GpuAllocator>,

    pub(crate) present_queue_family: u32,
    pub(crate) compute_queue_family: u32,
    pub(crate) present_queue: vk::Queue,
    pub(crate) compute_queue: vk::Queue,
}

impl GpuContext {
    /// Get the Vulkan entry point.
    pub const fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the physical device handle.
    pub const fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get GPU capabilities.
    pub const fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    /// Get the Vulkan instance handle.
    pub const fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get access to the GPU allocator.
    pub const fn allocator(&self) -> &Mutex<GpuAllocator> {
        &self.allocator
    }

    /// Queue that serves `role`.
    pub const fn queue(&self, role: QueueRole) -> vk::Queue {
        match role {
            QueueRole::Compute => self.compute_queue,
            QueueRole::Present => self.present_queue,
        }
    }

    /// Queue family index that serves `role`.
    pub const fn queue_family(&self, role: QueueRole) -> u32 {
        match role {
            QueueRole::Compute => self.compute_queue_family,
            QueueRole::Present => self.present_queue_family,
        }
    }

    /// Distinct queue family indices in use.
    ///
    /// Resources touched by both queues are created with concurrent sharing
    /// over these families when there is more than one.
    pub fn queue_families(&self) -> Vec<u32> {
        if self.compute_queue_family == self.present_queue_family {
            vec![self.present_queue_family]
        } else {
            vec![self.compute_queue_family, self.present_queue_family]
        }
    }

    /// Wait for device to be idle.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.context("vkDeviceWaitIdle")
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            // Allocations must go before the device
            self.allocator.lock().shutdown();

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

/// Builder for creating a GPU context.
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
    async_compute: bool,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Fractus".to_string(),
            enable_validation: cfg!(debug_assertions),
            async_compute: true,
        }
    }
}

impl GpuContextBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    #[must_use]
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    #[must_use]
    pub const fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Use a dedicated compute family when the device has one.
    #[must_use]
    pub const fn async_compute(mut self, enable: bool) -> Self {
        self.async_compute = enable;
        self
    }

    /// Build the GPU context.
    pub fn build(self) -> Result<GpuContext> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::Other(format!("Failed to load Vulkan: {e}")))?;

        let instance = unsafe { create_instance(&entry, &self.app_name, self.enable_validation) }?;

        let physical_device = unsafe { select_physical_device(&instance) }?;

        let capabilities = unsafe { GpuCapabilities::query(&instance, physical_device) };
        tracing::info!("Selected GPU: {}", capabilities.summary());

        let queue_families =
            unsafe { find_queue_families(&instance, physical_device, self.async_compute) }?;
        tracing::info!(
            "Queue families: compute={} present={}",
            queue_families.compute,
            queue_families.present
        );

        let (device, present_queue, compute_queue) =
            unsafe { create_device(&instance, physical_device, &queue_families)? };

        let device = Arc::new(device);

        let allocator = unsafe { GpuAllocator::new(&instance, device.clone(), physical_device) }?;

        Ok(GpuContext {
            entry,
            instance,
            physical_device,
            device,
            capabilities,
            allocator: Mutex::new(allocator),
            present_queue_family: queue_families.present,
            compute_queue_family: queue_families.compute,
            present_queue,
            compute_queue,
        })
    }
}

/// Queue family indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueFamilyIndices {
    present: u32,
    compute: u32,
}

/// Pick families from their flags.
///
/// Present work needs a blit, which requires a graphics family. Compute
/// prefers a family without graphics.
fn pick_queue_families(
    families: &[vk::QueueFamilyProperties],
    async_compute: bool,
) -> Option<QueueFamilyIndices> {
    let has = |family: &vk::QueueFamilyProperties, flags| family.queue_flags.contains(flags);

    let present = families
        .iter()
        .position(|f| has(f, vk::QueueFlags::GRAPHICS) && f.queue_count > 0)?;

    let dedicated = families.iter().position(|f| {
        has(f, vk::QueueFlags::COMPUTE) && !has(f, vk::QueueFlags::GRAPHICS) && f.queue_count > 0
    });

    let compute = match dedicated {
        Some(index) if async_compute => index,
        _ => present,
    };

    Some(QueueFamilyIndices {
        present: u32::try_from(present).ok()?,
        compute: u32::try_from(compute).ok()?,
    })
}

/// Find queue families for compute and present.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn find_queue_families(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    async_compute: bool,
) -> Result<QueueFamilyIndices> {
    let families = instance.get_physical_device_queue_family_properties(physical_device);
    pick_queue_families(&families, async_compute).ok_or(GpuError::NoSuitableDevice)
}

/// Required device extensions.
fn required_device_extensions() -> Vec<&'static CStr> {
    vec![ash::khr::swapchain::NAME]
}

/// Create the logical device and retrieve queues.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_families: &QueueFamilyIndices,
) -> Result<(ash::Device, vk::Queue, vk::Queue)> {
    let mut unique_families = vec![queue_families.present];
    if queue_families.compute != queue_families.present {
        unique_families.push(queue_families.compute);
    }

    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    let extensions = required_device_extensions();
    let extension_names: Vec<*const i8> = extensions.iter().map(|ext| ext.as_ptr()).collect();

    let mut vulkan_1_3_features = vk::PhysicalDeviceVulkan13Features::default().synchronization2(true);
    let mut vulkan_1_2_features = vk::PhysicalDeviceVulkan12Features::default().timeline_semaphore(true);

    let mut features2 = vk::PhysicalDeviceFeatures2::default()
        .push_next(&mut vulkan_1_3_features)
        .push_next(&mut vulkan_1_2_features);

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .push_next(&mut features2);

    let device = instance
        .create_device(physical_device, &device_create_info, None)
        .context("vkCreateDevice")?;

    let present_queue = device.get_device_queue(queue_families.present, 0);
    let compute_queue = device.get_device_queue(queue_families.compute, 0);

    Ok((device, present_queue, compute_queue))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn prefers_dedicated_compute_family() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
        ];

        let picked = pick_queue_families(&families, true).unwrap();
        assert_eq!(picked, QueueFamilyIndices { present: 0, compute: 2 });

        let shared = pick_queue_families(&families, false).unwrap();
        assert_eq!(shared, QueueFamilyIndices { present: 0, compute: 0 });
    }

    #[test]
    fn falls_back_to_graphics_family() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let picked = pick_queue_families(&families, true).unwrap();
        assert_eq!(picked, QueueFamilyIndices { present: 0, compute: 0 });
    }

    #[test]
    fn requires_graphics_family() {
        let families = [family(vk::QueueFlags::COMPUTE)];
        assert!(pick_queue_families(&families, true).is_none());
    }
}
