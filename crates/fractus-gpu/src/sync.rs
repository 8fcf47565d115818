//! Synchronization primitives.
//!
//! Per-slot fences are timeline semaphores: one per fence family and slot.
//! Values come from [`fractus_core::Timeline`]; this module only maps them
//! onto Vulkan handles.

use crate::error::{GpuError, Result, VkResultExt};
use ash::vk;
use fractus_core::{FenceFamily, FenceSignal, FenceWait};

/// Create a binary semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    device
        .create_semaphore(&create_info, None)
        .context("vkCreateSemaphore")
}

/// Create a timeline semaphore starting at `initial_value`.
///
/// # Safety
/// The device must be valid and have timeline semaphores enabled.
pub unsafe fn create_timeline_semaphore(
    device: &ash::Device,
    initial_value: u64,
) -> Result<vk::Semaphore> {
    let mut type_info = vk::SemaphoreTypeCreateInfo::default()
        .semaphore_type(vk::SemaphoreType::TIMELINE)
        .initial_value(initial_value);
    let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);
    device
        .create_semaphore(&create_info, None)
        .context("vkCreateSemaphore")
}

/// Timeline semaphores for every (fence family, slot) pair.
pub struct FenceTracker {
    semaphores: Vec<[vk::Semaphore; 2]>,
}

impl FenceTracker {
    /// Create one timeline semaphore per family for each of `slots` slots.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device, slots: usize) -> Result<Self> {
        let mut semaphores = Vec::with_capacity(slots);
        for _ in 0..slots {
            semaphores.push([
                create_timeline_semaphore(device, 0)?,
                create_timeline_semaphore(device, 0)?,
            ]);
        }
        Ok(Self { semaphores })
    }

    /// Number of slots.
    pub fn slot_count(&self) -> usize {
        self.semaphores.len()
    }

    /// Semaphore backing `family` for `slot`.
    pub fn semaphore(&self, family: FenceFamily, slot: usize) -> Result<vk::Semaphore> {
        self.semaphores
            .get(slot)
            .map(|pair| pair[family.index()])
            .ok_or_else(|| GpuError::InvalidState(format!("no fence for slot {slot}")))
    }

    /// Submit info that raises a fence to the signal's value.
    pub fn signal_info(
        &self,
        signal: FenceSignal,
        stage: vk::PipelineStageFlags2,
    ) -> Result<vk::SemaphoreSubmitInfo<'static>> {
        Ok(vk::SemaphoreSubmitInfo::default()
            .semaphore(self.semaphore(signal.family, signal.slot)?)
            .value(signal.value)
            .stage_mask(stage))
    }

    /// Submit info that holds a queue until a fence reaches the wait's value.
    pub fn wait_info(
        &self,
        wait: FenceWait,
        stage: vk::PipelineStageFlags2,
    ) -> Result<vk::SemaphoreSubmitInfo<'static>> {
        Ok(vk::SemaphoreSubmitInfo::default()
            .semaphore(self.semaphore(wait.family, wait.slot)?)
            .value(wait.value)
            .stage_mask(stage))
    }

    /// Value the GPU has completed for a fence.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn completed_value(
        &self,
        device: &ash::Device,
        family: FenceFamily,
        slot: usize,
    ) -> Result<u64> {
        device
            .get_semaphore_counter_value(self.semaphore(family, slot)?)
            .context("vkGetSemaphoreCounterValue")
    }

    /// Block the CPU until every wait in `waits` has completed.
    ///
    /// # Safety
    /// The device must be valid.
    #[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
    pub unsafe fn block_until(&self, device: &ash::Device, waits: &[FenceWait]) -> Result<()> {
        if waits.is_empty() {
            return Ok(());
        }

        let semaphores = waits
            .iter()
            .map(|wait| self.semaphore(wait.family, wait.slot))
            .collect::<Result<Vec<_>>>()?;
        let values: Vec<u64> = waits.iter().map(|wait| wait.value).collect();

        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);
        device
            .wait_semaphores(&wait_info, u64::MAX)
            .context("vkWaitSemaphores")
    }

    /// Destroy all semaphores.
    ///
    /// # Safety
    /// The device must be valid and no submission may still reference them.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        for pair in &self.semaphores {
            for &semaphore in pair {
                device.destroy_semaphore(semaphore, None);
            }
        }
    }
}

/// Ring of binary semaphores handed to swapchain acquisition.
///
/// The image index is unknown until acquisition returns, so the acquire
/// semaphore cannot be tied to a slot. Each entry remembers the drain of
/// the frame that last waited on it; that drain must complete before the
/// entry is handed out again.
pub struct SemaphoreRing {
    entries: Vec<(vk::Semaphore, Option<FenceWait>)>,
    current: usize,
}

impl SemaphoreRing {
    /// Create a ring of `count` semaphores.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device, count: usize) -> Result<Self> {
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            entries.push((create_semaphore(device)?, None));
        }
        Ok(Self {
            entries,
            current: 0,
        })
    }

    /// Current semaphore and the drain it must wait for before reuse.
    pub fn current(&self) -> Result<(vk::Semaphore, Option<FenceWait>)> {
        self.entries
            .get(self.current)
            .copied()
            .ok_or_else(|| GpuError::InvalidState("empty semaphore ring".to_string()))
    }

    /// Tag the current semaphore with the drain of the frame that consumed
    /// it and move to the next one.
    pub fn retire(&mut self, drained: FenceWait) {
        if let Some(entry) = self.entries.get_mut(self.current) {
            entry.1 = Some(drained);
            self.current = (self.current + 1) % self.entries.len();
        }
    }

    /// Destroy all semaphores.
    ///
    /// # Safety
    /// The device must be valid and no submission may still reference them.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        for (semaphore, _) in &self.entries {
            device.destroy_semaphore(*semaphore, None);
        }
    }
}
