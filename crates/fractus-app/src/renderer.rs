//! Vulkan implementation of [`FrameBackend`].

use ash::vk;
use fractus_core::{
    Extent, FenceFamily, FenceWait, FractalParams, ParamsKind, QueueRole, Residency,
    ResidencyChange,
};
use fractus_gpu::command::{submit, CommandPool};
use fractus_gpu::{
    create_semaphore, FenceTracker, GpuContext, GpuContextBuilder, GpuError, KernelLibrary,
    KernelSource, SemaphoreRing, SurfaceContext, Swapchain,
};
use winit::window::Window;

use crate::bindings::BindingTable;
use crate::recorder::{CommandRecorder, RecordContext};
use crate::resources::ResourceSet;
use crate::scheduler::{AcquiredImage, FrameBackend, Submission};

/// Settings the renderer is created with.
#[derive(Debug, Clone)]
pub struct RendererSettings<'a> {
    pub app_name: &'a str,
    pub validation: bool,
    pub async_compute: bool,
    pub kernels: &'a KernelSource,
    pub slots: usize,
    /// Initial size of Main and Minimap.
    pub extent: Extent,
    pub minimap: Residency,
}

/// Stage a queue waits at before running its part of the frame.
const fn wait_stage(queue: QueueRole) -> vk::PipelineStageFlags2 {
    match queue {
        QueueRole::Compute => vk::PipelineStageFlags2::COMPUTE_SHADER,
        QueueRole::Present => vk::PipelineStageFlags2::ALL_TRANSFER,
    }
}

/// Owns every GPU object of the viewer.
///
/// The display surface images do not exist until the first
/// [`FrameBackend::recreate_surface`] call.
pub struct Renderer {
    surface: SurfaceContext,
    swapchain: Option<Swapchain>,
    /// One per display image, signaled by the present submission.
    present_ready: Vec<vk::Semaphore>,
    fences: FenceTracker,
    acquire: SemaphoreRing,
    /// Acquire semaphore of the frame being built.
    acquired: Option<vk::Semaphore>,
    kernels: KernelLibrary,
    resources: ResourceSet,
    bindings: BindingTable,
    recorder: CommandRecorder,
    setup: CommandPool,
    // Dropped last
    gpu: GpuContext,
}

impl Renderer {
    /// Create the device, surface, kernels and render targets.
    pub fn new(window: &Window, settings: &RendererSettings<'_>) -> anyhow::Result<Self> {
        let gpu = GpuContextBuilder::new()
            .app_name(settings.app_name)
            .validation(settings.validation)
            .async_compute(settings.async_compute)
            .build()?;
        let device = gpu.device();

        // SAFETY: the window outlives the renderer and the context is valid.
        unsafe {
            let surface = SurfaceContext::from_window(&gpu, window)?;
            let fences = FenceTracker::new(device, settings.slots)?;
            let acquire = SemaphoreRing::new(device, settings.slots + 1)?;
            let kernels = KernelLibrary::load(device, settings.kernels)?;
            let setup = CommandPool::new(
                device,
                gpu.queue_family(QueueRole::Compute),
                vk::CommandPoolCreateFlags::TRANSIENT,
            )?;
            let resources = ResourceSet::create(
                &gpu,
                &setup,
                settings.extent,
                settings.slots,
                settings.minimap,
            )?;
            let bindings = BindingTable::new(device, settings.slots)?;
            let recorder = CommandRecorder::new(&gpu, settings.slots)?;

            tracing::info!(
                "Renderer ready: {} slots, compute family {}, present family {}",
                settings.slots,
                gpu.queue_family(QueueRole::Compute),
                gpu.queue_family(QueueRole::Present)
            );

            Ok(Self {
                surface,
                swapchain: None,
                present_ready: Vec::new(),
                fences,
                acquire,
                acquired: None,
                kernels,
                resources,
                bindings,
                recorder,
                setup,
                gpu,
            })
        }
    }

    /// The GPU context.
    #[must_use]
    pub const fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    /// Current display surface images, if created.
    #[must_use]
    pub const fn swapchain(&self) -> Option<&Swapchain> {
        self.swapchain.as_ref()
    }

    fn swapchain_or_err(&self) -> Result<&Swapchain, GpuError> {
        self.swapchain
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState("display surface not created".to_string()))
    }

    /// Replace the per-image present semaphores.
    ///
    /// # Safety
    /// No present may be pending on the old semaphores.
    unsafe fn recreate_present_ready(&mut self, count: usize) -> Result<(), GpuError> {
        let device = self.gpu.device();
        for semaphore in self.present_ready.drain(..) {
            device.destroy_semaphore(semaphore, None);
        }
        for _ in 0..count {
            self.present_ready.push(create_semaphore(device)?);
        }
        Ok(())
    }
}

impl FrameBackend for Renderer {
    type Error = anyhow::Error;

    fn acquire(&mut self) -> anyhow::Result<Option<AcquiredImage>> {
        let Some(swapchain) = &self.swapchain else {
            return Ok(None);
        };

        let (semaphore, last_use) = self.acquire.current()?;
        // SAFETY: handles are valid; the wait guarantees the semaphore is unsignaled.
        let acquired = unsafe {
            if let Some(wait) = last_use {
                self.fences.block_until(self.gpu.device(), &[wait])?;
            }
            swapchain.acquire_next_image(&self.surface.swapchain_loader, semaphore)?
        };

        Ok(acquired.map(|(index, suboptimal)| {
            self.acquired = Some(semaphore);
            AcquiredImage { index, suboptimal }
        }))
    }

    fn block_until(&mut self, waits: &[FenceWait]) -> anyhow::Result<()> {
        // SAFETY: the device is valid.
        unsafe { self.fences.block_until(self.gpu.device(), waits)? };
        Ok(())
    }

    fn apply_residency(&mut self, change: ResidencyChange) -> anyhow::Result<()> {
        // SAFETY: the scheduler drained every slot.
        unsafe {
            match change {
                ResidencyChange::Evict => self.resources.evict_minimap(&self.gpu)?,
                ResidencyChange::MakeResident => {
                    self.resources.make_minimap_resident(&self.gpu, &self.setup)?;
                }
            }
        }
        tracing::debug!(
            "Minimap resident: {}",
            self.resources.minimap.is_resident()
        );
        Ok(())
    }

    fn write_params(
        &mut self,
        slot: usize,
        kind: ParamsKind,
        params: &FractalParams,
    ) -> anyhow::Result<()> {
        self.resources.write_params(slot, kind, params)?;
        Ok(())
    }

    fn submit(&mut self, submission: Submission) -> anyhow::Result<()> {
        let device = self.gpu.device();
        let stage = wait_stage(submission.queue);

        let mut waits = submission
            .waits
            .iter()
            .map(|&wait| self.fences.wait_info(wait, stage))
            .collect::<Result<Vec<_>, GpuError>>()?;
        let mut signals = submission
            .signal
            .map(|signal| {
                self.fences
                    .signal_info(signal, vk::PipelineStageFlags2::ALL_COMMANDS)
            })
            .transpose()?
            .into_iter()
            .collect::<Vec<_>>();

        let mut command_buffers = Vec::with_capacity(1);
        if let Some(plan) = &submission.plan {
            let swapchain = self.swapchain.as_ref().ok_or_else(|| {
                GpuError::InvalidState("display surface not created".to_string())
            })?;
            let image = submission.image as usize;
            let display = *swapchain.images.get(image).ok_or_else(|| {
                GpuError::InvalidState(format!("display image {image} out of range"))
            })?;

            if plan.queue == QueueRole::Present {
                let acquired = self.acquired.take().ok_or_else(|| {
                    GpuError::InvalidState("present without an acquired image".to_string())
                })?;
                waits.push(
                    vk::SemaphoreSubmitInfo::default()
                        .semaphore(acquired)
                        .stage_mask(vk::PipelineStageFlags2::ALL_TRANSFER),
                );
                let ready = *self.present_ready.get(image).ok_or_else(|| {
                    GpuError::InvalidState(format!("no present semaphore for image {image}"))
                })?;
                signals.push(
                    vk::SemaphoreSubmitInfo::default()
                        .semaphore(ready)
                        .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS),
                );
            }

            let ctx = RecordContext {
                kernels: &self.kernels,
                bindings: &self.bindings,
                resources: &self.resources,
                display,
                display_extent: swapchain.extent,
            };
            // SAFETY: the scheduler waited for this slot to drain.
            let cmd = unsafe { self.recorder.record(device, submission.slot, plan, &ctx)? };
            command_buffers.push(cmd);
        }

        // SAFETY: every handle in the submission is alive until its fence signals.
        unsafe {
            submit(
                device,
                self.gpu.queue(submission.queue),
                &command_buffers,
                &waits,
                &signals,
            )?;
        }

        if let Some(signal) = submission.signal {
            if signal.family == FenceFamily::Drained {
                self.acquire.retire(signal.as_wait());
            }
        }
        Ok(())
    }

    fn present(&mut self, image: u32) -> anyhow::Result<bool> {
        let swapchain = self.swapchain_or_err()?;
        let ready = *self.present_ready.get(image as usize).ok_or_else(|| {
            GpuError::InvalidState(format!("no present semaphore for image {image}"))
        })?;

        // SAFETY: the present submission signals `ready` before this wait.
        let out_of_date = unsafe {
            swapchain.present(
                &self.surface.swapchain_loader,
                self.gpu.queue(QueueRole::Present),
                image,
                &[ready],
            )?
        };
        Ok(out_of_date)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn recreate_surface(&mut self, extent: Extent, vsync: bool) -> anyhow::Result<()> {
        self.gpu.wait_idle()?;
        let desired_images = self.fences.slot_count() as u32;

        // SAFETY: the device is idle, so neither the old swapchain nor its
        // semaphores are in use.
        unsafe {
            let swapchain = match &self.swapchain {
                Some(old) => self.surface.recreate_swapchain(
                    &self.gpu,
                    old,
                    extent.width,
                    extent.height,
                    vsync,
                    desired_images,
                )?,
                None => self.surface.create_swapchain(
                    &self.gpu,
                    extent.width,
                    extent.height,
                    vsync,
                    desired_images,
                    None,
                )?,
            };
            tracing::info!(
                "Swapchain created: {}x{} ({} images, {:?})",
                swapchain.extent.width,
                swapchain.extent.height,
                swapchain.images.len(),
                swapchain.present_mode
            );
            let image_count = swapchain.images.len();
            self.swapchain = Some(swapchain);
            self.recreate_present_ready(image_count)?;
        }
        self.acquired = None;
        Ok(())
    }

    fn recreate_targets(&mut self, extent: Extent, minimap: Residency) -> anyhow::Result<()> {
        // SAFETY: the coordinator drained every slot.
        unsafe {
            self.resources
                .recreate_targets(&self.gpu, &self.setup, extent, minimap)?;
        }
        Ok(())
    }

    fn rebuild_bindings(&mut self, minimap: Residency) -> anyhow::Result<()> {
        // SAFETY: every slot drained, so no set is in use.
        unsafe {
            self.bindings
                .rebuild(self.gpu.device(), &self.kernels, &self.resources, minimap)?;
        }
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.gpu.wait_idle() {
            tracing::error!("Failed to wait for GPU idle during cleanup: {}", e);
        }

        // SAFETY: the device is idle.
        unsafe {
            let device = self.gpu.device();
            self.recorder.destroy(device);
            self.bindings.destroy(device);
            self.resources.destroy(&self.gpu);
            self.setup.destroy(device);
            self.kernels.destroy(device);
            self.acquire.destroy(device);
            self.fences.destroy(device);
            for semaphore in self.present_ready.drain(..) {
                device.destroy_semaphore(semaphore, None);
            }
            if let Some(swapchain) = self.swapchain.take() {
                swapchain.destroy(&self.surface.swapchain_loader);
            }
            self.surface.destroy();
        }

        tracing::info!("Renderer destroyed");
    }
}
