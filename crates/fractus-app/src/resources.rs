//! Render targets, parameter buffers and the minimap sampler.

use ash::vk;
use fractus_core::{
    Extent, FractalParams, ImageState, ParamsKind, QueueRole, Residency, Target,
};
use fractus_gpu::barrier::{initial_barrier, COLOR_RANGE};
use fractus_gpu::command::{execute_single_time_commands, CommandPool};
use fractus_gpu::{GpuBuffer, GpuContext, GpuError, GpuImage, Result, VkResultExt};
use gpu_allocator::MemoryLocation;

/// Format of Main and Minimap.
pub const TARGET_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// A compute output image that can lose and regain its memory.
///
/// The logical target outlives its memory: an evicted target keeps its
/// name and usage and is recreated at the current extent on demand.
pub struct RenderTarget {
    name: &'static str,
    usage: vk::ImageUsageFlags,
    image: Option<GpuImage>,
    view: vk::ImageView,
}

impl RenderTarget {
    const fn evicted(name: &'static str, usage: vk::ImageUsageFlags) -> Self {
        Self {
            name,
            usage,
            image: None,
            view: vk::ImageView::null(),
        }
    }

    /// Whether the target has memory behind it.
    #[must_use]
    pub fn is_resident(&self) -> bool {
        self.image.as_ref().is_some_and(GpuImage::is_resident)
    }

    /// Image handle. Fails while evicted.
    pub fn image(&self) -> Result<vk::Image> {
        self.image
            .as_ref()
            .map(|image| image.image)
            .ok_or_else(|| self.not_resident())
    }

    /// View handle. Fails while evicted.
    pub fn view(&self) -> Result<vk::ImageView> {
        if self.image.is_some() {
            Ok(self.view)
        } else {
            Err(self.not_resident())
        }
    }

    fn not_resident(&self) -> GpuError {
        GpuError::InvalidState(format!("{} is not resident", self.name))
    }

    /// Allocate memory at `extent` and leave the image in the shader-write state.
    ///
    /// # Safety
    /// The target must not be in use by the GPU.
    unsafe fn allocate(
        &mut self,
        gpu: &GpuContext,
        setup: &CommandPool,
        extent: Extent,
    ) -> Result<()> {
        self.release(gpu)?;

        let families = gpu.queue_families();
        let info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(TARGET_FORMAT)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(self.usage)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        // Both queues touch the targets
        let info = if families.len() > 1 {
            info.sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&families)
        } else {
            info.sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let mut image = gpu
            .allocator()
            .lock()
            .create_image(&info, MemoryLocation::GpuOnly, self.name)?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(TARGET_FORMAT)
            .subresource_range(COLOR_RANGE);

        let device = gpu.device();
        let view = match device
            .create_image_view(&view_info, None)
            .context("vkCreateImageView")
        {
            Ok(view) => view,
            Err(e) => {
                gpu.allocator().lock().free_image(&mut image)?;
                return Err(e);
            }
        };

        let handle = image.image;
        self.image = Some(image);
        self.view = view;

        execute_single_time_commands(device, setup, gpu.queue(QueueRole::Compute), |cmd| {
            let barrier = initial_barrier(handle, ImageState::ShaderWrite);
            let dependency =
                vk::DependencyInfo::default().image_memory_barriers(std::slice::from_ref(&barrier));
            device.cmd_pipeline_barrier2(cmd, &dependency);
        })?;

        tracing::debug!(
            "Allocated {} ({}x{})",
            self.name,
            extent.width,
            extent.height
        );
        Ok(())
    }

    /// Free memory, view and image. The logical target stays.
    ///
    /// # Safety
    /// The target must not be in use by the GPU.
    unsafe fn release(&mut self, gpu: &GpuContext) -> Result<()> {
        let Some(mut image) = self.image.take() else {
            return Ok(());
        };
        gpu.device().destroy_image_view(self.view, None);
        self.view = vk::ImageView::null();
        gpu.allocator().lock().free_image(&mut image)
    }
}

/// Everything the kernels read and write, sized to the current extent.
pub struct ResourceSet {
    pub main: RenderTarget,
    pub minimap: RenderTarget,
    /// Per slot: `[stationary, movable]`.
    params: Vec<[GpuBuffer; 2]>,
    sampler: vk::Sampler,
    extent: Extent,
}

impl ResourceSet {
    /// Create targets at `extent` and parameter buffers for `slots` slots.
    ///
    /// # Safety
    /// `setup` must belong to the compute queue family.
    pub unsafe fn create(
        gpu: &GpuContext,
        setup: &CommandPool,
        extent: Extent,
        slots: usize,
        minimap: Residency,
    ) -> Result<Self> {
        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::NEAREST)
            .min_filter(vk::Filter::NEAREST)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .unnormalized_coordinates(false);
        let sampler = gpu
            .device()
            .create_sampler(&sampler_info, None)
            .context("vkCreateSampler")?;

        let mut resources = Self {
            main: RenderTarget::evicted(
                "main",
                vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::TRANSFER_SRC,
            ),
            minimap: RenderTarget::evicted(
                "minimap",
                vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
            ),
            params: Vec::with_capacity(slots),
            sampler,
            extent,
        };

        if let Err(e) = resources.populate(gpu, setup, slots, minimap) {
            resources.destroy(gpu);
            return Err(e);
        }

        tracing::info!(
            "Created render targets {}x{}, {} parameter slots",
            extent.width,
            extent.height,
            slots
        );
        Ok(resources)
    }

    unsafe fn populate(
        &mut self,
        gpu: &GpuContext,
        setup: &CommandPool,
        slots: usize,
        minimap: Residency,
    ) -> Result<()> {
        for slot in 0..slots {
            let mut allocator = gpu.allocator().lock();
            let mut buffer = |kind: &str| {
                allocator.create_buffer(
                    FractalParams::ALIGNED_SIZE,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    MemoryLocation::CpuToGpu,
                    &format!("{kind}_params_{slot}"),
                )
            };
            let mut stationary = buffer("stationary")?;
            match buffer("movable") {
                Ok(movable) => self.params.push([stationary, movable]),
                Err(e) => {
                    allocator.free_buffer(&mut stationary)?;
                    return Err(e);
                }
            }
        }

        self.main.allocate(gpu, setup, self.extent)?;
        if minimap == Residency::Resident {
            self.minimap.allocate(gpu, setup, self.extent)?;
        }
        Ok(())
    }

    #[must_use]
    pub const fn extent(&self) -> Extent {
        self.extent
    }

    #[must_use]
    pub const fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.params.len()
    }

    /// Render target for `target`. The display image is not owned here.
    pub fn target(&self, target: Target) -> Result<&RenderTarget> {
        match target {
            Target::Main => Ok(&self.main),
            Target::Minimap => Ok(&self.minimap),
            Target::Display => Err(GpuError::InvalidState(
                "display image is owned by the swapchain".to_string(),
            )),
        }
    }

    /// Parameter buffer of `slot`.
    pub fn params_buffer(&self, slot: usize, kind: ParamsKind) -> Result<&GpuBuffer> {
        let buffers = self.params.get(slot).ok_or_else(|| {
            GpuError::InvalidState(format!(
                "parameter slot {slot} out of range ({} slots)",
                self.params.len()
            ))
        })?;
        Ok(match kind {
            ParamsKind::Stationary => &buffers[0],
            ParamsKind::Movable => &buffers[1],
        })
    }

    /// Copy a parameter record into the slot's buffer.
    ///
    /// The caller must have waited for the slot to drain.
    pub fn write_params(
        &self,
        slot: usize,
        kind: ParamsKind,
        params: &FractalParams,
    ) -> Result<()> {
        self.params_buffer(slot, kind)?.write(params)
    }

    /// Recreate Main, and Minimap if it is resident, at `extent`.
    ///
    /// # Safety
    /// Every slot must have drained.
    pub unsafe fn recreate_targets(
        &mut self,
        gpu: &GpuContext,
        setup: &CommandPool,
        extent: Extent,
        minimap: Residency,
    ) -> Result<()> {
        self.extent = extent;
        self.main.allocate(gpu, setup, extent)?;
        match minimap {
            Residency::Resident => self.minimap.allocate(gpu, setup, extent),
            Residency::Evicted => self.minimap.release(gpu),
        }
    }

    /// Free the minimap's memory.
    ///
    /// # Safety
    /// Every slot must have drained.
    pub unsafe fn evict_minimap(&mut self, gpu: &GpuContext) -> Result<()> {
        self.minimap.release(gpu)
    }

    /// Give the minimap memory again at the current extent.
    ///
    /// # Safety
    /// Every slot must have drained.
    pub unsafe fn make_minimap_resident(
        &mut self,
        gpu: &GpuContext,
        setup: &CommandPool,
    ) -> Result<()> {
        self.minimap.allocate(gpu, setup, self.extent)
    }

    /// Release everything. Errors are logged, not returned.
    ///
    /// # Safety
    /// Nothing may be in use by the GPU.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        for target in [&mut self.main, &mut self.minimap] {
            if let Err(e) = target.release(gpu) {
                tracing::warn!("Failed to free {}: {}", target.name, e);
            }
        }

        let mut allocator = gpu.allocator().lock();
        for buffer in self.params.iter_mut().flatten() {
            if let Err(e) = allocator.free_buffer(buffer) {
                tracing::warn!("Failed to free parameter buffer: {}", e);
            }
        }
        self.params.clear();

        gpu.device().destroy_sampler(self.sampler, None);
        self.sampler = vk::Sampler::null();
    }
}
