//! Encodes frame plans into command buffers.

use ash::vk;
use fractus_core::{FramePlan, Op, QueueRole, Target, Transition};
use fractus_gpu::barrier::image_barrier;
use fractus_gpu::command::{begin_command_buffer, end_command_buffer, CommandPool};
use fractus_gpu::{GpuContext, GpuError, KernelLibrary, Result};

use crate::bindings::BindingTable;
use crate::resources::ResourceSet;

/// Everything a plan refers to, for one frame.
pub struct RecordContext<'a> {
    pub kernels: &'a KernelLibrary,
    pub bindings: &'a BindingTable,
    pub resources: &'a ResourceSet,
    /// The acquired display image.
    pub display: vk::Image,
    pub display_extent: vk::Extent2D,
}

impl RecordContext<'_> {
    fn image(&self, target: Target) -> Result<vk::Image> {
        match target {
            Target::Display => Ok(self.display),
            Target::Main | Target::Minimap => self.resources.target(target)?.image(),
        }
    }
}

/// A command pool and its single buffer.
struct Recording {
    pool: CommandPool,
    cmd: vk::CommandBuffer,
}

/// Per-slot command buffers for both queues.
///
/// Each slot owns one pool per queue. A pool is reset before recording,
/// which is only valid once the slot has drained.
pub struct CommandRecorder {
    slots: Vec<[Recording; 2]>,
}

impl CommandRecorder {
    /// Create pools and buffers for `slots` slots.
    ///
    /// # Safety
    /// The context must be valid.
    pub unsafe fn new(gpu: &GpuContext, slots: usize) -> Result<Self> {
        let mut recorder = Self {
            slots: Vec::with_capacity(slots),
        };
        if let Err(e) = recorder.populate(gpu, slots) {
            recorder.destroy(gpu.device());
            return Err(e);
        }
        Ok(recorder)
    }

    unsafe fn populate(&mut self, gpu: &GpuContext, slots: usize) -> Result<()> {
        let device = gpu.device();
        let recording = |role: QueueRole| -> Result<Recording> {
            let pool = CommandPool::new(
                device,
                gpu.queue_family(role),
                vk::CommandPoolCreateFlags::TRANSIENT,
            )?;
            match pool.allocate_command_buffer(device) {
                Ok(cmd) => Ok(Recording { pool, cmd }),
                Err(e) => {
                    pool.destroy(device);
                    Err(e)
                }
            }
        };

        for _ in 0..slots {
            let compute = recording(QueueRole::Compute)?;
            let present = match recording(QueueRole::Present) {
                Ok(present) => present,
                Err(e) => {
                    compute.pool.destroy(device);
                    return Err(e);
                }
            };
            self.slots.push([compute, present]);
        }
        Ok(())
    }

    /// Record `plan` into the slot's buffer for the plan's queue.
    ///
    /// # Safety
    /// The slot must have drained.
    pub unsafe fn record(
        &self,
        device: &ash::Device,
        slot: usize,
        plan: &FramePlan,
        ctx: &RecordContext<'_>,
    ) -> Result<vk::CommandBuffer> {
        let recording = self
            .slots
            .get(slot)
            .map(|pair| &pair[plan.queue.index()])
            .ok_or_else(|| {
                GpuError::InvalidState(format!("no command buffers for slot {slot}"))
            })?;
        let cmd = recording.cmd;

        recording.pool.reset(device)?;
        begin_command_buffer(device, cmd, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;

        for op in &plan.ops {
            match op {
                Op::Barrier(transitions) => record_barrier(device, cmd, transitions, ctx)?,
                Op::Dispatch(dispatch) => {
                    let pipeline = ctx.kernels.pipeline(dispatch.kernel)?;
                    let set = ctx.bindings.set(slot, dispatch.binding)?;
                    device.cmd_bind_pipeline(
                        cmd,
                        vk::PipelineBindPoint::COMPUTE,
                        pipeline.pipeline,
                    );
                    device.cmd_bind_descriptor_sets(
                        cmd,
                        vk::PipelineBindPoint::COMPUTE,
                        pipeline.layout,
                        0,
                        &[set],
                        &[],
                    );
                    let [x, y] = dispatch.groups;
                    device.cmd_dispatch(cmd, x, y, 1);
                }
                Op::Copy { src, dst } => {
                    let extent = ctx.resources.extent();
                    let region = vk::ImageBlit2::default()
                        .src_subresource(COLOR_LAYER)
                        .src_offsets([vk::Offset3D::default(), far_corner(extent.width, extent.height)])
                        .dst_subresource(COLOR_LAYER)
                        .dst_offsets([
                            vk::Offset3D::default(),
                            far_corner(ctx.display_extent.width, ctx.display_extent.height),
                        ]);
                    let blit = vk::BlitImageInfo2::default()
                        .src_image(ctx.image(*src)?)
                        .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                        .dst_image(ctx.image(*dst)?)
                        .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                        .regions(std::slice::from_ref(&region))
                        .filter(vk::Filter::NEAREST);
                    device.cmd_blit_image2(cmd, &blit);
                }
            }
        }

        end_command_buffer(device, cmd)?;
        Ok(cmd)
    }

    /// Destroy all pools and their buffers.
    ///
    /// # Safety
    /// No buffer may be pending.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        for recording in self.slots.iter().flatten() {
            recording.pool.destroy(device);
        }
        self.slots.clear();
    }
}

const COLOR_LAYER: vk::ImageSubresourceLayers = vk::ImageSubresourceLayers {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    mip_level: 0,
    base_array_layer: 0,
    layer_count: 1,
};

#[allow(clippy::cast_possible_wrap)]
const fn far_corner(width: u32, height: u32) -> vk::Offset3D {
    vk::Offset3D {
        x: width as i32,
        y: height as i32,
        z: 1,
    }
}

unsafe fn record_barrier(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    transitions: &[Transition],
    ctx: &RecordContext<'_>,
) -> Result<()> {
    let barriers = transitions
        .iter()
        .map(|transition| Ok(image_barrier(ctx.image(transition.target)?, transition)))
        .collect::<Result<Vec<_>>>()?;
    let dependency = vk::DependencyInfo::default().image_memory_barriers(&barriers);
    device.cmd_pipeline_barrier2(cmd, &dependency);
    Ok(())
}
