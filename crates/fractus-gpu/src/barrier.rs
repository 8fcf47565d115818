//! Image barriers for frame plan transitions.
//!
//! Every [`ImageState`] maps to one layout plus the stage and access that
//! use the image in that state. A [`Transition`] becomes a single
//! `VkImageMemoryBarrier2` from the source triple to the destination one.

use ash::vk;
use fractus_core::{ImageState, Transition};

/// Single-mip, single-layer color subresource.
pub const COLOR_RANGE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

/// Layout, stage and access of an image state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateAccess {
    pub layout: vk::ImageLayout,
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
}

/// Map an image state onto Vulkan terms.
///
/// The presentable state uses the transfer stage so that layout changes out
/// of it chain with the acquire semaphore wait, which is issued at that stage.
#[must_use]
pub const fn state_access(state: ImageState) -> StateAccess {
    match state {
        ImageState::ShaderWrite => StateAccess {
            layout: vk::ImageLayout::GENERAL,
            stage: vk::PipelineStageFlags2::COMPUTE_SHADER,
            access: vk::AccessFlags2::SHADER_STORAGE_WRITE,
        },
        ImageState::ShaderRead => StateAccess {
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            stage: vk::PipelineStageFlags2::COMPUTE_SHADER,
            access: vk::AccessFlags2::SHADER_SAMPLED_READ,
        },
        ImageState::CopySource => StateAccess {
            layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            stage: vk::PipelineStageFlags2::ALL_TRANSFER,
            access: vk::AccessFlags2::TRANSFER_READ,
        },
        ImageState::CopyDest => StateAccess {
            layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            stage: vk::PipelineStageFlags2::ALL_TRANSFER,
            access: vk::AccessFlags2::TRANSFER_WRITE,
        },
        ImageState::Present => StateAccess {
            layout: vk::ImageLayout::PRESENT_SRC_KHR,
            stage: vk::PipelineStageFlags2::ALL_TRANSFER,
            access: vk::AccessFlags2::NONE,
        },
    }
}

/// Barrier for one transition of `image`.
///
/// Discarding transitions start from `UNDEFINED`, letting the driver drop
/// the old contents.
#[must_use]
pub fn image_barrier(image: vk::Image, transition: &Transition) -> vk::ImageMemoryBarrier2<'static> {
    let src = state_access(transition.from);
    let dst = state_access(transition.to);
    let old_layout = if transition.discard {
        vk::ImageLayout::UNDEFINED
    } else {
        src.layout
    };

    vk::ImageMemoryBarrier2::default()
        .src_stage_mask(src.stage)
        .src_access_mask(src.access)
        .dst_stage_mask(dst.stage)
        .dst_access_mask(dst.access)
        .old_layout(old_layout)
        .new_layout(dst.layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(COLOR_RANGE)
}

/// Barrier that brings a freshly created or made-resident image into `state`.
#[must_use]
pub fn initial_barrier(image: vk::Image, state: ImageState) -> vk::ImageMemoryBarrier2<'static> {
    let dst = state_access(state);

    vk::ImageMemoryBarrier2::default()
        .src_stage_mask(vk::PipelineStageFlags2::NONE)
        .src_access_mask(vk::AccessFlags2::NONE)
        .dst_stage_mask(dst.stage)
        .dst_access_mask(dst.access)
        .old_layout(vk::ImageLayout::UNDEFINED)
        .new_layout(dst.layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(COLOR_RANGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fractus_core::Target;

    #[test]
    fn shader_states_use_compute_stage() {
        let write = state_access(ImageState::ShaderWrite);
        assert_eq!(write.layout, vk::ImageLayout::GENERAL);
        assert_eq!(write.stage, vk::PipelineStageFlags2::COMPUTE_SHADER);

        let read = state_access(ImageState::ShaderRead);
        assert_eq!(read.layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(read.access, vk::AccessFlags2::SHADER_SAMPLED_READ);
    }

    #[test]
    fn barrier_preserves_contents_unless_discarding() {
        let image = vk::Image::null();
        let keep = Transition::new(Target::Main, ImageState::ShaderWrite, ImageState::CopySource);
        let barrier = image_barrier(image, &keep);
        assert_eq!(barrier.old_layout, vk::ImageLayout::GENERAL);
        assert_eq!(barrier.new_layout, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
        assert_eq!(barrier.src_access_mask, vk::AccessFlags2::SHADER_STORAGE_WRITE);
        assert_eq!(barrier.dst_access_mask, vk::AccessFlags2::TRANSFER_READ);

        let discard = Transition::new(Target::Display, ImageState::Present, ImageState::CopyDest)
            .discarding();
        let barrier = image_barrier(image, &discard);
        assert_eq!(barrier.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(barrier.new_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
    }

    #[test]
    fn initial_barrier_starts_undefined() {
        let barrier = initial_barrier(vk::Image::null(), ImageState::ShaderWrite);
        assert_eq!(barrier.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(barrier.new_layout, vk::ImageLayout::GENERAL);
    }
}
