//! Parameter record read by the compute kernels.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::plan::Extent;
use crate::view::Viewport;

/// Uniform block shared with every kernel (std140 compatible).
///
/// Layout:
/// - `surface`: width, height, iteration cap, unused
/// - `window`: scale x, scale y, center x, center y
/// - `target`: click target x, y, unused, unused
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FractalParams {
    pub surface: [f32; 4],
    pub window: [f32; 4],
    pub target: [f32; 4],
}

impl FractalParams {
    /// Size of one record in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
    /// Per-slot buffer size, rounded up to the 256-byte uniform offset granularity.
    pub const ALIGNED_SIZE: u64 = (Self::SIZE + 255) & !255;

    /// Build a record from its parts.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn new(extent: Extent, max_iterations: f32, viewport: &Viewport, target: Vec2) -> Self {
        Self {
            surface: [
                extent.width as f32,
                extent.height as f32,
                max_iterations,
                0.0,
            ],
            window: [
                viewport.scale.x,
                viewport.scale.y,
                viewport.center.x,
                viewport.center.y,
            ],
            target: [target.x, target.y, 0.0, 0.0],
        }
    }

    /// Click target stored in the record.
    #[must_use]
    pub const fn target(&self) -> Vec2 {
        Vec2::new(self.target[0], self.target[1])
    }

    /// Raw bytes as uploaded to the GPU.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_three_vec4() {
        assert_eq!(FractalParams::SIZE, 48);
        assert_eq!(FractalParams::ALIGNED_SIZE, 256);
        assert_eq!(std::mem::align_of::<FractalParams>(), 4);
    }

    #[test]
    fn packs_viewport_and_target() {
        let viewport = Viewport::default();
        let params = FractalParams::new(
            Extent::new(1280, 720),
            700.0,
            &viewport,
            Vec2::new(0.25, -0.5),
        );

        assert_eq!(params.surface, [1280.0, 720.0, 700.0, 0.0]);
        assert_eq!(params.window, [4.0, 2.25, -0.65, 0.0]);
        assert_eq!(params.target(), Vec2::new(0.25, -0.5));
        assert_eq!(params.as_bytes().len(), 48);
    }
}
