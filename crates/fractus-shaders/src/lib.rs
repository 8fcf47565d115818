//! Fractal compute kernels for the Fractus viewer.
//!
//! The GLSL sources in `shaders/` are compiled to SPIR-V by the build script
//! and embedded here, one kernel per [`KernelId`].

use std::sync::OnceLock;

use fractus_core::{FractalFamily, KernelId, KernelVariant};

/// Embedded SPIR-V bytecode (raw bytes, may not be aligned).
mod spirv_bytes {
    macro_rules! kernel {
        ($name:literal) => {
            include_bytes!(concat!(env!("OUT_DIR"), "/", $name, ".spv"))
        };
    }

    pub static MANDELBROT: &[u8] = kernel!("mandelbrot");
    pub static MANDELBROT_JULIA: &[u8] = kernel!("mandelbrot_julia");
    pub static TRICORN: &[u8] = kernel!("tricorn");
    pub static TRICORN_JULIA: &[u8] = kernel!("tricorn_julia");
    pub static BURNINGSHIP: &[u8] = kernel!("burningship");
    pub static BURNINGSHIP_JULIA: &[u8] = kernel!("burningship_julia");
}

fn kernel_bytes(kernel: KernelId) -> &'static [u8] {
    match (kernel.family, kernel.variant) {
        (FractalFamily::Mandelbrot, KernelVariant::Base) => spirv_bytes::MANDELBROT,
        (FractalFamily::Mandelbrot, KernelVariant::Detail) => spirv_bytes::MANDELBROT_JULIA,
        (FractalFamily::Tricorn, KernelVariant::Base) => spirv_bytes::TRICORN,
        (FractalFamily::Tricorn, KernelVariant::Detail) => spirv_bytes::TRICORN_JULIA,
        (FractalFamily::BurningShip, KernelVariant::Base) => spirv_bytes::BURNINGSHIP,
        (FractalFamily::BurningShip, KernelVariant::Detail) => spirv_bytes::BURNINGSHIP_JULIA,
    }
}

/// Convert a byte slice to aligned words (SPIR-V requires 4-byte alignment).
fn bytes_to_spirv(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

static KERNELS: OnceLock<Vec<Vec<u32>>> = OnceLock::new();

/// SPIR-V words for `kernel`.
#[must_use]
pub fn kernel_spirv(kernel: KernelId) -> &'static [u32] {
    let kernels = KERNELS.get_or_init(|| {
        KernelId::all()
            .into_iter()
            .map(|id| bytes_to_spirv(kernel_bytes(id)))
            .collect()
    });
    &kernels[kernel.index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    #[test]
    fn every_kernel_is_spirv() {
        for kernel in KernelId::all() {
            let code = kernel_spirv(kernel);
            assert_eq!(code[0], SPIRV_MAGIC, "{} has no SPIR-V header", kernel.file_name());
            assert!(code.len() > 100, "{} is too small", kernel.file_name());
        }
    }

    #[test]
    fn variants_are_distinct() {
        let base = KernelId::new(FractalFamily::Tricorn, KernelVariant::Base);
        let detail = KernelId::new(FractalFamily::Tricorn, KernelVariant::Detail);
        assert_ne!(kernel_spirv(base), kernel_spirv(detail));
    }
}
