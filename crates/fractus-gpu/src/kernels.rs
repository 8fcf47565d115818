//! Fractal kernel loading.
//!
//! Each (family, variant) pair is a SPIR-V module, either embedded at build
//! time or read from an override directory. Bindings are:
//!
//! | binding | detail kernel       | base kernel                   |
//! |---------|---------------------|-------------------------------|
//! | 0       | output storage image| output storage image          |
//! | 1       | parameter uniform   | parameter uniform             |
//! | 2       |                     | sampled minimap               |

use crate::descriptors::DescriptorSetLayoutBuilder;
use crate::error::{GpuError, Result};
use crate::pipeline::ComputePipeline;
use ash::vk;
use fractus_core::{BindingKey, KernelId, KernelVariant};
use std::borrow::Cow;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Output image binding.
pub const OUTPUT_BINDING: u32 = 0;
/// Parameter buffer binding.
pub const PARAMS_BINDING: u32 = 1;
/// Minimap sampler binding (base kernels only).
pub const MINIMAP_BINDING: u32 = 2;

/// Read SPIR-V words from a file.
pub fn read_kernel(path: &Path) -> Result<Vec<u32>> {
    let load_error = |source| GpuError::KernelLoad {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(load_error)?;
    ash::util::read_spv(&mut file).map_err(load_error)
}

/// Where kernel bytecode comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum KernelSource {
    /// Kernels compiled into the binary.
    #[default]
    Embedded,
    /// `{stem}.spv` and `{stem}_julia.spv` files in a directory.
    Directory(PathBuf),
}

impl KernelSource {
    /// SPIR-V words for `kernel`.
    pub fn code(&self, kernel: KernelId) -> Result<Cow<'static, [u32]>> {
        match self {
            Self::Embedded => Ok(Cow::Borrowed(fractus_shaders::kernel_spirv(kernel))),
            Self::Directory(dir) => read_kernel(&dir.join(kernel.file_name())).map(Cow::Owned),
        }
    }
}

impl std::fmt::Display for KernelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Embedded => write!(f, "built-in kernels"),
            Self::Directory(dir) => write!(f, "{}", dir.display()),
        }
    }
}

/// Compiled pipelines for every kernel plus their set layouts.
pub struct KernelLibrary {
    pipelines: Vec<ComputePipeline>,
    detail_layout: vk::DescriptorSetLayout,
    base_layout: vk::DescriptorSetLayout,
}

impl KernelLibrary {
    /// Load and compile all kernels from `source`.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn load(device: &ash::Device, source: &KernelSource) -> Result<Self> {
        let stage = vk::ShaderStageFlags::COMPUTE;
        let detail_layout = DescriptorSetLayoutBuilder::new()
            .storage_image(OUTPUT_BINDING, stage)
            .uniform_buffer(PARAMS_BINDING, stage)
            .build(device)?;
        let base_layout = DescriptorSetLayoutBuilder::new()
            .storage_image(OUTPUT_BINDING, stage)
            .uniform_buffer(PARAMS_BINDING, stage)
            .sampled_image(MINIMAP_BINDING, stage)
            .build(device)?;

        let mut library = Self {
            pipelines: Vec::with_capacity(KernelId::COUNT),
            detail_layout,
            base_layout,
        };

        for kernel in KernelId::all() {
            let built = source.code(kernel).and_then(|code| {
                let layout = library.layout_for(kernel.variant);
                ComputePipeline::new(device, &code, &[layout])
            });
            match built {
                Ok(pipeline) => library.pipelines.push(pipeline),
                Err(e) => {
                    library.destroy(device);
                    return Err(e);
                }
            }
            tracing::debug!("Loaded kernel {}", kernel.file_name());
        }

        tracing::info!("Loaded {} kernels from {source}", KernelId::COUNT);
        Ok(library)
    }

    const fn layout_for(&self, variant: KernelVariant) -> vk::DescriptorSetLayout {
        match variant {
            KernelVariant::Detail => self.detail_layout,
            KernelVariant::Base => self.base_layout,
        }
    }

    /// Pipeline for `kernel`.
    pub fn pipeline(&self, kernel: KernelId) -> Result<&ComputePipeline> {
        self.pipelines
            .get(kernel.index())
            .ok_or_else(|| GpuError::InvalidState(format!("kernel {kernel:?} not loaded")))
    }

    /// Set layout used by dispatches bound through `key`.
    pub const fn set_layout(&self, key: BindingKey) -> vk::DescriptorSetLayout {
        match key.sampled() {
            Some(_) => self.base_layout,
            None => self.detail_layout,
        }
    }

    /// Destroy pipelines and layouts.
    ///
    /// # Safety
    /// The device must be valid and no pipeline may be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        for pipeline in &self.pipelines {
            pipeline.destroy(device);
        }
        device.destroy_descriptor_set_layout(self.detail_layout, None);
        device.destroy_descriptor_set_layout(self.base_layout, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_kernel_reports_path() {
        let path = Path::new("/nonexistent/mandelbrot.spv");
        let err = read_kernel(path).unwrap_err();
        assert!(matches!(err, GpuError::KernelLoad { .. }));
        assert!(err.to_string().contains("mandelbrot.spv"));
    }

    #[test]
    fn embedded_kernels_are_the_default() {
        let source = KernelSource::default();
        assert_eq!(source, KernelSource::Embedded);
        for kernel in KernelId::all() {
            let code = source.code(kernel).unwrap();
            assert_eq!(code[0], 0x0723_0203);
        }
    }

    #[test]
    fn directory_source_reads_named_files() {
        let source = KernelSource::Directory(PathBuf::from("/nonexistent"));
        let kernel = KernelId::new(fractus_core::FractalFamily::Tricorn, KernelVariant::Detail);
        let err = source.code(kernel).unwrap_err();
        assert!(err.to_string().contains("tricorn_julia.spv"));
    }
}
