//! Descriptor sets for every (slot, binding key) pair.

use ash::vk;
use fractus_core::{BindingKey, FractalParams, Residency};
use fractus_gpu::kernels::{MINIMAP_BINDING, OUTPUT_BINDING, PARAMS_BINDING};
use fractus_gpu::{
    write_sampled_image, write_storage_image, write_uniform_buffer, DescriptorPool, GpuError,
    KernelLibrary, Result,
};

use crate::resources::ResourceSet;

/// One descriptor set per slot and [`BindingKey`].
///
/// Keys that reference the minimap have no set while it is evicted.
pub struct BindingTable {
    pool: DescriptorPool,
    sets: Vec<[Option<vk::DescriptorSet>; BindingKey::ALL.len()]>,
}

impl BindingTable {
    /// Create an empty table with room for `slots` slots.
    ///
    /// # Safety
    /// The device must be valid.
    #[allow(clippy::cast_possible_truncation)]
    pub unsafe fn new(device: &ash::Device, slots: usize) -> Result<Self> {
        let slots = u32::try_from(slots)
            .map_err(|_| GpuError::InvalidState(format!("{slots} slots")))?;
        let keys = BindingKey::ALL.len() as u32;
        let sampled = BindingKey::ALL
            .iter()
            .filter(|key| key.sampled().is_some())
            .count() as u32;

        let pool_sizes = [
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::STORAGE_IMAGE)
                .descriptor_count(slots * keys),
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(slots * keys),
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(slots * sampled),
        ];
        let pool = DescriptorPool::new(device, slots * keys, &pool_sizes)?;

        Ok(Self {
            pool,
            sets: Vec::new(),
        })
    }

    /// Reallocate and rewrite every set against the current resources.
    ///
    /// # Safety
    /// No set may be in use by the GPU.
    pub unsafe fn rebuild(
        &mut self,
        device: &ash::Device,
        kernels: &KernelLibrary,
        resources: &ResourceSet,
        minimap: Residency,
    ) -> Result<()> {
        self.pool.reset(device)?;
        self.sets.clear();

        let keys: Vec<BindingKey> = BindingKey::ALL
            .into_iter()
            .filter(|key| minimap == Residency::Resident || !key.uses_minimap())
            .collect();
        let layouts: Vec<vk::DescriptorSetLayout> =
            keys.iter().map(|&key| kernels.set_layout(key)).collect();

        for slot in 0..resources.slot_count() {
            let allocated = self.pool.allocate(device, &layouts)?;
            let mut row = [None; BindingKey::ALL.len()];

            for (&key, &set) in keys.iter().zip(&allocated) {
                let output = resources.target(key.output())?.view()?;
                write_storage_image(device, set, OUTPUT_BINDING, output);

                let params = resources.params_buffer(slot, key.params())?;
                write_uniform_buffer(device, set, PARAMS_BINDING, params.buffer, FractalParams::SIZE);

                if let Some(sampled) = key.sampled() {
                    let view = resources.target(sampled)?.view()?;
                    write_sampled_image(device, set, MINIMAP_BINDING, view, resources.sampler());
                }

                row[key.index()] = Some(set);
            }
            self.sets.push(row);
        }

        tracing::debug!(
            "Rebuilt {} descriptor sets (minimap {:?})",
            keys.len() * self.sets.len(),
            minimap
        );
        Ok(())
    }

    /// Set for `key` in `slot`.
    pub fn set(&self, slot: usize, key: BindingKey) -> Result<vk::DescriptorSet> {
        self.sets
            .get(slot)
            .and_then(|row| row[key.index()])
            .ok_or_else(|| GpuError::InvalidState(format!("no descriptor set for {key:?} in slot {slot}")))
    }

    /// Destroy the pool and every set in it.
    ///
    /// # Safety
    /// No set may be in use by the GPU.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        self.sets.clear();
        self.pool.destroy(device);
    }
}
