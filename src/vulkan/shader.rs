//! Shader modules and bundles (shader resource bindings).

use std::ffi::CString;

use ash::vk;

use super::convert;
use super::resources::{BundleLayoutRecord, BundleRecord, ShaderRecord};
use super::sync::TextureLayout;
use super::{BundleHandle, BundleLayoutHandle, Device, ShaderHandle};
use crate::error::{GpuError, GpuResult};
use crate::types::{
    BindingResource, BindingType, BundleDescriptor, BundleEntry, BundleLayoutDescriptor,
    ShaderDescriptor,
};

impl Device {
    /// Create a shader module from SPIR-V words.
    pub fn create_shader(&mut self, desc: &ShaderDescriptor) -> GpuResult<ShaderHandle> {
        if desc.spirv.is_empty() {
            return Err(GpuError::InvalidParameter(
                "shader SPIR-V is empty".to_string(),
            ));
        }

        let create_info = vk::ShaderModuleCreateInfo::default().code(&desc.spirv);
        let module = unsafe { self.device.create_shader_module(&create_info, None) }
            .map_err(|code| GpuError::from_vk("create shader module", code))?;

        let entry = match CString::new(desc.entry.as_str()) {
            Ok(entry) => entry,
            Err(_) => {
                unsafe { self.device.destroy_shader_module(module, None) };
                return Err(GpuError::InvalidParameter(
                    "shader entry point contains a NUL byte".to_string(),
                ));
            }
        };

        self.name_object(module, desc.label.as_deref());

        let id = self.resources.next_id();
        self.resources.shaders.insert(
            id,
            ShaderRecord {
                module,
                stage: desc.stage,
                entry,
            },
        );
        Ok(ShaderHandle(id))
    }

    /// Create a bundle layout: the set of binding slots a shader consumes.
    pub fn create_bundle_layout(
        &mut self,
        desc: &BundleLayoutDescriptor,
    ) -> GpuResult<BundleLayoutHandle> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc
            .entries
            .iter()
            .map(|entry| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(entry.binding)
                    .descriptor_type(convert::convert_binding_type(entry.ty))
                    .descriptor_count(1)
                    .stage_flags(convert::convert_shader_stages(entry.stages))
            })
            .collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let layout = unsafe { self.device.create_descriptor_set_layout(&create_info, None) }
            .map_err(|code| GpuError::from_vk("create bundle layout", code))?;

        self.name_object(layout, desc.label.as_deref());

        let id = self.resources.next_id();
        self.resources.bundle_layouts.insert(
            id,
            BundleLayoutRecord {
                layout,
                entries: desc.entries.clone(),
            },
        );
        Ok(BundleLayoutHandle(id))
    }

    /// Create a bundle and write its initial bindings.
    pub fn create_bundle(&mut self, desc: &BundleDescriptor) -> GpuResult<BundleHandle> {
        let layout_record = self
            .resources
            .bundle_layouts
            .get(&desc.layout.0)
            .ok_or(GpuError::InvalidHandle("bundle layout"))?;

        let set_layouts = [layout_record.layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.descriptor_pool)
            .set_layouts(&set_layouts);

        let set = unsafe { self.device.allocate_descriptor_sets(&alloc_info) }
            .map_err(|code| GpuError::from_vk("allocate bundle", code))?[0];

        let id = self.resources.next_id();
        self.resources.bundles.insert(
            id,
            BundleRecord {
                set,
                pool: self.descriptor_pool,
                layout: desc.layout,
            },
        );

        let handle = BundleHandle(id);
        if !desc.entries.is_empty() {
            if let Err(err) = self.write_bundle(handle, &desc.entries) {
                // Roll the half-built bundle back out of the tables.
                let record = self.resources.bundles.remove(&id);
                if let Some(record) = record {
                    if let Err(code) = unsafe {
                        self.device
                            .free_descriptor_sets(record.pool, &[record.set])
                    } {
                        log::warn!("Failed to free bundle after write failure: {code:?}");
                    }
                }
                return Err(err);
            }
        }
        Ok(handle)
    }

    /// Rebind the resources a bundle points at.
    ///
    /// Binding types must match the bundle's layout; buffers bind a
    /// `(offset, size)` range where size 0 means "to the end".
    pub fn write_bundle(&mut self, handle: BundleHandle, entries: &[BundleEntry]) -> GpuResult<()> {
        let record = self
            .resources
            .bundles
            .get(&handle.0)
            .ok_or(GpuError::InvalidHandle("bundle"))?;
        let layout_record = self
            .resources
            .bundle_layouts
            .get(&record.layout.0)
            .ok_or(GpuError::InvalidHandle("bundle layout"))?;
        let set = record.set;

        // Resolve every entry before building the write list so the info
        // arrays have stable addresses.
        let mut resolved = Vec::with_capacity(entries.len());
        for entry in entries {
            let slot = layout_record
                .entries
                .iter()
                .find(|slot| slot.binding == entry.binding)
                .ok_or_else(|| {
                    GpuError::InvalidParameter(format!(
                        "binding {} is not in the bundle layout",
                        entry.binding
                    ))
                })?;

            let info = match (slot.ty, entry.resource) {
                (BindingType::UniformBuffer | BindingType::StorageBuffer, BindingResource::Buffer { buffer, offset, size }) => {
                    let buffer_record = self
                        .resources
                        .buffers
                        .get(&buffer.0)
                        .ok_or(GpuError::InvalidHandle("buffer"))?;
                    let range = if size == 0 {
                        vk::WHOLE_SIZE
                    } else {
                        size
                    };
                    ResolvedBinding::Buffer(
                        vk::DescriptorBufferInfo::default()
                            .buffer(buffer_record.buffer)
                            .offset(offset)
                            .range(range),
                    )
                }
                (BindingType::SampledTexture | BindingType::StorageTexture, BindingResource::Texture(texture)) => {
                    let texture_record = self
                        .resources
                        .textures
                        .get(&texture.0)
                        .ok_or(GpuError::InvalidHandle("texture"))?;
                    let layout = if slot.ty == BindingType::StorageTexture {
                        TextureLayout::General
                    } else {
                        texture_record.natural
                    };
                    ResolvedBinding::Image(
                        vk::DescriptorImageInfo::default()
                            .image_view(texture_record.view)
                            .image_layout(layout.to_vk()),
                    )
                }
                (BindingType::Sampler, BindingResource::Sampler(sampler)) => {
                    let sampler_record = self
                        .resources
                        .samplers
                        .get(&sampler.0)
                        .ok_or(GpuError::InvalidHandle("sampler"))?;
                    ResolvedBinding::Image(
                        vk::DescriptorImageInfo::default().sampler(sampler_record.sampler),
                    )
                }
                _ => {
                    return Err(GpuError::InvalidParameter(format!(
                        "resource kind does not match layout binding {}",
                        entry.binding
                    )))
                }
            };
            resolved.push((entry.binding, convert::convert_binding_type(slot.ty), info));
        }

        let writes: Vec<vk::WriteDescriptorSet> = resolved
            .iter()
            .map(|(binding, descriptor_type, info)| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(*binding)
                    .descriptor_type(*descriptor_type);
                match info {
                    ResolvedBinding::Buffer(info) => write.buffer_info(std::slice::from_ref(info)),
                    ResolvedBinding::Image(info) => write.image_info(std::slice::from_ref(info)),
                }
            })
            .collect();

        unsafe { self.device.update_descriptor_sets(&writes, &[]) };
        Ok(())
    }
}

enum ResolvedBinding {
    Buffer(vk::DescriptorBufferInfo),
    Image(vk::DescriptorImageInfo),
}
