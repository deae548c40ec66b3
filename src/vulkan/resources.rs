//! Resource records and buffer/texture/sampler lifecycle.
//!
//! Creation follows one shape: validate the descriptor, create the
//! native sub-objects in order, and unwind everything already created if
//! a later step fails. Nothing may leak on a failed construction.
//! Destruction never releases handles directly; records are removed from
//! the tables and their handles condemned to the appropriate frame slot.

use std::collections::HashMap;

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;

use super::condemn::Victim;
use super::convert;
use super::sync::{self, TextureLayout};
use super::{
    BufferHandle, BundleHandle, BundleLayoutHandle, CanvasHandle, Device, PassHandle,
    PipelineHandle, SamplerHandle, ShaderHandle, TextureHandle,
};
use crate::error::{GpuError, GpuResult};
use crate::types::{
    BufferDescriptor, BufferUsage, BundleLayoutEntry, ColorAttachment, DepthAttachment, Extent3d,
    SamplerDescriptor, ShaderStage, TextureDescriptor, TextureFormat, TextureType, TextureUsage,
    TextureViewDescriptor,
};

#[derive(Debug)]
pub(crate) struct BufferRecord {
    pub buffer: vk::Buffer,
    pub size: u64,
    pub usage: BufferUsage,
    pub allocation: Option<Allocation>,
}

#[derive(Debug)]
pub(crate) struct TextureRecord {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub ty: TextureType,
    pub format: TextureFormat,
    pub extent: Extent3d,
    pub mip_count: u32,
    pub usage: TextureUsage,
    pub aspect: vk::ImageAspectFlags,
    /// Last-known image layout; only changed through the sync layer.
    pub layout: TextureLayout,
    /// Layout the texture rests in between explicit uses.
    pub natural: TextureLayout,
    /// Views share the base image and do not own it.
    pub owns_image: bool,
    pub allocation: Option<Allocation>,
}

#[derive(Debug)]
pub(crate) struct SamplerRecord {
    pub sampler: vk::Sampler,
}

#[derive(Debug)]
pub(crate) struct ShaderRecord {
    pub module: vk::ShaderModule,
    pub stage: ShaderStage,
    pub entry: std::ffi::CString,
}

#[derive(Debug)]
pub(crate) struct BundleLayoutRecord {
    pub layout: vk::DescriptorSetLayout,
    pub entries: Vec<BundleLayoutEntry>,
}

#[derive(Debug)]
pub(crate) struct BundleRecord {
    pub set: vk::DescriptorSet,
    pub pool: vk::DescriptorPool,
    pub layout: BundleLayoutHandle,
}

#[derive(Debug)]
pub(crate) struct PassRecord {
    pub render_pass: vk::RenderPass,
    pub colors: Vec<ColorAttachment>,
    pub depth: Option<DepthAttachment>,
    pub sample_count: u32,
}

#[derive(Debug)]
pub(crate) struct CanvasRecord {
    pub framebuffer: vk::Framebuffer,
    pub pass: PassHandle,
    pub colors: Vec<TextureHandle>,
    pub depth: Option<TextureHandle>,
    pub extent: vk::Extent2D,
}

#[derive(Debug)]
pub(crate) struct PipelineRecord {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    pub bind_point: vk::PipelineBindPoint,
}

/// Handle-indexed storage for every live resource.
#[derive(Debug, Default)]
pub(crate) struct ResourceTables {
    pub buffers: HashMap<u64, BufferRecord>,
    pub textures: HashMap<u64, TextureRecord>,
    pub samplers: HashMap<u64, SamplerRecord>,
    pub shaders: HashMap<u64, ShaderRecord>,
    pub bundle_layouts: HashMap<u64, BundleLayoutRecord>,
    pub bundles: HashMap<u64, BundleRecord>,
    pub passes: HashMap<u64, PassRecord>,
    pub canvases: HashMap<u64, CanvasRecord>,
    pub pipelines: HashMap<u64, PipelineRecord>,
    next_id: u64,
}

impl ResourceTables {
    pub(crate) fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn live_count(&self) -> usize {
        self.buffers.len()
            + self.textures.len()
            + self.samplers.len()
            + self.shaders.len()
            + self.bundle_layouts.len()
            + self.bundles.len()
            + self.passes.len()
            + self.canvases.len()
            + self.pipelines.len()
    }
}

impl Device {
    /// Create a buffer in device-local memory.
    pub fn create_buffer(&mut self, desc: &BufferDescriptor) -> GpuResult<BufferHandle> {
        if desc.size == 0 {
            return Err(GpuError::InvalidParameter(
                "buffer size must be non-zero".to_string(),
            ));
        }

        let create_info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(convert::convert_buffer_usage(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.device.create_buffer(&create_info, None) }
            .map_err(|code| GpuError::from_vk("create buffer", code))?;

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let allocation = self.allocator().lock().allocate(&AllocationCreateDesc {
            name: desc.label.as_deref().unwrap_or("buffer"),
            requirements,
            location: MemoryLocation::GpuOnly,
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(err) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(err.into());
            }
        };

        if let Err(code) = unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        } {
            unsafe { self.device.destroy_buffer(buffer, None) };
            self.free_allocation(allocation);
            return Err(GpuError::from_vk("bind buffer memory", code));
        }

        self.name_object(buffer, desc.label.as_deref());

        let id = self.resources.next_id();
        self.resources.buffers.insert(
            id,
            BufferRecord {
                buffer,
                size: desc.size,
                usage: desc.usage,
                allocation: Some(allocation),
            },
        );
        Ok(BufferHandle(id))
    }

    /// Condemn a buffer; its native handles are released once the GPU is
    /// provably done with them.
    pub fn destroy_buffer(&mut self, handle: BufferHandle) -> GpuResult<()> {
        let mut record = self
            .resources
            .buffers
            .remove(&handle.0)
            .ok_or(GpuError::InvalidHandle("buffer"))?;
        self.condemn(Victim::Buffer {
            buffer: record.buffer,
            allocation: record.allocation.take(),
        });
        Ok(())
    }

    /// Create a texture, including its default full-range view.
    pub fn create_texture(&mut self, desc: &TextureDescriptor) -> GpuResult<TextureHandle> {
        let extent = desc.extent;
        if extent.width == 0 || extent.height == 0 || extent.depth_or_layers == 0 {
            return Err(GpuError::InvalidParameter(
                "texture extent must be non-zero".to_string(),
            ));
        }
        if desc.ty == TextureType::Cube && extent.depth_or_layers % 6 != 0 {
            return Err(GpuError::InvalidParameter(
                "cube textures need a multiple of 6 layers".to_string(),
            ));
        }
        let max = self.limits.max_texture_size_2d;
        if desc.ty != TextureType::D3 && (extent.width > max || extent.height > max) {
            return Err(GpuError::FeatureNotSupported(format!(
                "texture extent {}x{} exceeds device maximum {max}",
                extent.width, extent.height
            )));
        }

        let (image_type, view_type) = convert::convert_texture_type(desc.ty);
        let is_3d = desc.ty == TextureType::D3;
        let (depth, layers) = if is_3d {
            (extent.depth_or_layers, 1)
        } else {
            (1, extent.depth_or_layers)
        };

        let mut flags = vk::ImageCreateFlags::empty();
        if desc.ty == TextureType::Cube {
            flags |= vk::ImageCreateFlags::CUBE_COMPATIBLE;
        }

        let create_info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(image_type)
            .format(convert::convert_format(desc.format))
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth,
            })
            .mip_levels(desc.mip_count.max(1))
            .array_layers(layers)
            .samples(vk::SampleCountFlags::from_raw(desc.sample_count.max(1)))
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(convert::convert_texture_usage(desc.usage, desc.format))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { self.device.create_image(&create_info, None) }
            .map_err(|code| GpuError::from_vk("create image", code))?;

        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        let allocation = self.allocator().lock().allocate(&AllocationCreateDesc {
            name: desc.label.as_deref().unwrap_or("texture"),
            requirements,
            location: MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(err) => {
                unsafe { self.device.destroy_image(image, None) };
                return Err(err.into());
            }
        };

        if let Err(code) = unsafe {
            self.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        } {
            unsafe { self.device.destroy_image(image, None) };
            self.free_allocation(allocation);
            return Err(GpuError::from_vk("bind image memory", code));
        }

        let aspect = convert::aspect_for_format(desc.format);
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(convert::convert_format(desc.format))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            });

        let view = match unsafe { self.device.create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(code) => {
                unsafe { self.device.destroy_image(image, None) };
                self.free_allocation(allocation);
                return Err(GpuError::from_vk("create image view", code));
            }
        };

        self.name_object(image, desc.label.as_deref());

        let id = self.resources.next_id();
        self.resources.textures.insert(
            id,
            TextureRecord {
                image,
                view,
                ty: desc.ty,
                format: desc.format,
                extent,
                mip_count: desc.mip_count.max(1),
                usage: desc.usage,
                aspect,
                layout: TextureLayout::Undefined,
                natural: sync::natural_layout(desc.usage, desc.format),
                owns_image: true,
                allocation: Some(allocation),
            },
        );
        Ok(TextureHandle(id))
    }

    /// Create a view over a texture's mip/layer range.
    ///
    /// The view aliases the base texture's memory; destroying it
    /// releases only the view object. The base texture must outlive all
    /// of its views.
    pub fn create_texture_view(
        &mut self,
        base: TextureHandle,
        desc: &TextureViewDescriptor,
    ) -> GpuResult<TextureHandle> {
        let record = self
            .resources
            .textures
            .get(&base.0)
            .ok_or(GpuError::InvalidHandle("texture"))?;
        if !record.owns_image {
            return Err(GpuError::InvalidParameter(
                "cannot create a view of a view".to_string(),
            ));
        }

        let (_, view_type) = convert::convert_texture_type(record.ty);
        let view_info = vk::ImageViewCreateInfo::default()
            .image(record.image)
            .view_type(view_type)
            .format(convert::convert_format(record.format))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: record.aspect,
                base_mip_level: desc.base_mip,
                level_count: desc.mip_count.max(1),
                base_array_layer: desc.base_layer,
                layer_count: desc.layer_count.max(1),
            });

        let view = unsafe { self.device.create_image_view(&view_info, None) }
            .map_err(|code| GpuError::from_vk("create texture view", code))?;

        self.name_object(view, desc.label.as_deref());

        let (image, ty, format, extent, usage, aspect, natural) = (
            record.image,
            record.ty,
            record.format,
            record.extent,
            record.usage,
            record.aspect,
            record.natural,
        );
        let id = self.resources.next_id();
        self.resources.textures.insert(
            id,
            TextureRecord {
                image,
                view,
                ty,
                format,
                extent,
                mip_count: desc.mip_count.max(1),
                usage,
                aspect,
                layout: TextureLayout::Undefined,
                natural,
                owns_image: false,
                allocation: None,
            },
        );
        Ok(TextureHandle(id))
    }

    /// Condemn a texture (or view). Owning textures take their image,
    /// default view, and memory with them; views release only the view.
    pub fn destroy_texture(&mut self, handle: TextureHandle) -> GpuResult<()> {
        let mut record = self
            .resources
            .textures
            .remove(&handle.0)
            .ok_or(GpuError::InvalidHandle("texture"))?;
        let victim = if record.owns_image {
            Victim::Image {
                image: record.image,
                view: record.view,
                allocation: record.allocation.take(),
            }
        } else {
            Victim::ImageView { view: record.view }
        };
        self.condemn(victim);
        Ok(())
    }

    /// Create an immutable sampler.
    pub fn create_sampler(&mut self, desc: &SamplerDescriptor) -> GpuResult<SamplerHandle> {
        let anisotropy_enabled =
            desc.anisotropy > 1.0 && self.features.contains(crate::types::Features::ANISOTROPY);

        let mut create_info = vk::SamplerCreateInfo::default()
            .mag_filter(convert::convert_filter(desc.mag_filter))
            .min_filter(convert::convert_filter(desc.min_filter))
            .mipmap_mode(convert::convert_mipmap_filter(desc.mipmap_filter))
            .address_mode_u(convert::convert_address_mode(desc.address_u))
            .address_mode_v(convert::convert_address_mode(desc.address_v))
            .address_mode_w(convert::convert_address_mode(desc.address_w))
            .anisotropy_enable(anisotropy_enabled)
            .max_anisotropy(desc.anisotropy.max(1.0))
            .min_lod(desc.lod_min)
            .max_lod(desc.lod_max);

        if let Some(compare) = desc.compare {
            create_info = create_info
                .compare_enable(true)
                .compare_op(convert::convert_compare(compare));
        }

        let sampler = unsafe { self.device.create_sampler(&create_info, None) }
            .map_err(|code| GpuError::from_vk("create sampler", code))?;

        self.name_object(sampler, desc.label.as_deref());

        let id = self.resources.next_id();
        self.resources.samplers.insert(id, SamplerRecord { sampler });
        Ok(SamplerHandle(id))
    }

    /// Condemn a sampler.
    pub fn destroy_sampler(&mut self, handle: SamplerHandle) -> GpuResult<()> {
        let record = self
            .resources
            .samplers
            .remove(&handle.0)
            .ok_or(GpuError::InvalidHandle("sampler"))?;
        self.condemn(Victim::Sampler {
            sampler: record.sampler,
        });
        Ok(())
    }

    /// Condemn a shader module.
    pub fn destroy_shader(&mut self, handle: ShaderHandle) -> GpuResult<()> {
        let record = self
            .resources
            .shaders
            .remove(&handle.0)
            .ok_or(GpuError::InvalidHandle("shader"))?;
        self.condemn(Victim::ShaderModule {
            module: record.module,
        });
        Ok(())
    }

    /// Condemn a bundle layout.
    pub fn destroy_bundle_layout(&mut self, handle: BundleLayoutHandle) -> GpuResult<()> {
        let record = self
            .resources
            .bundle_layouts
            .remove(&handle.0)
            .ok_or(GpuError::InvalidHandle("bundle layout"))?;
        self.condemn(Victim::BundleLayout {
            layout: record.layout,
        });
        Ok(())
    }

    /// Condemn a bundle.
    pub fn destroy_bundle(&mut self, handle: BundleHandle) -> GpuResult<()> {
        let record = self
            .resources
            .bundles
            .remove(&handle.0)
            .ok_or(GpuError::InvalidHandle("bundle"))?;
        self.condemn(Victim::Bundle {
            pool: record.pool,
            set: record.set,
        });
        Ok(())
    }

    /// Condemn a pass.
    pub fn destroy_pass(&mut self, handle: PassHandle) -> GpuResult<()> {
        let record = self
            .resources
            .passes
            .remove(&handle.0)
            .ok_or(GpuError::InvalidHandle("pass"))?;
        self.condemn(Victim::RenderPass {
            pass: record.render_pass,
        });
        Ok(())
    }

    /// Condemn a canvas.
    pub fn destroy_canvas(&mut self, handle: CanvasHandle) -> GpuResult<()> {
        let record = self
            .resources
            .canvases
            .remove(&handle.0)
            .ok_or(GpuError::InvalidHandle("canvas"))?;
        self.condemn(Victim::Framebuffer {
            framebuffer: record.framebuffer,
        });
        Ok(())
    }

    /// Condemn a pipeline.
    pub fn destroy_pipeline(&mut self, handle: PipelineHandle) -> GpuResult<()> {
        let record = self
            .resources
            .pipelines
            .remove(&handle.0)
            .ok_or(GpuError::InvalidHandle("pipeline"))?;
        self.condemn(Victim::Pipeline {
            pipeline: record.pipeline,
            layout: record.layout,
        });
        Ok(())
    }
}
