//! Vulkan implementation of the rendering device.
//!
//! The [`Device`] owns the instance, logical device, allocator, and every
//! resource created through it. Work is recorded into rotating frame
//! contexts; resource destruction is deferred until the GPU provably
//! finished with the resource. All GPU work flows through one
//! graphics+compute queue.

mod condemn;
mod convert;
mod debug;
mod frame;
mod instance;
mod pass;
mod physical;
mod pipeline;
mod resources;
mod shader;
mod staging;
pub(crate) mod sync;

use std::ffi::CString;
use std::mem::ManuallyDrop;

use ash::vk;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use gpu_allocator::MemoryLocation;
use parking_lot::Mutex;
use raw_window_handle::RawDisplayHandle;

use crate::error::{GpuError, GpuResult};
use crate::types::{
    BufferUsage, Extent3d, Features, IndexType, Limits, LoadOp, Offset3d, TextureUsage,
};
use condemn::{CondemnQueues, Victim};
use frame::{FrameRing, FENCE_TIMEOUT_NS, FRAME_COUNT};
use staging::STAGING_ALIGN;
pub use sync::TextureLayout;

/// Opaque handle to a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

/// Opaque handle to a texture or texture view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

/// Opaque handle to a sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerHandle(pub(crate) u64);

/// Opaque handle to a shader module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub(crate) u64);

/// Opaque handle to a bundle layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BundleLayoutHandle(pub(crate) u64);

/// Opaque handle to a bundle (a bound set of shader resources).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BundleHandle(pub(crate) u64);

/// Opaque handle to a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassHandle(pub(crate) u64);

/// Opaque handle to a canvas (a pass bound to concrete textures).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanvasHandle(pub(crate) u64);

/// Opaque handle to a graphics or compute pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub(crate) u64);

/// Device creation options.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Application name reported to the driver.
    pub app_name: String,
    /// Enable validation layers and the debug messenger.
    pub validation: bool,
    /// Display to enable surface extensions for; `None` for headless.
    pub display_handle: Option<RawDisplayHandle>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            app_name: "vermilion".to_string(),
            validation: cfg!(debug_assertions),
            display_handle: None,
        }
    }
}

/// Snapshot of per-frame bookkeeping, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Scratchpads across all frame slots.
    pub scratchpads: usize,
    /// Bytes staged into the current frame since it opened.
    pub staged_bytes: u64,
    /// Resources condemned and awaiting destruction.
    pub condemned: usize,
    /// Submitted frames not yet observed complete.
    pub in_flight: usize,
}

/// Command pool, buffer, and fence for blocking one-shot transfers
/// outside the frame loop (readbacks).
#[derive(Debug)]
struct TransferContext {
    pool: vk::CommandPool,
    cmd: vk::CommandBuffer,
    fence: vk::Fence,
}

impl TransferContext {
    fn new(device: &ash::Device, queue_family: u32) -> GpuResult<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::TRANSIENT)
            .queue_family_index(queue_family);
        let pool = unsafe { device.create_command_pool(&pool_info, None) }
            .map_err(|code| GpuError::from_vk("create transfer command pool", code))?;

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let cmd = match unsafe { device.allocate_command_buffers(&alloc_info) } {
            Ok(buffers) => buffers[0],
            Err(code) => {
                unsafe { device.destroy_command_pool(pool, None) };
                return Err(GpuError::from_vk("allocate transfer command buffer", code));
            }
        };

        let fence = match unsafe { device.create_fence(&vk::FenceCreateInfo::default(), None) } {
            Ok(fence) => fence,
            Err(code) => {
                unsafe { device.destroy_command_pool(pool, None) };
                return Err(GpuError::from_vk("create transfer fence", code));
            }
        };

        Ok(Self { pool, cmd, fence })
    }

    unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_fence(self.fence, None);
        device.destroy_command_pool(self.pool, None);
    }
}

/// Redundant-bind elimination state, reset every frame.
#[derive(Debug, Default)]
struct BindCache {
    pipeline: Option<PipelineHandle>,
    layout: vk::PipelineLayout,
    bind_point: vk::PipelineBindPoint,
    in_pass: bool,
    canvas: Option<CanvasHandle>,
}

impl BindCache {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The rendering device.
///
/// Owns every GPU object the crate creates. `&mut self` methods record
/// into or mutate the current frame; dropping the device waits for the
/// GPU to go idle and releases everything.
pub struct Device {
    _entry: ash::Entry,
    instance: ash::Instance,
    debug_utils: Option<ash::ext::debug_utils::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    debug_device: Option<ash::ext::debug_utils::Device>,
    physical_device: vk::PhysicalDevice,
    pub(crate) device: ash::Device,
    queue: vk::Queue,
    /// Dropped by hand in `Drop`, after all allocations are freed and
    /// before the logical device is destroyed.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    pub(crate) descriptor_pool: vk::DescriptorPool,
    pub(crate) features: Features,
    pub(crate) limits: Limits,
    frames: FrameRing,
    condemned: CondemnQueues,
    transfer: TransferContext,
    pub(crate) resources: resources::ResourceTables,
    binds: BindCache,
}

impl Device {
    /// Initialize Vulkan and create the device.
    pub fn new(config: &DeviceConfig) -> GpuResult<Self> {
        let entry = unsafe { ash::Entry::load() }.map_err(|err| {
            GpuError::InitializationFailed(format!("failed to load Vulkan library: {err}"))
        })?;

        let (instance, debug_messenger, debug_utils) = instance::create_instance(
            &entry,
            &config.app_name,
            config.validation,
            config.display_handle,
        )?;

        let physical_device = match physical::select_physical_device(&instance) {
            Ok(device) => device,
            Err(err) => {
                unsafe { destroy_instance_chain(&instance, &debug_utils, debug_messenger) };
                return Err(err);
            }
        };
        let queue_family = match physical::find_queue_family(&instance, physical_device) {
            Ok(family) => family,
            Err(err) => {
                unsafe { destroy_instance_chain(&instance, &debug_utils, debug_messenger) };
                return Err(err);
            }
        };

        let features = physical::harvest_features(&instance, physical_device);
        let limits = physical::harvest_limits(&instance, physical_device);

        let device = match physical::create_logical_device(&instance, physical_device, queue_family)
        {
            Ok(device) => device,
            Err(err) => {
                unsafe { destroy_instance_chain(&instance, &debug_utils, debug_messenger) };
                return Err(err);
            }
        };
        let queue = unsafe { device.get_device_queue(queue_family, 0) };

        let debug_device = debug_utils
            .as_ref()
            .map(|_| ash::ext::debug_utils::Device::new(&instance, &device));

        let allocator = match Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        }) {
            Ok(allocator) => ManuallyDrop::new(Mutex::new(allocator)),
            Err(err) => {
                unsafe {
                    device.destroy_device(None);
                    destroy_instance_chain(&instance, &debug_utils, debug_messenger);
                }
                return Err(err.into());
            }
        };

        let descriptor_pool = match create_descriptor_pool(&device) {
            Ok(pool) => pool,
            Err(err) => {
                unsafe {
                    drop_allocator(allocator);
                    device.destroy_device(None);
                    destroy_instance_chain(&instance, &debug_utils, debug_messenger);
                }
                return Err(err);
            }
        };

        let frames = match FrameRing::new(&device, queue_family) {
            Ok(frames) => frames,
            Err(err) => {
                unsafe {
                    device.destroy_descriptor_pool(descriptor_pool, None);
                    drop_allocator(allocator);
                    device.destroy_device(None);
                    destroy_instance_chain(&instance, &debug_utils, debug_messenger);
                }
                return Err(err);
            }
        };

        let transfer = match TransferContext::new(&device, queue_family) {
            Ok(transfer) => transfer,
            Err(err) => {
                let mut frames = frames;
                unsafe {
                    frames.destroy(&device);
                    device.destroy_descriptor_pool(descriptor_pool, None);
                    drop_allocator(allocator);
                    device.destroy_device(None);
                    destroy_instance_chain(&instance, &debug_utils, debug_messenger);
                }
                return Err(err);
            }
        };

        log::info!("Device ready ({} frames in flight)", FRAME_COUNT);

        Ok(Self {
            _entry: entry,
            instance,
            debug_utils,
            debug_messenger,
            debug_device,
            physical_device,
            device,
            queue,
            allocator,
            descriptor_pool,
            features,
            limits,
            frames,
            condemned: CondemnQueues::new(),
            transfer,
            resources: resources::ResourceTables::default(),
            binds: BindCache::default(),
        })
    }

    /// Optional features the selected GPU supports.
    pub fn features(&self) -> Features {
        self.features
    }

    /// Numeric limits of the selected GPU.
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Number of live resources across all tables.
    pub fn live_resources(&self) -> usize {
        self.resources.live_count()
    }

    /// Per-frame bookkeeping snapshot.
    pub fn frame_stats(&self) -> FrameStats {
        let scratchpads = self
            .frames
            .slots
            .iter()
            .map(|s| s.staging.scratchpad_count())
            .sum();
        let staged_bytes = self.frames.slots[self.frames.current].staging.staged_bytes();
        FrameStats {
            scratchpads,
            staged_bytes,
            condemned: self.condemned.pending_total(),
            in_flight: self.frames.in_flight(),
        }
    }

    /// Block until all submitted GPU work has finished.
    pub fn wait_idle(&self) -> GpuResult<()> {
        unsafe { self.device.device_wait_idle() }
            .map_err(|code| GpuError::from_vk("device idle wait", code))
    }

    // ----- frame lifecycle -------------------------------------------------

    /// Open the next frame for recording.
    ///
    /// Blocks until the frame slot's previous use has finished on the
    /// GPU, then purges that slot's condemned resources, rewinds its
    /// staging pool, and begins command recording.
    pub fn begin_frame(&mut self) -> GpuResult<()> {
        self.frames.wait_current(&self.device)?;

        let current = self.frames.current;
        if self.frames.slots[current].submitted {
            debug_assert!(matches!(
                unsafe { self.device.get_fence_status(self.frames.slots[current].fence) },
                Ok(true)
            ));
        }

        unsafe { self.condemned.purge(current, &self.device, &self.allocator) };
        self.frames.slots[current].staging.reset();

        self.frames.open_current(&self.device)?;
        self.binds.reset();
        Ok(())
    }

    /// Submit the open frame and return its frame number.
    ///
    /// Frame numbers start at 1 and increase monotonically; feed them to
    /// [`Self::is_frame_complete`].
    pub fn submit_frame(&mut self) -> GpuResult<u64> {
        if self.binds.in_pass {
            return Err(GpuError::InvalidParameter(
                "cannot submit with a pass still open".to_string(),
            ));
        }
        self.frames.submit_current(&self.device, self.queue)?;
        Ok(self.frames.submitted_count)
    }

    /// Whether the GPU has finished the given submitted frame.
    ///
    /// Frames never submitted report incomplete; frames whose slot has
    /// since been recycled report complete without touching the driver.
    pub fn is_frame_complete(&self, frame: u64) -> GpuResult<bool> {
        if frame == 0 || frame > self.frames.submitted_count {
            return Ok(false);
        }
        if self.frames.submitted_count - frame >= FRAME_COUNT as u64 {
            return Ok(true);
        }

        let slot = &self.frames.slots[((frame - 1) % FRAME_COUNT as u64) as usize];
        if !slot.submitted {
            return Ok(true);
        }
        unsafe { self.device.get_fence_status(slot.fence) }
            .map_err(|code| GpuError::from_vk("frame fence query", code))
    }

    // ----- data transfer ---------------------------------------------------

    /// Stage `data` and record a copy into a buffer at `offset`.
    ///
    /// The write becomes visible to GPU work in the same frame after the
    /// recorded copy. Requires an open frame and no open pass.
    pub fn write_buffer(&mut self, handle: BufferHandle, offset: u64, data: &[u8]) -> GpuResult<()> {
        let cmd = self.transfer_cmd()?;
        let record = self
            .resources
            .buffers
            .get(&handle.0)
            .ok_or(GpuError::InvalidHandle("buffer"))?;
        if !record.usage.contains(BufferUsage::COPY_DST) {
            return Err(GpuError::InvalidParameter(
                "buffer lacks COPY_DST usage".to_string(),
            ));
        }
        let end = checked_range_end(offset, data.len() as u64)?;
        if end > record.size {
            return Err(GpuError::InvalidParameter(format!(
                "write of {} bytes at {offset} exceeds buffer size {}",
                data.len(),
                record.size
            )));
        }
        if data.is_empty() {
            return Ok(());
        }
        let dst = record.buffer;

        let current = self.frames.current;
        let slot = &mut self.frames.slots[current];
        let mapping = slot
            .staging
            .map(&self.device, &self.allocator, data.len() as u64, STAGING_ALIGN)?;
        slot.staging.write(mapping, data)?;
        let src = slot.staging.buffer(mapping.scratchpad);

        let region = vk::BufferCopy {
            src_offset: mapping.offset,
            dst_offset: offset,
            size: data.len() as u64,
        };
        unsafe {
            self.device.cmd_copy_buffer(cmd, src, dst, &[region]);
        }
        self.transfer_barrier(cmd);
        Ok(())
    }

    /// Stage `data` and record a copy into a texture region.
    ///
    /// `data` is tightly packed rows of the region, which must lie
    /// within the selected mip level. The texture is transitioned to a
    /// transfer destination for the copy and back to its natural layout
    /// afterwards. Requires an open frame and no open pass.
    pub fn write_texture(
        &mut self,
        handle: TextureHandle,
        offset: Offset3d,
        extent: Extent3d,
        mip: u32,
        data: &[u8],
    ) -> GpuResult<()> {
        let cmd = self.transfer_cmd()?;
        let record = self
            .resources
            .textures
            .get(&handle.0)
            .ok_or(GpuError::InvalidHandle("texture"))?;
        if !record.usage.contains(TextureUsage::COPY_DST) {
            return Err(GpuError::InvalidParameter(
                "texture lacks COPY_DST usage".to_string(),
            ));
        }
        if mip >= record.mip_count {
            return Err(GpuError::InvalidParameter(format!(
                "mip {mip} out of range for texture with {} mips",
                record.mip_count
            )));
        }

        let is_3d = record.ty == crate::types::TextureType::D3;
        let (depth, layers) = if is_3d {
            (extent.depth_or_layers, 1)
        } else {
            (1, extent.depth_or_layers)
        };

        // The region must fit the mip level; layers do not scale with
        // mip, volume depth does.
        let level_width = mip_dimension(record.extent.width, mip);
        let level_height = mip_dimension(record.extent.height, mip);
        let level_depth = if is_3d {
            mip_dimension(record.extent.depth_or_layers, mip)
        } else {
            record.extent.depth_or_layers
        };
        let fits = offset.x as u64 + extent.width as u64 <= level_width as u64
            && offset.y as u64 + extent.height as u64 <= level_height as u64
            && if is_3d {
                offset.z as u64 + depth as u64 <= level_depth as u64
            } else {
                offset.z == 0 && offset.layer as u64 + layers as u64 <= level_depth as u64
            };
        if !fits {
            return Err(GpuError::InvalidParameter(format!(
                "texture write region {}x{}x{} at ({}, {}, {}, layer {}) exceeds mip {mip} extent \
                 {level_width}x{level_height}x{level_depth}",
                extent.width, extent.height, extent.depth_or_layers,
                offset.x, offset.y, offset.z, offset.layer
            )));
        }
        let texel_count = extent.width as u64 * extent.height as u64 * depth as u64 * layers as u64;
        let expected = texel_count * record.format.bytes_per_texel() as u64;
        if data.len() as u64 != expected {
            return Err(GpuError::InvalidParameter(format!(
                "texture write of {} bytes does not match region size {expected}",
                data.len()
            )));
        }

        let image = record.image;
        let aspect = record.aspect;
        let old_layout = record.layout;
        let natural = record.natural;

        let current = self.frames.current;
        let slot = &mut self.frames.slots[current];
        let mapping = slot
            .staging
            .map(&self.device, &self.allocator, data.len() as u64, STAGING_ALIGN)?;
        slot.staging.write(mapping, data)?;
        let src = slot.staging.buffer(mapping.scratchpad);

        let region = vk::BufferImageCopy {
            buffer_offset: mapping.offset,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: aspect,
                mip_level: mip,
                base_array_layer: offset.layer,
                layer_count: layers,
            },
            image_offset: vk::Offset3D {
                x: offset.x as i32,
                y: offset.y as i32,
                z: offset.z as i32,
            },
            image_extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth,
            },
        };

        sync::transition(&self.device, cmd, image, old_layout, TextureLayout::TransferDst, aspect);
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                cmd,
                src,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
        sync::transition(&self.device, cmd, image, TextureLayout::TransferDst, natural, aspect);

        if let Some(record) = self.resources.textures.get_mut(&handle.0) {
            record.layout = natural;
        }
        Ok(())
    }

    /// Record a buffer-to-buffer copy in the open frame. Not valid
    /// inside a pass.
    pub fn copy_buffer(
        &mut self,
        src: BufferHandle,
        dst: BufferHandle,
        src_offset: u64,
        dst_offset: u64,
        size: u64,
    ) -> GpuResult<()> {
        let cmd = self.transfer_cmd()?;
        let src_record = self
            .resources
            .buffers
            .get(&src.0)
            .ok_or(GpuError::InvalidHandle("buffer"))?;
        let dst_record = self
            .resources
            .buffers
            .get(&dst.0)
            .ok_or(GpuError::InvalidHandle("buffer"))?;
        if !src_record.usage.contains(BufferUsage::COPY_SRC) {
            return Err(GpuError::InvalidParameter(
                "source buffer lacks COPY_SRC usage".to_string(),
            ));
        }
        if !dst_record.usage.contains(BufferUsage::COPY_DST) {
            return Err(GpuError::InvalidParameter(
                "destination buffer lacks COPY_DST usage".to_string(),
            ));
        }
        if checked_range_end(src_offset, size)? > src_record.size
            || checked_range_end(dst_offset, size)? > dst_record.size
        {
            return Err(GpuError::InvalidParameter(
                "copy range out of bounds".to_string(),
            ));
        }

        let region = vk::BufferCopy {
            src_offset,
            dst_offset,
            size,
        };
        unsafe {
            self.device
                .cmd_copy_buffer(cmd, src_record.buffer, dst_record.buffer, &[region]);
        }
        self.transfer_barrier(cmd);
        Ok(())
    }

    /// Blocking read of a buffer range back to the CPU.
    ///
    /// Waits for the GPU to go idle first, so pending writes to the
    /// buffer are included. Not usable while a frame is open.
    pub fn read_buffer(&mut self, handle: BufferHandle, offset: u64, size: u64) -> GpuResult<Vec<u8>> {
        if self.frames.recording {
            return Err(GpuError::InvalidParameter(
                "cannot read back while a frame is open".to_string(),
            ));
        }
        let record = self
            .resources
            .buffers
            .get(&handle.0)
            .ok_or(GpuError::InvalidHandle("buffer"))?;
        if !record.usage.contains(BufferUsage::COPY_SRC) {
            return Err(GpuError::InvalidParameter(
                "buffer lacks COPY_SRC usage".to_string(),
            ));
        }
        if checked_range_end(offset, size)? > record.size {
            return Err(GpuError::InvalidParameter(
                "read range out of bounds".to_string(),
            ));
        }
        let src = record.buffer;

        self.wait_idle()?;

        let (readback, allocation) = self.create_readback(size)?;
        let region = vk::BufferCopy {
            src_offset: offset,
            dst_offset: 0,
            size,
        };
        let result = self.run_transfer(|device, cmd| unsafe {
            device.cmd_copy_buffer(cmd, src, readback, &[region]);
            host_read_barrier(device, cmd);
        });

        let bytes = result.and_then(|()| {
            allocation
                .mapped_slice()
                .map(|slice| slice[..size as usize].to_vec())
                .ok_or_else(|| GpuError::Internal("readback buffer is not mapped".to_string()))
        });

        unsafe { self.device.destroy_buffer(readback, None) };
        self.free_allocation(allocation);
        bytes
    }

    /// Blocking read of a texture's base mip back to the CPU, as tightly
    /// packed rows.
    ///
    /// Waits for the GPU to go idle first. Not usable while a frame is
    /// open.
    pub fn read_texture(&mut self, handle: TextureHandle) -> GpuResult<Vec<u8>> {
        if self.frames.recording {
            return Err(GpuError::InvalidParameter(
                "cannot read back while a frame is open".to_string(),
            ));
        }
        let record = self
            .resources
            .textures
            .get(&handle.0)
            .ok_or(GpuError::InvalidHandle("texture"))?;
        if !record.usage.contains(TextureUsage::COPY_SRC) {
            return Err(GpuError::InvalidParameter(
                "texture lacks COPY_SRC usage".to_string(),
            ));
        }

        let image = record.image;
        let aspect = record.aspect;
        let old_layout = record.layout;
        let natural = record.natural;
        let extent = record.extent;
        let is_3d = record.ty == crate::types::TextureType::D3;
        let (depth, layers) = if is_3d {
            (extent.depth_or_layers, 1)
        } else {
            (1, extent.depth_or_layers)
        };
        let size = extent.width as u64
            * extent.height as u64
            * depth as u64
            * layers as u64
            * record.format.bytes_per_texel() as u64;

        self.wait_idle()?;

        let (readback, allocation) = self.create_readback(size)?;
        let region = vk::BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: aspect,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: layers,
            },
            image_offset: vk::Offset3D::default(),
            image_extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth,
            },
        };
        let result = self.run_transfer(|device, cmd| {
            sync::transition(device, cmd, image, old_layout, TextureLayout::TransferSrc, aspect);
            unsafe {
                device.cmd_copy_image_to_buffer(
                    cmd,
                    image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    readback,
                    &[region],
                );
            }
            sync::transition(device, cmd, image, TextureLayout::TransferSrc, natural, aspect);
            unsafe { host_read_barrier(device, cmd) };
        });

        if result.is_ok() {
            if let Some(record) = self.resources.textures.get_mut(&handle.0) {
                record.layout = natural;
            }
        }

        let bytes = result.and_then(|()| {
            allocation
                .mapped_slice()
                .map(|slice| slice[..size as usize].to_vec())
                .ok_or_else(|| GpuError::Internal("readback buffer is not mapped".to_string()))
        });

        unsafe { self.device.destroy_buffer(readback, None) };
        self.free_allocation(allocation);
        bytes
    }

    /// Explicitly transition a texture to a layout, recording the
    /// barrier into the open frame. Not valid inside a pass.
    pub fn set_layout(&mut self, handle: TextureHandle, layout: TextureLayout) -> GpuResult<()> {
        let cmd = self.transfer_cmd()?;
        let record = self
            .resources
            .textures
            .get_mut(&handle.0)
            .ok_or(GpuError::InvalidHandle("texture"))?;
        let old = record.layout;
        record.layout = layout;
        let (image, aspect) = (record.image, record.aspect);
        sync::transition(&self.device, cmd, image, old, layout, aspect);
        Ok(())
    }

    // ----- passes and command recording ------------------------------------

    /// Begin rendering into a canvas.
    ///
    /// Transitions attachments into their attachment layouts (only
    /// needed when loading existing contents), begins the render pass
    /// with the declared clear values, and sets viewport and scissor to
    /// the canvas extent.
    pub fn begin_pass(&mut self, canvas: CanvasHandle) -> GpuResult<()> {
        let cmd = self.frames.open_cmd()?;
        if self.binds.in_pass {
            return Err(GpuError::InvalidParameter(
                "a pass is already open".to_string(),
            ));
        }

        let canvas_record = self
            .resources
            .canvases
            .get(&canvas.0)
            .ok_or(GpuError::InvalidHandle("canvas"))?;
        let pass_record = self
            .resources
            .passes
            .get(&canvas_record.pass.0)
            .ok_or(GpuError::InvalidHandle("pass"))?;

        let framebuffer = canvas_record.framebuffer;
        let render_pass = pass_record.render_pass;
        let extent = canvas_record.extent;

        let mut clear_values = Vec::new();
        // (texture id, attachment layout, contents are loaded)
        let mut attachments = Vec::new();
        for (texture, color) in canvas_record.colors.iter().zip(&pass_record.colors) {
            clear_values.push(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: color.clear,
                },
            });
            attachments.push((texture.0, TextureLayout::ColorAttachment, color.load == LoadOp::Load));
        }
        if let (Some(texture), Some(depth)) = (canvas_record.depth, &pass_record.depth) {
            clear_values.push(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: depth.clear_depth,
                    stencil: depth.clear_stencil,
                },
            });
            attachments.push((
                texture.0,
                TextureLayout::DepthStencilAttachment,
                depth.load == LoadOp::Load,
            ));
        }

        for (id, target, loaded) in attachments {
            let record = self
                .resources
                .textures
                .get_mut(&id)
                .ok_or(GpuError::InvalidHandle("texture"))?;
            let old = record.layout;
            record.layout = target;
            // Discarded contents enter the pass as UNDEFINED; no barrier.
            if loaded {
                let (image, aspect) = (record.image, record.aspect);
                sync::transition(&self.device, cmd, image, old, target, aspect);
            }
        }

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            })
            .clear_values(&clear_values);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        };

        unsafe {
            self.device
                .cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
            self.device.cmd_set_viewport(cmd, 0, &[viewport]);
            self.device.cmd_set_scissor(cmd, 0, &[scissor]);
        }

        self.binds.in_pass = true;
        self.binds.canvas = Some(canvas);
        self.binds.pipeline = None;
        Ok(())
    }

    /// End the open pass and settle attachments back into their natural
    /// layouts.
    pub fn end_pass(&mut self) -> GpuResult<()> {
        let cmd = self.frames.open_cmd()?;
        if !self.binds.in_pass {
            return Err(GpuError::InvalidParameter("no pass is open".to_string()));
        }

        unsafe { self.device.cmd_end_render_pass(cmd) };

        if let Some(canvas) = self.binds.canvas {
            let canvas_record = self
                .resources
                .canvases
                .get(&canvas.0)
                .ok_or(GpuError::InvalidHandle("canvas"))?;
            let attachments: Vec<u64> = canvas_record
                .colors
                .iter()
                .map(|t| t.0)
                .chain(canvas_record.depth.iter().map(|t| t.0))
                .collect();
            for id in attachments {
                let record = self
                    .resources
                    .textures
                    .get_mut(&id)
                    .ok_or(GpuError::InvalidHandle("texture"))?;
                let old = record.layout;
                let natural = record.natural;
                record.layout = natural;
                let (image, aspect) = (record.image, record.aspect);
                sync::transition(&self.device, cmd, image, old, natural, aspect);
            }
        }

        self.binds.in_pass = false;
        self.binds.canvas = None;
        self.binds.pipeline = None;
        Ok(())
    }

    /// Bind a pipeline; a rebind of the already-bound pipeline records
    /// nothing.
    pub fn bind_pipeline(&mut self, handle: PipelineHandle) -> GpuResult<()> {
        let cmd = self.frames.open_cmd()?;
        if self.binds.pipeline == Some(handle) {
            return Ok(());
        }

        let record = self
            .resources
            .pipelines
            .get(&handle.0)
            .ok_or(GpuError::InvalidHandle("pipeline"))?;
        if record.bind_point == vk::PipelineBindPoint::GRAPHICS && !self.binds.in_pass {
            return Err(GpuError::InvalidParameter(
                "graphics pipelines bind inside a pass".to_string(),
            ));
        }

        unsafe {
            self.device
                .cmd_bind_pipeline(cmd, record.bind_point, record.pipeline);
        }
        self.binds.pipeline = Some(handle);
        self.binds.layout = record.layout;
        self.binds.bind_point = record.bind_point;
        Ok(())
    }

    /// Bind a bundle at a slot of the current pipeline's layout.
    pub fn bind_bundle(&mut self, slot: u32, bundle: BundleHandle) -> GpuResult<()> {
        let cmd = self.frames.open_cmd()?;
        if self.binds.pipeline.is_none() {
            return Err(GpuError::InvalidParameter(
                "no pipeline is bound".to_string(),
            ));
        }
        let record = self
            .resources
            .bundles
            .get(&bundle.0)
            .ok_or(GpuError::InvalidHandle("bundle"))?;

        unsafe {
            self.device.cmd_bind_descriptor_sets(
                cmd,
                self.binds.bind_point,
                self.binds.layout,
                slot,
                &[record.set],
                &[],
            );
        }
        Ok(())
    }

    /// Bind vertex buffers starting at binding `first`.
    pub fn bind_vertex_buffers(
        &mut self,
        first: u32,
        buffers: &[(BufferHandle, u64)],
    ) -> GpuResult<()> {
        let cmd = self.frames.open_cmd()?;
        let mut native = Vec::with_capacity(buffers.len());
        let mut offsets = Vec::with_capacity(buffers.len());
        for (handle, offset) in buffers {
            let record = self
                .resources
                .buffers
                .get(&handle.0)
                .ok_or(GpuError::InvalidHandle("buffer"))?;
            if !record.usage.contains(BufferUsage::VERTEX) {
                return Err(GpuError::InvalidParameter(
                    "buffer lacks VERTEX usage".to_string(),
                ));
            }
            native.push(record.buffer);
            offsets.push(*offset);
        }

        unsafe {
            self.device
                .cmd_bind_vertex_buffers(cmd, first, &native, &offsets);
        }
        Ok(())
    }

    /// Bind an index buffer.
    pub fn bind_index_buffer(
        &mut self,
        handle: BufferHandle,
        offset: u64,
        index_type: IndexType,
    ) -> GpuResult<()> {
        let cmd = self.frames.open_cmd()?;
        let record = self
            .resources
            .buffers
            .get(&handle.0)
            .ok_or(GpuError::InvalidHandle("buffer"))?;
        if !record.usage.contains(BufferUsage::INDEX) {
            return Err(GpuError::InvalidParameter(
                "buffer lacks INDEX usage".to_string(),
            ));
        }

        unsafe {
            self.device.cmd_bind_index_buffer(
                cmd,
                record.buffer,
                offset,
                convert::convert_index_type(index_type),
            );
        }
        Ok(())
    }

    /// Draw non-indexed geometry with the bound pipeline.
    pub fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> GpuResult<()> {
        let cmd = self.drawable_cmd()?;
        unsafe {
            self.device
                .cmd_draw(cmd, vertex_count, instance_count, first_vertex, first_instance);
        }
        Ok(())
    }

    /// Draw indexed geometry with the bound pipeline.
    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> GpuResult<()> {
        let cmd = self.drawable_cmd()?;
        unsafe {
            self.device.cmd_draw_indexed(
                cmd,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
        Ok(())
    }

    /// Draw from indirect arguments stored in a buffer.
    pub fn draw_indirect(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        draw_count: u32,
        stride: u32,
    ) -> GpuResult<()> {
        let cmd = self.drawable_cmd()?;
        let native = self.indirect_buffer(buffer, draw_count)?;
        unsafe {
            self.device
                .cmd_draw_indirect(cmd, native, offset, draw_count, stride);
        }
        Ok(())
    }

    /// Draw indexed geometry from indirect arguments stored in a buffer.
    pub fn draw_indexed_indirect(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        draw_count: u32,
        stride: u32,
    ) -> GpuResult<()> {
        let cmd = self.drawable_cmd()?;
        let native = self.indirect_buffer(buffer, draw_count)?;
        unsafe {
            self.device
                .cmd_draw_indexed_indirect(cmd, native, offset, draw_count, stride);
        }
        Ok(())
    }

    /// Dispatch the bound compute pipeline. Must be outside a pass.
    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) -> GpuResult<()> {
        let cmd = self.frames.open_cmd()?;
        if self.binds.in_pass {
            return Err(GpuError::InvalidParameter(
                "compute dispatch inside a pass".to_string(),
            ));
        }
        if self.binds.bind_point != vk::PipelineBindPoint::COMPUTE || self.binds.pipeline.is_none()
        {
            return Err(GpuError::InvalidParameter(
                "no compute pipeline is bound".to_string(),
            ));
        }

        unsafe { self.device.cmd_dispatch(cmd, x, y, z) };
        Ok(())
    }

    // ----- internals -------------------------------------------------------

    pub(crate) fn allocator(&self) -> &Mutex<Allocator> {
        &self.allocator
    }

    pub(crate) fn free_allocation(&self, allocation: Allocation) {
        if let Err(err) = self.allocator.lock().free(allocation) {
            log::warn!("Failed to free GPU allocation: {err}");
        }
    }

    /// Route a victim to the frame slot whose fence covers it, or
    /// destroy it immediately if the GPU has never seen it.
    pub(crate) fn condemn(&mut self, victim: Victim) {
        let slot = condemn::routing_slot(
            self.frames.recording,
            self.frames.current,
            self.frames.last_submitted,
        );
        match slot {
            Some(slot) => self.condemned.push(slot, victim),
            None => unsafe { victim.destroy(&self.device, &self.allocator) },
        }
    }

    /// Attach a debug label to a native object, when the debug utils
    /// extension is live.
    pub(crate) fn name_object<T: vk::Handle>(&self, object: T, label: Option<&str>) {
        if let (Some(debug), Some(label)) = (&self.debug_device, label) {
            if let Ok(name) = CString::new(label) {
                let info = vk::DebugUtilsObjectNameInfoEXT::default()
                    .object_handle(object)
                    .object_name(&name);
                if let Err(code) = unsafe { debug.set_debug_utils_object_name(&info) } {
                    log::debug!("Failed to name object: {code:?}");
                }
            }
        }
    }

    /// The open frame's command buffer, for transfers and barriers.
    /// These are forbidden inside a render pass instance.
    fn transfer_cmd(&self) -> GpuResult<vk::CommandBuffer> {
        let cmd = self.frames.open_cmd()?;
        if self.binds.in_pass {
            return Err(GpuError::InvalidParameter(
                "transfers and barriers are not valid inside a pass".to_string(),
            ));
        }
        Ok(cmd)
    }

    fn drawable_cmd(&self) -> GpuResult<vk::CommandBuffer> {
        let cmd = self.frames.open_cmd()?;
        if !self.binds.in_pass {
            return Err(GpuError::InvalidParameter(
                "draws are only valid inside a pass".to_string(),
            ));
        }
        if self.binds.bind_point != vk::PipelineBindPoint::GRAPHICS || self.binds.pipeline.is_none()
        {
            return Err(GpuError::InvalidParameter(
                "no graphics pipeline is bound".to_string(),
            ));
        }
        Ok(cmd)
    }

    fn indirect_buffer(&self, handle: BufferHandle, draw_count: u32) -> GpuResult<vk::Buffer> {
        if draw_count > 1 && !self.features.contains(Features::MULTI_DRAW_INDIRECT) {
            return Err(GpuError::FeatureNotSupported(
                "multi-draw indirect".to_string(),
            ));
        }
        let record = self
            .resources
            .buffers
            .get(&handle.0)
            .ok_or(GpuError::InvalidHandle("buffer"))?;
        if !record.usage.contains(BufferUsage::INDIRECT) {
            return Err(GpuError::InvalidParameter(
                "buffer lacks INDIRECT usage".to_string(),
            ));
        }
        Ok(record.buffer)
    }

    /// Make transfer writes visible to subsequent commands in the frame.
    fn transfer_barrier(&self, cmd: vk::CommandBuffer) {
        let barrier = vk::MemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE);
        unsafe {
            self.device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::DependencyFlags::empty(),
                &[barrier],
                &[],
                &[],
            );
        }
    }

    /// Create a host-visible buffer for readbacks.
    fn create_readback(&self, size: u64) -> GpuResult<(vk::Buffer, Allocation)> {
        let create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(vk::BufferUsageFlags::TRANSFER_DST)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { self.device.create_buffer(&create_info, None) }
            .map_err(|code| GpuError::from_vk("create readback buffer", code))?;

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let allocation = self.allocator.lock().allocate(&AllocationCreateDesc {
            name: "readback",
            requirements,
            location: MemoryLocation::GpuToCpu,
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
            return Err(GpuError::from_vk("bind readback memory", code));
        }

        Ok((buffer, allocation))
    }

    /// Record and submit a one-shot transfer command buffer, blocking
    /// until the GPU finishes it.
    fn run_transfer<F>(&self, record: F) -> GpuResult<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let transfer = &self.transfer;
        unsafe {
            self.device
                .reset_command_pool(transfer.pool, vk::CommandPoolResetFlags::empty())
        }
        .map_err(|code| GpuError::from_vk("transfer pool reset", code))?;

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device.begin_command_buffer(transfer.cmd, &begin_info) }
            .map_err(|code| GpuError::from_vk("transfer command buffer begin", code))?;

        record(&self.device, transfer.cmd);

        unsafe { self.device.end_command_buffer(transfer.cmd) }
            .map_err(|code| GpuError::from_vk("transfer command buffer end", code))?;

        let command_buffers = [transfer.cmd];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        unsafe {
            self.device
                .queue_submit(self.queue, &[submit_info], transfer.fence)
        }
        .map_err(|code| GpuError::from_vk("transfer submit", code))?;

        unsafe {
            self.device
                .wait_for_fences(&[transfer.fence], true, FENCE_TIMEOUT_NS)
        }
        .map_err(|code| GpuError::from_vk("transfer fence wait", code))?;
        unsafe { self.device.reset_fences(&[transfer.fence]) }
            .map_err(|code| GpuError::from_vk("transfer fence reset", code))?;
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Err(err) = self.wait_idle() {
            log::warn!("Device teardown without reaching idle: {err}");
        }

        unsafe {
            self.condemned.purge_all(&self.device, &self.allocator);

            for (_, mut record) in self.resources.buffers.drain() {
                Victim::Buffer {
                    buffer: record.buffer,
                    allocation: record.allocation.take(),
                }
                .destroy(&self.device, &self.allocator);
            }
            // Non-owning views go first so no view outlives its image.
            let texture_ids: Vec<u64> = self.resources.textures.keys().copied().collect();
            for id in texture_ids {
                if let Some(record) = self.resources.textures.get(&id) {
                    if !record.owns_image {
                        if let Some(record) = self.resources.textures.remove(&id) {
                            Victim::ImageView { view: record.view }
                                .destroy(&self.device, &self.allocator);
                        }
                    }
                }
            }
            for (_, mut record) in self.resources.textures.drain() {
                Victim::Image {
                    image: record.image,
                    view: record.view,
                    allocation: record.allocation.take(),
                }
                .destroy(&self.device, &self.allocator);
            }
            for (_, record) in self.resources.samplers.drain() {
                Victim::Sampler {
                    sampler: record.sampler,
                }
                .destroy(&self.device, &self.allocator);
            }
            for (_, record) in self.resources.shaders.drain() {
                Victim::ShaderModule {
                    module: record.module,
                }
                .destroy(&self.device, &self.allocator);
            }
            for (_, record) in self.resources.pipelines.drain() {
                Victim::Pipeline {
                    pipeline: record.pipeline,
                    layout: record.layout,
                }
                .destroy(&self.device, &self.allocator);
            }
            for (_, record) in self.resources.canvases.drain() {
                Victim::Framebuffer {
                    framebuffer: record.framebuffer,
                }
                .destroy(&self.device, &self.allocator);
            }
            for (_, record) in self.resources.passes.drain() {
                Victim::RenderPass {
                    pass: record.render_pass,
                }
                .destroy(&self.device, &self.allocator);
            }
            // Bundles die with the descriptor pool.
            self.resources.bundles.clear();
            for (_, record) in self.resources.bundle_layouts.drain() {
                Victim::BundleLayout {
                    layout: record.layout,
                }
                .destroy(&self.device, &self.allocator);
            }

            for slot in &mut self.frames.slots {
                slot.staging.destroy(&self.device, &self.allocator);
            }
            self.transfer.destroy(&self.device);
            self.frames.destroy(&self.device);
            self.device.destroy_descriptor_pool(self.descriptor_pool, None);

            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
            destroy_instance_chain(&self.instance, &self.debug_utils, self.debug_messenger);
        }
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("physical_device", &self.physical_device)
            .field("features", &self.features)
            .field("live_resources", &self.resources.live_count())
            .finish_non_exhaustive()
    }
}

/// End of a byte range, rejecting offsets that would wrap.
fn checked_range_end(offset: u64, size: u64) -> GpuResult<u64> {
    offset.checked_add(size).ok_or_else(|| {
        GpuError::InvalidParameter(format!("range {size} bytes at {offset} overflows"))
    })
}

/// Size of a texture dimension at a mip level.
fn mip_dimension(value: u32, mip: u32) -> u32 {
    (value >> mip).max(1)
}

const DESCRIPTOR_POOL_CAPACITY: u32 = 1024;

fn create_descriptor_pool(device: &ash::Device) -> GpuResult<vk::DescriptorPool> {
    let sizes = [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: DESCRIPTOR_POOL_CAPACITY,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::STORAGE_BUFFER,
            descriptor_count: DESCRIPTOR_POOL_CAPACITY,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::SAMPLED_IMAGE,
            descriptor_count: DESCRIPTOR_POOL_CAPACITY,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::STORAGE_IMAGE,
            descriptor_count: DESCRIPTOR_POOL_CAPACITY,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::SAMPLER,
            descriptor_count: DESCRIPTOR_POOL_CAPACITY,
        },
    ];
    let create_info = vk::DescriptorPoolCreateInfo::default()
        .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
        .max_sets(DESCRIPTOR_POOL_CAPACITY)
        .pool_sizes(&sizes);

    unsafe { device.create_descriptor_pool(&create_info, None) }
        .map_err(|code| GpuError::from_vk("create descriptor pool", code))
}

/// Make transfer writes visible to host reads after the fence wait.
unsafe fn host_read_barrier(device: &ash::Device, cmd: vk::CommandBuffer) {
    let barrier = vk::MemoryBarrier::default()
        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .dst_access_mask(vk::AccessFlags::HOST_READ);
    device.cmd_pipeline_barrier(
        cmd,
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::HOST,
        vk::DependencyFlags::empty(),
        &[barrier],
        &[],
        &[],
    );
}

unsafe fn destroy_instance_chain(
    instance: &ash::Instance,
    debug_utils: &Option<ash::ext::debug_utils::Instance>,
    messenger: Option<vk::DebugUtilsMessengerEXT>,
) {
    if let (Some(utils), Some(messenger)) = (debug_utils, messenger) {
        utils.destroy_debug_utils_messenger(messenger, None);
    }
    instance.destroy_instance(None);
}

unsafe fn drop_allocator(allocator: ManuallyDrop<Mutex<Allocator>>) {
    drop(ManuallyDrop::into_inner(allocator));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_headless() {
        let config = DeviceConfig::default();
        assert!(config.display_handle.is_none());
        assert!(!config.app_name.is_empty());
    }

    #[test]
    fn test_frame_stats_default_is_empty() {
        let stats = FrameStats::default();
        assert_eq!(stats.scratchpads, 0);
        assert_eq!(stats.condemned, 0);
        assert_eq!(stats.in_flight, 0);
    }

    #[test]
    fn test_mip_dimension_halves_and_clamps() {
        assert_eq!(mip_dimension(16, 0), 16);
        assert_eq!(mip_dimension(16, 2), 4);
        assert_eq!(mip_dimension(16, 4), 1);
        // Never reaches zero, even past the last real mip.
        assert_eq!(mip_dimension(16, 10), 1);
        assert_eq!(mip_dimension(5, 1), 2);
    }

    #[test]
    fn test_range_end_rejects_wrapping_offsets() {
        assert_eq!(checked_range_end(16, 64), Ok(80));
        assert!(checked_range_end(u64::MAX - 4, 64).is_err());
        assert!(checked_range_end(u64::MAX, 1).is_err());
    }
}
