//! Render passes and canvases.
//!
//! A pass is the attachment layout plus load/store behavior; a canvas
//! binds a pass to concrete textures through a framebuffer. Attachment
//! layout transitions happen outside the render pass through the sync
//! layer, so passes declare their working layouts as both initial and
//! final.

use ash::vk;

use super::convert;
use super::resources::{CanvasRecord, PassRecord};
use super::{CanvasHandle, Device, PassHandle};
use crate::error::{GpuError, GpuResult};
use crate::types::{CanvasDescriptor, LoadOp, PassDescriptor};

impl Device {
    /// Create a pass from its attachment descriptions.
    pub fn create_pass(&mut self, desc: &PassDescriptor) -> GpuResult<PassHandle> {
        if desc.colors.is_empty() && desc.depth.is_none() {
            return Err(GpuError::InvalidParameter(
                "a pass needs at least one attachment".to_string(),
            ));
        }

        let samples = vk::SampleCountFlags::from_raw(desc.sample_count.max(1));
        let mut attachments = Vec::new();
        let mut color_refs = Vec::new();

        for color in &desc.colors {
            // Loaded contents come in already transitioned by begin_pass.
            let initial_layout = if color.load == LoadOp::Load {
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
            } else {
                vk::ImageLayout::UNDEFINED
            };
            color_refs.push(
                vk::AttachmentReference::default()
                    .attachment(attachments.len() as u32)
                    .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
            );
            attachments.push(
                vk::AttachmentDescription::default()
                    .format(convert::convert_format(color.format))
                    .samples(samples)
                    .load_op(convert::convert_load_op(color.load))
                    .store_op(convert::convert_store_op(color.store))
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(initial_layout)
                    .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
            );
        }

        let depth_ref;
        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);

        if let Some(depth) = &desc.depth {
            let initial_layout = if depth.load == LoadOp::Load {
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
            } else {
                vk::ImageLayout::UNDEFINED
            };
            depth_ref = vk::AttachmentReference::default()
                .attachment(attachments.len() as u32)
                .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
            attachments.push(
                vk::AttachmentDescription::default()
                    .format(convert::convert_format(depth.format))
                    .samples(samples)
                    .load_op(convert::convert_load_op(depth.load))
                    .store_op(convert::convert_store_op(depth.store))
                    .stencil_load_op(convert::convert_load_op(depth.load))
                    .stencil_store_op(convert::convert_store_op(depth.store))
                    .initial_layout(initial_layout)
                    .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            );
            subpass = subpass.depth_stencil_attachment(&depth_ref);
        }

        let dependencies = [
            vk::SubpassDependency::default()
                .src_subpass(vk::SUBPASS_EXTERNAL)
                .dst_subpass(0)
                .src_stage_mask(
                    vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                )
                .src_access_mask(vk::AccessFlags::empty())
                .dst_stage_mask(
                    vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                )
                .dst_access_mask(
                    vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                        | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                ),
            vk::SubpassDependency::default()
                .src_subpass(0)
                .dst_subpass(vk::SUBPASS_EXTERNAL)
                .src_stage_mask(
                    vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                        | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
                )
                .src_access_mask(
                    vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                        | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                )
                .dst_stage_mask(vk::PipelineStageFlags::ALL_COMMANDS)
                .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE),
        ];

        let subpasses = [subpass];
        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe { self.device.create_render_pass(&create_info, None) }
            .map_err(|code| GpuError::from_vk("create render pass", code))?;

        self.name_object(render_pass, desc.label.as_deref());

        let id = self.resources.next_id();
        self.resources.passes.insert(
            id,
            PassRecord {
                render_pass,
                colors: desc.colors.clone(),
                depth: desc.depth.clone(),
                sample_count: desc.sample_count.max(1),
            },
        );
        Ok(PassHandle(id))
    }

    /// Create a canvas: a framebuffer binding a pass to textures.
    ///
    /// Attachment textures must have [`RENDER`](crate::TextureUsage::RENDER)
    /// usage and formats matching the pass declaration.
    pub fn create_canvas(&mut self, desc: &CanvasDescriptor) -> GpuResult<CanvasHandle> {
        let pass_record = self
            .resources
            .passes
            .get(&desc.pass.0)
            .ok_or(GpuError::InvalidHandle("pass"))?;

        if desc.colors.len() != pass_record.colors.len()
            || desc.depth.is_some() != pass_record.depth.is_some()
        {
            return Err(GpuError::InvalidParameter(
                "canvas attachments do not match the pass".to_string(),
            ));
        }

        let mut views = Vec::new();
        let mut extent: Option<vk::Extent2D> = None;

        let textures = desc.colors.iter().chain(desc.depth.iter());
        let declared_formats = pass_record
            .colors
            .iter()
            .map(|c| c.format)
            .chain(pass_record.depth.iter().map(|d| d.format));

        for (texture, declared_format) in textures.zip(declared_formats) {
            let record = self
                .resources
                .textures
                .get(&texture.0)
                .ok_or(GpuError::InvalidHandle("texture"))?;
            if record.format != declared_format {
                return Err(GpuError::InvalidParameter(
                    "attachment format does not match the pass".to_string(),
                ));
            }
            if !record.usage.contains(crate::types::TextureUsage::RENDER) {
                return Err(GpuError::InvalidParameter(
                    "attachment texture lacks RENDER usage".to_string(),
                ));
            }

            let this_extent = vk::Extent2D {
                width: record.extent.width,
                height: record.extent.height,
            };
            match extent {
                None => extent = Some(this_extent),
                Some(prev) if prev != this_extent => {
                    return Err(GpuError::InvalidParameter(
                        "attachment sizes differ".to_string(),
                    ))
                }
                Some(_) => {}
            }
            views.push(record.view);
        }

        let extent = extent.ok_or_else(|| {
            GpuError::InvalidParameter("a canvas needs at least one attachment".to_string())
        })?;

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(pass_record.render_pass)
            .attachments(&views)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { self.device.create_framebuffer(&create_info, None) }
            .map_err(|code| GpuError::from_vk("create framebuffer", code))?;

        self.name_object(framebuffer, desc.label.as_deref());

        let id = self.resources.next_id();
        self.resources.canvases.insert(
            id,
            CanvasRecord {
                framebuffer,
                pass: desc.pass,
                colors: desc.colors.clone(),
                depth: desc.depth,
                extent,
            },
        );
        Ok(CanvasHandle(id))
    }
}
