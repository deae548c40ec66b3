//! Graphics and compute pipeline creation.

use std::ffi::CString;

use ash::vk;

use super::convert;
use super::resources::PipelineRecord;
use super::{BundleLayoutHandle, Device, PipelineHandle};
use crate::error::{GpuError, GpuResult};
use crate::types::{ComputePipelineDescriptor, PipelineDescriptor, ShaderStage};

impl Device {
    /// Create an immutable graphics pipeline targeting a pass.
    pub fn create_pipeline(&mut self, desc: &PipelineDescriptor) -> GpuResult<PipelineHandle> {
        let (vertex_module, vertex_entry) = self.shader_stage(desc.vertex_shader, ShaderStage::Vertex)?;
        let fragment = match desc.fragment_shader {
            Some(handle) => Some(self.shader_stage(handle, ShaderStage::Fragment)?),
            None => None,
        };

        let pass_record = self
            .resources
            .passes
            .get(&desc.pass.0)
            .ok_or(GpuError::InvalidHandle("pass"))?;
        let render_pass = pass_record.render_pass;
        let sample_count = pass_record.sample_count;
        let color_count = pass_record.colors.len();
        let pass_has_depth = pass_record.depth.is_some();

        if desc.depth.is_some() && !pass_has_depth {
            return Err(GpuError::InvalidParameter(
                "pipeline enables depth but the pass has no depth attachment".to_string(),
            ));
        }
        if desc.vertex_buffers.len() as u32 > self.limits.max_vertex_buffers {
            return Err(GpuError::FeatureNotSupported(format!(
                "{} vertex buffers exceeds device maximum {}",
                desc.vertex_buffers.len(),
                self.limits.max_vertex_buffers
            )));
        }

        let layout = self.create_pipeline_layout(&desc.bundle_layouts)?;

        let mut stages = vec![vk::PipelineShaderStageCreateInfo::default()
            .stage(convert::convert_shader_stage(ShaderStage::Vertex))
            .module(vertex_module)
            .name(&vertex_entry)];
        if let Some((module, entry)) = &fragment {
            stages.push(
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(convert::convert_shader_stage(ShaderStage::Fragment))
                    .module(*module)
                    .name(entry),
            );
        }

        let mut bindings = Vec::new();
        let mut attributes = Vec::new();
        for (index, buffer_layout) in desc.vertex_buffers.iter().enumerate() {
            bindings.push(
                vk::VertexInputBindingDescription::default()
                    .binding(index as u32)
                    .stride(buffer_layout.stride)
                    .input_rate(vk::VertexInputRate::VERTEX),
            );
            for attribute in &buffer_layout.attributes {
                attributes.push(
                    vk::VertexInputAttributeDescription::default()
                        .location(attribute.location)
                        .binding(index as u32)
                        .format(convert::convert_vertex_format(attribute.format))
                        .offset(attribute.offset),
                );
            }
        }

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(convert::convert_topology(desc.topology));

        // Viewport and scissor are dynamic; begin_pass sets them to the
        // canvas extent.
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(convert::convert_cull_mode(desc.cull_mode))
            .front_face(convert::convert_front_face(desc.front_face))
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::from_raw(sample_count));

        let mut depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default();
        if let Some(depth) = &desc.depth {
            depth_stencil = depth_stencil
                .depth_test_enable(true)
                .depth_write_enable(depth.write)
                .depth_compare_op(convert::convert_compare(depth.compare));
        }

        let blend_attachment = match &desc.blend {
            Some(blend) => vk::PipelineColorBlendAttachmentState::default()
                .blend_enable(true)
                .src_color_blend_factor(convert::convert_blend_factor(blend.src_color))
                .dst_color_blend_factor(convert::convert_blend_factor(blend.dst_color))
                .color_blend_op(convert::convert_blend_op(blend.color_op))
                .src_alpha_blend_factor(convert::convert_blend_factor(blend.src_alpha))
                .dst_alpha_blend_factor(convert::convert_blend_factor(blend.dst_alpha))
                .alpha_blend_op(convert::convert_blend_op(blend.alpha_op))
                .color_write_mask(vk::ColorComponentFlags::RGBA),
            None => vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA),
        };
        let blend_attachments = vec![blend_attachment; color_count];
        let color_blend =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
        };
        let pipeline = match pipelines {
            Ok(pipelines) => pipelines[0],
            Err((partial, code)) => {
                for pipeline in partial {
                    unsafe { self.device.destroy_pipeline(pipeline, None) };
                }
                unsafe { self.device.destroy_pipeline_layout(layout, None) };
                return Err(GpuError::from_vk("create graphics pipeline", code));
            }
        };

        self.name_object(pipeline, desc.label.as_deref());

        let id = self.resources.next_id();
        self.resources.pipelines.insert(
            id,
            PipelineRecord {
                pipeline,
                layout,
                bind_point: vk::PipelineBindPoint::GRAPHICS,
            },
        );
        Ok(PipelineHandle(id))
    }

    /// Create a compute pipeline from a compute shader.
    pub fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDescriptor,
    ) -> GpuResult<PipelineHandle> {
        let (module, entry) = self.shader_stage(desc.shader, ShaderStage::Compute)?;
        let layout = self.create_pipeline_layout(&desc.bundle_layouts)?;

        let stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(convert::convert_shader_stage(ShaderStage::Compute))
            .module(module)
            .name(&entry);
        let create_info = vk::ComputePipelineCreateInfo::default()
            .stage(stage)
            .layout(layout);

        let pipelines = unsafe {
            self.device
                .create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
        };
        let pipeline = match pipelines {
            Ok(pipelines) => pipelines[0],
            Err((partial, code)) => {
                for pipeline in partial {
                    unsafe { self.device.destroy_pipeline(pipeline, None) };
                }
                unsafe { self.device.destroy_pipeline_layout(layout, None) };
                return Err(GpuError::from_vk("create compute pipeline", code));
            }
        };

        self.name_object(pipeline, desc.label.as_deref());

        let id = self.resources.next_id();
        self.resources.pipelines.insert(
            id,
            PipelineRecord {
                pipeline,
                layout,
                bind_point: vk::PipelineBindPoint::COMPUTE,
            },
        );
        Ok(PipelineHandle(id))
    }

    /// Look up a shader and check it matches the expected stage; returns
    /// owned copies so no table borrow outlives the call.
    fn shader_stage(
        &self,
        handle: super::ShaderHandle,
        expected: ShaderStage,
    ) -> GpuResult<(vk::ShaderModule, CString)> {
        let record = self
            .resources
            .shaders
            .get(&handle.0)
            .ok_or(GpuError::InvalidHandle("shader"))?;
        if record.stage != expected {
            return Err(GpuError::InvalidParameter(format!(
                "shader is not a {expected:?} shader"
            )));
        }
        Ok((record.module, record.entry.clone()))
    }

    fn create_pipeline_layout(
        &mut self,
        bundle_layouts: &[BundleLayoutHandle],
    ) -> GpuResult<vk::PipelineLayout> {
        if bundle_layouts.len() as u32 > self.limits.max_bundle_slots {
            return Err(GpuError::FeatureNotSupported(format!(
                "{} bundle layouts exceeds device maximum {}",
                bundle_layouts.len(),
                self.limits.max_bundle_slots
            )));
        }

        let mut set_layouts = Vec::with_capacity(bundle_layouts.len());
        for handle in bundle_layouts {
            let record = self
                .resources
                .bundle_layouts
                .get(&handle.0)
                .ok_or(GpuError::InvalidHandle("bundle layout"))?;
            set_layouts.push(record.layout);
        }

        let create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        unsafe { self.device.create_pipeline_layout(&create_info, None) }
            .map_err(|code| GpuError::from_vk("create pipeline layout", code))
    }
}
