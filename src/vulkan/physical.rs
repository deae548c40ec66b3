//! Physical device selection, logical device creation, and capability
//! harvesting.

use std::ffi::CStr;

use ash::vk;

use crate::error::{GpuError, GpuResult};
use crate::types::{Features, Limits};

/// Select the best physical device, preferring discrete GPUs.
pub(crate) fn select_physical_device(instance: &ash::Instance) -> GpuResult<vk::PhysicalDevice> {
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(|code| {
        GpuError::InitializationFailed(format!("failed to enumerate physical devices: {code:?}"))
    })?;

    if devices.is_empty() {
        return Err(GpuError::InitializationFailed(
            "no Vulkan-capable GPU found".to_string(),
        ));
    }

    let mut best_device = None;
    let mut best_score = 0;

    for device in devices {
        let properties = unsafe { instance.get_physical_device_properties(device) };

        let mut score = 1;
        if properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
            score += 1000;
        } else if properties.device_type == vk::PhysicalDeviceType::INTEGRATED_GPU {
            score += 100;
        }
        score += properties.limits.max_image_dimension2_d / 1024;

        if score > best_score {
            best_score = score;
            best_device = Some(device);
        }

        let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
        log::info!(
            "Found GPU: {:?} (type: {:?}, score: {})",
            device_name,
            properties.device_type,
            score
        );
    }

    best_device
        .ok_or_else(|| GpuError::InitializationFailed("no suitable GPU found".to_string()))
}

/// Find a queue family supporting both graphics and compute.
pub(crate) fn find_queue_family(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> GpuResult<u32> {
    let queue_families =
        unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

    for (index, family) in queue_families.iter().enumerate() {
        if family
            .queue_flags
            .contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
        {
            return Ok(index as u32);
        }
    }

    Err(GpuError::InitializationFailed(
        "no graphics+compute queue family found".to_string(),
    ))
}

/// Create the logical device, enabling every optional feature the
/// hardware supports so the harvested [`Features`] bits are usable.
pub(crate) fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_family: u32,
) -> GpuResult<ash::Device> {
    let queue_priorities = [1.0f32];
    let queue_create_info = vk::DeviceQueueCreateInfo::default()
        .queue_family_index(queue_family)
        .queue_priorities(&queue_priorities);
    let queue_create_infos = [queue_create_info];

    let supported = unsafe { instance.get_physical_device_features(physical_device) };
    let features = vk::PhysicalDeviceFeatures::default()
        .sampler_anisotropy(supported.sampler_anisotropy == vk::TRUE)
        .fill_mode_non_solid(supported.fill_mode_non_solid == vk::TRUE)
        .depth_clamp(supported.depth_clamp == vk::TRUE)
        .multi_draw_indirect(supported.multi_draw_indirect == vk::TRUE)
        .draw_indirect_first_instance(supported.draw_indirect_first_instance == vk::TRUE)
        .texture_compression_bc(supported.texture_compression_bc == vk::TRUE)
        .texture_compression_astc_ldr(supported.texture_compression_astc_ldr == vk::TRUE)
        .shader_float64(supported.shader_float64 == vk::TRUE)
        .shader_int64(supported.shader_int64 == vk::TRUE)
        .shader_int16(supported.shader_int16 == vk::TRUE);

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_features(&features);

    let device =
        unsafe { instance.create_device(physical_device, &create_info, None) }.map_err(|code| {
            GpuError::InitializationFailed(format!("failed to create logical device: {code:?}"))
        })?;

    Ok(device)
}

/// Harvest the feature bitset from the physical device.
pub(crate) fn harvest_features(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Features {
    let supported = unsafe { instance.get_physical_device_features(physical_device) };
    let mut features = Features::empty();

    if supported.texture_compression_bc == vk::TRUE {
        features |= Features::TEXTURE_BC;
    }
    if supported.texture_compression_astc_ldr == vk::TRUE {
        features |= Features::TEXTURE_ASTC;
    }
    if supported.fill_mode_non_solid == vk::TRUE {
        features |= Features::WIREFRAME;
    }
    if supported.depth_clamp == vk::TRUE {
        features |= Features::DEPTH_CLAMP;
    }
    if supported.sampler_anisotropy == vk::TRUE {
        features |= Features::ANISOTROPY;
    }
    if supported.draw_indirect_first_instance == vk::TRUE {
        features |= Features::INDIRECT_FIRST_INSTANCE;
    }
    if supported.multi_draw_indirect == vk::TRUE {
        features |= Features::MULTI_DRAW_INDIRECT;
    }
    if supported.shader_float64 == vk::TRUE {
        features |= Features::FLOAT64;
    }
    if supported.shader_int64 == vk::TRUE {
        features |= Features::INT64;
    }
    if supported.shader_int16 == vk::TRUE {
        features |= Features::INT16;
    }

    features
}

/// Harvest numeric limits from the physical device.
pub(crate) fn harvest_limits(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Limits {
    let properties = unsafe { instance.get_physical_device_properties(physical_device) };
    let vk_limits = &properties.limits;

    Limits {
        max_texture_size_2d: vk_limits.max_image_dimension2_d,
        max_texture_size_3d: vk_limits.max_image_dimension3_d,
        max_texture_size_cube: vk_limits.max_image_dimension_cube,
        max_texture_layers: vk_limits.max_image_array_layers,
        max_canvas_width: vk_limits.max_framebuffer_width,
        max_canvas_height: vk_limits.max_framebuffer_height,
        max_bundle_slots: vk_limits.max_bound_descriptor_sets,
        max_uniform_buffer_range: vk_limits.max_uniform_buffer_range,
        max_storage_buffer_range: vk_limits.max_storage_buffer_range,
        uniform_buffer_align: vk_limits.min_uniform_buffer_offset_alignment,
        storage_buffer_align: vk_limits.min_storage_buffer_offset_alignment,
        max_vertex_attributes: vk_limits.max_vertex_input_attributes,
        max_vertex_buffers: vk_limits.max_vertex_input_bindings,
        max_compute_workgroups: vk_limits.max_compute_work_group_count,
        max_compute_workgroup_size: vk_limits.max_compute_work_group_size,
        max_compute_workgroup_invocations: vk_limits.max_compute_work_group_invocations,
    }
}
