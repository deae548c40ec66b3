//! Vulkan instance creation and validation layer plumbing.

use std::ffi::{c_char, CStr, CString};

use ash::vk;
use raw_window_handle::RawDisplayHandle;

use crate::error::{GpuError, GpuResult};

use super::debug;

/// Required Vulkan API version.
const REQUIRED_API_VERSION: u32 = vk::make_api_version(0, 1, 1, 0);

/// Validation layer name.
const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Create a Vulkan instance, optionally with validation layers and the
/// debug messenger that relays driver messages into `log`.
///
/// When `display_handle` is given, the surface extensions required to
/// later present on that display are enabled; headless devices pass
/// `None` and get a bare instance.
pub(crate) fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    validation_enabled: bool,
    display_handle: Option<RawDisplayHandle>,
) -> GpuResult<(
    ash::Instance,
    Option<vk::DebugUtilsMessengerEXT>,
    Option<ash::ext::debug_utils::Instance>,
)> {
    let validation_available = validation_enabled && check_validation_layer_support(entry);

    if validation_enabled && !validation_available {
        log::warn!("Validation layers requested but not available");
    }

    let app_name = CString::new(app_name)
        .map_err(|_| GpuError::InvalidParameter("app name contains a NUL byte".to_string()))?;
    let engine_name = CString::new("vermilion").unwrap_or_default();

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(&engine_name)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(REQUIRED_API_VERSION);

    let mut extensions: Vec<*const c_char> = Vec::new();

    if let Some(display) = display_handle {
        let surface_extensions = ash_window::enumerate_required_extensions(display)
            .map_err(|code| GpuError::from_vk("query surface extensions", code))?;
        extensions.extend_from_slice(surface_extensions);
    }

    if validation_available {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    let layer_names: Vec<*const c_char> = if validation_available {
        vec![VALIDATION_LAYER_NAME.as_ptr()]
    } else {
        vec![]
    };

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layer_names);

    let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(|code| {
        GpuError::InitializationFailed(format!("failed to create Vulkan instance: {code:?}"))
    })?;

    let (messenger, debug_utils) = if validation_available {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, &instance);
        match debug::create_debug_messenger(&debug_utils) {
            Ok(messenger) => (Some(messenger), Some(debug_utils)),
            Err(err) => {
                unsafe { instance.destroy_instance(None) };
                return Err(err);
            }
        }
    } else {
        (None, None)
    };

    Ok((instance, messenger, debug_utils))
}

/// Check if the validation layer is available.
fn check_validation_layer_support(entry: &ash::Entry) -> bool {
    let available_layers = match unsafe { entry.enumerate_instance_layer_properties() } {
        Ok(layers) => layers,
        Err(_) => return false,
    };

    for layer in &available_layers {
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        if name == VALIDATION_LAYER_NAME {
            return true;
        }
    }

    false
}
