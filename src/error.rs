//! GPU error types.

use std::fmt;

use ash::vk;

/// Errors that can occur in the GPU interface.
///
/// Every native Vulkan result code is translated into one of these
/// variants, so callers never see backend-specific error codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// Failed to initialize the device or one of its subsystems.
    InitializationFailed(String),
    /// Failed to create a resource.
    ResourceCreationFailed(String),
    /// A requested format/feature combination is unsupported on this device.
    ///
    /// This is the "try a fallback path" error; callers should gate on
    /// [`Features`](crate::Features) and [`Limits`](crate::Limits) first.
    FeatureNotSupported(String),
    /// Out of CPU or GPU memory.
    OutOfMemory,
    /// The GPU device was lost, or a fence wait timed out.
    DeviceLost,
    /// An invalid parameter was provided.
    InvalidParameter(String),
    /// A handle refers to a resource that no longer exists.
    InvalidHandle(&'static str),
    /// An internal error occurred.
    Internal(String),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed(msg) => write!(f, "initialization failed: {msg}"),
            Self::ResourceCreationFailed(msg) => write!(f, "resource creation failed: {msg}"),
            Self::FeatureNotSupported(msg) => write!(f, "feature not supported: {msg}"),
            Self::OutOfMemory => write!(f, "out of GPU memory"),
            Self::DeviceLost => write!(f, "GPU device lost"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            Self::InvalidHandle(kind) => write!(f, "stale {kind} handle"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for GpuError {}

/// Convenience alias used throughout the crate.
pub type GpuResult<T> = Result<T, GpuError>;

impl GpuError {
    /// Translate a raw Vulkan result code, keeping the driver code in the
    /// message for the few variants that carry one.
    pub(crate) fn from_vk(context: &str, code: vk::Result) -> Self {
        match code {
            vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
                Self::OutOfMemory
            }
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            vk::Result::TIMEOUT => Self::DeviceLost,
            vk::Result::ERROR_FORMAT_NOT_SUPPORTED
            | vk::Result::ERROR_FEATURE_NOT_PRESENT
            | vk::Result::ERROR_EXTENSION_NOT_PRESENT => {
                Self::FeatureNotSupported(format!("{context}: {code:?}"))
            }
            _ => Self::Internal(format!("{context}: {code:?}")),
        }
    }
}

impl From<gpu_allocator::AllocationError> for GpuError {
    fn from(err: gpu_allocator::AllocationError) -> Self {
        match err {
            gpu_allocator::AllocationError::OutOfMemory => Self::OutOfMemory,
            other => Self::Internal(format!("allocator: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GpuError::OutOfMemory;
        assert_eq!(err.to_string(), "out of GPU memory");

        let err = GpuError::InitializationFailed("no GPU found".to_string());
        assert_eq!(err.to_string(), "initialization failed: no GPU found");
    }

    #[test]
    fn test_vk_code_translation() {
        assert_eq!(
            GpuError::from_vk("alloc", vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
            GpuError::OutOfMemory
        );
        assert_eq!(
            GpuError::from_vk("wait", vk::Result::TIMEOUT),
            GpuError::DeviceLost
        );
        assert_eq!(
            GpuError::from_vk("submit", vk::Result::ERROR_DEVICE_LOST),
            GpuError::DeviceLost
        );
    }
}
