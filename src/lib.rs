//! A Vulkan rendering device with explicit frame pacing.
//!
//! The crate wraps raw Vulkan (via `ash`) behind a single [`Device`]
//! object that owns every GPU resource and a two-deep ring of rotating
//! frame contexts. Its core promises:
//!
//! - **Bounded latency**: at most two frames are ever in flight; opening
//!   a frame blocks until its slot's previous GPU work has finished.
//! - **Safe destruction**: destroying a resource never races the GPU.
//!   Native handles are condemned to the frame slot whose fence covers
//!   their last possible use and released when that fence signals.
//! - **Cheap uploads**: per-frame staging scratchpads are persistently
//!   mapped and bump-allocated; the pool grows on demand and is rewound,
//!   not freed, when the frame slot is reused.
//! - **Tracked layouts**: every texture knows its current image layout
//!   and all state changes flow through one barrier choke point.
//!
//! # Example
//!
//! ```no_run
//! use vermilion_gpu::{BufferDescriptor, BufferUsage, Device, DeviceConfig};
//!
//! # fn main() -> Result<(), vermilion_gpu::GpuError> {
//! let mut device = Device::new(&DeviceConfig::default())?;
//! let buffer = device.create_buffer(&BufferDescriptor::new(
//!     1024,
//!     BufferUsage::VERTEX | BufferUsage::COPY_DST,
//! ))?;
//!
//! device.begin_frame()?;
//! device.write_buffer(buffer, 0, &[0u8; 64])?;
//! device.submit_frame()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod types;
pub mod vulkan;

pub use error::{GpuError, GpuResult};
pub use types::*;
pub use vulkan::{
    BufferHandle, BundleHandle, BundleLayoutHandle, CanvasHandle, Device, DeviceConfig,
    FrameStats, PassHandle, PipelineHandle, SamplerHandle, ShaderHandle, TextureHandle,
    TextureLayout,
};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
