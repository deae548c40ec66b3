//! Bundle (shader resource binding) descriptors.
//!
//! A bundle layout names which binding slots a shader consumes; a bundle
//! binds concrete buffers/textures/samplers to those slots.

use super::pipeline::ShaderStages;
use crate::vulkan::{BufferHandle, BundleLayoutHandle, SamplerHandle, TextureHandle};

/// Kind of resource bound at a bundle slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingType {
    UniformBuffer,
    StorageBuffer,
    SampledTexture,
    StorageTexture,
    Sampler,
}

/// One slot in a bundle layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BundleLayoutEntry {
    pub binding: u32,
    pub ty: BindingType,
    pub stages: ShaderStages,
}

/// Descriptor for creating a bundle layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BundleLayoutDescriptor {
    /// Debug label for the layout.
    pub label: Option<String>,
    pub entries: Vec<BundleLayoutEntry>,
}

/// A concrete resource bound at a bundle slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingResource {
    Buffer {
        buffer: BufferHandle,
        offset: u64,
        /// Bound range in bytes; 0 means "to the end of the buffer".
        size: u64,
    },
    Texture(TextureHandle),
    Sampler(SamplerHandle),
}

/// One binding of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BundleEntry {
    pub binding: u32,
    pub resource: BindingResource,
}

/// Descriptor for creating a bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleDescriptor {
    /// Debug label for the bundle.
    pub label: Option<String>,
    pub layout: BundleLayoutHandle,
    pub entries: Vec<BundleEntry>,
}
