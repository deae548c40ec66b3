//! Render pass and canvas descriptors.

use super::texture::TextureFormat;
use crate::vulkan::{PassHandle, TextureHandle};

/// What happens to an attachment's contents when a pass begins.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LoadOp {
    /// Preserve the existing contents.
    Load,
    /// Clear to the attachment's clear value.
    #[default]
    Clear,
    /// Contents are undefined at pass start.
    Discard,
}

/// What happens to an attachment's contents when a pass ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    /// Write results back to memory.
    #[default]
    Store,
    /// Results may be discarded (e.g. transient depth).
    Discard,
}

/// One color attachment slot of a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorAttachment {
    pub format: TextureFormat,
    pub load: LoadOp,
    pub store: StoreOp,
    /// Clear color, used when `load` is [`LoadOp::Clear`].
    pub clear: [f32; 4],
}

impl Default for ColorAttachment {
    fn default() -> Self {
        Self {
            format: TextureFormat::Rgba8Unorm,
            load: LoadOp::Clear,
            store: StoreOp::Store,
            clear: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// The depth/stencil attachment slot of a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthAttachment {
    pub format: TextureFormat,
    pub load: LoadOp,
    pub store: StoreOp,
    pub clear_depth: f32,
    pub clear_stencil: u32,
}

impl Default for DepthAttachment {
    fn default() -> Self {
        Self {
            format: TextureFormat::Depth32Float,
            load: LoadOp::Clear,
            store: StoreOp::Discard,
            clear_depth: 1.0,
            clear_stencil: 0,
        }
    }
}

/// Descriptor for creating a pass: the attachment layout and load/store
/// behavior shared by every canvas and pipeline targeting it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PassDescriptor {
    /// Debug label for the pass.
    pub label: Option<String>,
    pub colors: Vec<ColorAttachment>,
    pub depth: Option<DepthAttachment>,
    pub sample_count: u32,
}

impl PassDescriptor {
    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Descriptor for creating a canvas: a pass bound to concrete textures.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasDescriptor {
    /// Debug label for the canvas.
    pub label: Option<String>,
    pub pass: PassHandle,
    /// One texture per color attachment declared by the pass.
    pub colors: Vec<TextureHandle>,
    pub depth: Option<TextureHandle>,
}
