//! Texture types and descriptors.

use bitflags::bitflags;

/// Texture pixel formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    // 8-bit formats
    R8Unorm,
    R8Snorm,
    R8Uint,
    R8Sint,

    // 16-bit formats
    R16Unorm,
    R16Float,
    Rg8Unorm,

    // 32-bit formats
    R32Float,
    R32Uint,
    Rg16Float,
    #[default]
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,

    // 64-bit formats
    Rgba16Float,
    Rg32Float,

    // 128-bit formats
    Rgba32Float,

    // Depth/stencil formats
    Depth16Unorm,
    Depth24PlusStencil8,
    Depth32Float,
    Depth32FloatStencil8,
}

impl TextureFormat {
    /// Whether this is a depth or depth/stencil format.
    pub fn is_depth_stencil(self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm
                | Self::Depth24PlusStencil8
                | Self::Depth32Float
                | Self::Depth32FloatStencil8
        )
    }

    /// Whether this format carries a stencil aspect.
    pub fn has_stencil(self) -> bool {
        matches!(self, Self::Depth24PlusStencil8 | Self::Depth32FloatStencil8)
    }

    /// Bytes per texel for color formats, bytes per depth texel otherwise.
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            Self::R8Unorm | Self::R8Snorm | Self::R8Uint | Self::R8Sint => 1,
            Self::R16Unorm | Self::R16Float | Self::Rg8Unorm | Self::Depth16Unorm => 2,
            Self::R32Float
            | Self::R32Uint
            | Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Bgra8UnormSrgb
            | Self::Depth24PlusStencil8
            | Self::Depth32Float => 4,
            Self::Rgba16Float | Self::Rg32Float | Self::Depth32FloatStencil8 => 8,
            Self::Rgba32Float => 16,
        }
    }
}

/// Texture dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureType {
    /// Plain 2D texture.
    #[default]
    D2,
    /// 3D volume texture.
    D3,
    /// Cubemap (6 layers).
    Cube,
    /// 2D array texture; `extent.depth_or_layers` is the layer count.
    Array,
}

bitflags! {
    /// Usage flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be copied from.
        const COPY_SRC = 1 << 0;
        /// Texture can be copied to.
        const COPY_DST = 1 << 1;
        /// Texture can be sampled in shaders.
        const SAMPLE = 1 << 2;
        /// Texture can be bound as a storage image.
        const STORAGE = 1 << 3;
        /// Texture can be rendered to as a pass attachment.
        const RENDER = 1 << 4;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// A 3D extent: width, height, and depth or array layer count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    pub depth_or_layers: u32,
}

impl Default for Extent3d {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            depth_or_layers: 1,
        }
    }
}

impl Extent3d {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth_or_layers: 1,
        }
    }
}

/// A 3D offset into a texture, plus the starting array layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Offset3d {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub layer: u32,
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    pub ty: TextureType,
    pub format: TextureFormat,
    pub extent: Extent3d,
    pub mip_count: u32,
    pub sample_count: u32,
    pub usage: TextureUsage,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            ty: TextureType::D2,
            format: TextureFormat::Rgba8Unorm,
            extent: Extent3d::default(),
            mip_count: 1,
            sample_count: 1,
            usage: TextureUsage::empty(),
        }
    }
}

impl TextureDescriptor {
    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Descriptor for creating a view over an existing texture.
///
/// Views share the base texture's backing memory; destroying a view
/// releases only the view object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureViewDescriptor {
    /// Debug label for the view.
    pub label: Option<String>,
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}

impl Default for TextureViewDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            base_mip: 0,
            mip_count: 1,
            base_layer: 0,
            layer_count: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_format_classification() {
        assert!(TextureFormat::Depth32Float.is_depth_stencil());
        assert!(TextureFormat::Depth24PlusStencil8.has_stencil());
        assert!(!TextureFormat::Rgba8Unorm.is_depth_stencil());
        assert!(!TextureFormat::Depth32Float.has_stencil());
    }

    #[test]
    fn test_bytes_per_texel() {
        assert_eq!(TextureFormat::Rgba8Unorm.bytes_per_texel(), 4);
        assert_eq!(TextureFormat::Rgba32Float.bytes_per_texel(), 16);
        assert_eq!(TextureFormat::R8Unorm.bytes_per_texel(), 1);
    }
}
