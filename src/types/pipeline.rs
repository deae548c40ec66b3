//! Shader and pipeline descriptors.

use bitflags::bitflags;

use super::sampler::CompareFunction;
use crate::vulkan::{BundleLayoutHandle, PassHandle, ShaderHandle};

/// Shader pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

bitflags! {
    /// Stage visibility mask for resource bindings.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
    }
}

/// Descriptor for creating a shader module from SPIR-V.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderDescriptor {
    /// Debug label for the shader.
    pub label: Option<String>,
    pub stage: ShaderStage,
    /// SPIR-V words.
    pub spirv: Vec<u32>,
    /// Entry point name.
    pub entry: String,
}

impl ShaderDescriptor {
    pub fn new(stage: ShaderStage, spirv: Vec<u32>) -> Self {
        Self {
            label: None,
            stage,
            spirv,
            entry: "main".to_string(),
        }
    }
}

/// Format of a single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Sint32,
    Unorm8x4,
}

impl VertexFormat {
    /// Size of one attribute in bytes.
    pub fn size(self) -> u32 {
        match self {
            Self::Float32 | Self::Uint32 | Self::Sint32 | Self::Unorm8x4 => 4,
            Self::Float32x2 => 8,
            Self::Float32x3 => 12,
            Self::Float32x4 => 16,
        }
    }
}

/// A single vertex attribute within a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub offset: u32,
    pub format: VertexFormat,
}

/// Layout of one bound vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexBufferLayout {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

/// Primitive assembly topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

/// Triangle winding order considered front-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

/// Face culling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
}

/// Index element width for indexed draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexType {
    Uint16,
    #[default]
    Uint32,
}

/// Blend factor for color blending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

/// Blend operation combining source and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOperation {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Per-attachment blend state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub color_op: BlendOperation,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub alpha_op: BlendOperation,
}

impl BlendState {
    /// Standard premultiplied-style alpha blending.
    pub const ALPHA: Self = Self {
        src_color: BlendFactor::SrcAlpha,
        dst_color: BlendFactor::OneMinusSrcAlpha,
        color_op: BlendOperation::Add,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::OneMinusSrcAlpha,
        alpha_op: BlendOperation::Add,
    };
}

/// Depth test state for a graphics pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthState {
    pub write: bool,
    pub compare: CompareFunction,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            write: true,
            compare: CompareFunction::LessEqual,
        }
    }
}

/// Descriptor for creating a graphics pipeline.
///
/// Pipelines are immutable once created and are tied to the attachment
/// layout of a specific pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDescriptor {
    /// Debug label for the pipeline.
    pub label: Option<String>,
    pub vertex_shader: ShaderHandle,
    pub fragment_shader: Option<ShaderHandle>,
    pub vertex_buffers: Vec<VertexBufferLayout>,
    pub topology: PrimitiveTopology,
    pub front_face: FrontFace,
    pub cull_mode: CullMode,
    /// Depth state; `None` disables depth testing entirely.
    pub depth: Option<DepthState>,
    /// Blend state applied to every color attachment; `None` is opaque.
    pub blend: Option<BlendState>,
    pub bundle_layouts: Vec<BundleLayoutHandle>,
    /// The pass this pipeline renders into.
    pub pass: PassHandle,
}

/// Descriptor for creating a compute pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComputePipelineDescriptor {
    /// Debug label for the pipeline.
    pub label: Option<String>,
    pub shader: ShaderHandle,
    pub bundle_layouts: Vec<BundleLayoutHandle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_format_sizes() {
        assert_eq!(VertexFormat::Float32x3.size(), 12);
        assert_eq!(VertexFormat::Unorm8x4.size(), 4);
    }
}
