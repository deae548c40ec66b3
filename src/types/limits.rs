//! Device feature and limit introspection types.

use bitflags::bitflags;

bitflags! {
    /// Optional device capabilities.
    ///
    /// Callers should gate optional rendering paths on these bits before
    /// attempting resource creation that depends on them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Features: u32 {
        /// BC (DXT) compressed texture formats.
        const TEXTURE_BC = 1 << 0;
        /// ASTC compressed texture formats.
        const TEXTURE_ASTC = 1 << 1;
        /// Wireframe (line) polygon fill mode.
        const WIREFRAME = 1 << 2;
        /// Depth clamping instead of clipping.
        const DEPTH_CLAMP = 1 << 3;
        /// Anisotropic texture filtering.
        const ANISOTROPY = 1 << 4;
        /// Non-zero `first_instance` in indirect draws.
        const INDIRECT_FIRST_INSTANCE = 1 << 5;
        /// Multiple draws per indirect buffer.
        const MULTI_DRAW_INDIRECT = 1 << 6;
        /// 64-bit floats in shaders.
        const FLOAT64 = 1 << 7;
        /// 64-bit integers in shaders.
        const INT64 = 1 << 8;
        /// 16-bit integers in shaders.
        const INT16 = 1 << 9;
    }
}

/// Numeric device limits.
///
/// `Default` is all-zero, so code paths that have no device yet observe a
/// defined sentinel value rather than garbage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Limits {
    pub max_texture_size_2d: u32,
    pub max_texture_size_3d: u32,
    pub max_texture_size_cube: u32,
    pub max_texture_layers: u32,
    pub max_canvas_width: u32,
    pub max_canvas_height: u32,
    pub max_bundle_slots: u32,
    pub max_uniform_buffer_range: u32,
    pub max_storage_buffer_range: u32,
    pub uniform_buffer_align: u64,
    pub storage_buffer_align: u64,
    pub max_vertex_attributes: u32,
    pub max_vertex_buffers: u32,
    pub max_compute_workgroups: [u32; 3],
    pub max_compute_workgroup_size: [u32; 3],
    pub max_compute_workgroup_invocations: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_are_zeroed() {
        let limits = Limits::default();
        assert_eq!(limits.max_texture_size_2d, 0);
        assert_eq!(limits.uniform_buffer_align, 0);
        assert_eq!(Features::default(), Features::empty());
    }
}
