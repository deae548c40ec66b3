//! Texture layout tracking and barrier generation.
//!
//! Every texture carries its last-known image layout; all copies and
//! render attachments route through [`Device::set_layout`] (or the
//! internal transition helpers), which emit the minimal pipeline barrier
//! for the state change and update the tracked layout. A transition to
//! the layout a texture is already in emits nothing.

use ash::vk;

use crate::types::{TextureFormat, TextureUsage};

/// Image layout states a texture can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureLayout {
    /// Initial state, contents undefined.
    #[default]
    Undefined,
    /// Optimal for color attachment writes.
    ColorAttachment,
    /// Optimal for depth/stencil attachment writes.
    DepthStencilAttachment,
    /// Optimal for shader sampling.
    ShaderReadOnly,
    /// Optimal for transfer reads.
    TransferSrc,
    /// Optimal for transfer writes.
    TransferDst,
    /// General layout; required for storage images, valid for everything.
    General,
}

impl TextureLayout {
    /// Convert to the Vulkan image layout.
    pub fn to_vk(self) -> vk::ImageLayout {
        match self {
            Self::Undefined => vk::ImageLayout::UNDEFINED,
            Self::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            Self::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            Self::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            Self::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            Self::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            Self::General => vk::ImageLayout::GENERAL,
        }
    }

    /// Access mask for work that ran in this layout.
    pub fn src_access(self) -> vk::AccessFlags {
        match self {
            Self::Undefined => vk::AccessFlags::empty(),
            Self::ColorAttachment => vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            Self::DepthStencilAttachment => vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            Self::ShaderReadOnly => vk::AccessFlags::SHADER_READ,
            Self::TransferSrc => vk::AccessFlags::TRANSFER_READ,
            Self::TransferDst => vk::AccessFlags::TRANSFER_WRITE,
            Self::General => vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE,
        }
    }

    /// Access mask for work that will run in this layout.
    pub fn dst_access(self) -> vk::AccessFlags {
        match self {
            Self::Undefined => vk::AccessFlags::empty(),
            Self::ColorAttachment => {
                vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            }
            Self::DepthStencilAttachment => {
                vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
            }
            Self::ShaderReadOnly => vk::AccessFlags::SHADER_READ,
            Self::TransferSrc => vk::AccessFlags::TRANSFER_READ,
            Self::TransferDst => vk::AccessFlags::TRANSFER_WRITE,
            Self::General => vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE,
        }
    }

    /// Pipeline stage producing work in this layout.
    pub fn src_stage(self) -> vk::PipelineStageFlags {
        match self {
            Self::Undefined => vk::PipelineStageFlags::TOP_OF_PIPE,
            Self::ColorAttachment => vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            Self::DepthStencilAttachment => vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            Self::ShaderReadOnly => vk::PipelineStageFlags::FRAGMENT_SHADER,
            Self::TransferSrc | Self::TransferDst => vk::PipelineStageFlags::TRANSFER,
            Self::General => vk::PipelineStageFlags::COMPUTE_SHADER,
        }
    }

    /// Pipeline stage consuming work in this layout.
    pub fn dst_stage(self) -> vk::PipelineStageFlags {
        match self {
            Self::Undefined => vk::PipelineStageFlags::TOP_OF_PIPE,
            Self::ColorAttachment => vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            Self::DepthStencilAttachment => vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            Self::ShaderReadOnly => vk::PipelineStageFlags::FRAGMENT_SHADER,
            Self::TransferSrc | Self::TransferDst => vk::PipelineStageFlags::TRANSFER,
            Self::General => vk::PipelineStageFlags::COMPUTE_SHADER,
        }
    }
}

/// Whether a transition from `old` to `new` needs a barrier at all.
pub fn needs_transition(old: TextureLayout, new: TextureLayout) -> bool {
    old != new
}

/// The layout a texture rests in between explicit uses, derived from its
/// usage flags. Storage or copy-source textures need the flexible General
/// layout; sampled textures rest shader-readable; pure render targets
/// rest in their attachment layout.
pub fn natural_layout(usage: TextureUsage, format: TextureFormat) -> TextureLayout {
    if usage.contains(TextureUsage::STORAGE) || usage.contains(TextureUsage::COPY_SRC) {
        TextureLayout::General
    } else if usage.contains(TextureUsage::SAMPLE) {
        TextureLayout::ShaderReadOnly
    } else if usage.contains(TextureUsage::RENDER) {
        if format.is_depth_stencil() {
            TextureLayout::DepthStencilAttachment
        } else {
            TextureLayout::ColorAttachment
        }
    } else {
        TextureLayout::General
    }
}

/// Build the image memory barrier for a layout transition.
///
/// The caller is responsible for skipping same-layout transitions; this
/// always produces a barrier.
pub fn image_barrier(
    image: vk::Image,
    old: TextureLayout,
    new: TextureLayout,
    aspect: vk::ImageAspectFlags,
) -> vk::ImageMemoryBarrier<'static> {
    vk::ImageMemoryBarrier::default()
        .old_layout(old.to_vk())
        .new_layout(new.to_vk())
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: vk::REMAINING_MIP_LEVELS,
            base_array_layer: 0,
            layer_count: vk::REMAINING_ARRAY_LAYERS,
        })
        .src_access_mask(old.src_access())
        .dst_access_mask(new.dst_access())
}

/// Record a layout transition into a command buffer.
///
/// No-op when `old == new`; this is the single choke point every texture
/// state change goes through.
pub fn transition(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    old: TextureLayout,
    new: TextureLayout,
    aspect: vk::ImageAspectFlags,
) {
    if !needs_transition(old, new) {
        return;
    }

    let barrier = image_barrier(image, old, new, aspect);
    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            old.src_stage(),
            new.dst_stage(),
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn test_layout_to_vk() {
        assert_eq!(TextureLayout::Undefined.to_vk(), vk::ImageLayout::UNDEFINED);
        assert_eq!(
            TextureLayout::ColorAttachment.to_vk(),
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        );
        assert_eq!(
            TextureLayout::TransferDst.to_vk(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL
        );
    }

    #[test]
    fn test_same_layout_needs_no_barrier() {
        assert!(!needs_transition(
            TextureLayout::ShaderReadOnly,
            TextureLayout::ShaderReadOnly
        ));
        assert!(needs_transition(
            TextureLayout::Undefined,
            TextureLayout::TransferDst
        ));
    }

    #[test]
    fn test_natural_layout_from_usage() {
        assert_eq!(
            natural_layout(TextureUsage::STORAGE, TextureFormat::Rgba8Unorm),
            TextureLayout::General
        );
        assert_eq!(
            natural_layout(
                TextureUsage::SAMPLE | TextureUsage::COPY_DST,
                TextureFormat::Rgba8Unorm
            ),
            TextureLayout::ShaderReadOnly
        );
        assert_eq!(
            natural_layout(TextureUsage::RENDER, TextureFormat::Rgba8Unorm),
            TextureLayout::ColorAttachment
        );
        assert_eq!(
            natural_layout(TextureUsage::RENDER, TextureFormat::Depth32Float),
            TextureLayout::DepthStencilAttachment
        );
        // COPY_SRC forces General even for sampled textures
        assert_eq!(
            natural_layout(
                TextureUsage::SAMPLE | TextureUsage::COPY_SRC,
                TextureFormat::Rgba8Unorm
            ),
            TextureLayout::General
        );
    }

    #[test]
    fn test_barrier_masks_follow_layouts() {
        let image = vk::Image::from_raw(42);
        let barrier = image_barrier(
            image,
            TextureLayout::TransferDst,
            TextureLayout::ShaderReadOnly,
            vk::ImageAspectFlags::COLOR,
        );
        assert_eq!(barrier.old_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(barrier.new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(barrier.src_access_mask, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(barrier.dst_access_mask, vk::AccessFlags::SHADER_READ);
    }
}
