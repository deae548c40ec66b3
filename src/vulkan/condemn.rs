//! Deferred destruction of GPU resources.
//!
//! Destroying a resource never releases native handles immediately.
//! Instead the handles are condemned into the freelist of the frame slot
//! whose fence is known to cover every command that might still touch
//! them. When that slot is waited on again (its fence has signaled), the
//! freelist is purged and the native destroys actually run.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, Allocator};
use parking_lot::Mutex;

use super::frame::FRAME_COUNT;

/// Native handles scheduled for destruction.
///
/// One variant per resource kind, so purge dispatch is an exhaustive
/// match checked by the compiler rather than a runtime tag switch.
#[derive(Debug)]
pub(crate) enum Victim {
    Buffer {
        buffer: vk::Buffer,
        allocation: Option<Allocation>,
    },
    /// An owning texture: image, its default view, and backing memory.
    Image {
        image: vk::Image,
        view: vk::ImageView,
        allocation: Option<Allocation>,
    },
    /// A non-owning texture view; the base texture keeps the image.
    ImageView { view: vk::ImageView },
    Sampler { sampler: vk::Sampler },
    ShaderModule { module: vk::ShaderModule },
    BundleLayout { layout: vk::DescriptorSetLayout },
    Bundle {
        pool: vk::DescriptorPool,
        set: vk::DescriptorSet,
    },
    Pipeline {
        pipeline: vk::Pipeline,
        layout: vk::PipelineLayout,
    },
    RenderPass { pass: vk::RenderPass },
    Framebuffer { framebuffer: vk::Framebuffer },
}

impl Victim {
    /// Destroy the native handles.
    ///
    /// # Safety
    ///
    /// The GPU must have finished all work referencing these handles.
    pub(crate) unsafe fn destroy(self, device: &ash::Device, allocator: &Mutex<Allocator>) {
        match self {
            Self::Buffer { buffer, allocation } => {
                device.destroy_buffer(buffer, None);
                free_allocation(allocator, allocation);
            }
            Self::Image {
                image,
                view,
                allocation,
            } => {
                device.destroy_image_view(view, None);
                device.destroy_image(image, None);
                free_allocation(allocator, allocation);
            }
            Self::ImageView { view } => {
                device.destroy_image_view(view, None);
            }
            Self::Sampler { sampler } => {
                device.destroy_sampler(sampler, None);
            }
            Self::ShaderModule { module } => {
                device.destroy_shader_module(module, None);
            }
            Self::BundleLayout { layout } => {
                device.destroy_descriptor_set_layout(layout, None);
            }
            Self::Bundle { pool, set } => {
                if let Err(code) = device.free_descriptor_sets(pool, &[set]) {
                    log::warn!("Failed to free descriptor set: {code:?}");
                }
            }
            Self::Pipeline { pipeline, layout } => {
                device.destroy_pipeline(pipeline, None);
                device.destroy_pipeline_layout(layout, None);
            }
            Self::RenderPass { pass } => {
                device.destroy_render_pass(pass, None);
            }
            Self::Framebuffer { framebuffer } => {
                device.destroy_framebuffer(framebuffer, None);
            }
        }
    }
}

fn free_allocation(allocator: &Mutex<Allocator>, allocation: Option<Allocation>) {
    if let Some(allocation) = allocation {
        if let Err(err) = allocator.lock().free(allocation) {
            log::warn!("Failed to free GPU allocation: {err}");
        }
    }
}

/// Pick the frame slot whose freelist should receive a victim.
///
/// - While a frame is open for recording, victims belong to it: its fence
///   will cover every command recorded so far.
/// - Outside the recording window, victims go to the most recently
///   submitted slot; its fence covers the last submission that could
///   still reference the resource.
/// - Before anything was ever submitted the GPU has never seen the
///   resource, so `None` means "destroy immediately".
pub(crate) fn routing_slot(
    recording: bool,
    current: usize,
    last_submitted: Option<usize>,
) -> Option<usize> {
    if recording {
        Some(current)
    } else {
        last_submitted
    }
}

/// Per-frame-slot freelists of condemned resources.
///
/// The backing `Vec`s are cleared on purge, never deallocated, so their
/// capacity is reused across frames.
#[derive(Debug, Default)]
pub(crate) struct CondemnQueues {
    queues: [Vec<Victim>; FRAME_COUNT],
}

impl CondemnQueues {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a victim to a slot's freelist.
    pub(crate) fn push(&mut self, slot: usize, victim: Victim) {
        self.queues[slot].push(victim);
    }

    /// Destroy everything condemned to `slot`.
    ///
    /// # Safety
    ///
    /// The slot's fence must have been observed signaled since the last
    /// submission that used it.
    pub(crate) unsafe fn purge(
        &mut self,
        slot: usize,
        device: &ash::Device,
        allocator: &Mutex<Allocator>,
    ) {
        let queue = &mut self.queues[slot];
        if queue.is_empty() {
            return;
        }

        log::trace!("Purging {} condemned resources from slot {slot}", queue.len());
        for victim in queue.drain(..) {
            victim.destroy(device, allocator);
        }
    }

    /// Destroy everything in every slot. Used at device teardown, after
    /// the device has gone idle.
    pub(crate) unsafe fn purge_all(&mut self, device: &ash::Device, allocator: &Mutex<Allocator>) {
        for slot in 0..FRAME_COUNT {
            self.purge(slot, device, allocator);
        }
    }

    /// Number of victims currently condemned to `slot`.
    pub(crate) fn pending(&self, slot: usize) -> usize {
        self.queues[slot].len()
    }

    /// Total victims pending across all slots.
    pub(crate) fn pending_total(&self) -> usize {
        self.queues.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_prefers_open_frame() {
        assert_eq!(routing_slot(true, 1, Some(0)), Some(1));
        assert_eq!(routing_slot(true, 0, None), Some(0));
    }

    #[test]
    fn test_routing_outside_window_uses_last_submitted() {
        assert_eq!(routing_slot(false, 1, Some(0)), Some(0));
        assert_eq!(routing_slot(false, 0, Some(1)), Some(1));
    }

    #[test]
    fn test_routing_before_first_submit_is_immediate() {
        assert_eq!(routing_slot(false, 0, None), None);
    }

    #[test]
    fn test_queues_track_pending_per_slot() {
        let mut queues = CondemnQueues::new();
        queues.push(
            0,
            Victim::Sampler {
                sampler: vk::Sampler::null(),
            },
        );
        queues.push(
            1,
            Victim::Framebuffer {
                framebuffer: vk::Framebuffer::null(),
            },
        );
        queues.push(
            1,
            Victim::RenderPass {
                pass: vk::RenderPass::null(),
            },
        );

        assert_eq!(queues.pending(0), 1);
        assert_eq!(queues.pending(1), 2);
        assert_eq!(queues.pending_total(), 3);
    }
}
