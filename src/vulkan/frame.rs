//! Rotating frame contexts.
//!
//! The ring holds [`FRAME_COUNT`] slots, each owning a command pool and
//! buffer, a completion fence, and a staging pool. A slot is only reused
//! for new recording after its fence from the previous use has signaled,
//! which bounds the number of frames in flight to the ring size.

use ash::vk;

use super::staging::StagingPool;
use crate::error::{GpuError, GpuResult};

/// Number of frames in flight.
pub(crate) const FRAME_COUNT: usize = 2;

/// Fence wait budget. A frame taking this long is treated as device loss,
/// not a retryable state.
pub(crate) const FENCE_TIMEOUT_NS: u64 = 2_000_000_000;

/// One rotating frame context.
#[derive(Debug)]
pub(crate) struct FrameSlot {
    pub pool: vk::CommandPool,
    pub cmd: vk::CommandBuffer,
    pub fence: vk::Fence,
    pub staging: StagingPool,
    /// Whether the fence has a pending (unwaited) submission behind it.
    pub submitted: bool,
}

/// The ring of frame slots plus the recording cursor.
#[derive(Debug)]
pub(crate) struct FrameRing {
    pub slots: Vec<FrameSlot>,
    pub current: usize,
    /// True between `begin_frame` and `submit_frame`.
    pub recording: bool,
    /// Slot of the most recent submission, for out-of-window condemns.
    pub last_submitted: Option<usize>,
    /// Monotonic count of submitted frames.
    pub submitted_count: u64,
}

impl FrameRing {
    /// Create all slots up front. On partial failure, everything created
    /// so far is destroyed before returning the error.
    pub(crate) fn new(device: &ash::Device, queue_family: u32) -> GpuResult<Self> {
        let mut slots: Vec<FrameSlot> = Vec::with_capacity(FRAME_COUNT);

        for _ in 0..FRAME_COUNT {
            match create_slot(device, queue_family) {
                Ok(slot) => slots.push(slot),
                Err(err) => {
                    for slot in &slots {
                        unsafe { destroy_slot_sync_objects(device, slot) };
                    }
                    return Err(err);
                }
            }
        }

        Ok(Self {
            slots,
            current: 0,
            recording: false,
            last_submitted: None,
            submitted_count: 0,
        })
    }

    /// Block until the current slot's previous use has finished on the
    /// GPU. The fence is left signaled so the caller can purge the
    /// slot's freelist while completion is still observable, then call
    /// [`Self::open_current`].
    pub(crate) fn wait_current(&mut self, device: &ash::Device) -> GpuResult<()> {
        if self.recording {
            return Err(GpuError::InvalidParameter(
                "a frame is already open for recording".to_string(),
            ));
        }

        let slot = &self.slots[self.current];
        if slot.submitted {
            unsafe { device.wait_for_fences(&[slot.fence], true, FENCE_TIMEOUT_NS) }
                .map_err(|code| GpuError::from_vk("frame fence wait", code))?;
        }
        Ok(())
    }

    /// Reset the current slot and open its command buffer for recording.
    /// Must follow a successful [`Self::wait_current`].
    pub(crate) fn open_current(&mut self, device: &ash::Device) -> GpuResult<()> {
        let slot = &mut self.slots[self.current];
        if slot.submitted {
            unsafe { device.reset_fences(&[slot.fence]) }
                .map_err(|code| GpuError::from_vk("frame fence reset", code))?;
            slot.submitted = false;
        }

        unsafe { device.reset_command_pool(slot.pool, vk::CommandPoolResetFlags::empty()) }
            .map_err(|code| GpuError::from_vk("frame command pool reset", code))?;

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { device.begin_command_buffer(slot.cmd, &begin_info) }
            .map_err(|code| GpuError::from_vk("frame command buffer begin", code))?;

        self.recording = true;
        Ok(())
    }

    /// End recording, submit with the slot's fence, and advance the ring.
    pub(crate) fn submit_current(
        &mut self,
        device: &ash::Device,
        queue: vk::Queue,
    ) -> GpuResult<()> {
        if !self.recording {
            return Err(GpuError::InvalidParameter(
                "no frame is open for recording".to_string(),
            ));
        }

        let slot = &mut self.slots[self.current];
        unsafe { device.end_command_buffer(slot.cmd) }
            .map_err(|code| GpuError::from_vk("frame command buffer end", code))?;

        let command_buffers = [slot.cmd];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        unsafe { device.queue_submit(queue, &[submit_info], slot.fence) }
            .map_err(|code| GpuError::from_vk("frame submit", code))?;

        slot.submitted = true;
        self.recording = false;
        self.last_submitted = Some(self.current);
        self.submitted_count += 1;
        self.current = advance(self.current);
        Ok(())
    }

    /// The command buffer currently open for recording, if any.
    pub(crate) fn open_cmd(&self) -> GpuResult<vk::CommandBuffer> {
        if self.recording {
            Ok(self.slots[self.current].cmd)
        } else {
            Err(GpuError::InvalidParameter(
                "no frame is open for recording".to_string(),
            ))
        }
    }

    /// Number of submissions the GPU has not yet been seen to finish.
    pub(crate) fn in_flight(&self) -> usize {
        self.slots.iter().filter(|s| s.submitted).count()
    }

    /// Destroy fences and command pools. Staging pools are torn down by
    /// the caller, which owns the allocator.
    pub(crate) unsafe fn destroy(&mut self, device: &ash::Device) {
        for slot in &self.slots {
            destroy_slot_sync_objects(device, slot);
        }
    }
}

/// The slot index after `current`.
pub(crate) fn advance(current: usize) -> usize {
    (current + 1) % FRAME_COUNT
}

fn create_slot(device: &ash::Device, queue_family: u32) -> GpuResult<FrameSlot> {
    let pool_info = vk::CommandPoolCreateInfo::default()
        .flags(vk::CommandPoolCreateFlags::TRANSIENT)
        .queue_family_index(queue_family);
    let pool = unsafe { device.create_command_pool(&pool_info, None) }
        .map_err(|code| GpuError::from_vk("create frame command pool", code))?;

    let alloc_info = vk::CommandBufferAllocateInfo::default()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);
    let cmd = match unsafe { device.allocate_command_buffers(&alloc_info) } {
        Ok(buffers) => buffers[0],
        Err(code) => {
            unsafe { device.destroy_command_pool(pool, None) };
            return Err(GpuError::from_vk("allocate frame command buffer", code));
        }
    };

    let fence = match unsafe { device.create_fence(&vk::FenceCreateInfo::default(), None) } {
        Ok(fence) => fence,
        Err(code) => {
            unsafe { device.destroy_command_pool(pool, None) };
            return Err(GpuError::from_vk("create frame fence", code));
        }
    };

    Ok(FrameSlot {
        pool,
        cmd,
        fence,
        staging: StagingPool::new(),
        submitted: false,
    })
}

unsafe fn destroy_slot_sync_objects(device: &ash::Device, slot: &FrameSlot) {
    device.destroy_fence(slot.fence, None);
    device.destroy_command_pool(slot.pool, None);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unbacked_ring() -> FrameRing {
        let slots = (0..FRAME_COUNT)
            .map(|_| FrameSlot {
                pool: vk::CommandPool::null(),
                cmd: vk::CommandBuffer::null(),
                fence: vk::Fence::null(),
                staging: StagingPool::new(),
                submitted: false,
            })
            .collect();
        FrameRing {
            slots,
            current: 0,
            recording: false,
            last_submitted: None,
            submitted_count: 0,
        }
    }

    #[test]
    fn test_in_flight_is_bounded_by_ring_size() {
        let mut ring = unbacked_ring();
        assert_eq!(ring.in_flight(), 0);

        for slot in 0..FRAME_COUNT {
            ring.slots[slot].submitted = true;
            assert_eq!(ring.in_flight(), slot + 1);
        }
        // Every slot pending is the ceiling; reusing a slot first
        // clears its submission, so the count never exceeds the ring.
        assert_eq!(ring.in_flight(), FRAME_COUNT);
        ring.slots[0].submitted = false;
        assert_eq!(ring.in_flight(), FRAME_COUNT - 1);
    }

    #[test]
    fn test_advance_wraps() {
        let mut slot = 0;
        for _ in 0..2 * FRAME_COUNT {
            let next = advance(slot);
            assert!(next < FRAME_COUNT);
            assert_ne!(next, slot);
            slot = next;
        }
        assert_eq!(slot, 0);
    }
}
