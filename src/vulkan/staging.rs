//! Per-frame staging memory ("scratchpad") pool.
//!
//! Each frame slot owns a pool of fixed-capacity, persistently mapped,
//! host-coherent buffers. CPU writes land in a scratchpad at a bumped
//! cursor; a copy command recorded into the frame's command buffer moves
//! the bytes to their destination at submit time. The pool only ever
//! grows; cursors are reset when the owning frame slot is reused, after
//! its fence has confirmed the GPU consumed the staged bytes.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use parking_lot::Mutex;

use crate::error::{GpuError, GpuResult};

/// Capacity of a standard scratchpad.
pub(crate) const SCRATCHPAD_SIZE: u64 = 16 * 1024 * 1024;

/// Minimum alignment of any staged allocation.
pub(crate) const STAGING_ALIGN: u64 = 4;

/// Where staged bytes live: which scratchpad of the owning frame's pool,
/// and at what offset. Resolved into a copy source at record time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StagingMapping {
    pub scratchpad: usize,
    pub offset: u64,
    pub size: u64,
}

/// One persistently mapped host-coherent buffer.
#[derive(Debug)]
struct Scratchpad {
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    capacity: u64,
    cursor: u64,
}

/// Where the next staged allocation goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// Fits in an existing scratchpad at this offset.
    Existing { scratchpad: usize, offset: u64 },
    /// A new scratchpad of this capacity must be appended first.
    Grow { capacity: u64 },
}

/// A frame slot's scratchpad pool.
#[derive(Debug, Default)]
pub(crate) struct StagingPool {
    scratchpads: Vec<Scratchpad>,
    active: usize,
}

impl StagingPool {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reserve `size` bytes and return where they live.
    ///
    /// Grows the pool when the active scratchpad is exhausted. A request
    /// larger than [`SCRATCHPAD_SIZE`] gets a dedicated scratchpad sized
    /// to the request; it joins the pool like any other and is retained
    /// for reuse.
    pub(crate) fn map(
        &mut self,
        device: &ash::Device,
        allocator: &Mutex<Allocator>,
        size: u64,
        align: u64,
    ) -> GpuResult<StagingMapping> {
        if size == 0 {
            return Err(GpuError::InvalidParameter(
                "staging map of zero bytes".to_string(),
            ));
        }

        let align = align.max(STAGING_ALIGN);
        if let Placement::Grow { capacity } = self.plan(size, align) {
            let pad = create_scratchpad(device, allocator, capacity)?;
            self.scratchpads.push(pad);
        }

        match self.plan(size, align) {
            Placement::Existing { scratchpad, offset } => {
                self.commit(scratchpad, offset, size);
                Ok(StagingMapping {
                    scratchpad,
                    offset,
                    size,
                })
            }
            // A freshly grown scratchpad always fits the request.
            Placement::Grow { .. } => Err(GpuError::Internal(
                "staging pool failed to grow".to_string(),
            )),
        }
    }

    /// Copy `data` into the mapped bytes a mapping refers to.
    pub(crate) fn write(&mut self, mapping: StagingMapping, data: &[u8]) -> GpuResult<()> {
        debug_assert!(data.len() as u64 <= mapping.size);

        let pad = self
            .scratchpads
            .get_mut(mapping.scratchpad)
            .ok_or(GpuError::Internal("stale staging mapping".to_string()))?;
        let slice = pad
            .allocation
            .as_mut()
            .and_then(|a| a.mapped_slice_mut())
            .ok_or(GpuError::Internal("scratchpad is not mapped".to_string()))?;

        let start = mapping.offset as usize;
        slice[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// The native buffer backing a mapping, for recording the copy.
    pub(crate) fn buffer(&self, scratchpad: usize) -> vk::Buffer {
        self.scratchpads[scratchpad].buffer
    }

    /// Rewind every cursor to the start of the pool.
    ///
    /// Called when the owning frame slot is reused; its fence has proven
    /// the GPU consumed everything staged during the previous use.
    pub(crate) fn reset(&mut self) {
        for pad in &mut self.scratchpads {
            pad.cursor = 0;
        }
        self.active = 0;
    }

    /// Number of scratchpads; never decreases over the pool's lifetime.
    pub(crate) fn scratchpad_count(&self) -> usize {
        self.scratchpads.len()
    }

    /// Bytes staged since the last reset.
    pub(crate) fn staged_bytes(&self) -> u64 {
        self.scratchpads.iter().map(|p| p.cursor).sum()
    }

    /// Release all scratchpads. Called at device teardown after idle.
    pub(crate) unsafe fn destroy(&mut self, device: &ash::Device, allocator: &Mutex<Allocator>) {
        for mut pad in self.scratchpads.drain(..) {
            device.destroy_buffer(pad.buffer, None);
            if let Some(allocation) = pad.allocation.take() {
                if let Err(err) = allocator.lock().free(allocation) {
                    log::warn!("Failed to free scratchpad memory: {err}");
                }
            }
        }
        self.active = 0;
    }

    /// Decide where `size` bytes go without mutating anything.
    ///
    /// Scratchpads before `active` are never revisited; skipping one
    /// wastes its tail rather than risking overwriting staged bytes.
    fn plan(&self, size: u64, align: u64) -> Placement {
        let mut index = self.active;
        while let Some(pad) = self.scratchpads.get(index) {
            let offset = if index == self.active {
                align_up(pad.cursor, align)
            } else {
                0
            };
            if offset + size <= pad.capacity {
                return Placement::Existing { scratchpad: index, offset };
            }
            index += 1;
        }
        Placement::Grow {
            capacity: size.max(SCRATCHPAD_SIZE),
        }
    }

    fn commit(&mut self, scratchpad: usize, offset: u64, size: u64) {
        self.active = scratchpad;
        self.scratchpads[scratchpad].cursor = offset + size;
    }

    #[cfg(test)]
    fn push_unbacked(&mut self, capacity: u64) {
        self.scratchpads.push(Scratchpad {
            buffer: vk::Buffer::null(),
            allocation: None,
            capacity,
            cursor: 0,
        });
    }

    #[cfg(test)]
    fn plan_and_commit(&mut self, size: u64, align: u64) -> Option<StagingMapping> {
        if let Placement::Grow { capacity } = self.plan(size, align) {
            self.push_unbacked(capacity);
        }
        match self.plan(size, align) {
            Placement::Existing { scratchpad, offset } => {
                self.commit(scratchpad, offset, size);
                Some(StagingMapping {
                    scratchpad,
                    offset,
                    size,
                })
            }
            Placement::Grow { .. } => None,
        }
    }
}

fn align_up(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Create one host-coherent, persistently mapped scratchpad.
fn create_scratchpad(
    device: &ash::Device,
    allocator: &Mutex<Allocator>,
    capacity: u64,
) -> GpuResult<Scratchpad> {
    let create_info = vk::BufferCreateInfo::default()
        .size(capacity)
        .usage(vk::BufferUsageFlags::TRANSFER_SRC)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let buffer = unsafe { device.create_buffer(&create_info, None) }
        .map_err(|code| GpuError::from_vk("create scratchpad buffer", code))?;

    let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
    let allocation = allocator.lock().allocate(&AllocationCreateDesc {
        name: "staging scratchpad",
        requirements,
        location: MemoryLocation::CpuToGpu,
        linear: true,
        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
    });
    let allocation = match allocation {
        Ok(allocation) => allocation,
        Err(err) => {
            unsafe { device.destroy_buffer(buffer, None) };
            return Err(err.into());
        }
    };

    if let Err(code) =
        unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) }
    {
        unsafe { device.destroy_buffer(buffer, None) };
        if let Err(err) = allocator.lock().free(allocation) {
            log::warn!("Failed to free scratchpad memory after bind failure: {err}");
        }
        return Err(GpuError::from_vk("bind scratchpad memory", code));
    }

    log::debug!("Created {capacity}-byte staging scratchpad");
    Ok(Scratchpad {
        buffer,
        allocation: Some(allocation),
        capacity,
        cursor: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_map_grows_pool() {
        let mut pool = StagingPool::new();
        let mapping = pool.plan_and_commit(1024, STAGING_ALIGN).unwrap();
        assert_eq!(mapping.scratchpad, 0);
        assert_eq!(mapping.offset, 0);
        assert_eq!(pool.scratchpad_count(), 1);
    }

    #[test]
    fn test_cursor_bumps_with_alignment() {
        let mut pool = StagingPool::new();
        pool.push_unbacked(SCRATCHPAD_SIZE);

        let a = pool.plan_and_commit(3, STAGING_ALIGN).unwrap();
        let b = pool.plan_and_commit(8, STAGING_ALIGN).unwrap();
        assert_eq!(a.offset, 0);
        // 3 bytes rounds up to the 4-byte staging alignment
        assert_eq!(b.offset, 4);
        assert_eq!(pool.staged_bytes(), 12);
    }

    #[test]
    fn test_exhausted_scratchpad_appends_not_overwrites() {
        let mut pool = StagingPool::new();
        pool.push_unbacked(64);

        let a = pool.plan_and_commit(48, STAGING_ALIGN).unwrap();
        let b = pool.plan_and_commit(32, STAGING_ALIGN).unwrap();
        assert_eq!(a.scratchpad, 0);
        assert_eq!(b.scratchpad, 1);
        assert_eq!(b.offset, 0);
        assert_eq!(pool.scratchpad_count(), 2);
    }

    #[test]
    fn test_pool_never_shrinks_across_reset() {
        let mut pool = StagingPool::new();
        pool.push_unbacked(64);
        pool.plan_and_commit(64, STAGING_ALIGN).unwrap();
        pool.plan_and_commit(64, STAGING_ALIGN).unwrap();
        assert_eq!(pool.scratchpad_count(), 2);

        pool.reset();
        assert_eq!(pool.scratchpad_count(), 2);
        assert_eq!(pool.staged_bytes(), 0);

        // After reset the first scratchpad is writable again from offset 0.
        let a = pool.plan_and_commit(16, STAGING_ALIGN).unwrap();
        assert_eq!(a.scratchpad, 0);
        assert_eq!(a.offset, 0);
    }

    #[test]
    fn test_oversize_request_gets_dedicated_scratchpad() {
        let mut pool = StagingPool::new();
        pool.push_unbacked(SCRATCHPAD_SIZE);

        let mapping = pool.plan_and_commit(SCRATCHPAD_SIZE + 1, STAGING_ALIGN).unwrap();
        assert_eq!(mapping.scratchpad, 1);
        assert_eq!(mapping.offset, 0);
        assert_eq!(pool.scratchpad_count(), 2);
    }

    #[test]
    fn test_skipped_scratchpad_is_not_revisited() {
        let mut pool = StagingPool::new();
        pool.push_unbacked(64);

        pool.plan_and_commit(40, STAGING_ALIGN).unwrap();
        // Doesn't fit in the 24 remaining bytes; pool grows.
        let big = pool.plan_and_commit(48, STAGING_ALIGN).unwrap();
        assert_eq!(big.scratchpad, 1);

        // A later small allocation must not land back in scratchpad 0.
        let small = pool.plan_and_commit(8, STAGING_ALIGN).unwrap();
        assert_eq!(small.scratchpad, 1);
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 4), 0);
        assert_eq!(align_up(1, 4), 4);
        assert_eq!(align_up(4, 4), 4);
        assert_eq!(align_up(17, 16), 32);
    }
}
