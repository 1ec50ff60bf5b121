//! Virtqueue descriptor layout, legacy interface.
//!
//! 2.6.2 Legacy Interfaces: A Note on Virtqueue Layout
//! ------------------------------------------------------------------
//! Descriptor Table  | Available Ring | (...padding...) | Used Ring
//! ------------------------------------------------------------------

use crate::bus::Bus;
use crate::exception::Exception;

/// Size of one descriptor table entry in guest memory.
pub const VIRTQ_DESC_SIZE: u64 = 16;

// virtqueue descriptor flags
pub const VIRTQ_DESC_F_NEXT: u16 = 1;
pub const VIRTQ_DESC_F_WRITE: u16 = 2;

// virtio block request types
pub const VIRTIO_BLK_T_IN: u32 = 0;
pub const VIRTIO_BLK_T_OUT: u32 = 1;

/// One descriptor, read out of guest memory through the bus. `addr` points at
/// the buffer, `flags` marks chaining and the device-write direction, `next`
/// indexes the chained descriptor.
pub struct VirtqDesc {
    pub addr: u64,
    pub len: u32,
    pub flags: u16,
    pub next: u16,
}

impl VirtqDesc {
    pub fn fetch(bus: &mut Bus, addr: u64) -> Result<Self, Exception> {
        Ok(Self {
            addr: bus.load(addr, 64)?,
            len: bus.load(addr + 8, 32)? as u32,
            flags: bus.load(addr + 12, 16)? as u16,
            next: bus.load(addr + 14, 16)? as u16,
        })
    }
}
