//! Ring descriptors and their shared read/write offsets.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use guest_mem::{MappedRange, MemoryMapper};
use tracing::debug;

use crate::error::{CpError, CpResult};

/// Number of rings implemented by the front end.
pub const RING_COUNT: usize = 2;

/// Address-space context rings are mapped through.
const RING_SPACE: u8 = 0;

/// Cloneable handle over one ring's read/write offsets.
///
/// Offsets are byte-valued, as the controller programs them, and always move
/// in whole dwords. The producer publishes `wptr` with release ordering and
/// never touches `rptr`; the consumer is the only writer of `rptr`. A stale
/// `wptr` read delays processing but never mis-dispatches.
#[derive(Clone, Debug, Default)]
pub struct RingPointers {
    rptr: Arc<AtomicU32>,
    wptr: Arc<AtomicU32>,
}

impl RingPointers {
    /// Byte offset the consumer has processed up to.
    pub fn rptr(&self) -> u32 {
        self.rptr.load(Ordering::Acquire)
    }

    /// Byte offset the producer has published up to.
    pub fn wptr(&self) -> u32 {
        self.wptr.load(Ordering::Acquire)
    }

    /// Producer-side publish of new stream bytes.
    pub fn set_wptr(&self, wptr: u32) {
        self.wptr.store(wptr, Ordering::Release);
    }

    pub(crate) fn advance_rptr(&self, dwords: u32) {
        let rptr = self.rptr.load(Ordering::Relaxed);
        self.rptr
            .store(rptr.wrapping_add(dwords * 4), Ordering::Release);
    }
}

/// Per-ring location and mapping state.
pub struct RingBuffer {
    index: usize,
    base: u64,
    size_bytes: u64,
    mapping: Option<MappedRange>,
    ptrs: RingPointers,
}

impl RingBuffer {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            base: 0,
            size_bytes: 0,
            mapping: None,
            ptrs: RingPointers::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn is_configured(&self) -> bool {
        self.mapping.is_some()
    }

    /// Handle shared with the producer side.
    pub fn pointers(&self) -> RingPointers {
        self.ptrs.clone()
    }

    pub(crate) fn ptrs(&self) -> &RingPointers {
        &self.ptrs
    }

    /// Packets are pending while the consumer trails the producer.
    pub(crate) fn pending(&self) -> bool {
        self.ptrs.rptr() < self.ptrs.wptr()
    }

    pub(crate) fn mapping(&self) -> CpResult<&MappedRange> {
        self.mapping.as_ref().ok_or(CpError::RingNotConfigured {
            index: self.index,
        })
    }

    /// (Re)programs the ring's guest-memory location.
    ///
    /// Any previous mapping is released before the new range is acquired.
    /// Read/write offsets are left untouched; the controller programs those
    /// through their own registers.
    pub(crate) fn set_location(
        &mut self,
        mem: &Arc<dyn MemoryMapper>,
        base: u64,
        size_bytes: u64,
    ) -> CpResult<()> {
        if size_bytes == 0 || size_bytes % 8 != 0 {
            return Err(CpError::InvalidRingSize { size: size_bytes });
        }
        self.mapping = None;
        let mapping = MappedRange::map(Arc::clone(mem), RING_SPACE, base, size_bytes)?;
        self.base = base;
        self.size_bytes = size_bytes;
        self.mapping = Some(mapping);
        debug!(ring = self.index, base, size_bytes, "ring location set");
        Ok(())
    }
}
