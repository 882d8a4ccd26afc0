use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::mapper::{AddressSpaceId, MapError, MapResult, MemoryMapper};

/// In-memory [`MemoryMapper`] backend.
///
/// Holds one flat byte range per address-space context and counts
/// outstanding pins, so callers can assert the acquire/release pairing.
pub struct SharedRam {
    spaces: Vec<Mutex<Vec<u8>>>,
    active: AtomicUsize,
}

impl SharedRam {
    /// Number of address-space contexts; the command stream selects one
    /// with a 4-bit field.
    pub const SPACE_COUNT: usize = 16;

    /// Creates a backend with `size` bytes in every context.
    pub fn new(size: usize) -> Self {
        Self {
            spaces: (0..Self::SPACE_COUNT)
                .map(|_| Mutex::new(vec![0; size]))
                .collect(),
            active: AtomicUsize::new(0),
        }
    }

    /// Pins that have been acquired and not yet released.
    pub fn active_mappings(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn space(&self, space: AddressSpaceId) -> MapResult<&Mutex<Vec<u8>>> {
        self.spaces
            .get(usize::from(space))
            .ok_or(MapError::InvalidAddressSpace { space })
    }

    fn check_range(size: usize, addr: u64, len: u64) -> MapResult<(usize, usize)> {
        let end = addr
            .checked_add(len)
            .ok_or(MapError::AddressOverflow { base: addr, len })?;
        if end > size as u64 {
            return Err(MapError::OutOfRange {
                addr,
                len,
                size: size as u64,
            });
        }
        Ok((addr as usize, end as usize))
    }
}

impl MemoryMapper for SharedRam {
    fn acquire(&self, space: AddressSpaceId, base: u64, len: u64) -> MapResult<u64> {
        let bytes = self.space(space)?.lock().unwrap();
        Self::check_range(bytes.len(), base, len)?;
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(len)
    }

    fn release(&self, _space: AddressSpaceId, _base: u64, _len: u64) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn read(&self, space: AddressSpaceId, addr: u64, buf: &mut [u8]) -> MapResult<()> {
        let bytes = self.space(space)?.lock().unwrap();
        let (start, end) = Self::check_range(bytes.len(), addr, buf.len() as u64)?;
        buf.copy_from_slice(&bytes[start..end]);
        Ok(())
    }

    fn write(&self, space: AddressSpaceId, addr: u64, buf: &[u8]) -> MapResult<()> {
        let mut bytes = self.space(space)?.lock().unwrap();
        let (start, end) = Self::check_range(bytes.len(), addr, buf.len() as u64)?;
        bytes[start..end].copy_from_slice(buf);
        Ok(())
    }
}
