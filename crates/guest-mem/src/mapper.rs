use core::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Identifier selecting one guest address-translation context.
///
/// The command stream carries this as a 4-bit field; backends may implement
/// fewer contexts than the encoding can name.
pub type AddressSpaceId = u8;

/// Errors from [`MemoryMapper`] backends and [`MappedRange`] accessors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("address-space context {space} does not exist")]
    InvalidAddressSpace { space: AddressSpaceId },

    #[error("zero-length mapping requested at 0x{base:x}")]
    ZeroLength { base: u64 },

    #[error("guest range 0x{base:x}+0x{len:x} overflows the address space")]
    AddressOverflow { base: u64, len: u64 },

    #[error("guest access out of range: addr=0x{addr:x} len=0x{len:x} size=0x{size:x}")]
    OutOfRange { addr: u64, len: u64, size: u64 },

    #[error("mapper pinned 0x{pinned:x} of the 0x{requested:x} bytes requested at 0x{base:x}")]
    ShortMapping {
        base: u64,
        requested: u64,
        pinned: u64,
    },
}

pub type MapResult<T> = Result<T, MapError>;

/// Scoped mapper over a set of guest address-space contexts.
///
/// `acquire` and `release` must pair exactly. [`MappedRange`] is the
/// intended way to hold a pin; it guarantees the pairing on every exit path.
pub trait MemoryMapper: Send + Sync {
    /// Pins `[base, base + len)` in `space` for host access and returns the
    /// pinned length, which is at least `len` on success.
    fn acquire(&self, space: AddressSpaceId, base: u64, len: u64) -> MapResult<u64>;

    /// Releases a pin previously returned by [`MemoryMapper::acquire`].
    fn release(&self, space: AddressSpaceId, base: u64, len: u64);

    /// Reads bytes from `space` into `buf`.
    fn read(&self, space: AddressSpaceId, addr: u64, buf: &mut [u8]) -> MapResult<()>;

    /// Writes `buf` into `space`.
    fn write(&self, space: AddressSpaceId, addr: u64, buf: &[u8]) -> MapResult<()>;

    fn read_u32(&self, space: AddressSpaceId, addr: u64) -> MapResult<u32> {
        let mut buf = [0u8; 4];
        self.read(space, addr, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn write_u32(&self, space: AddressSpaceId, addr: u64, val: u32) -> MapResult<()> {
        self.write(space, addr, &val.to_le_bytes())
    }

    fn read_u64(&self, space: AddressSpaceId, addr: u64) -> MapResult<u64> {
        let mut buf = [0u8; 8];
        self.read(space, addr, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn write_u64(&self, space: AddressSpaceId, addr: u64, val: u64) -> MapResult<()> {
        self.write(space, addr, &val.to_le_bytes())
    }
}

/// A bounded host view of one pinned guest range.
///
/// Accesses are checked against the requested length, not the (possibly
/// larger) pinned length, so a view never reads or writes past what its
/// creator asked for. Dropping the view releases the pin.
pub struct MappedRange {
    mem: Arc<dyn MemoryMapper>,
    space: AddressSpaceId,
    base: u64,
    len: u64,
    pinned: u64,
}

impl MappedRange {
    /// Pins `[base, base + len)` in `space`.
    ///
    /// Fails if the range is empty, wraps the address space, or the mapper
    /// pins less than requested (the partial pin is released before the
    /// error is returned).
    pub fn map(
        mem: Arc<dyn MemoryMapper>,
        space: AddressSpaceId,
        base: u64,
        len: u64,
    ) -> MapResult<Self> {
        if len == 0 {
            return Err(MapError::ZeroLength { base });
        }
        if base.checked_add(len).is_none() {
            return Err(MapError::AddressOverflow { base, len });
        }
        let pinned = mem.acquire(space, base, len)?;
        if pinned < len {
            mem.release(space, base, pinned);
            return Err(MapError::ShortMapping {
                base,
                requested: len,
                pinned,
            });
        }
        Ok(Self {
            mem,
            space,
            base,
            len,
            pinned,
        })
    }

    pub fn space(&self) -> AddressSpaceId {
        self.space
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn len_bytes(&self) -> u64 {
        self.len
    }

    /// Number of whole dwords covered by the view.
    pub fn dword_count(&self) -> u32 {
        (self.len / 4) as u32
    }

    /// Reads the dword at dword offset `index` from the view base.
    pub fn read_dword(&self, index: u32) -> MapResult<u32> {
        let offset = u64::from(index) * 4;
        self.check(offset, 4)?;
        self.mem.read_u32(self.space, self.base + offset)
    }

    /// Reads bytes at a view-relative byte offset.
    pub fn read_bytes(&self, offset: u64, buf: &mut [u8]) -> MapResult<()> {
        self.check(offset, buf.len() as u64)?;
        self.mem.read(self.space, self.base + offset, buf)
    }

    /// Writes bytes at a view-relative byte offset.
    pub fn write_bytes(&self, offset: u64, bytes: &[u8]) -> MapResult<()> {
        self.check(offset, bytes.len() as u64)?;
        self.mem.write(self.space, self.base + offset, bytes)
    }

    fn check(&self, offset: u64, len: u64) -> MapResult<()> {
        let end = offset
            .checked_add(len)
            .ok_or(MapError::AddressOverflow { base: offset, len })?;
        if end > self.len {
            // Reported addresses are view-relative.
            return Err(MapError::OutOfRange {
                addr: offset,
                len,
                size: self.len,
            });
        }
        Ok(())
    }
}

impl Drop for MappedRange {
    fn drop(&mut self) {
        self.mem.release(self.space, self.base, self.pinned);
    }
}

impl fmt::Debug for MappedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedRange")
            .field("space", &self.space)
            .field("base", &format_args!("0x{:x}", self.base))
            .field("len", &format_args!("0x{:x}", self.len))
            .finish()
    }
}
