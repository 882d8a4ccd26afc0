use guest_mem::MapError;
use thiserror::Error;

use crate::regs::RegWindow;

pub type CpResult<T> = std::result::Result<T, CpError>;

/// Fatal command-processor faults.
///
/// Every variant is a contract violation by whoever programmed the device.
/// The hardware leaves such streams undefined, so the consumer halts the
/// device on the first one instead of skipping past it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpError {
    #[error("ring index {index} out of range (two rings are implemented)")]
    InvalidRingIndex { index: usize },

    #[error("ring size 0x{size:x} is not a nonzero multiple of 8 bytes")]
    InvalidRingSize { size: u64 },

    #[error("ring {index} has packets pending but no mapped location")]
    RingNotConfigured { index: usize },

    #[error("reserved type-1 packet header 0x{header:08x}")]
    ReservedPacketType { header: u32 },

    #[error("packet extends past its buffer: dword {index} of {available}")]
    TruncatedPacket { index: u32, available: u32 },

    #[error("{window} register block 0x{offset:x}+{count} exceeds span 0x{span:x}")]
    RegisterBlockOverflow {
        window: RegWindow,
        offset: u32,
        count: u32,
        span: u32,
    },

    #[error("indirect buffers nested deeper than {max} levels")]
    NestingTooDeep { max: u32 },

    #[error(transparent)]
    Memory(#[from] MapError),
}
