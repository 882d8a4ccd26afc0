//! Command-processor front end of the GFX device model.
//!
//! The front end consumes producer-written command packets from two ring
//! buffers, decodes the self-describing headers, and dispatches each packet
//! to a handler that mutates the register file or writes guest memory.
//! Indirect-buffer packets redirect execution into guest-resident
//! sub-streams, which run to exhaustion before the ring resumes.
//!
//! Layering:
//! - [`regs`] — the register file and its config/context windows,
//! - [`pm4`] — the packet wire format and field decoders,
//! - [`ring`] — per-ring location state and shared read/write offsets,
//! - [`cp`] — the device context and the decode/dispatch step,
//! - [`worker`] — the background consumer thread.
//!
//! Programming mistakes (reserved packet kinds, misaligned ring sizes,
//! register-block overruns) are contract violations: they surface as
//! [`CpError`] and halt the device instead of being skipped.
#![forbid(unsafe_code)]

pub mod cp;
pub mod error;
pub mod pm4;
pub mod regs;
pub mod ring;
pub mod worker;

pub use cp::{CpConfig, EventWatcher, GfxCp};
pub use error::{CpError, CpResult};
pub use guest_mem::{MapError, MappedRange, MemoryMapper, SharedRam};
pub use regs::{RegWindow, RegisterFile};
pub use ring::{RingPointers, RING_COUNT};
pub use worker::CpWorker;
