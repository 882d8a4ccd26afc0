//! Guest-memory access for the GFX device model.
//!
//! Device code never touches guest memory directly. It asks a
//! [`MemoryMapper`] to pin a range of one address-space context and receives
//! a [`MappedRange`]: a bounded view whose accesses are checked against the
//! requested length and whose pin is released when the view is dropped.
//!
//! [`SharedRam`] is the in-memory backend: one flat byte range per
//! address-space context, with an outstanding-pin counter so tests can
//! assert that every acquire is paired with exactly one release.
#![forbid(unsafe_code)]

mod mapper;
mod ram;

pub use mapper::{AddressSpaceId, MapError, MapResult, MappedRange, MemoryMapper};
pub use ram::SharedRam;
