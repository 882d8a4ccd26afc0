#![allow(dead_code)]

use std::sync::Arc;

use gfx_cp::pm4::opcode;
use gfx_cp::{CpConfig, GfxCp, MemoryMapper, SharedRam};

pub const RAM_BYTES: usize = 0x20000;
pub const RING_BASE: u64 = 0x1000;
pub const RING_BYTES: u64 = 0x100;

pub fn new_cp() -> (Arc<SharedRam>, GfxCp) {
    new_cp_with(CpConfig::default())
}

pub fn new_cp_with(config: CpConfig) -> (Arc<SharedRam>, GfxCp) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let ram = Arc::new(SharedRam::new(RAM_BYTES));
    let cp = GfxCp::new(ram.clone(), config);
    (ram, cp)
}

/// Writes a dword stream into guest memory, little-endian.
pub fn write_stream(ram: &SharedRam, space: u8, base: u64, dwords: &[u32]) {
    for (i, dw) in dwords.iter().enumerate() {
        ram.write_u32(space, base + i as u64 * 4, *dw).unwrap();
    }
}

pub fn type0_header(base_reg: u16, count_minus_one: u16) -> u32 {
    (u32::from(count_minus_one) << 16) | u32::from(base_reg)
}

pub fn type1_header() -> u32 {
    1 << 30
}

pub fn type2_header() -> u32 {
    2 << 30
}

pub fn type3_header(op: u8, count_minus_one: u16) -> u32 {
    (3 << 30) | (u32::from(count_minus_one) << 16) | (u32::from(op) << 8)
}

/// Register-block burst targeting the window `op` selects.
pub fn set_reg_packet(op: u8, offset: u16, values: &[u32]) -> Vec<u32> {
    let mut pkt = vec![type3_header(op, values.len() as u16), u32::from(offset)];
    pkt.extend_from_slice(values);
    pkt
}

/// End-of-pipe event packet (6 dwords).
pub fn eop_packet(
    event_type: u8,
    addr: u64,
    int_sel: u8,
    data_sel: u8,
    data_lo: u32,
    data_hi: u32,
) -> [u32; 6] {
    [
        type3_header(opcode::EVENT_WRITE_EOP, 4),
        u32::from(event_type) & 0x3F,
        addr as u32,
        (((addr >> 32) as u32) & 0xFFFF)
            | (u32::from(int_sel) << 24)
            | (u32::from(data_sel) << 29),
        data_lo,
        data_hi,
    ]
}

/// Indirect-buffer packet (4 dwords).
pub fn ib_packet(base: u64, size_dw: u32, space: u8) -> [u32; 4] {
    [
        type3_header(opcode::INDIRECT_BUFFER, 2),
        base as u32,
        (base >> 32) as u32,
        (size_dw & 0xF_FFFF) | (u32::from(space) << 24),
    ]
}
