mod common;

use common::*;
use gfx_cp::MemoryMapper;

const TARGET: u64 = 0x2000;

/// Runs a single end-of-pipe packet with the target range pre-filled so
/// untouched bytes are distinguishable from written zeros.
fn run_eop(packet: &[u32]) -> (std::sync::Arc<gfx_cp::SharedRam>, gfx_cp::GfxCp) {
    let (ram, mut cp) = new_cp();
    cp.configure_ring(0, RING_BASE, RING_BYTES).unwrap();
    ram.write(0, TARGET, &[0xFF; 12]).unwrap();

    write_stream(&ram, 0, RING_BASE, packet);
    cp.ring_pointers(0).unwrap().set_wptr(packet.len() as u32 * 4);
    cp.tick().unwrap();
    (ram, cp)
}

#[test]
fn selector_zero_writes_nothing_but_records_the_event() {
    let (ram, cp) = run_eop(&eop_packet(0x04, TARGET, 0, 0, 0x1234_5678, 0x9ABC_DEF0));

    assert_eq!(ram.read_u64(0, TARGET).unwrap(), u64::MAX);
    assert_eq!(cp.last_event_type(), 0x04);
}

#[test]
fn selector_one_writes_exactly_four_bytes() {
    let (ram, cp) = run_eop(&eop_packet(0x16, TARGET, 0, 1, 0xCAFE_BABE, 0x1111_1111));

    assert_eq!(ram.read_u32(0, TARGET).unwrap(), 0xCAFE_BABE);
    // The high dword was not touched.
    assert_eq!(ram.read_u32(0, TARGET + 4).unwrap(), 0xFFFF_FFFF);
    assert_eq!(cp.last_event_type(), 0x16);
}

#[test]
fn selector_two_writes_both_dwords_little_endian() {
    let (ram, cp) = run_eop(&eop_packet(0x2F, TARGET, 0, 2, 0x1111_1111, 0x2222_2222));

    assert_eq!(ram.read_u32(0, TARGET).unwrap(), 0x1111_1111);
    assert_eq!(ram.read_u32(0, TARGET + 4).unwrap(), 0x2222_2222);
    assert_eq!(
        ram.read_u64(0, TARGET).unwrap(),
        0x2222_2222_1111_1111
    );
    // Bytes past the 8-byte write are untouched.
    assert_eq!(ram.read_u32(0, TARGET + 8).unwrap(), 0xFFFF_FFFF);
    assert_eq!(cp.last_event_type(), 0x2F);
}

#[test]
fn clock_and_perf_selectors_write_placeholder_zero() {
    for data_sel in [3u8, 4] {
        let (ram, _cp) = run_eop(&eop_packet(0x05, TARGET, 0, data_sel, 0xDEAD, 0xBEEF));
        assert_eq!(
            ram.read_u64(0, TARGET).unwrap(),
            0,
            "selector {data_sel} writes a zero placeholder"
        );
    }
}

#[test]
fn undefined_selectors_write_nothing() {
    for data_sel in [5u8, 6, 7] {
        let (ram, cp) = run_eop(&eop_packet(0x08, TARGET, 0, data_sel, 0xDEAD, 0xBEEF));
        assert_eq!(ram.read_u64(0, TARGET).unwrap(), u64::MAX);
        assert_eq!(cp.last_event_type(), 0x08, "event still recorded");
    }
}

#[test]
fn interrupt_selectors_are_acknowledged_no_ops() {
    for int_sel in [1u8, 2] {
        let (ram, cp) = run_eop(&eop_packet(0x2F, TARGET, int_sel, 1, 0x55, 0));
        // The data write still happens; no fault, no other side effect.
        assert_eq!(ram.read_u32(0, TARGET).unwrap(), 0x55);
        assert_eq!(cp.last_event_type(), 0x2F);
    }
}

#[test]
fn event_type_is_overwritten_by_each_event() {
    let (ram, mut cp) = new_cp();
    cp.configure_ring(0, RING_BASE, RING_BYTES).unwrap();

    let mut stream = eop_packet(0x11, TARGET, 0, 0, 0, 0).to_vec();
    stream.extend_from_slice(&eop_packet(0x22, TARGET, 0, 0, 0, 0));
    write_stream(&ram, 0, RING_BASE, &stream);
    cp.ring_pointers(0).unwrap().set_wptr(stream.len() as u32 * 4);

    cp.tick().unwrap();
    assert_eq!(cp.last_event_type(), 0x11);
    cp.tick().unwrap();
    assert_eq!(cp.last_event_type(), 0x22);
}

#[test]
fn event_watcher_handles_observe_updates() {
    let (ram, mut cp) = new_cp();
    cp.configure_ring(0, RING_BASE, RING_BYTES).unwrap();
    let watcher = cp.event_watcher();

    let packet = eop_packet(0x2A, TARGET, 0, 0, 0, 0);
    write_stream(&ram, 0, RING_BASE, &packet);
    cp.ring_pointers(0).unwrap().set_wptr(24);

    assert_eq!(watcher.last_event_type(), 0);
    cp.tick().unwrap();
    assert_eq!(watcher.last_event_type(), 0x2A);
}
