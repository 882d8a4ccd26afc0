//! The device context and the decode/dispatch step.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use guest_mem::{MappedRange, MemoryMapper};
use tracing::{debug, trace, warn};

use crate::error::{CpError, CpResult};
use crate::pm4::{
    self, DataControl, EventControl, IndirectBuffer, PacketView, Type0Header, Type3Header,
};
use crate::regs::{RegWindow, RegisterFile};
use crate::ring::{RingBuffer, RingPointers, RING_COUNT};

/// Address-space context end-of-pipe writes go through.
const EOP_WRITE_SPACE: u8 = 0;

/// Command-processor tunables.
#[derive(Debug, Clone)]
pub struct CpConfig {
    /// Delay between consumer iterations.
    pub poll_interval: Duration,
    /// Indirect buffers may nest this many levels before the device faults.
    pub max_indirect_depth: u32,
}

impl Default for CpConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            max_indirect_depth: 32,
        }
    }
}

/// Cloneable, lock-free reader for the most recent end-of-pipe event type.
///
/// This is the surface the interrupt/status side of the device model polls.
#[derive(Clone, Debug, Default)]
pub struct EventWatcher {
    cell: Arc<AtomicU32>,
}

impl EventWatcher {
    /// Event type recorded by the latest end-of-pipe packet.
    pub fn last_event_type(&self) -> u32 {
        self.cell.load(Ordering::Acquire)
    }

    fn record(&self, event_type: u32) {
        self.cell.store(event_type, Ordering::Release);
    }
}

/// The command-processor front end: rings, register file, and event state.
///
/// One instance owns all device-visible state; nothing here is process-wide.
pub struct GfxCp {
    mem: Arc<dyn MemoryMapper>,
    rings: [RingBuffer; RING_COUNT],
    regs: RegisterFile,
    last_event: EventWatcher,
    config: CpConfig,
}

impl GfxCp {
    pub fn new(mem: Arc<dyn MemoryMapper>, config: CpConfig) -> Self {
        Self {
            mem,
            rings: [RingBuffer::new(0), RingBuffer::new(1)],
            regs: RegisterFile::new(),
            last_event: EventWatcher::default(),
            config,
        }
    }

    pub fn config(&self) -> &CpConfig {
        &self.config
    }

    /// (Re)programs one ring's guest-memory location.
    pub fn configure_ring(&mut self, index: usize, base: u64, size_bytes: u64) -> CpResult<()> {
        let ring = self
            .rings
            .get_mut(index)
            .ok_or(CpError::InvalidRingIndex { index })?;
        ring.set_location(&self.mem, base, size_bytes)
    }

    /// Handle for the producer side of ring `index`.
    pub fn ring_pointers(&self, index: usize) -> CpResult<RingPointers> {
        self.rings
            .get(index)
            .map(|ring| ring.pointers())
            .ok_or(CpError::InvalidRingIndex { index })
    }

    pub fn ring(&self, index: usize) -> CpResult<&RingBuffer> {
        self.rings
            .get(index)
            .ok_or(CpError::InvalidRingIndex { index })
    }

    /// Lock-free observer for the latest end-of-pipe event type.
    pub fn event_watcher(&self) -> EventWatcher {
        self.last_event.clone()
    }

    pub fn last_event_type(&self) -> u32 {
        self.last_event.last_event_type()
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.regs
    }

    /// One consumer iteration: at most one packet per ring, ring 0 first.
    ///
    /// Returns whether any packet was consumed. An error is a device halt;
    /// the caller must stop driving the device.
    pub fn tick(&mut self) -> CpResult<bool> {
        let mut progressed = false;
        for index in 0..RING_COUNT {
            if !self.rings[index].pending() {
                continue;
            }
            self.step_ring(index)?;
            progressed = true;
        }
        Ok(progressed)
    }

    /// Decodes and executes the packet at ring `index`'s read offset, then
    /// advances the read offset by the packet's length.
    fn step_ring(&mut self, index: usize) -> CpResult<()> {
        let Self {
            mem,
            rings,
            regs,
            last_event,
            config,
        } = self;

        let ring = &rings[index];
        let mapping = ring.mapping()?;
        let start = ring.ptrs().rptr() >> 2;

        let mut interp = Interp {
            mem,
            regs,
            last_event,
            max_depth: config.max_indirect_depth,
        };
        let consumed = interp.execute(&PacketView::new(mapping, start), 0)?;
        ring.ptrs().advance_rptr(consumed);
        Ok(())
    }
}

/// Dispatcher state borrowed for the duration of one packet, kept apart
/// from the ring storage the packet is being read out of.
struct Interp<'a> {
    mem: &'a Arc<dyn MemoryMapper>,
    regs: &'a mut RegisterFile,
    last_event: &'a EventWatcher,
    max_depth: u32,
}

impl Interp<'_> {
    /// Decodes one packet and returns the dwords it spans.
    fn execute(&mut self, packet: &PacketView<'_>, depth: u32) -> CpResult<u32> {
        let header = packet.header()?;
        trace!(depth, "packet header {header:#010x}");
        match pm4::header_type(header) {
            pm4::PKT_TYPE0 => {
                // Decoded for stream advance only: type-0 bursts perform no
                // register writes at this design point.
                let hdr = Type0Header::decode(header);
                trace!(
                    base_reg = hdr.base_reg,
                    count = hdr.count,
                    "type-0 burst skipped"
                );
                Ok(hdr.total_dwords())
            }
            pm4::PKT_TYPE1 => Err(CpError::ReservedPacketType { header }),
            pm4::PKT_TYPE2 => Ok(1),
            pm4::PKT_TYPE3 => {
                let hdr = Type3Header::decode(header);
                self.dispatch(packet, &hdr, depth)?;
                // The length is header-declared, not handler-dependent.
                Ok(hdr.total_dwords())
            }
            _ => unreachable!("2-bit type tag"),
        }
    }

    fn dispatch(&mut self, packet: &PacketView<'_>, hdr: &Type3Header, depth: u32) -> CpResult<()> {
        match hdr.opcode {
            pm4::opcode::INDIRECT_BUFFER => self.indirect_buffer(packet, depth),
            pm4::opcode::EVENT_WRITE_EOP => self.event_write_eop(packet),
            pm4::opcode::SET_CONFIG_REG => self.set_reg_block(packet, hdr, RegWindow::Config),
            pm4::opcode::SET_CONTEXT_REG => self.set_reg_block(packet, hdr, RegWindow::Context),
            other => {
                warn!(opcode = other, "ignoring unimplemented type-3 opcode");
                Ok(())
            }
        }
    }

    /// Executes a guest-resident sub-stream to exhaustion before returning.
    fn indirect_buffer(&mut self, packet: &PacketView<'_>, depth: u32) -> CpResult<()> {
        if depth >= self.max_depth {
            return Err(CpError::NestingTooDeep {
                max: self.max_depth,
            });
        }
        let ib = IndirectBuffer::decode(packet.dword(1)?, packet.dword(2)?, packet.dword(3)?);
        debug!(
            size_dw = ib.size_dw,
            space = ib.space,
            "indirect buffer at {:#x}",
            ib.base
        );
        if ib.size_dw == 0 {
            return Ok(());
        }
        let mapping = MappedRange::map(
            Arc::clone(self.mem),
            ib.space,
            ib.base,
            u64::from(ib.size_dw) * 4,
        )?;
        let mut cursor = 0;
        while cursor < ib.size_dw {
            cursor += self.execute(&PacketView::new(&mapping, cursor), depth + 1)?;
        }
        Ok(())
    }

    fn event_write_eop(&mut self, packet: &PacketView<'_>) -> CpResult<()> {
        let event = EventControl::decode(packet.dword(1)?);
        let addr_lo = packet.dword(2)?;
        let data = DataControl::decode(packet.dword(3)?);
        let data_lo = packet.dword(4)?;
        let data_hi = packet.dword(5)?;

        let write = match data.data_sel {
            0 => None,
            1 => Some((4u32, u64::from(data_lo))),
            2 => Some((8, u64::from(data_hi) << 32 | u64::from(data_lo))),
            // Selector 3 asks for the GPU clock counter and 4 for the CP
            // perf counter; neither source is modeled, so both write zero.
            3 | 4 => Some((8, 0)),
            _ => None,
        };

        if let Some((size, value)) = write {
            let addr = u64::from(data.addr_hi) << 32 | u64::from(addr_lo);
            let target =
                MappedRange::map(Arc::clone(self.mem), EOP_WRITE_SPACE, addr, size.into())?;
            target.write_bytes(0, &value.to_le_bytes()[..size as usize])?;
        }

        match data.int_sel {
            // 1 = interrupt only, 2 = interrupt on write confirm; interrupt
            // delivery lives outside this front end.
            1 | 2 => debug!(int_sel = data.int_sel, "end-of-pipe interrupt request ignored"),
            _ => {}
        }

        self.last_event.record(u32::from(event.event_type));
        Ok(())
    }

    fn set_reg_block(
        &mut self,
        packet: &PacketView<'_>,
        hdr: &Type3Header,
        window: RegWindow,
    ) -> CpResult<()> {
        let offset = packet.dword(1)? & 0xFFFF;
        let mut values = Vec::with_capacity((hdr.count - 1) as usize);
        for i in 0..hdr.count - 1 {
            values.push(packet.dword(2 + i)?);
        }
        self.regs.write_window(window, offset, &values)
    }
}
