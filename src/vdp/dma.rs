use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::memory::VideoMemory;
use crate::debug_flags;
use crate::error::{VdpError, VdpResult};

/// Register 23 bits 7-6 as passed to [`DmaEngine::start`].
pub const DMA_MODE_TRANSFER: u8 = 0b00;
pub const DMA_MODE_TRANSFER_HI: u8 = 0b01;
pub const DMA_MODE_FILL: u8 = 0b10;
pub const DMA_MODE_COPY: u8 = 0b11;

/// Destination region codes (command CD3..CD0) carried in bits 16-19 of
/// the `dest` argument to [`DmaEngine::start`].
pub const DMA_TARGET_VRAM: u8 = 0b0001;
pub const DMA_TARGET_CRAM: u8 = 0b0011;
pub const DMA_TARGET_VSRAM: u8 = 0b0101;

const MAX_LENGTH: u32 = 0x10000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DmaMode {
    Idle,
    Fill,
    Copy,
    Transfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DmaTarget {
    Vram,
    Cram,
    Vsram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DmaPhase {
    Idle,
    Configured,
    Executing,
}

/// Outcome of the most recent start/execute, for schedulers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DmaStatus {
    Idle,
    Configured,
    Completed,
    InvalidTarget,
    MissingSource,
}

/// External bus as seen by the DMA engine.
pub trait DmaSource {
    fn read_byte(&mut self, address: u32) -> u8;
}

impl<F> DmaSource for F
where
    F: FnMut(u32) -> u8,
{
    fn read_byte(&mut self, address: u32) -> u8 {
        self(address)
    }
}

/// Pack a destination region code and a 16-bit address into the `dest`
/// argument of [`DmaEngine::start`].
pub fn encode_destination(target_code: u8, address: u16) -> u32 {
    (((target_code & 0x0F) as u32) << 16) | address as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmaState {
    pub mode: DmaMode,
    pub target: DmaTarget,
    pub phase: DmaPhase,
    pub source: u32,
    pub destination: u32,
    pub remaining: u32,
    pub fill_byte: u8,
    pub status: DmaStatus,
    pub last_transfer_len: u32,
}

impl DmaState {
    fn new() -> Self {
        Self {
            mode: DmaMode::Idle,
            target: DmaTarget::Vram,
            phase: DmaPhase::Idle,
            source: 0,
            destination: 0,
            remaining: 0,
            fill_byte: 0,
            status: DmaStatus::Idle,
            last_transfer_len: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DmaEngine {
    state: DmaState,
}

impl DmaEngine {
    pub fn new() -> Self {
        Self { state: DmaState::new() }
    }

    pub fn reset(&mut self) {
        self.state = DmaState::new();
    }

    pub fn state(&self) -> &DmaState {
        &self.state
    }

    pub fn restore(&mut self, state: DmaState) {
        self.state = state;
    }

    pub fn is_active(&self) -> bool {
        self.state.phase != DmaPhase::Idle
    }

    pub fn status(&self) -> DmaStatus {
        self.state.status
    }

    pub fn mode(&self) -> DmaMode {
        self.state.mode
    }

    pub fn remaining(&self) -> u32 {
        self.state.remaining
    }

    pub fn last_transfer_len(&self) -> u32 {
        self.state.last_transfer_len
    }

    /// Configure a transfer.
    ///
    /// `mode_code` is register 23 bits 7-6; `dest` carries the region code
    /// in bits 16-19 (see [`encode_destination`]) and the address in the low
    /// 16 bits. For fills, the low byte of `source` is the fill byte.
    /// A `length` of 0 moves 65536 bytes.
    pub fn start(&mut self, mode_code: u8, dest: u32, source: u32, length: u16) -> VdpResult<()> {
        let bytes = if length == 0 { MAX_LENGTH } else { length as u32 };
        self.configure(mode_code, dest, source, bytes)
    }

    /// Same as [`start`](Self::start) with an explicit byte count, used
    /// when a register-programmed word count has already been widened.
    pub fn configure(&mut self, mode_code: u8, dest: u32, source: u32, bytes: u32) -> VdpResult<()> {
        let target_code = ((dest >> 16) & 0x0F) as u8;
        let mode = match mode_code & 0x03 {
            DMA_MODE_FILL => DmaMode::Fill,
            DMA_MODE_COPY => DmaMode::Copy,
            _ => DmaMode::Transfer,
        };
        let target = match target_code {
            DMA_TARGET_VRAM => Some(DmaTarget::Vram),
            DMA_TARGET_CRAM if mode == DmaMode::Transfer => Some(DmaTarget::Cram),
            DMA_TARGET_VSRAM if mode == DmaMode::Transfer => Some(DmaTarget::Vsram),
            _ => None,
        };

        let Some(target) = target else {
            warn!(
                "DMA {:?} with destination code {:#03x} ignored",
                mode, target_code
            );
            self.state.phase = DmaPhase::Idle;
            self.state.mode = DmaMode::Idle;
            self.state.remaining = 0;
            self.state.status = DmaStatus::InvalidTarget;
            return Err(VdpError::MalformedDma { target_code });
        };

        self.state.mode = mode;
        self.state.target = target;
        self.state.destination = dest & 0xFFFF;
        self.state.source = source;
        self.state.remaining = bytes.min(2 * MAX_LENGTH);
        self.state.fill_byte = source as u8;
        self.state.phase = DmaPhase::Configured;
        self.state.status = DmaStatus::Configured;

        if debug_flags::dma() {
            debug!(
                "DMA configured: {:?} -> {:?} dest={:#06x} src={:#08x} len={}",
                mode, target, self.state.destination, source, self.state.remaining
            );
        }
        Ok(())
    }

    /// Override the fill byte of a configured fill (data-port triggered fills).
    pub fn set_fill_byte(&mut self, value: u8) {
        self.state.fill_byte = value;
    }

    /// Drain the configured transfer in one call and return to idle.
    pub fn execute(&mut self, memory: &mut VideoMemory, source: Option<&mut dyn DmaSource>) -> DmaStatus {
        if self.state.phase != DmaPhase::Configured {
            return self.state.status;
        }
        self.state.phase = DmaPhase::Executing;
        let len = self.state.remaining;

        let status = match self.state.mode {
            DmaMode::Fill => {
                self.run_fill(memory);
                DmaStatus::Completed
            }
            DmaMode::Copy => {
                self.run_copy(memory);
                DmaStatus::Completed
            }
            DmaMode::Transfer => match source {
                Some(bus) => {
                    self.run_transfer(memory, bus);
                    DmaStatus::Completed
                }
                None => {
                    warn!("DMA transfer of {} bytes with no source reader", len);
                    DmaStatus::MissingSource
                }
            },
            DmaMode::Idle => DmaStatus::Idle,
        };

        self.state.last_transfer_len = if status == DmaStatus::Completed { len } else { 0 };
        self.state.remaining = 0;
        self.state.mode = DmaMode::Idle;
        self.state.phase = DmaPhase::Idle;
        self.state.status = status;

        if debug_flags::dma() {
            debug!("DMA finished: {:?} ({} bytes)", status, self.state.last_transfer_len);
        }
        status
    }

    fn run_fill(&mut self, memory: &mut VideoMemory) {
        let value = self.state.fill_byte;
        let mut dest = self.state.destination;
        while self.state.remaining > 0 {
            memory.write_vram(dest, value);
            dest = (dest + 1) & 0xFFFF;
            self.state.remaining -= 1;
        }
        self.state.destination = dest;
    }

    fn run_copy(&mut self, memory: &mut VideoMemory) {
        let mut src = self.state.source & 0xFFFF;
        let mut dest = self.state.destination;
        // Byte at a time, so overlapping ranges replicate like the hardware
        while self.state.remaining > 0 {
            let value = memory.read_vram(src);
            memory.write_vram(dest, value);
            src = (src + 1) & 0xFFFF;
            dest = (dest + 1) & 0xFFFF;
            self.state.remaining -= 1;
        }
        self.state.source = src;
        self.state.destination = dest;
    }

    fn run_transfer(&mut self, memory: &mut VideoMemory, bus: &mut dyn DmaSource) {
        let mut src = self.state.source;
        let mut dest = self.state.destination;
        while self.state.remaining > 0 {
            let value = bus.read_byte(src & 0x00FF_FFFF);
            match self.state.target {
                DmaTarget::Vram => memory.write_vram(dest, value),
                DmaTarget::Cram => memory.write_cram_byte(dest, value),
                DmaTarget::Vsram => memory.write_vsram_byte(dest, value),
            }
            src = src.wrapping_add(1);
            dest = (dest + 1) & 0xFFFF;
            self.state.remaining -= 1;
        }
        self.state.source = src;
        self.state.destination = dest;
    }
}

impl Default for DmaEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_writes_every_byte() {
        let mut mem = VideoMemory::new();
        let mut dma = DmaEngine::new();
        dma.start(DMA_MODE_FILL, encode_destination(DMA_TARGET_VRAM, 0x2000), 0x5A, 0x40)
            .unwrap();
        assert!(dma.is_active());
        assert_eq!(dma.execute(&mut mem, None), DmaStatus::Completed);
        assert!(!dma.is_active());
        assert!((0x2000..0x2040).all(|a| mem.read_vram(a) == 0x5A));
        assert_eq!(mem.read_vram(0x2040), 0);
        assert_eq!(mem.read_vram(0x1FFF), 0);
    }

    #[test]
    fn test_zero_length_fill_covers_65536_bytes() {
        let mut mem = VideoMemory::new();
        let mut dma = DmaEngine::new();
        let dest = 0x1234u32;
        dma.start(DMA_MODE_FILL, encode_destination(DMA_TARGET_VRAM, dest as u16), 0xC3, 0)
            .unwrap();
        dma.execute(&mut mem, None);
        assert_eq!(dma.last_transfer_len(), 65536);
        assert_eq!(mem.read_vram(dest + 65535), 0xC3);
        assert!(mem.vram().iter().all(|&b| b == 0xC3));
        assert_eq!(dma.remaining(), 0);
    }

    #[test]
    fn test_copy_wraps_and_replicates_overlap() {
        let mut mem = VideoMemory::new();
        mem.write_vram(0xFFFF, 0x11);
        mem.write_vram(0x0000, 0x22);
        let mut dma = DmaEngine::new();
        dma.start(DMA_MODE_COPY, encode_destination(DMA_TARGET_VRAM, 0x0100), 0xFFFF, 2)
            .unwrap();
        dma.execute(&mut mem, None);
        assert_eq!(mem.read_vram(0x0100), 0x11);
        assert_eq!(mem.read_vram(0x0101), 0x22);

        // Destination one past source: the first byte smears forward
        mem.write_vram(0x0200, 0x77);
        dma.start(DMA_MODE_COPY, encode_destination(DMA_TARGET_VRAM, 0x0201), 0x0200, 4)
            .unwrap();
        dma.execute(&mut mem, None);
        assert!((0x0200..0x0205).all(|a| mem.read_vram(a) == 0x77));
    }

    #[test]
    fn test_transfer_routes_by_region() {
        let mut mem = VideoMemory::new();
        let mut dma = DmaEngine::new();
        let mut bus = |addr: u32| (addr & 0xFF) as u8;

        dma.start(DMA_MODE_TRANSFER, encode_destination(DMA_TARGET_CRAM, 0x0002), 0x0E, 2)
            .unwrap();
        dma.execute(&mut mem, Some(&mut bus));
        assert_eq!(mem.read_cram(1), 0x0E0F);

        dma.start(DMA_MODE_TRANSFER, encode_destination(DMA_TARGET_VSRAM, 0x0000), 0x01, 2)
            .unwrap();
        dma.execute(&mut mem, Some(&mut bus));
        assert_eq!(mem.read_vsram(0), 0x0102);

        dma.start(DMA_MODE_TRANSFER_HI, encode_destination(DMA_TARGET_VRAM, 0x8000), 0x40, 3)
            .unwrap();
        dma.execute(&mut mem, Some(&mut bus));
        assert_eq!(mem.read_vram(0x8000), 0x40);
        assert_eq!(mem.read_vram(0x8002), 0x42);
    }

    #[test]
    fn test_malformed_destination_is_a_noop() {
        let mut mem = VideoMemory::new();
        let mut dma = DmaEngine::new();
        let result = dma.start(DMA_MODE_FILL, encode_destination(DMA_TARGET_CRAM, 0), 0xFF, 16);
        assert!(matches!(result, Err(VdpError::MalformedDma { target_code: 0x03 })));
        assert_eq!(dma.status(), DmaStatus::InvalidTarget);
        assert!(!dma.is_active());
        assert_eq!(dma.execute(&mut mem, None), DmaStatus::InvalidTarget);
        assert_eq!(mem.read_cram(0), 0);

        assert!(dma.start(DMA_MODE_TRANSFER, encode_destination(0x0F, 0), 0, 1).is_err());
    }

    #[test]
    fn test_transfer_without_reader_reports_missing_source() {
        let mut mem = VideoMemory::new();
        let mut dma = DmaEngine::new();
        dma.start(DMA_MODE_TRANSFER, encode_destination(DMA_TARGET_VRAM, 0), 0, 8)
            .unwrap();
        assert_eq!(dma.execute(&mut mem, None), DmaStatus::MissingSource);
        assert!(!dma.is_active());
        assert_eq!(dma.last_transfer_len(), 0);
    }
}
