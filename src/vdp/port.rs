use serde::{Deserialize, Serialize};

use crate::error::{VdpError, VdpResult};

/// Memory surface and direction selected by the last complete command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    VramRead,
    VramWrite,
    CramWrite,
    VsramWrite,
    CramRead,
    VsramRead,
}

impl AccessMode {
    /// Decode the CD3..CD0 access code.
    pub fn from_code(code: u8) -> VdpResult<Self> {
        match code & 0x0F {
            0b0000 => Ok(AccessMode::VramRead),
            0b0001 => Ok(AccessMode::VramWrite),
            0b0011 => Ok(AccessMode::CramWrite),
            0b0100 => Ok(AccessMode::VsramRead),
            0b0101 => Ok(AccessMode::VsramWrite),
            0b1000 => Ok(AccessMode::CramRead),
            other => Err(VdpError::InvalidAccessMode { code: other }),
        }
    }
}

/// What a single control-port word turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlWrite {
    /// `100R_RRRR_DDDD_DDDD` while no command half is pending.
    Register { index: u8, value: u8 },
    /// First half of a two-word command stored; waiting for the second.
    FirstHalf,
    /// Both halves received. `dma` is set when CD5 requested a transfer.
    Command { mode: Option<AccessMode>, dma: bool },
}

/// Control/data port protocol state.
///
/// Holds no references; the whole struct is plain data so save states can
/// carry it as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortState {
    /// First word of a command, kept until the second one lands
    pub pending_word: u16,
    pub command_pending: bool,
    /// High byte of a byte-wide control write
    pub byte_latch: u8,
    pub first_byte_received: bool,
    /// CD5..CD0
    pub code: u8,
    pub address: u16,
    /// `None` after a command whose code selects no surface
    pub access_mode: Option<AccessMode>,
    /// Last word returned by a data port read
    pub read_latch: u16,
}

impl PortState {
    pub fn new() -> Self {
        Self {
            pending_word: 0,
            command_pending: false,
            byte_latch: 0,
            first_byte_received: false,
            code: 0,
            address: 0,
            access_mode: Some(AccessMode::VramRead),
            read_latch: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Word-wide control port write.
    pub fn write_control(&mut self, word: u16) -> ControlWrite {
        if !self.command_pending {
            if word & 0xC000 == 0x8000 {
                return ControlWrite::Register {
                    index: ((word >> 8) & 0x1F) as u8,
                    value: word as u8,
                };
            }
            // The first half takes effect immediately; the second refines it.
            self.pending_word = word;
            self.command_pending = true;
            self.code = (self.code & 0x3C) | ((word >> 14) as u8 & 0x03);
            self.address = (self.address & 0xC000) | (word & 0x3FFF);
            return ControlWrite::FirstHalf;
        }

        self.command_pending = false;
        self.code = (self.code & 0x03) | (((word >> 2) as u8) & 0x3C);
        self.address = (self.address & 0x3FFF) | ((word & 0x0003) << 14);
        self.access_mode = AccessMode::from_code(self.code).ok();
        ControlWrite::Command {
            mode: self.access_mode,
            dma: self.dma_requested(),
        }
    }

    /// Byte-wide control port write: high byte first, then low byte.
    pub fn port_write(&mut self, byte: u8) -> Option<ControlWrite> {
        if !self.first_byte_received {
            self.byte_latch = byte;
            self.first_byte_received = true;
            return None;
        }
        self.first_byte_received = false;
        let word = u16::from_be_bytes([self.byte_latch, byte]);
        Some(self.write_control(word))
    }

    /// Status reads and data accesses abandon any half-written command.
    pub fn clear_latches(&mut self) {
        self.command_pending = false;
        self.first_byte_received = false;
    }

    pub fn dma_requested(&self) -> bool {
        self.code & 0x20 != 0
    }

    pub fn target_code(&self) -> u8 {
        self.code & 0x0F
    }

    pub fn advance(&mut self, increment: u8) {
        self.address = self.address.wrapping_add(increment as u16);
    }
}

impl Default for PortState {
    fn default() -> Self {
        Self::new()
    }
}
