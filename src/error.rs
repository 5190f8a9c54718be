use thiserror::Error;

use crate::vdp::port::AccessMode;

/// Conditions the VDP surfaces instead of panicking.
///
/// The hardware-faithful entry points swallow these (returning a default
/// value) and park the last one in `Vdp::last_error`; the `try_*` entry
/// points hand them back directly.
#[derive(Debug, Error)]
pub enum VdpError {
    #[error("register index {index:#04x} is out of range (0x00..=0x17)")]
    RegisterOutOfRange { index: u8 },

    #[error("access code {code:#04x} does not select a memory surface")]
    InvalidAccessMode { code: u8 },

    #[error("data port used against the current {mode:?} access mode")]
    WrongPortDirection { mode: AccessMode },

    #[error("DMA destination code {target_code:#04x} does not match any surface")]
    MalformedDma { target_code: u8 },

    #[error("external DMA transfer requested with no source reader installed")]
    MissingDmaSource,

    #[error("save state version {found} is not supported (expected {expected})")]
    SaveStateVersion { found: u32, expected: u32 },

    #[error("save state {what} has {actual} bytes, expected {expected}")]
    SaveStateSize {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("save state timing is out of range (line {line}, cycle {line_cycles})")]
    SaveStateTiming { line: u16, line_cycles: u32 },

    #[error("save state codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type VdpResult<T> = Result<T, VdpError>;
