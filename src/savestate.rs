use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{VdpError, VdpResult};
use crate::vdp::dma::DmaState;
use crate::vdp::memory::{CRAM_ENTRIES, VRAM_SIZE, VSRAM_ENTRIES};
use crate::vdp::port::PortState;
use crate::vdp::registers::RegisterBank;
use crate::vdp::timing::{ScanlineTiming, VideoStandard, MASTER_CYCLES_PER_LINE};

pub const SAVE_STATE_VERSION: u32 = 1;

/// Everything needed to put a VDP back where it was. Memories are stored
/// as flat big-endian byte ranges; derived register state and color
/// tables are rebuilt on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VdpSaveState {
    pub version: u32,
    pub vram: Vec<u8>,
    pub cram: Vec<u8>,
    pub vsram: Vec<u8>,
    pub registers: RegisterBank,
    pub port: PortState,
    pub dma: DmaState,
    pub timing: ScanlineTiming,
    pub sprite_overflow: bool,
    pub sprite_collision: bool,
}

impl VdpSaveState {
    /// Check buffer sizes before anything is copied into a live core.
    pub fn validate(&self) -> VdpResult<()> {
        if self.version != SAVE_STATE_VERSION {
            return Err(VdpError::SaveStateVersion {
                found: self.version,
                expected: SAVE_STATE_VERSION,
            });
        }
        check_len("vram", VRAM_SIZE, self.vram.len())?;
        check_len("cram", CRAM_ENTRIES * 2, self.cram.len())?;
        check_len("vsram", VSRAM_ENTRIES * 2, self.vsram.len())?;
        self.check_timing(VideoStandard::Pal)
    }

    /// Line counter must fit the frame of `standard`, cycle counter the line.
    pub fn check_timing(&self, standard: VideoStandard) -> VdpResult<()> {
        let ScanlineTiming { line, line_cycles, .. } = self.timing;
        if line >= standard.lines_per_frame() || line_cycles >= MASTER_CYCLES_PER_LINE {
            return Err(VdpError::SaveStateTiming { line, line_cycles });
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> VdpResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> VdpResult<Self> {
        let state: VdpSaveState = bincode::deserialize(data)?;
        state.validate()?;
        Ok(state)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> VdpResult<()> {
        let data = self.to_bytes()?;
        let mut file = File::create(path)?;
        file.write_all(&data)?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> VdpResult<Self> {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> VdpResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(VdpError::SaveStateSize { what, expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vdp::Vdp;

    #[test]
    fn test_bytes_round_trip_restores_core() {
        let mut vdp = Vdp::new();
        vdp.write_register(0x0C, 0x81);
        vdp.write_register(0x07, 0x05);
        vdp.memory_mut().write_vram(0xBEEF, 0x42);
        vdp.memory_mut().write_cram(5, 0x0ACE);
        vdp.memory_mut().write_vsram(3, 0x0123);
        vdp.write_control(0x4000);

        let bytes = vdp.to_save_state().to_bytes().unwrap();
        let state = VdpSaveState::from_bytes(&bytes).unwrap();

        let mut restored = Vdp::new();
        restored.load_save_state(&state).unwrap();
        assert_eq!(restored.get_register(0x0C), 0x81);
        assert_eq!(restored.derived().screen_width, 320);
        assert_eq!(restored.derived().background_color, 0x05);
        assert_eq!(restored.memory().read_vram(0xBEEF), 0x42);
        assert_eq!(restored.memory().read_cram(5), 0x0ACE);
        assert_eq!(restored.memory().read_vsram(3), 0x0123);
        assert!(restored.port_state().command_pending);
        assert_eq!(restored.to_save_state(), vdp.to_save_state());
    }

    #[test]
    fn test_short_buffers_are_rejected() {
        let mut state = Vdp::new().to_save_state();
        state.cram.truncate(10);
        assert!(matches!(
            state.validate(),
            Err(VdpError::SaveStateSize { what: "cram", expected: 128, actual: 10 })
        ));

        let mut vdp = Vdp::new();
        vdp.memory_mut().write_vram(0, 0x99);
        assert!(vdp.load_save_state(&state).is_err());
        // Nothing was touched
        assert_eq!(vdp.memory().read_vram(0), 0x99);
    }

    #[test]
    fn test_out_of_frame_timing_is_rejected() {
        let mut state = Vdp::new().to_save_state();
        state.timing.line = 0xFFFF;
        assert!(matches!(
            state.validate(),
            Err(VdpError::SaveStateTiming { line: 0xFFFF, .. })
        ));
        let mut vdp = Vdp::new();
        assert!(vdp.load_save_state(&state).is_err());
        assert_eq!(vdp.timing().line, 0);
        assert_eq!(vdp.read_hv_counter() >> 8, 0);

        // Line 300 fits a PAL frame but not an NTSC one
        let mut state = Vdp::new().to_save_state();
        state.timing.line = 300;
        assert!(state.validate().is_ok());
        assert!(matches!(
            Vdp::new().load_save_state(&state),
            Err(VdpError::SaveStateTiming { line: 300, .. })
        ));

        let mut state = Vdp::new().to_save_state();
        state.timing.line_cycles = MASTER_CYCLES_PER_LINE;
        assert!(state.validate().is_err());
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        assert!(VdpSaveState::from_bytes(&[1, 2, 3]).is_err());
    }
}
