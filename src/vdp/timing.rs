use serde::{Deserialize, Serialize};

/// Master clock cycles in one scanline, both standards.
pub const MASTER_CYCLES_PER_LINE: u32 = 3420;
/// Master cycles spent drawing the visible part of a line (320 * 8 or 256 * 10).
const ACTIVE_LINE_CYCLES: u32 = 2560;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoStandard {
    Ntsc,
    Pal,
}

impl VideoStandard {
    pub fn lines_per_frame(self) -> u16 {
        match self {
            VideoStandard::Ntsc => 262,
            VideoStandard::Pal => 313,
        }
    }
}

/// What happened at the end of a line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineEvents {
    pub hint: bool,
    pub vint: bool,
    pub frame_done: bool,
}

/// Line/frame counters and the interrupt bookkeeping that hangs off them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanlineTiming {
    /// Next line the scanline driver will output
    pub line: u16,
    /// Master cycles into `line`
    pub line_cycles: u32,
    pub hint_counter: u8,
    pub hint_pending: bool,
    pub vint_pending: bool,
    pub vblank: bool,
    pub odd_frame: bool,
    pub frame_count: u64,
}

impl ScanlineTiming {
    pub fn new() -> Self {
        Self {
            line: 0,
            line_cycles: 0,
            hint_counter: 0,
            hint_pending: false,
            vint_pending: false,
            vblank: false,
            odd_frame: false,
            frame_count: 0,
        }
    }

    pub fn hblank(&self) -> bool {
        self.line_cycles >= ACTIVE_LINE_CYCLES
    }

    /// Counter bookkeeping once `line` has been output.
    ///
    /// The H-int counter counts down through the active lines and the first
    /// blanking line and is reloaded from `hint_interval` everywhere else.
    pub fn finish_line(
        &mut self,
        line: u16,
        active_height: u16,
        lines_per_frame: u16,
        hint_interval: u8,
        hint_enabled: bool,
        vint_enabled: bool,
    ) -> LineEvents {
        let mut events = LineEvents::default();

        if line <= active_height {
            if self.hint_counter == 0 {
                self.hint_counter = hint_interval;
                if hint_enabled {
                    self.hint_pending = true;
                    events.hint = true;
                }
            } else {
                self.hint_counter -= 1;
            }
        } else {
            self.hint_counter = hint_interval;
        }

        if line == active_height {
            self.vblank = true;
            self.vint_pending = true;
            events.vint = vint_enabled;
        }

        if line + 1 >= lines_per_frame {
            self.vblank = false;
            self.odd_frame = !self.odd_frame;
            self.frame_count += 1;
            events.frame_done = true;
            self.line = 0;
        } else {
            self.line = line + 1;
        }
        self.line_cycles = 0;
        events
    }

    /// 9-bit V counter for `line`, including the jump back during blanking.
    pub fn v_counter(line: u16, standard: VideoStandard, v30: bool) -> u16 {
        let jump = match (standard, v30) {
            (VideoStandard::Ntsc, false) => Some((0x00EA, 0x01E5)),
            (VideoStandard::Pal, false) => Some((0x0102, 0x01CA)),
            (VideoStandard::Pal, true) => Some((0x010A, 0x01D2)),
            // V30 on NTSC never reaches the jump point; the counter just wraps
            (VideoStandard::Ntsc, true) => None,
        };
        let v = match jump {
            Some((last, resume)) if line > last => line.wrapping_sub(last + 1).wrapping_add(resume),
            _ => line,
        };
        v & 0x01FF
    }

    /// HV counter word: V in the high byte, H/2 in the low byte.
    pub fn hv_counter(&self, standard: VideoStandard, v30: bool, h40: bool) -> u16 {
        let v = Self::v_counter(self.line, standard, v30) & 0xFF;
        let divider = if h40 { 8 } else { 10 };
        let h = (self.line_cycles / divider) >> 1;
        (v << 8) | (h as u16 & 0xFF)
    }
}

impl Default for ScanlineTiming {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_counter_fires_every_interval_plus_one() {
        let mut timing = ScanlineTiming::new();
        timing.hint_counter = 3;
        let mut fired = Vec::new();
        for line in 0..12 {
            if timing.finish_line(line, 224, 262, 3, true, false).hint {
                fired.push(line);
            }
        }
        assert_eq!(fired, vec![3, 7, 11]);
    }

    #[test]
    fn test_hint_counter_reloads_in_vblank() {
        let mut timing = ScanlineTiming::new();
        timing.hint_counter = 0;
        let events = timing.finish_line(230, 224, 262, 9, true, false);
        assert!(!events.hint);
        assert_eq!(timing.hint_counter, 9);
    }

    #[test]
    fn test_vint_at_first_blank_line() {
        let mut timing = ScanlineTiming::new();
        let events = timing.finish_line(223, 224, 262, 0xFF, false, true);
        assert!(!events.vint);
        let events = timing.finish_line(224, 224, 262, 0xFF, false, true);
        assert!(events.vint);
        assert!(timing.vblank);
        assert!(timing.vint_pending);

        // Disabled V-int still sets the pending status bit
        let mut quiet = ScanlineTiming::new();
        let events = quiet.finish_line(224, 224, 262, 0xFF, false, false);
        assert!(!events.vint);
        assert!(quiet.vint_pending);
    }

    #[test]
    fn test_frame_wraps_on_last_line() {
        let mut timing = ScanlineTiming::new();
        timing.vblank = true;
        let events = timing.finish_line(261, 224, 262, 0, false, false);
        assert!(events.frame_done);
        assert!(!timing.vblank);
        assert_eq!(timing.line, 0);
        assert_eq!(timing.frame_count, 1);
        assert!(timing.odd_frame);
    }

    #[test]
    fn test_v_counter_jumps() {
        assert_eq!(ScanlineTiming::v_counter(0xEA, VideoStandard::Ntsc, false), 0xEA);
        assert_eq!(ScanlineTiming::v_counter(0xEB, VideoStandard::Ntsc, false), 0x1E5);
        assert_eq!(ScanlineTiming::v_counter(261, VideoStandard::Ntsc, false), 0x1FF);
        assert_eq!(ScanlineTiming::v_counter(312, VideoStandard::Pal, false), 0x1FF);
        assert_eq!(ScanlineTiming::v_counter(312, VideoStandard::Pal, true), 0x1FF);
        // Out-of-frame lines stay inside 9 bits
        assert!(ScanlineTiming::v_counter(u16::MAX, VideoStandard::Ntsc, false) <= 0x1FF);
    }

    #[test]
    fn test_hv_counter_layout() {
        let mut timing = ScanlineTiming::new();
        timing.line = 0x20;
        timing.line_cycles = 800;
        // 800 / 8 = 100 pixels -> 50
        assert_eq!(timing.hv_counter(VideoStandard::Ntsc, false, true), 0x2032);
        assert!(!timing.hblank());
        timing.line_cycles = 3000;
        assert!(timing.hblank());
    }
}
