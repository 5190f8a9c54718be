use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{VdpError, VdpResult};

pub const REGISTER_COUNT: usize = 24;

pub const REG_MODE_1: usize = 0x00;
pub const REG_MODE_2: usize = 0x01;
pub const REG_PLANE_A: usize = 0x02;
pub const REG_WINDOW: usize = 0x03;
pub const REG_PLANE_B: usize = 0x04;
pub const REG_SPRITE_TABLE: usize = 0x05;
pub const REG_BACKGROUND: usize = 0x07;
pub const REG_HINT_COUNTER: usize = 0x0A;
pub const REG_MODE_3: usize = 0x0B;
pub const REG_MODE_4: usize = 0x0C;
pub const REG_HSCROLL: usize = 0x0D;
pub const REG_AUTO_INCREMENT: usize = 0x0F;
pub const REG_PLANE_SIZE: usize = 0x10;
pub const REG_WINDOW_H: usize = 0x11;
pub const REG_WINDOW_V: usize = 0x12;
pub const REG_DMA_LENGTH_LO: usize = 0x13;
pub const REG_DMA_LENGTH_HI: usize = 0x14;
pub const REG_DMA_SOURCE_LO: usize = 0x15;
pub const REG_DMA_SOURCE_MID: usize = 0x16;
pub const REG_DMA_SOURCE_HI: usize = 0x17;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModeSet1: u8 {
        const HINT_ENABLE = 0b0001_0000;
        const LEFT_COLUMN_BLANK = 0b0010_0000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModeSet2: u8 {
        const MODE_5 = 0b0000_0100;
        const V30 = 0b0000_1000;
        const DMA_ENABLE = 0b0001_0000;
        const VINT_ENABLE = 0b0010_0000;
        const DISPLAY_ENABLE = 0b0100_0000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModeSet3: u8 {
        const HSCROLL_LO = 0b0000_0001;
        const HSCROLL_HI = 0b0000_0010;
        const VSCROLL_2CELL = 0b0000_0100;
        const EXT_INT_ENABLE = 0b0000_1000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModeSet4: u8 {
        const H40_LO = 0b0000_0001;
        const INTERLACE_LO = 0b0000_0010;
        const INTERLACE_HI = 0b0000_0100;
        const SHADOW_HIGHLIGHT = 0b0000_1000;
        const H40_HI = 0b1000_0000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HScrollMode {
    FullScreen,
    /// Undocumented mode 1: the first eight line entries repeat down the screen.
    FirstEightLines,
    Cell,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VScrollMode {
    FullScreen,
    TwoCell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterlaceMode {
    Off,
    Normal,
    Double,
}

/// Window boundaries as decoded from registers 0x11 / 0x12.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRegion {
    /// Window covers x >= `h_split` when set, x < `h_split` otherwise.
    pub right: bool,
    pub h_split: u16,
    /// Window covers lines >= `v_split` when set, lines < `v_split` otherwise.
    pub down: bool,
    pub v_split: u16,
}

impl WindowRegion {
    fn from_registers(h: u8, v: u8) -> Self {
        Self {
            right: h & 0x80 != 0,
            h_split: (h & 0x1F) as u16 * 16,
            down: v & 0x80 != 0,
            v_split: (v & 0x1F) as u16 * 8,
        }
    }

    pub fn covers_line(&self, line: u16) -> bool {
        if self.down {
            line >= self.v_split
        } else {
            line < self.v_split
        }
    }

    /// Covered horizontal span on a line inside the vertical range.
    pub fn columns(&self, screen_width: u16) -> std::ops::Range<u16> {
        let split = self.h_split.min(screen_width);
        if self.right {
            split..screen_width
        } else {
            0..split
        }
    }
}

/// Raw VDP register file. Reads always return exactly what was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBank {
    regs: [u8; REGISTER_COUNT],
}

impl RegisterBank {
    pub fn new() -> Self {
        Self { regs: [0; REGISTER_COUNT] }
    }

    pub fn read(&self, index: usize) -> VdpResult<u8> {
        self.regs
            .get(index)
            .copied()
            .ok_or(VdpError::RegisterOutOfRange { index: index as u8 })
    }

    pub fn write(&mut self, index: usize, value: u8) -> VdpResult<()> {
        let slot = self
            .regs
            .get_mut(index)
            .ok_or(VdpError::RegisterOutOfRange { index: index as u8 })?;
        *slot = value;
        Ok(())
    }

    /// Byte for one of the `REG_*` indices above; 0 past the end.
    #[inline]
    pub fn get(&self, index: usize) -> u8 {
        self.regs.get(index).copied().unwrap_or(0)
    }

    pub fn as_bytes(&self) -> &[u8; REGISTER_COUNT] {
        &self.regs
    }

    pub fn from_bytes(regs: [u8; REGISTER_COUNT]) -> Self {
        Self { regs }
    }

    pub fn mode1(&self) -> ModeSet1 {
        ModeSet1::from_bits_truncate(self.get(REG_MODE_1))
    }

    pub fn mode2(&self) -> ModeSet2 {
        ModeSet2::from_bits_truncate(self.get(REG_MODE_2))
    }

    pub fn mode3(&self) -> ModeSet3 {
        ModeSet3::from_bits_truncate(self.get(REG_MODE_3))
    }

    pub fn mode4(&self) -> ModeSet4 {
        ModeSet4::from_bits_truncate(self.get(REG_MODE_4))
    }

    pub fn h40(&self) -> bool {
        self.mode4().intersects(ModeSet4::H40_LO | ModeSet4::H40_HI)
    }
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

/// Layout and mode values cached from the register file.
///
/// Never stored in save states; always rebuilt from a `RegisterBank`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedConfig {
    pub h40: bool,
    pub screen_width: u16,
    pub screen_height: u16,
    pub max_sprites: u16,

    pub display_enabled: bool,
    pub dma_enabled: bool,
    pub hint_enabled: bool,
    pub vint_enabled: bool,
    pub left_column_blank: bool,
    pub shadow_highlight: bool,
    pub interlace: InterlaceMode,

    pub plane_a_base: u32,
    pub window_base: u32,
    pub plane_b_base: u32,
    pub sprite_table_base: u32,
    pub hscroll_base: u32,

    pub plane_width: u16,
    pub plane_height: u16,
    pub window_width: u16,
    pub hscroll_mode: HScrollMode,
    pub vscroll_mode: VScrollMode,
    pub window: WindowRegion,

    pub background_color: u8,
    pub hint_interval: u8,
    pub auto_increment: u8,

    pub dma_length: u16,
    pub dma_source: u32,
    pub dma_mode_code: u8,
}

fn plane_cells(code: u8) -> u16 {
    match code & 0x03 {
        0 => 32,
        1 => 64,
        3 => 128,
        // Code 2 is prohibited; treat it as the smallest plane.
        _ => 32,
    }
}

impl DerivedConfig {
    pub fn from_registers(bank: &RegisterBank) -> Self {
        let mut cfg = Self::power_on();
        for index in 0..REGISTER_COUNT {
            cfg.apply_register(index, bank);
        }
        cfg
    }

    fn power_on() -> Self {
        Self {
            h40: false,
            screen_width: 256,
            screen_height: 224,
            max_sprites: 64,
            display_enabled: false,
            dma_enabled: false,
            hint_enabled: false,
            vint_enabled: false,
            left_column_blank: false,
            shadow_highlight: false,
            interlace: InterlaceMode::Off,
            plane_a_base: 0,
            window_base: 0,
            plane_b_base: 0,
            sprite_table_base: 0,
            hscroll_base: 0,
            plane_width: 32,
            plane_height: 32,
            window_width: 32,
            hscroll_mode: HScrollMode::FullScreen,
            vscroll_mode: VScrollMode::FullScreen,
            window: WindowRegion::from_registers(0, 0),
            background_color: 0,
            hint_interval: 0,
            auto_increment: 0,
            dma_length: 0,
            dma_source: 0,
            dma_mode_code: 0,
        }
    }

    /// Recompute every field that depends on register `index`.
    pub fn apply_register(&mut self, index: usize, bank: &RegisterBank) {
        match index {
            REG_MODE_1 => {
                let mode = bank.mode1();
                self.hint_enabled = mode.contains(ModeSet1::HINT_ENABLE);
                self.left_column_blank = mode.contains(ModeSet1::LEFT_COLUMN_BLANK);
            }
            REG_MODE_2 => {
                let mode = bank.mode2();
                self.display_enabled = mode.contains(ModeSet2::DISPLAY_ENABLE);
                self.vint_enabled = mode.contains(ModeSet2::VINT_ENABLE);
                self.dma_enabled = mode.contains(ModeSet2::DMA_ENABLE);
                self.screen_height = if mode.contains(ModeSet2::V30) { 240 } else { 224 };
            }
            REG_PLANE_A => {
                self.plane_a_base = ((bank.get(REG_PLANE_A) & 0x38) as u32) << 10;
            }
            REG_WINDOW => {
                self.window_base = Self::window_base(bank);
            }
            REG_PLANE_B => {
                self.plane_b_base = ((bank.get(REG_PLANE_B) & 0x07) as u32) << 13;
            }
            REG_SPRITE_TABLE => {
                self.sprite_table_base = Self::sprite_table_base(bank);
            }
            REG_BACKGROUND => {
                self.background_color = bank.get(REG_BACKGROUND) & 0x3F;
            }
            REG_HINT_COUNTER => {
                self.hint_interval = bank.get(REG_HINT_COUNTER);
            }
            REG_MODE_3 => {
                let mode = bank.mode3();
                self.hscroll_mode = match bank.get(REG_MODE_3) & 0x03 {
                    0 => HScrollMode::FullScreen,
                    1 => HScrollMode::FirstEightLines,
                    2 => HScrollMode::Cell,
                    _ => HScrollMode::Line,
                };
                self.vscroll_mode = if mode.contains(ModeSet3::VSCROLL_2CELL) {
                    VScrollMode::TwoCell
                } else {
                    VScrollMode::FullScreen
                };
            }
            REG_MODE_4 => {
                let mode = bank.mode4();
                self.h40 = bank.h40();
                self.screen_width = if self.h40 { 320 } else { 256 };
                self.max_sprites = if self.h40 { 80 } else { 64 };
                self.window_width = if self.h40 { 64 } else { 32 };
                self.shadow_highlight = mode.contains(ModeSet4::SHADOW_HIGHLIGHT);
                self.interlace = match (bank.get(REG_MODE_4) >> 1) & 0x03 {
                    1 => InterlaceMode::Normal,
                    3 => InterlaceMode::Double,
                    _ => InterlaceMode::Off,
                };
                // Both table bases lose a low bit in H40
                self.window_base = Self::window_base(bank);
                self.sprite_table_base = Self::sprite_table_base(bank);
            }
            REG_HSCROLL => {
                self.hscroll_base = ((bank.get(REG_HSCROLL) & 0x3F) as u32) << 10;
            }
            REG_AUTO_INCREMENT => {
                self.auto_increment = bank.get(REG_AUTO_INCREMENT);
            }
            REG_PLANE_SIZE => {
                let size = bank.get(REG_PLANE_SIZE);
                self.plane_width = plane_cells(size);
                self.plane_height = plane_cells(size >> 4);
            }
            REG_WINDOW_H | REG_WINDOW_V => {
                self.window =
                    WindowRegion::from_registers(bank.get(REG_WINDOW_H), bank.get(REG_WINDOW_V));
            }
            REG_DMA_LENGTH_LO | REG_DMA_LENGTH_HI => {
                self.dma_length = u16::from_le_bytes([
                    bank.get(REG_DMA_LENGTH_LO),
                    bank.get(REG_DMA_LENGTH_HI),
                ]);
            }
            REG_DMA_SOURCE_LO | REG_DMA_SOURCE_MID | REG_DMA_SOURCE_HI => {
                let hi = bank.get(REG_DMA_SOURCE_HI);
                self.dma_mode_code = hi >> 6;
                self.dma_source = Self::dma_source(bank);
            }
            // 0x06, 0x08, 0x09, 0x0E: unused on this chip revision
            _ => {}
        }
    }

    fn window_base(bank: &RegisterBank) -> u32 {
        let mask = if bank.h40() { 0x3C } else { 0x3E };
        ((bank.get(REG_WINDOW) & mask) as u32) << 10
    }

    fn sprite_table_base(bank: &RegisterBank) -> u32 {
        let mask = if bank.h40() { 0x7E } else { 0x7F };
        ((bank.get(REG_SPRITE_TABLE) & mask) as u32) << 9
    }

    /// Source address for the active DMA mode.
    ///
    /// External transfers use a word address spread over all three
    /// registers; fill and copy only look at the low two as a byte address.
    fn dma_source(bank: &RegisterBank) -> u32 {
        let lo = bank.get(REG_DMA_SOURCE_LO) as u32;
        let mid = bank.get(REG_DMA_SOURCE_MID) as u32;
        let hi = bank.get(REG_DMA_SOURCE_HI);
        if hi & 0x80 == 0 {
            (((hi & 0x7F) as u32) << 17) | (mid << 9) | (lo << 1)
        } else {
            (mid << 8) | lo
        }
    }
}

impl Default for DerivedConfig {
    fn default() -> Self {
        Self::from_registers(&RegisterBank::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank_with(writes: &[(usize, u8)]) -> RegisterBank {
        let mut bank = RegisterBank::new();
        for &(index, value) in writes {
            bank.write(index, value).unwrap();
        }
        bank
    }

    #[test]
    fn test_out_of_range_index_is_rejected() {
        let mut bank = RegisterBank::new();
        assert!(matches!(
            bank.write(24, 1),
            Err(VdpError::RegisterOutOfRange { index: 24 })
        ));
        assert!(bank.read(0x1F).is_err());
    }

    #[test]
    fn test_display_dimensions() {
        let cfg = DerivedConfig::from_registers(&RegisterBank::new());
        assert_eq!((cfg.screen_width, cfg.screen_height), (256, 224));

        let cfg = DerivedConfig::from_registers(&bank_with(&[(REG_MODE_4, 0x81), (REG_MODE_2, 0x08)]));
        assert_eq!((cfg.screen_width, cfg.screen_height), (320, 240));
        assert_eq!(cfg.max_sprites, 80);
        assert_eq!(cfg.window_width, 64);
    }

    #[test]
    fn test_table_base_addresses() {
        let cfg = DerivedConfig::from_registers(&bank_with(&[
            (REG_PLANE_A, 0x30),
            (REG_WINDOW, 0x2C),
            (REG_PLANE_B, 0x07),
            (REG_SPRITE_TABLE, 0x6C),
            (REG_HSCROLL, 0x2F),
        ]));
        assert_eq!(cfg.plane_a_base, 0xC000);
        assert_eq!(cfg.window_base, 0xB000);
        assert_eq!(cfg.plane_b_base, 0xE000);
        assert_eq!(cfg.sprite_table_base, 0xD800);
        assert_eq!(cfg.hscroll_base, 0xBC00);
    }

    #[test]
    fn test_h40_drops_low_table_bits() {
        let cfg = DerivedConfig::from_registers(&bank_with(&[
            (REG_WINDOW, 0x3E),
            (REG_SPRITE_TABLE, 0x7F),
            (REG_MODE_4, 0x81),
        ]));
        assert_eq!(cfg.window_base, 0xF000);
        assert_eq!(cfg.sprite_table_base, 0xFC00);
    }

    #[test]
    fn test_plane_size_and_scroll_modes() {
        let cfg = DerivedConfig::from_registers(&bank_with(&[(REG_PLANE_SIZE, 0x13), (REG_MODE_3, 0x07)]));
        assert_eq!(cfg.plane_width, 128);
        assert_eq!(cfg.plane_height, 64);
        assert_eq!(cfg.hscroll_mode, HScrollMode::Line);
        assert_eq!(cfg.vscroll_mode, VScrollMode::TwoCell);
    }

    #[test]
    fn test_window_region_decode() {
        let cfg = DerivedConfig::from_registers(&bank_with(&[(REG_WINDOW_H, 0x85), (REG_WINDOW_V, 0x03)]));
        assert!(cfg.window.right);
        assert_eq!(cfg.window.h_split, 80);
        assert!(!cfg.window.down);
        assert_eq!(cfg.window.v_split, 24);
        assert!(cfg.window.covers_line(23));
        assert!(!cfg.window.covers_line(24));
        assert_eq!(cfg.window.columns(320), 80..320);
    }

    #[test]
    fn test_dma_source_layouts() {
        let transfer = DerivedConfig::from_registers(&bank_with(&[
            (REG_DMA_SOURCE_LO, 0x80),
            (REG_DMA_SOURCE_MID, 0x01),
            (REG_DMA_SOURCE_HI, 0x7F),
            (REG_DMA_LENGTH_LO, 0x34),
            (REG_DMA_LENGTH_HI, 0x12),
        ]));
        assert_eq!(transfer.dma_source, 0xFE_0300);
        assert_eq!(transfer.dma_mode_code, 1);
        assert_eq!(transfer.dma_length, 0x1234);

        let copy = DerivedConfig::from_registers(&bank_with(&[
            (REG_DMA_SOURCE_LO, 0x34),
            (REG_DMA_SOURCE_MID, 0x12),
            (REG_DMA_SOURCE_HI, 0xC0),
        ]));
        assert_eq!(copy.dma_source, 0x1234);
        assert_eq!(copy.dma_mode_code, 3);
    }

    #[test]
    fn test_incremental_matches_full_rebuild() {
        let writes = [
            (REG_MODE_4, 0x89u8),
            (REG_WINDOW, 0x3E),
            (REG_MODE_2, 0x74),
            (REG_PLANE_SIZE, 0x11),
            (REG_DMA_SOURCE_HI, 0x95),
            (REG_BACKGROUND, 0xFF),
        ];
        let mut bank = RegisterBank::new();
        let mut cfg = DerivedConfig::default();
        for (index, value) in writes {
            bank.write(index, value).unwrap();
            cfg.apply_register(index, &bank);
        }
        assert_eq!(cfg, DerivedConfig::from_registers(&bank));
        assert_eq!(cfg.background_color, 0x3F);
        assert!(cfg.shadow_highlight);
        assert_eq!(cfg.interlace, InterlaceMode::Off);
    }
}
