use super::memory::VideoMemory;

pub const TILE_BYTES: u32 = 32;
const ROW_BYTES: u32 = 4;

/// Decoded name-table / sprite attribute word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileAttributes {
    pub pattern: u16,
    pub palette: u8,
    pub priority: bool,
    pub flip_h: bool,
    pub flip_v: bool,
}

impl TileAttributes {
    pub fn from_word(word: u16) -> Self {
        Self {
            pattern: word & 0x07FF,
            flip_h: word & 0x0800 != 0,
            flip_v: word & 0x1000 != 0,
            palette: ((word >> 13) & 0x03) as u8,
            priority: word & 0x8000 != 0,
        }
    }
}

/// Decode one 8-pixel row of a 4bpp tile into color indices, left to right.
///
/// `row` is the on-screen row within the tile; vertical flip picks the
/// mirrored source row.
pub fn decode_row(memory: &VideoMemory, pattern: u16, row: u8, flip_h: bool, flip_v: bool) -> [u8; 8] {
    let row = (row & 7) as u32;
    let src_row = if flip_v { 7 - row } else { row };
    let addr = (pattern as u32 & 0x07FF) * TILE_BYTES + src_row * ROW_BYTES;

    let mut pixels = [0u8; 8];
    for byte_idx in 0..4u32 {
        let packed = memory.read_vram(addr + byte_idx);
        pixels[(byte_idx * 2) as usize] = packed >> 4;
        pixels[(byte_idx * 2 + 1) as usize] = packed & 0x0F;
    }
    if flip_h {
        pixels.reverse();
    }
    pixels
}
