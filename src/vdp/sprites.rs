use log::trace;

use super::memory::VideoMemory;
use super::pixel::TaggedPixel;
use super::registers::DerivedConfig;
use super::tile::{decode_row, TileAttributes};
use crate::debug_flags;

/// Sprite tiles (8-pixel columns) that fit on one scanline.
pub const SPRITE_LINE_TILE_LIMIT: usize = 20;

const ENTRY_BYTES: u32 = 8;
const EFFECT_PALETTE: u8 = 3;
const SHADOW_COLOR: u8 = 14;
const HIGHLIGHT_COLOR: u8 = 15;

/// One decoded sprite attribute table entry. Rebuilt from VRAM every line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteEntry {
    pub y: u16,
    /// Tiles across, 1-4
    pub width: u8,
    /// Tiles down, 1-4
    pub height: u8,
    pub link: u8,
    pub attributes: TileAttributes,
    pub x: i16,
}

impl SpriteEntry {
    pub fn read(memory: &VideoMemory, table_base: u32, index: u8) -> Self {
        let addr = table_base + index as u32 * ENTRY_BYTES;
        let size = memory.read_vram(addr + 2);
        let raw_x = memory.read_vram_word(addr + 6) & 0x01FF;
        Self {
            y: memory.read_vram_word(addr) & 0x03FF,
            width: ((size >> 2) & 0x03) + 1,
            height: (size & 0x03) + 1,
            link: memory.read_vram(addr + 3) & 0x7F,
            attributes: TileAttributes::from_word(memory.read_vram_word(addr + 4)),
            // 9-bit two's complement
            x: ((raw_x << 7) as i16) >> 7,
        }
    }

    pub fn pixel_height(&self) -> u16 {
        self.height as u16 * 8
    }

    pub fn visible_on(&self, line: u16) -> bool {
        line >= self.y && line < self.y + self.pixel_height()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpriteRenderer {
    overflow: bool,
    collision: bool,
    line_tiles: usize,
    line_sprites: usize,
}

impl SpriteRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(overflow, collision)`; both stick until [`clear_flags`](Self::clear_flags).
    pub fn flags(&self) -> (bool, bool) {
        (self.overflow, self.collision)
    }

    pub fn clear_flags(&mut self) {
        self.overflow = false;
        self.collision = false;
    }

    pub(crate) fn restore_flags(&mut self, overflow: bool, collision: bool) {
        self.overflow = overflow;
        self.collision = collision;
    }

    /// Tiles emitted on the most recently rendered line.
    pub fn line_tiles(&self) -> usize {
        self.line_tiles
    }

    /// Sprites found visible on the most recently rendered line.
    pub fn line_sprites(&self) -> usize {
        self.line_sprites
    }

    /// Walk the sprite list and draw every sprite visible on `line` into `out`.
    ///
    /// Earlier list entries win; a later opaque pixel over an earlier one
    /// only raises the collision flag. The walk stops after
    /// `cfg.max_sprites` entries whatever the links say.
    pub fn render_line(
        &mut self,
        line: u16,
        cfg: &DerivedConfig,
        memory: &VideoMemory,
        enforce_limit: bool,
        out: &mut [TaggedPixel],
    ) {
        self.line_tiles = 0;
        self.line_sprites = 0;
        let width = (cfg.screen_width as usize).min(out.len());

        let mut index = 0u8;
        'walk: for _ in 0..cfg.max_sprites {
            let sprite = SpriteEntry::read(memory, cfg.sprite_table_base, index);

            if sprite.visible_on(line) {
                self.line_sprites += 1;
                let attr = sprite.attributes;
                let sprite_row = line - sprite.y;
                let src_row = if attr.flip_v {
                    sprite.pixel_height() - 1 - sprite_row
                } else {
                    sprite_row
                };
                let tile_row = src_row / 8;

                for col in 0..sprite.width {
                    if enforce_limit && self.line_tiles >= SPRITE_LINE_TILE_LIMIT {
                        self.overflow = true;
                        break 'walk;
                    }
                    self.line_tiles += 1;

                    let src_col = if attr.flip_h { sprite.width - 1 - col } else { col };
                    // Multi-tile sprites are stored column by column
                    let pattern = attr
                        .pattern
                        .wrapping_add(src_col as u16 * sprite.height as u16 + tile_row)
                        & 0x07FF;
                    let pixels = decode_row(memory, pattern, (src_row & 7) as u8, attr.flip_h, false);
                    let screen_x = sprite.x as i32 + col as i32 * 8;
                    self.place(&pixels, &attr, screen_x, width, cfg.shadow_highlight, out);
                }
            }

            if sprite.link == 0 || sprite.link as u16 >= cfg.max_sprites {
                break;
            }
            index = sprite.link;
        }

        if debug_flags::sprites() {
            trace!(
                "line {}: {} sprites, {} tiles, overflow={} collision={}",
                line, self.line_sprites, self.line_tiles, self.overflow, self.collision
            );
        }
    }

    fn place(
        &mut self,
        pixels: &[u8; 8],
        attr: &TileAttributes,
        screen_x: i32,
        width: usize,
        shadow_highlight: bool,
        out: &mut [TaggedPixel],
    ) {
        for (i, &color) in pixels.iter().enumerate() {
            let x = screen_x + i as i32;
            if color == 0 || x < 0 || x as usize >= width {
                continue;
            }
            let x = x as usize;
            if out[x].is_opaque() {
                self.collision = true;
                continue;
            }
            let px = TaggedPixel::new(color, attr.palette, attr.priority);
            out[x] = if shadow_highlight && attr.palette == EFFECT_PALETTE {
                match color {
                    SHADOW_COLOR => px.shadowed(),
                    HIGHLIGHT_COLOR => px.highlighted(),
                    _ => px,
                }
            } else {
                px
            };
        }
    }
}
