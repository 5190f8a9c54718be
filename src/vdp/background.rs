use std::ops::Range;

use super::memory::VideoMemory;
use super::pixel::TaggedPixel;
use super::registers::{DerivedConfig, HScrollMode, VScrollMode};
use super::tile::{decode_row, TileAttributes};

/// The two scrolling background layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    A,
    B,
}

impl Plane {
    fn scroll_slot(self) -> u32 {
        match self {
            Plane::A => 0,
            Plane::B => 1,
        }
    }

    fn name_table_base(self, cfg: &DerivedConfig) -> u32 {
        match self {
            Plane::A => cfg.plane_a_base,
            Plane::B => cfg.plane_b_base,
        }
    }
}

/// Horizontal scroll for `plane` on `line`, read from the VRAM scroll table.
pub fn horizontal_scroll(cfg: &DerivedConfig, memory: &VideoMemory, plane: Plane, line: u16) -> u16 {
    let line = line as u32;
    let offset = match cfg.hscroll_mode {
        HScrollMode::FullScreen => 0,
        HScrollMode::FirstEightLines => (line & 7) * 4,
        HScrollMode::Cell => (line & !7) * 4,
        HScrollMode::Line => line * 4,
    };
    let addr = cfg.hscroll_base + offset + plane.scroll_slot() * 2;
    memory.read_vram_word(addr) & 0x03FF
}

/// Vertical scroll for `plane` at screen column `screen_x`.
pub fn vertical_scroll(cfg: &DerivedConfig, memory: &VideoMemory, plane: Plane, screen_x: u16) -> u16 {
    let slot = plane.scroll_slot() as usize;
    let index = match cfg.vscroll_mode {
        VScrollMode::FullScreen => slot,
        VScrollMode::TwoCell => (screen_x as usize / 16) * 2 + slot,
    };
    memory.read_vsram(index) & 0x03FF
}

/// Render one scanline of plane A or B into `out`.
///
/// Only opaque pixels are written; whatever `out` held under a
/// transparent pixel stays put.
pub fn render_plane(
    plane: Plane,
    line: u16,
    cfg: &DerivedConfig,
    memory: &VideoMemory,
    out: &mut [TaggedPixel],
) {
    let width = (cfg.screen_width as usize).min(out.len());
    let plane_w = cfg.plane_width as u32;
    let x_mask = plane_w * 8 - 1;
    let y_mask = cfg.plane_height as u32 * 8 - 1;
    let base = plane.name_table_base(cfg);

    let hscroll = horizontal_scroll(cfg, memory, plane, line) as u32;
    let first_x = 0u32.wrapping_sub(hscroll) & x_mask;
    let fine_x = (first_x & 7) as i32;
    let aligned_x = first_x & !7;

    for tile in 0..=(width as i32 / 8) {
        let screen_x = tile * 8 - fine_x;
        let plane_x = (aligned_x + tile as u32 * 8) & x_mask;

        let column = screen_x.clamp(0, width as i32 - 1) as u16;
        let vscroll = vertical_scroll(cfg, memory, plane, column) as u32;
        let plane_y = (line as u32 + vscroll) & y_mask;

        let entry_addr = base + 2 * ((plane_y / 8) * plane_w + plane_x / 8);
        let attr = TileAttributes::from_word(memory.read_vram_word(entry_addr & 0xFFFF));
        let pixels = decode_row(memory, attr.pattern, (plane_y & 7) as u8, attr.flip_h, attr.flip_v);

        emit_row(&pixels, &attr, screen_x, width, out);
    }
}

/// Render the window layer for `line`, returning the columns it owns.
///
/// Outside the returned span `out` is left untouched.
pub fn render_window(line: u16, cfg: &DerivedConfig, memory: &VideoMemory, out: &mut [TaggedPixel]) -> Range<usize> {
    if !cfg.window.covers_line(line) {
        return 0..0;
    }
    let width = cfg.screen_width.min(out.len() as u16);
    let columns = cfg.window.columns(width);
    if columns.is_empty() {
        return 0..0;
    }

    let row = line as u32 / 8;
    let fine_y = (line & 7) as u8;
    let span = columns.start as usize..columns.end as usize;

    for cell in (columns.start / 8)..columns.end.div_ceil(8) {
        let entry_addr = cfg.window_base + 2 * (row * cfg.window_width as u32 + cell as u32);
        let attr = TileAttributes::from_word(memory.read_vram_word(entry_addr & 0xFFFF));
        let pixels = decode_row(memory, attr.pattern, fine_y, attr.flip_h, attr.flip_v);
        let screen_x = cell as i32 * 8;
        for (i, &color) in pixels.iter().enumerate() {
            let x = (screen_x + i as i32) as usize;
            if color != 0 && span.contains(&x) {
                out[x] = TaggedPixel::new(color, attr.palette, attr.priority);
            }
        }
    }
    span
}

fn emit_row(pixels: &[u8; 8], attr: &TileAttributes, screen_x: i32, width: usize, out: &mut [TaggedPixel]) {
    for (i, &color) in pixels.iter().enumerate() {
        let x = screen_x + i as i32;
        if color == 0 || x < 0 || x as usize >= width {
            continue;
        }
        out[x as usize] = TaggedPixel::new(color, attr.palette, attr.priority);
    }
}
