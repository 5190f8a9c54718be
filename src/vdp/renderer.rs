use std::ops::Range;

use super::pixel::TaggedPixel;

pub const MAX_LINE_WIDTH: usize = 320;

/// Per-scanline scratch buffers, one per source plus the composited row.
/// Cleared in place every line, never reallocated.
#[derive(Debug, Clone)]
pub struct FrameLineBuffers {
    pub plane_a: [TaggedPixel; MAX_LINE_WIDTH],
    pub plane_b: [TaggedPixel; MAX_LINE_WIDTH],
    pub window: [TaggedPixel; MAX_LINE_WIDTH],
    pub sprites: [TaggedPixel; MAX_LINE_WIDTH],
    pub composited: [TaggedPixel; MAX_LINE_WIDTH],
    /// Columns on this line where the window replaces plane A.
    pub window_span: Range<usize>,
}

impl FrameLineBuffers {
    pub fn new() -> Self {
        Self {
            plane_a: [TaggedPixel::TRANSPARENT; MAX_LINE_WIDTH],
            plane_b: [TaggedPixel::TRANSPARENT; MAX_LINE_WIDTH],
            window: [TaggedPixel::TRANSPARENT; MAX_LINE_WIDTH],
            sprites: [TaggedPixel::TRANSPARENT; MAX_LINE_WIDTH],
            composited: [TaggedPixel::TRANSPARENT; MAX_LINE_WIDTH],
            window_span: 0..0,
        }
    }

    pub fn clear(&mut self) {
        self.plane_a.fill(TaggedPixel::TRANSPARENT);
        self.plane_b.fill(TaggedPixel::TRANSPARENT);
        self.window.fill(TaggedPixel::TRANSPARENT);
        self.sprites.fill(TaggedPixel::TRANSPARENT);
        self.composited.fill(TaggedPixel::TRANSPARENT);
        self.window_span = 0..0;
    }

    /// Plane A or window pixel, whichever owns column `x` on this line.
    #[inline]
    fn foreground(&self, x: usize) -> TaggedPixel {
        if self.window_span.contains(&x) {
            self.window[x]
        } else {
            self.plane_a[x]
        }
    }
}

impl Default for FrameLineBuffers {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn draw_layer(acc: TaggedPixel, px: TaggedPixel, high: bool) -> TaggedPixel {
    if px.is_opaque() && px.priority() == high {
        px
    } else {
        acc
    }
}

#[inline]
fn draw_sprite(acc: TaggedPixel, px: TaggedPixel, high: bool) -> TaggedPixel {
    if px.is_transparent() || px.priority() != high {
        return acc;
    }
    // Effect sprites only carry these tags when shadow/highlight is on
    if px.shadow() {
        acc.shadowed()
    } else if px.highlight() {
        acc.highlighted()
    } else {
        px
    }
}

/// Merge the four source buffers over `background` into `composited`.
///
/// Two passes (low priority, then high), each in the fixed source order
/// B, sprites, A/window. Transparent pixels never replace the accumulator.
pub fn composite_line(buffers: &mut FrameLineBuffers, background: TaggedPixel, width: usize, left_column_blank: bool) {
    let width = width.min(MAX_LINE_WIDTH);
    for x in 0..width {
        let mut acc = background;
        for high in [false, true] {
            acc = draw_layer(acc, buffers.plane_b[x], high);
            acc = draw_sprite(acc, buffers.sprites[x], high);
            acc = draw_layer(acc, buffers.foreground(x), high);
        }
        if left_column_blank && x < 8 {
            acc = background;
        }
        buffers.composited[x] = acc;
    }
}
