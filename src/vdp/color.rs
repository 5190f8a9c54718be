use super::memory::CRAM_ENTRIES;
use super::pixel::TaggedPixel;

/// Number of distinct 12-bit stored colors.
pub const COLOR_TABLE_SIZE: usize = 4096;

/// Precomputed 12-bit -> 0x00RRGGBB conversions for the three brightness
/// levels. Built once when the core is created and never touched again.
#[derive(Clone)]
pub struct ColorTables {
    normal: Box<[u32]>,
    shadow: Box<[u32]>,
    highlight: Box<[u32]>,
}

impl std::fmt::Debug for ColorTables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColorTables")
            .field("entries", &self.normal.len())
            .finish()
    }
}

#[inline]
fn expand_channel(nibble: u16) -> u32 {
    let n = (nibble & 0x0F) as u32;
    (n << 4) | n
}

#[inline]
fn pack_rgb(r: u32, g: u32, b: u32) -> u32 {
    (r << 16) | (g << 8) | b
}

fn shadow_channel(c: u32) -> u32 {
    c >> 1
}

fn highlight_channel(c: u32) -> u32 {
    (c + (c >> 2)).min(255)
}

impl ColorTables {
    pub fn new() -> Self {
        let mut normal = vec![0u32; COLOR_TABLE_SIZE];
        let mut shadow = vec![0u32; COLOR_TABLE_SIZE];
        let mut highlight = vec![0u32; COLOR_TABLE_SIZE];

        for color in 0..COLOR_TABLE_SIZE {
            // Stored as 0x0BGR, one nibble per channel
            let c = color as u16;
            let r = expand_channel(c);
            let g = expand_channel(c >> 4);
            let b = expand_channel(c >> 8);

            normal[color] = pack_rgb(r, g, b);
            shadow[color] = pack_rgb(shadow_channel(r), shadow_channel(g), shadow_channel(b));
            highlight[color] = pack_rgb(
                highlight_channel(r),
                highlight_channel(g),
                highlight_channel(b),
            );
        }

        Self {
            normal: normal.into_boxed_slice(),
            shadow: shadow.into_boxed_slice(),
            highlight: highlight.into_boxed_slice(),
        }
    }

    pub fn normal(&self, color: u16) -> u32 {
        self.normal[color as usize & (COLOR_TABLE_SIZE - 1)]
    }

    pub fn shadow(&self, color: u16) -> u32 {
        self.shadow[color as usize & (COLOR_TABLE_SIZE - 1)]
    }

    pub fn highlight(&self, color: u16) -> u32 {
        self.highlight[color as usize & (COLOR_TABLE_SIZE - 1)]
    }

    /// Resolve a tagged pixel against color RAM.
    ///
    /// Index 0 always reads entry 0 of palette 0, which is how the global
    /// backdrop shows through every transparent layer.
    pub fn pixel_to_display_color(&self, pixel: TaggedPixel, color_ram: &[u16; CRAM_ENTRIES]) -> u32 {
        let entry = if pixel.is_transparent() {
            0
        } else {
            pixel.color_entry()
        };
        let stored = color_ram[entry & (CRAM_ENTRIES - 1)];

        if pixel.shadow() {
            self.shadow(stored)
        } else if pixel.highlight() {
            self.highlight(stored)
        } else {
            self.normal(stored)
        }
    }

    pub fn resolve_line(&self, pixels: &[TaggedPixel], color_ram: &[u16; CRAM_ENTRIES], out: &mut [u32]) {
        for (dst, &px) in out.iter_mut().zip(pixels.iter()) {
            *dst = self.pixel_to_display_color(px, color_ram);
        }
    }
}

impl Default for ColorTables {
    fn default() -> Self {
        Self::new()
    }
}
