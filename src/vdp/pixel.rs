/// One pre-resolution pixel: color index, palette line and the
/// priority/shadow/highlight tags the compositor works with.
///
/// Packed as `P S H . . . . . . . p p i i i i` (bit 15 down to bit 0).
/// Index 0 is transparent whatever the palette says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TaggedPixel(u16);

const INDEX_MASK: u16 = 0x000F;
const PALETTE_MASK: u16 = 0x0030;
const PALETTE_SHIFT: u16 = 4;
const HIGHLIGHT_BIT: u16 = 0x2000;
const SHADOW_BIT: u16 = 0x4000;
const PRIORITY_BIT: u16 = 0x8000;

impl TaggedPixel {
    pub const TRANSPARENT: TaggedPixel = TaggedPixel(0);

    pub fn new(index: u8, palette: u8, priority: bool) -> Self {
        let mut raw = (index as u16 & INDEX_MASK) | (((palette as u16) << PALETTE_SHIFT) & PALETTE_MASK);
        if priority {
            raw |= PRIORITY_BIT;
        }
        TaggedPixel(raw)
    }

    /// Background pixel from a register 7 style `00pp_iiii` byte.
    pub fn from_background_register(value: u8) -> Self {
        TaggedPixel::new(value & 0x0F, (value >> 4) & 0x03, false)
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn index(self) -> u8 {
        (self.0 & INDEX_MASK) as u8
    }

    pub fn palette(self) -> u8 {
        ((self.0 & PALETTE_MASK) >> PALETTE_SHIFT) as u8
    }

    /// Offset into color RAM (palette * 16 + index).
    pub fn color_entry(self) -> usize {
        (self.0 & (PALETTE_MASK | INDEX_MASK)) as usize
    }

    pub fn priority(self) -> bool {
        self.0 & PRIORITY_BIT != 0
    }

    pub fn shadow(self) -> bool {
        self.0 & SHADOW_BIT != 0
    }

    pub fn highlight(self) -> bool {
        self.0 & HIGHLIGHT_BIT != 0
    }

    pub fn is_transparent(self) -> bool {
        self.index() == 0
    }

    pub fn is_opaque(self) -> bool {
        !self.is_transparent()
    }

    /// Marks this pixel as darkened. Replaces any highlight tag.
    pub fn shadowed(self) -> Self {
        TaggedPixel((self.0 & !HIGHLIGHT_BIT) | SHADOW_BIT)
    }

    /// Marks this pixel as brightened. Replaces any shadow tag.
    pub fn highlighted(self) -> Self {
        TaggedPixel((self.0 & !SHADOW_BIT) | HIGHLIGHT_BIT)
    }
}
