pub const VRAM_SIZE: usize = 0x10000;
pub const CRAM_ENTRIES: usize = 64;
pub const VSRAM_ENTRIES: usize = 64;

const VRAM_MASK: u32 = (VRAM_SIZE - 1) as u32;
const CRAM_VALUE_MASK: u16 = 0x0FFF;
const VSRAM_VALUE_MASK: u16 = 0x03FF;

/// The three memories owned by the VDP: pattern/tile RAM, color RAM and
/// vertical scroll RAM. Every accessor masks its address so nothing here
/// can index out of bounds.
#[derive(Debug, Clone)]
pub struct VideoMemory {
    vram: Vec<u8>,
    cram: [u16; CRAM_ENTRIES],
    vsram: [u16; VSRAM_ENTRIES],
}

impl VideoMemory {
    pub fn new() -> Self {
        Self {
            vram: vec![0; VRAM_SIZE],
            cram: [0; CRAM_ENTRIES],
            vsram: [0; VSRAM_ENTRIES],
        }
    }

    pub fn reset(&mut self) {
        self.vram.fill(0);
        self.cram = [0; CRAM_ENTRIES];
        self.vsram = [0; VSRAM_ENTRIES];
    }

    // --- pattern / tile RAM ---

    pub fn read_vram(&self, addr: u32) -> u8 {
        self.vram[(addr & VRAM_MASK) as usize]
    }

    pub fn write_vram(&mut self, addr: u32, value: u8) {
        self.vram[(addr & VRAM_MASK) as usize] = value;
    }

    /// Big-endian word; the low address bit is ignored.
    pub fn read_vram_word(&self, addr: u32) -> u16 {
        let addr = addr & !1;
        ((self.read_vram(addr) as u16) << 8) | self.read_vram(addr + 1) as u16
    }

    pub fn write_vram_word(&mut self, addr: u32, value: u16) {
        let addr = addr & !1;
        self.write_vram(addr, (value >> 8) as u8);
        self.write_vram(addr + 1, value as u8);
    }

    pub fn vram(&self) -> &[u8] {
        &self.vram
    }

    // --- color RAM ---

    pub fn read_cram(&self, index: usize) -> u16 {
        self.cram[index & (CRAM_ENTRIES - 1)]
    }

    pub fn write_cram(&mut self, index: usize, value: u16) {
        self.cram[index & (CRAM_ENTRIES - 1)] = value & CRAM_VALUE_MASK;
    }

    /// Byte-addressed write: even addresses carry the high half of an entry.
    pub fn write_cram_byte(&mut self, addr: u32, value: u8) {
        let index = ((addr >> 1) as usize) & (CRAM_ENTRIES - 1);
        self.cram[index] = merge_byte(self.cram[index], addr, value) & CRAM_VALUE_MASK;
    }

    pub fn cram(&self) -> &[u16; CRAM_ENTRIES] {
        &self.cram
    }

    // --- vertical scroll RAM ---

    pub fn read_vsram(&self, index: usize) -> u16 {
        self.vsram[index & (VSRAM_ENTRIES - 1)]
    }

    pub fn write_vsram(&mut self, index: usize, value: u16) {
        self.vsram[index & (VSRAM_ENTRIES - 1)] = value & VSRAM_VALUE_MASK;
    }

    pub fn write_vsram_byte(&mut self, addr: u32, value: u8) {
        let index = ((addr >> 1) as usize) & (VSRAM_ENTRIES - 1);
        self.vsram[index] = merge_byte(self.vsram[index], addr, value) & VSRAM_VALUE_MASK;
    }

    pub fn vsram(&self) -> &[u16; VSRAM_ENTRIES] {
        &self.vsram
    }

    // --- flat byte views for save states ---

    pub fn cram_bytes(&self) -> Vec<u8> {
        words_to_bytes(&self.cram)
    }

    pub fn vsram_bytes(&self) -> Vec<u8> {
        words_to_bytes(&self.vsram)
    }

    /// Replace all three surfaces. Callers validate the lengths first.
    pub(crate) fn restore(&mut self, vram: &[u8], cram: &[u8], vsram: &[u8]) {
        self.vram.copy_from_slice(vram);
        for (i, pair) in cram.chunks_exact(2).enumerate() {
            self.write_cram(i, u16::from_be_bytes([pair[0], pair[1]]));
        }
        for (i, pair) in vsram.chunks_exact(2).enumerate() {
            self.write_vsram(i, u16::from_be_bytes([pair[0], pair[1]]));
        }
    }
}

impl Default for VideoMemory {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_byte(word: u16, addr: u32, value: u8) -> u16 {
    if addr & 1 == 0 {
        (word & 0x00FF) | ((value as u16) << 8)
    } else {
        (word & 0xFF00) | value as u16
    }
}

fn words_to_bytes(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}
