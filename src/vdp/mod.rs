pub mod background;
pub mod color;
pub mod dma;
pub mod memory;
pub mod pixel;
pub mod port;
pub mod registers;
pub mod renderer;
pub mod sprites;
pub mod tile;
pub mod timing;


use bitflags::bitflags;
use log::{debug, trace, warn};

use crate::debug_flags;
use crate::error::{VdpError, VdpResult};
use crate::savestate::{VdpSaveState, SAVE_STATE_VERSION};

use self::background::{render_plane, render_window, Plane};
use self::color::ColorTables;
use self::dma::{DmaEngine, DmaMode, DmaSource, DmaStatus, DMA_MODE_COPY, DMA_MODE_FILL, DMA_TARGET_VRAM};
use self::memory::VideoMemory;
use self::pixel::TaggedPixel;
use self::port::{AccessMode, ControlWrite, PortState};
use self::registers::{DerivedConfig, RegisterBank, REG_HINT_COUNTER};
use self::renderer::{composite_line, FrameLineBuffers};
use self::sprites::SpriteRenderer;
use self::timing::{ScanlineTiming, VideoStandard, MASTER_CYCLES_PER_LINE};

/// Frame buffer stride and height; the largest mode the chip can display.
pub const FRAME_WIDTH: usize = 320;
pub const FRAME_HEIGHT: usize = 240;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VdpStatus: u16 {
        const PAL = 0x0001;
        const DMA_BUSY = 0x0002;
        const HBLANK = 0x0004;
        const VBLANK = 0x0008;
        const ODD_FRAME = 0x0010;
        const SPRITE_COLLISION = 0x0020;
        const SPRITE_OVERFLOW = 0x0040;
        const VINT_PENDING = 0x0080;
        const FIFO_EMPTY = 0x0200;
    }
}

// Bits 10, 12 and 13 always read back set
const STATUS_FIXED_BITS: u16 = 0x3400;

/// Construction-time options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VdpConfig {
    pub standard: VideoStandard,
    /// Stop drawing sprite tiles past the per-line limit (and flag overflow)
    pub enforce_sprite_limits: bool,
}

impl VdpConfig {
    /// `MD_VDP_PAL=1` selects PAL timing, `MD_VDP_NO_SPRITE_LIMIT=1` lifts
    /// the per-line sprite limit.
    pub fn from_env() -> Self {
        Self {
            standard: if debug_flags::env_flag("MD_VDP_PAL", false) {
                VideoStandard::Pal
            } else {
                VideoStandard::Ntsc
            },
            enforce_sprite_limits: !debug_flags::env_flag("MD_VDP_NO_SPRITE_LIMIT", false),
        }
    }
}

impl Default for VdpConfig {
    fn default() -> Self {
        Self {
            standard: VideoStandard::Ntsc,
            enforce_sprite_limits: true,
        }
    }
}

type InterruptHook = Box<dyn FnMut()>;

/// Mega Drive style video display processor.
///
/// The CPU side drives it through the control/data ports (or the direct
/// register and DMA entry points); the frame loop calls
/// [`render_scanline`](Vdp::render_scanline) once per line, or hands it
/// master cycles via [`advance_cycles`](Vdp::advance_cycles).
pub struct Vdp {
    config: VdpConfig,
    memory: VideoMemory,
    registers: RegisterBank,
    derived: DerivedConfig,
    port: PortState,
    dma: DmaEngine,
    sprites: SpriteRenderer,
    lines: FrameLineBuffers,
    colors: ColorTables,
    timing: ScanlineTiming,
    frame_buffer: Vec<u32>,

    last_error: Option<VdpError>,
    protocol_errors: u64,

    hblank_hook: Option<InterruptHook>,
    vblank_hook: Option<InterruptHook>,
    dma_reader: Option<Box<dyn DmaSource>>,
}

impl std::fmt::Debug for Vdp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vdp")
            .field("config", &self.config)
            .field("registers", &self.registers)
            .field("port", &self.port)
            .field("dma", self.dma.state())
            .field("timing", &self.timing)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl Vdp {
    pub fn new() -> Self {
        Self::with_config(VdpConfig::default())
    }

    pub fn with_config(config: VdpConfig) -> Self {
        let registers = RegisterBank::new();
        Self {
            config,
            memory: VideoMemory::new(),
            derived: DerivedConfig::from_registers(&registers),
            registers,
            port: PortState::new(),
            dma: DmaEngine::new(),
            sprites: SpriteRenderer::new(),
            lines: FrameLineBuffers::new(),
            colors: ColorTables::new(),
            timing: ScanlineTiming::new(),
            frame_buffer: vec![0; FRAME_WIDTH * FRAME_HEIGHT],
            last_error: None,
            protocol_errors: 0,
            hblank_hook: None,
            vblank_hook: None,
            dma_reader: None,
        }
    }

    /// Soft reset: protocol, DMA, timing and sticky flags go back to
    /// power-on values. Memory and registers survive.
    pub fn reset(&mut self) {
        self.port.reset();
        self.dma.reset();
        self.timing = ScanlineTiming::new();
        self.sprites.clear_flags();
        self.lines.clear();
        self.last_error = None;
    }

    /// Full power cycle, including memory and registers.
    pub fn power_on(&mut self) {
        self.reset();
        self.memory.reset();
        self.registers = RegisterBank::new();
        self.derived = DerivedConfig::from_registers(&self.registers);
        self.frame_buffer.fill(0);
        self.protocol_errors = 0;
    }

    pub fn config(&self) -> &VdpConfig {
        &self.config
    }

    pub fn derived(&self) -> &DerivedConfig {
        &self.derived
    }

    pub fn registers(&self) -> &RegisterBank {
        &self.registers
    }

    pub fn memory(&self) -> &VideoMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut VideoMemory {
        &mut self.memory
    }

    pub fn color_tables(&self) -> &ColorTables {
        &self.colors
    }

    // --- error reporting ---

    fn record(&mut self, err: VdpError) {
        warn!("VDP: {}", err);
        self.protocol_errors += 1;
        self.last_error = Some(err);
    }

    pub fn last_error(&self) -> Option<&VdpError> {
        self.last_error.as_ref()
    }

    pub fn take_last_error(&mut self) -> Option<VdpError> {
        self.last_error.take()
    }

    pub fn protocol_error_count(&self) -> u64 {
        self.protocol_errors
    }

    // --- registers ---

    pub fn try_write_register(&mut self, index: u8, value: u8) -> VdpResult<()> {
        let index = index as usize;
        self.registers.write(index, value)?;
        self.derived.apply_register(index, &self.registers);
        if index == REG_HINT_COUNTER {
            self.timing.hint_counter = value;
        }
        if debug_flags::vdp_reg() {
            debug!("VDP reg {:02X} <- {:02X}", index, value);
        }
        Ok(())
    }

    /// Hardware-faithful register write: out-of-range indices are dropped
    /// and reported through [`last_error`](Vdp::last_error).
    pub fn write_register(&mut self, index: u8, value: u8) {
        if let Err(err) = self.try_write_register(index, value) {
            self.record(err);
        }
    }

    pub fn read_register(&self, index: u8) -> VdpResult<u8> {
        self.registers.read(index as usize)
    }

    /// Raw register byte, or 0 for an index past the register file.
    pub fn get_register(&mut self, index: u8) -> u8 {
        match self.read_register(index) {
            Ok(value) => value,
            Err(err) => {
                self.record(err);
                0
            }
        }
    }

    // --- control port ---

    pub fn write_control(&mut self, word: u16) {
        let result = self.port.write_control(word);
        self.handle_control(result);
    }

    /// Byte-wide control port: two calls make one control word.
    pub fn port_write(&mut self, byte: u8) {
        if let Some(result) = self.port.port_write(byte) {
            self.handle_control(result);
        }
    }

    fn handle_control(&mut self, result: ControlWrite) {
        match result {
            ControlWrite::Register { index, value } => self.write_register(index, value),
            ControlWrite::FirstHalf => {}
            ControlWrite::Command { mode, dma } => {
                if debug_flags::vdp_port() {
                    debug!(
                        "VDP command code={:02X} addr={:04X} mode={:?} dma={}",
                        self.port.code, self.port.address, mode, dma
                    );
                }
                if mode.is_none() && !dma {
                    self.record(VdpError::InvalidAccessMode { code: self.port.target_code() });
                }
                if dma && self.derived.dma_enabled {
                    self.begin_port_dma();
                }
            }
        }
    }

    /// Configure a DMA from registers 19-23 and the command just written.
    fn begin_port_dma(&mut self) {
        let mode_code = self.derived.dma_mode_code;
        let target_code = if mode_code == DMA_MODE_COPY {
            DMA_TARGET_VRAM
        } else {
            self.port.target_code()
        };
        let units = match self.derived.dma_length {
            0 => 0x10000,
            n => n as u32,
        };
        // External transfers count words, fill and copy count bytes
        let bytes = if mode_code & 0x02 == 0 { units * 2 } else { units };
        let dest = dma::encode_destination(target_code, self.port.address);

        if let Err(err) = self.dma.configure(mode_code, dest, self.derived.dma_source, bytes) {
            self.record(err);
            return;
        }
        // Fills wait for the data port to supply the fill byte
        if mode_code != DMA_MODE_FILL {
            self.run_dma();
        }
    }

    fn run_dma(&mut self) -> DmaStatus {
        let status = match self.dma_reader.as_mut() {
            Some(reader) => self.dma.execute(&mut self.memory, Some(reader.as_mut())),
            None => self.dma.execute(&mut self.memory, None),
        };
        if status == DmaStatus::MissingSource {
            self.record(VdpError::MissingDmaSource);
        }
        let moved = self.dma.last_transfer_len();
        self.port.address = self.port.address.wrapping_add((moved & 0xFFFF) as u16);
        status
    }

    // --- data port ---

    pub fn try_write_data(&mut self, word: u16) -> VdpResult<()> {
        self.port.clear_latches();

        if self.dma.is_active() && self.dma.mode() == DmaMode::Fill {
            self.dma.set_fill_byte((word >> 8) as u8);
            self.run_dma();
            return Ok(());
        }

        let mode = self
            .port
            .access_mode
            .ok_or_else(|| VdpError::InvalidAccessMode { code: self.port.target_code() })?;
        let addr = self.port.address as u32;
        match mode {
            AccessMode::VramWrite => {
                // Odd addresses store the word byte-swapped
                let word = if addr & 1 != 0 { word.swap_bytes() } else { word };
                self.memory.write_vram_word(addr, word);
            }
            AccessMode::CramWrite => self.memory.write_cram((addr >> 1) as usize, word),
            AccessMode::VsramWrite => self.memory.write_vsram((addr >> 1) as usize, word),
            _ => return Err(VdpError::WrongPortDirection { mode }),
        }
        if debug_flags::vdp_port() {
            trace!("VDP data {:?} [{:04X}] <- {:04X}", mode, addr, word);
        }
        self.port.advance(self.derived.auto_increment);
        Ok(())
    }

    pub fn write_data(&mut self, word: u16) {
        if let Err(err) = self.try_write_data(word) {
            self.record(err);
        }
    }

    pub fn try_port_read(&mut self) -> VdpResult<u16> {
        self.port.clear_latches();
        let mode = self
            .port
            .access_mode
            .ok_or_else(|| VdpError::InvalidAccessMode { code: self.port.target_code() })?;
        let addr = self.port.address as u32;
        let value = match mode {
            AccessMode::VramRead => self.memory.read_vram_word(addr),
            AccessMode::CramRead => self.memory.read_cram((addr >> 1) as usize),
            AccessMode::VsramRead => self.memory.read_vsram((addr >> 1) as usize),
            _ => return Err(VdpError::WrongPortDirection { mode }),
        };
        self.port.read_latch = value;
        self.port.advance(self.derived.auto_increment);
        Ok(value)
    }

    /// Data port read. A read in a write mode returns the last latched word.
    pub fn port_read(&mut self) -> u16 {
        match self.try_port_read() {
            Ok(value) => value,
            Err(err) => {
                self.record(err);
                self.port.read_latch
            }
        }
    }

    pub fn port_state(&self) -> &PortState {
        &self.port
    }

    // --- status / counters ---

    pub fn status(&self) -> VdpStatus {
        let mut status = VdpStatus::FIFO_EMPTY;
        let (overflow, collision) = self.sprites.flags();
        status.set(VdpStatus::PAL, self.config.standard == VideoStandard::Pal);
        status.set(VdpStatus::DMA_BUSY, self.dma.is_active());
        status.set(VdpStatus::HBLANK, self.timing.hblank());
        status.set(VdpStatus::VBLANK, self.timing.vblank || !self.derived.display_enabled);
        status.set(VdpStatus::ODD_FRAME, self.timing.odd_frame);
        status.set(VdpStatus::SPRITE_COLLISION, collision);
        status.set(VdpStatus::SPRITE_OVERFLOW, overflow);
        status.set(VdpStatus::VINT_PENDING, self.timing.vint_pending);
        status
    }

    /// Status port read. Abandons a half-written command.
    pub fn read_status(&mut self) -> u16 {
        self.port.clear_latches();
        STATUS_FIXED_BITS | self.status().bits()
    }

    pub fn read_hv_counter(&self) -> u16 {
        let v30 = self.derived.screen_height == 240;
        self.timing.hv_counter(self.config.standard, v30, self.derived.h40)
    }

    pub fn timing(&self) -> &ScanlineTiming {
        &self.timing
    }

    pub fn frame_count(&self) -> u64 {
        self.timing.frame_count
    }

    // --- sprites ---

    pub fn get_sprite_flags(&self) -> (bool, bool) {
        self.sprites.flags()
    }

    pub fn clear_sprite_flags(&mut self) {
        self.sprites.clear_flags();
    }

    pub fn sprite_renderer(&self) -> &SpriteRenderer {
        &self.sprites
    }

    // --- DMA ---

    /// Install the bus read used by external-memory transfers.
    pub fn set_dma_reader<F>(&mut self, reader: F)
    where
        F: FnMut(u32) -> u8 + 'static,
    {
        self.dma_reader = Some(Box::new(reader));
    }

    pub fn start_dma(&mut self, mode_code: u8, dest: u32, source: u32, length: u16) -> VdpResult<()> {
        let result = self.dma.start(mode_code, dest, source, length);
        if let Err(err) = &result {
            warn!("VDP: {}", err);
        }
        result
    }

    pub fn execute_dma(&mut self) -> DmaStatus {
        self.run_dma()
    }

    pub fn is_dma_active(&self) -> bool {
        self.dma.is_active()
    }

    pub fn dma_status(&self) -> DmaStatus {
        self.dma.status()
    }

    pub fn last_transfer_len(&self) -> u32 {
        self.dma.last_transfer_len()
    }

    // --- interrupts ---

    pub fn set_hblank_hook<F: FnMut() + 'static>(&mut self, hook: F) {
        self.hblank_hook = Some(Box::new(hook));
    }

    pub fn set_vblank_hook<F: FnMut() + 'static>(&mut self, hook: F) {
        self.vblank_hook = Some(Box::new(hook));
    }

    pub fn hint_pending(&self) -> bool {
        self.timing.hint_pending
    }

    pub fn vint_pending(&self) -> bool {
        self.timing.vint_pending
    }

    pub fn acknowledge_hint(&mut self) {
        self.timing.hint_pending = false;
    }

    pub fn acknowledge_vint(&mut self) {
        self.timing.vint_pending = false;
    }

    // --- rendering ---

    /// Output one scanline and run the end-of-line counters.
    ///
    /// Returns the RGB row for active lines and an empty slice for lines
    /// in vertical blank.
    pub fn render_scanline(&mut self, line: u16) -> &[u32] {
        let lines_per_frame = self.config.standard.lines_per_frame();
        let line = line % lines_per_frame;
        let height = self.derived.screen_height;
        let width = self.derived.screen_width as usize;
        let active = line < height;

        if active {
            self.draw_line(line);
        }

        let events = self.timing.finish_line(
            line,
            height,
            lines_per_frame,
            self.derived.hint_interval,
            self.derived.hint_enabled,
            self.derived.vint_enabled,
        );
        if events.hint {
            if let Some(hook) = self.hblank_hook.as_mut() {
                hook();
            }
        }
        if events.vint {
            if let Some(hook) = self.vblank_hook.as_mut() {
                hook();
            }
        }
        if events.frame_done
            && debug_flags::render_verbose()
            && self.timing.frame_count <= debug_flags::render_frame_limit() as u64
        {
            debug!(
                "frame {} done: {}x{} display={} sprites overflow/collision={:?}",
                self.timing.frame_count,
                width,
                height,
                self.derived.display_enabled,
                self.sprites.flags()
            );
        }

        if active {
            let start = line as usize * FRAME_WIDTH;
            &self.frame_buffer[start..start + width]
        } else {
            &[]
        }
    }

    fn draw_line(&mut self, line: u16) {
        let width = self.derived.screen_width as usize;
        let background = TaggedPixel::from_background_register(self.derived.background_color);
        self.lines.clear();

        if self.derived.display_enabled {
            let cfg = &self.derived;
            render_plane(Plane::B, line, cfg, &self.memory, &mut self.lines.plane_b);
            self.sprites.render_line(
                line,
                cfg,
                &self.memory,
                self.config.enforce_sprite_limits,
                &mut self.lines.sprites,
            );
            render_plane(Plane::A, line, cfg, &self.memory, &mut self.lines.plane_a);
            self.lines.window_span = render_window(line, cfg, &self.memory, &mut self.lines.window);
            composite_line(&mut self.lines, background, width, cfg.left_column_blank);
        } else {
            self.lines.composited[..width].fill(background);
        }

        let start = line as usize * FRAME_WIDTH;
        let row = &mut self.frame_buffer[start..start + width];
        self.colors
            .resolve_line(&self.lines.composited[..width], self.memory.cram(), row);
    }

    /// Feed master clock cycles; every completed line is rendered.
    /// Returns how many lines finished.
    pub fn advance_cycles(&mut self, master_cycles: u32) -> u32 {
        let mut remaining = master_cycles;
        let mut completed = 0;
        loop {
            let to_line_end = MASTER_CYCLES_PER_LINE.saturating_sub(self.timing.line_cycles);
            if remaining < to_line_end {
                self.timing.line_cycles += remaining;
                return completed;
            }
            remaining -= to_line_end;
            // finish_line zeroes line_cycles
            let line = self.timing.line;
            self.render_scanline(line);
            completed += 1;
        }
    }

    /// Render from the current line through the end of the frame.
    pub fn run_frame(&mut self) -> &[u32] {
        loop {
            let line = self.timing.line;
            self.render_scanline(line);
            if self.timing.line == 0 {
                break;
            }
        }
        &self.frame_buffer
    }

    /// Whole frame buffer, `FRAME_WIDTH` pixels per row, 0x00RRGGBB.
    pub fn frame_buffer(&self) -> &[u32] {
        &self.frame_buffer
    }

    /// Visible area of the current mode.
    pub fn display_size(&self) -> (usize, usize) {
        (self.derived.screen_width as usize, self.derived.screen_height as usize)
    }

    // --- save states ---

    pub fn to_save_state(&self) -> VdpSaveState {
        let (sprite_overflow, sprite_collision) = self.sprites.flags();
        VdpSaveState {
            version: SAVE_STATE_VERSION,
            vram: self.memory.vram().to_vec(),
            cram: self.memory.cram_bytes(),
            vsram: self.memory.vsram_bytes(),
            registers: self.registers,
            port: self.port,
            dma: *self.dma.state(),
            timing: self.timing,
            sprite_overflow,
            sprite_collision,
        }
    }

    /// Restore a snapshot. The core is untouched if the snapshot is malformed.
    pub fn load_save_state(&mut self, state: &VdpSaveState) -> VdpResult<()> {
        state.validate()?;
        state.check_timing(self.config.standard)?;
        self.memory.restore(&state.vram, &state.cram, &state.vsram);
        self.registers = state.registers;
        self.derived = DerivedConfig::from_registers(&self.registers);
        self.port = state.port;
        self.dma.restore(state.dma);
        self.timing = state.timing;
        self.sprites
            .restore_flags(state.sprite_overflow, state.sprite_collision);
        self.lines.clear();
        Ok(())
    }
}

impl Default for Vdp {
    fn default() -> Self {
        Self::new()
    }
}
