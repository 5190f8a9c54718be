//! Scanline renderer and port/DMA state machine for a Mega Drive style VDP.
//!
//! The [`Vdp`] owns video memory, the register file and all rendering
//! scratch state. A host emulator drives it through the control/data ports
//! and asks for one RGB scanline at a time.

pub mod debug_flags;
pub mod error;
pub mod savestate;
pub mod vdp;

pub use error::{VdpError, VdpResult};
pub use savestate::VdpSaveState;
pub use vdp::color::ColorTables;
pub use vdp::dma::{DmaSource, DmaStatus};
pub use vdp::pixel::TaggedPixel;
pub use vdp::timing::VideoStandard;
pub use vdp::{Vdp, VdpConfig, VdpStatus, FRAME_HEIGHT, FRAME_WIDTH};
