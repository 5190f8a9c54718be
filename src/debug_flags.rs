use std::sync::OnceLock;

pub(crate) fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
        .unwrap_or(default)
}

pub(crate) fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}

pub fn quiet() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| env_flag("QUIET", false))
}

// Every register write with the fields it recomputed
pub fn vdp_reg() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| !quiet() && env_flag("DEBUG_VDP_REG", false))
}

// Control/data port traffic (command words, access mode switches)
pub fn vdp_port() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| !quiet() && env_flag("DEBUG_VDP_PORT", false))
}

pub fn dma() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| !quiet() && env_flag("DEBUG_VDP_DMA", false))
}

// Per-line sprite evaluation summary; very chatty.
pub fn sprites() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| !quiet() && env_flag("DEBUG_VDP_SPRITES", false))
}

pub fn render_verbose() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| !quiet() && env_flag("DEBUG_RENDER", false))
}

// Only log the first N frames when DEBUG_RENDER is on (default 2)
pub fn render_frame_limit() -> u32 {
    static N: OnceLock<u32> = OnceLock::new();
    *N.get_or_init(|| env_u32("DEBUG_RENDER_FRAMES", 2))
}
