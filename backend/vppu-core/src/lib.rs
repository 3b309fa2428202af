//! Software PPU: scanline rasterizer for tile-and-sprite 2D graphics.
//!
//! Renders one frame at a time from host-writable video memory and register
//! regions into a 32-bit RGBA framebuffer. Four pipelines are supported,
//! selected by the mode register: a wide-background superset mode with
//! per-line scroll tables and SNES-style color math (mode 0), two GBA-style
//! tile modes (modes 1 and 2), and a DMG-style monochrome mode (mode 7).

pub mod api;
mod memory;
mod ppu;

pub use api::{VppuConfig, VppuError, global};
pub use ppu::wide::layout as wide;
pub use ppu::{
    DMG_FRAME_SIZE, FRAME_BUFFER_LEN, GBA_FRAME_SIZE, MAX_FRAME_HEIGHT, MAX_FRAME_WIDTH, Mode,
    Ppu,
};
