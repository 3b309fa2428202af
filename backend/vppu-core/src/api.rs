//! Public configuration, error types, and the process-wide facade.

use crate::ppu::Ppu;
use bincode::{Decode, Encode};
use std::num::NonZeroU8;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Encode, Decode)]
pub struct VppuConfig {
    /// Number of scanline render workers; 1 renders on the calling thread.
    pub render_threads: NonZeroU8,
}

impl Default for VppuConfig {
    fn default() -> Self {
        Self { render_threads: NonZeroU8::MIN }
    }
}

#[derive(Debug, Error)]
pub enum VppuError {
    #[error(
        "write of {len} bytes at offset {offset:#X} overflows {region} (capacity {capacity:#X})"
    )]
    RegionOverflow { region: &'static str, offset: usize, len: usize, capacity: usize },
    #[error("{what} {index} is out of range (limit {limit})")]
    IndexOutOfRange { what: &'static str, index: usize, limit: usize },
}

/// Process-wide instance for hosts that want the classic global entry
/// points instead of owning a [`Ppu`] value.
pub mod global {
    use super::{Ppu, VppuConfig};
    use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
    use vppu_common::frontend::Color;

    static INSTANCE: OnceLock<Mutex<Ppu>> = OnceLock::new();

    fn lock() -> MutexGuard<'static, Ppu> {
        INSTANCE
            .get_or_init(|| Mutex::new(Ppu::new(VppuConfig::default())))
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Render one frame using the current global registers and VRAM.
    pub fn render_frame() {
        lock().render_frame();
    }

    /// Run `f` against the global instance, e.g. to write registers or
    /// video memory between frames.
    pub fn with_ppu<T>(f: impl FnOnce(&mut Ppu) -> T) -> T {
        f(&mut lock())
    }

    /// Read access to the finished framebuffer.
    pub fn with_frame_buffer<T>(f: impl FnOnce(&[Color]) -> T) -> T {
        f(lock().frame_buffer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_facade_round_trip() {
        global::with_ppu(|ppu| {
            ppu.set_mode(1);
            ppu.write_io16(0x00, 1 << 7);
        });
        global::render_frame();
        global::with_frame_buffer(|fb| {
            assert_eq!(fb[0].to_word(), 0xFFFFFFFF);
        });
    }
}
