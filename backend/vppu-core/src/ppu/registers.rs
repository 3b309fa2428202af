//! GBA-style register bank, decoded from the 1 KiB I/O byte region.
//!
//! The host writes raw little-endian register bytes; the render path parses
//! the whole bank into typed values once per frame.

use crate::memory;
use crate::ppu::fixed;
use crate::ppu::{GBA_SCREEN_HEIGHT, GBA_SCREEN_WIDTH};
use std::array;
use vppu_common::define_bit_enum;
use vppu_common::num::GetBit;

// I/O register byte offsets
const DISPCNT: u32 = 0x00;
const BG0CNT: u32 = 0x08;
const BG0HOFS: u32 = 0x10;
const BG0VOFS: u32 = 0x12;
const BG2_AFFINE: u32 = 0x20;
const BG3_AFFINE: u32 = 0x30;
const WIN0H: u32 = 0x40;
const WIN0V: u32 = 0x44;
const WININ: u32 = 0x48;
const WINOUT: u32 = 0x4A;
const MOSAIC: u32 = 0x4C;
const BLDCNT: u32 = 0x50;
const BLDALPHA: u32 = 0x52;
const BLDY: u32 = 0x54;

define_bit_enum!(ObjVramMapDimensions, [Two, One]);
define_bit_enum!(BitsPerPixel, [Four, Eight]);
define_bit_enum!(AffineOverflowBehavior, [Transparent, Wrap]);

impl BitsPerPixel {
    pub fn tile_size_bytes(self) -> u32 {
        match self {
            Self::Four => 32,
            Self::Eight => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, bincode::Encode, bincode::Decode)]
pub enum ScreenSize {
    #[default]
    Zero = 0, // 256x256 text / 128x128 affine
    One = 1,   // 512x256 text / 256x256 affine
    Two = 2,   // 256x512 text / 512x512 affine
    Three = 3, // 512x512 text / 1024x1024 affine
}

impl ScreenSize {
    fn from_bits(bits: u16) -> Self {
        match bits & 3 {
            0 => Self::Zero,
            1 => Self::One,
            2 => Self::Two,
            3 => Self::Three,
            _ => unreachable!("value & 3 is always <= 3"),
        }
    }

    pub fn text_width_tiles(self) -> u32 {
        match self {
            Self::Zero | Self::Two => 32,
            Self::One | Self::Three => 64,
        }
    }

    pub fn text_height_tiles(self) -> u32 {
        match self {
            Self::Zero | Self::One => 32,
            Self::Two | Self::Three => 64,
        }
    }

    pub fn affine_size_pixels(self) -> i32 {
        match self {
            Self::Zero => 128,
            Self::One => 256,
            Self::Two => 512,
            Self::Three => 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BgControl {
    pub priority: u8,
    pub tile_data_addr: u32,
    pub mosaic: bool,
    pub bpp: BitsPerPixel,
    pub tile_map_addr: u32,
    pub affine_overflow: AffineOverflowBehavior,
    pub size: ScreenSize,
}

impl BgControl {
    fn parse(value: u16) -> Self {
        Self {
            priority: (value & 3) as u8,
            // 16 KiB character-data units
            tile_data_addr: u32::from((value >> 2) & 3) * 0x4000,
            mosaic: value.bit(6),
            bpp: BitsPerPixel::from_bit(value.bit(7)),
            // 2 KiB screen-map units
            tile_map_addr: u32::from((value >> 8) & 0x1F) * 0x800,
            affine_overflow: AffineOverflowBehavior::from_bit(value.bit(13)),
            size: ScreenSize::from_bits(value >> 14),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BgAffineParameters {
    pub a: i32,
    pub b: i32,
    pub c: i32,
    pub d: i32,
    // 20.8 fixed point, sign-extended from bit 27
    pub reference_x: i32,
    pub reference_y: i32,
}

impl Default for BgAffineParameters {
    fn default() -> Self {
        Self { a: 1 << 8, b: 0, c: 0, d: 1 << 8, reference_x: 0, reference_y: 0 }
    }
}

impl BgAffineParameters {
    fn parse(io: &[u8], base: u32) -> Self {
        Self {
            a: memory::read_i16_le(io, base).into(),
            b: memory::read_i16_le(io, base + 2).into(),
            c: memory::read_i16_le(io, base + 4).into(),
            d: memory::read_i16_le(io, base + 6).into(),
            reference_x: fixed::sign_extend_28(memory::read_u32_le(io, base + 8)),
            reference_y: fixed::sign_extend_28(memory::read_u32_le(io, base + 12)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    None = 0,
    AlphaBlending = 1,
    BrightnessIncrease = 2,
    BrightnessDecrease = 3,
}

impl BlendMode {
    fn from_bits(bits: u16) -> Self {
        match bits & 3 {
            0 => Self::None,
            1 => Self::AlphaBlending,
            2 => Self::BrightnessIncrease,
            3 => Self::BrightnessDecrease,
            _ => unreachable!("value & 3 is always <= 3"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BlendTargets {
    pub bg: [bool; 4],
    pub obj: bool,
    pub backdrop: bool,
}

impl BlendTargets {
    fn parse(bits: u16) -> Self {
        Self {
            bg: array::from_fn(|i| bits.bit(i as u8)),
            obj: bits.bit(4),
            backdrop: bits.bit(5),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BlendControl {
    pub first_target: BlendTargets,
    pub mode: BlendMode,
    pub second_target: BlendTargets,
    // Coefficients pre-clamped to 0..=16
    pub alpha_a: u32,
    pub alpha_b: u32,
    pub brightness: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowEnabled {
    pub bg: [bool; 4],
    pub obj: bool,
    pub blend: bool,
}

impl WindowEnabled {
    pub const ALL: Self = Self { bg: [true; 4], obj: true, blend: true };

    fn parse(bits: u16) -> Self {
        Self {
            bg: array::from_fn(|i| bits.bit(i as u8)),
            obj: bits.bit(4),
            blend: bits.bit(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registers {
    // DISPCNT
    pub obj_vram_map_dimensions: ObjVramMapDimensions,
    pub forced_blanking: bool,
    pub bg_enabled: [bool; 4],
    pub obj_enabled: bool,
    pub window_enabled: [bool; 2],
    pub obj_window_enabled: bool,
    // BGxCNT
    pub bg_control: [BgControl; 4],
    // BGxHOFS / BGxVOFS (9 bits each)
    pub bg_h_scroll: [u32; 4],
    pub bg_v_scroll: [u32; 4],
    // BG2/BG3 affine parameter blocks
    pub bg_affine: [BgAffineParameters; 2],
    // WINxH / WINxV
    pub window_x1: [u32; 2],
    pub window_x2: [u32; 2],
    pub window_y1: [u32; 2],
    pub window_y2: [u32; 2],
    // WININ / WINOUT
    pub window_in: [WindowEnabled; 2],
    pub window_out: WindowEnabled,
    pub obj_window: WindowEnabled,
    // MOSAIC (stored as block sizes, i.e. register value + 1)
    pub bg_mosaic_h: u32,
    pub bg_mosaic_v: u32,
    // BLDCNT / BLDALPHA / BLDY
    pub blend: BlendControl,
}

impl Registers {
    pub fn parse(io: &[u8]) -> Self {
        let dispcnt = memory::read_u16_le(io, DISPCNT);
        let mosaic = memory::read_u16_le(io, MOSAIC);
        let bldcnt = memory::read_u16_le(io, BLDCNT);
        let bldalpha = memory::read_u16_le(io, BLDALPHA);
        let bldy = memory::read_u16_le(io, BLDY);

        let registers = Self {
            obj_vram_map_dimensions: ObjVramMapDimensions::from_bit(dispcnt.bit(6)),
            forced_blanking: dispcnt.bit(7),
            bg_enabled: array::from_fn(|i| dispcnt.bit((8 + i) as u8)),
            obj_enabled: dispcnt.bit(12),
            window_enabled: [dispcnt.bit(13), dispcnt.bit(14)],
            obj_window_enabled: dispcnt.bit(15),
            bg_control: array::from_fn(|i| {
                BgControl::parse(memory::read_u16_le(io, BG0CNT + 2 * i as u32))
            }),
            bg_h_scroll: array::from_fn(|i| {
                u32::from(memory::read_u16_le(io, BG0HOFS + 4 * i as u32) & 0x1FF)
            }),
            bg_v_scroll: array::from_fn(|i| {
                u32::from(memory::read_u16_le(io, BG0VOFS + 4 * i as u32) & 0x1FF)
            }),
            bg_affine: [
                BgAffineParameters::parse(io, BG2_AFFINE),
                BgAffineParameters::parse(io, BG3_AFFINE),
            ],
            // WINxH/WINxV hold the left/top bound in the high byte and the
            // exclusive right/bottom bound in the low byte
            window_x1: array::from_fn(|i| {
                memory::read_u16_le(io, WIN0H + 2 * i as u32).to_be_bytes()[0].into()
            }),
            window_x2: array::from_fn(|i| {
                memory::read_u16_le(io, WIN0H + 2 * i as u32).to_be_bytes()[1].into()
            }),
            window_y1: array::from_fn(|i| {
                memory::read_u16_le(io, WIN0V + 2 * i as u32).to_be_bytes()[0].into()
            }),
            window_y2: array::from_fn(|i| {
                memory::read_u16_le(io, WIN0V + 2 * i as u32).to_be_bytes()[1].into()
            }),
            window_in: [
                WindowEnabled::parse(memory::read_u16_le(io, WININ)),
                WindowEnabled::parse(memory::read_u16_le(io, WININ) >> 8),
            ],
            window_out: WindowEnabled::parse(memory::read_u16_le(io, WINOUT)),
            obj_window: WindowEnabled::parse(memory::read_u16_le(io, WINOUT) >> 8),
            bg_mosaic_h: u32::from(mosaic & 0xF) + 1,
            bg_mosaic_v: u32::from((mosaic >> 4) & 0xF) + 1,
            blend: BlendControl {
                first_target: BlendTargets::parse(bldcnt),
                mode: BlendMode::from_bits(bldcnt >> 6),
                second_target: BlendTargets::parse(bldcnt >> 8),
                alpha_a: u32::from(bldalpha & 0x1F).min(16),
                alpha_b: u32::from((bldalpha >> 8) & 0x1F).min(16),
                brightness: u32::from(bldy & 0x1F).min(16),
            },
        };

        log::trace!("DISPCNT: {dispcnt:04X}");
        log::trace!("  Forced blanking: {}", registers.forced_blanking);
        log::trace!("  BGs enabled: {:?}", registers.bg_enabled);
        log::trace!("  OBJ enabled: {}", registers.obj_enabled);
        log::trace!("  Blend mode: {:?}", registers.blend.mode);

        registers
    }

    /// Whether window `w` contains the point, under the convention that a
    /// window with inverted or off-screen bounds is empty.
    pub fn window_contains(&self, w: usize, x: u32, y: u32) -> bool {
        let valid = self.window_x1[w] <= self.window_x2[w]
            && self.window_x2[w] <= GBA_SCREEN_WIDTH
            && self.window_y1[w] <= self.window_y2[w]
            && self.window_y2[w] <= GBA_SCREEN_HEIGHT;
        valid
            && (self.window_x1[w]..self.window_x2[w]).contains(&x)
            && (self.window_y1[w]..self.window_y2[w]).contains(&y)
    }

    /// Per-pixel layer enables from the highest-precedence active window, or
    /// everything when no window is active.
    pub fn window_layers_at(&self, x: u32, y: u32, obj_window_pixel: bool) -> WindowEnabled {
        let any_window =
            self.window_enabled[0] || self.window_enabled[1] || self.obj_window_enabled;
        if !any_window {
            return WindowEnabled::ALL;
        }

        for w in 0..2 {
            if self.window_enabled[w] && self.window_contains(w, x, y) {
                return self.window_in[w];
            }
        }
        if self.obj_window_enabled && obj_window_pixel {
            return self.obj_window;
        }
        self.window_out
    }
}
