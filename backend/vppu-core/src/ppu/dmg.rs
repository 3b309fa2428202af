//! DMG-style monochrome pipeline (mode 7).
//!
//! Reads a Game Boy memory image laid out at the start of VRAM: 8 KiB of
//! tile/map bytes, a 160-byte sprite table, then 8 register bytes. Output
//! is 160x144 with the fixed four-shade palette.

use crate::memory;
use crate::ppu::{DMG_SCREEN_WIDTH, colors, tiles};
use vppu_common::frontend::Color;
use vppu_common::num::GetBit;

pub const VRAM_OFFSET: u32 = 0;
pub const OAM_OFFSET: u32 = 0x2000;
pub const OAM_LEN: u32 = 0xA0;
pub const REGS_OFFSET: u32 = 0x20A0;

const MAX_SPRITES_PER_LINE: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct DmgRegisters {
    pub lcdc: LcdControl,
    pub scy: u8,
    pub scx: u8,
    pub bgp: u8,
    pub obp0: u8,
    pub obp1: u8,
    pub wy: u8,
    pub wx: u8,
}

impl DmgRegisters {
    pub fn parse(vram: &[u8]) -> Self {
        Self {
            lcdc: LcdControl::from_byte(memory::read_u8(vram, REGS_OFFSET)),
            scy: memory::read_u8(vram, REGS_OFFSET + 1),
            scx: memory::read_u8(vram, REGS_OFFSET + 2),
            bgp: memory::read_u8(vram, REGS_OFFSET + 3),
            obp0: memory::read_u8(vram, REGS_OFFSET + 4),
            obp1: memory::read_u8(vram, REGS_OFFSET + 5),
            wy: memory::read_u8(vram, REGS_OFFSET + 6),
            wx: memory::read_u8(vram, REGS_OFFSET + 7),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LcdControl {
    pub enabled: bool,
    pub window_tile_map_high: bool,
    pub window_enabled: bool,
    pub tile_data_8000: bool,
    pub bg_tile_map_high: bool,
    pub double_height_sprites: bool,
    pub obj_enabled: bool,
    pub bg_enabled: bool,
}

impl LcdControl {
    fn from_byte(value: u8) -> Self {
        Self {
            enabled: value.bit(7),
            window_tile_map_high: value.bit(6),
            window_enabled: value.bit(5),
            tile_data_8000: value.bit(4),
            bg_tile_map_high: value.bit(3),
            double_height_sprites: value.bit(2),
            obj_enabled: value.bit(1),
            bg_enabled: value.bit(0),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SpriteCandidate {
    x: u8,
    tile: u8,
    attributes: u8,
    line: u8,
}

/// Read a byte through Game Boy VRAM addressing ($8000-$9FFF).
fn vram_read(vram: &[u8], address: u16) -> u8 {
    if !(0x8000..0xA000).contains(&address) {
        return 0;
    }
    memory::read_u8(vram, VRAM_OFFSET + u32::from(address - 0x8000))
}

fn oam_read(vram: &[u8], index: u32) -> u8 {
    memory::read_u8(vram, OAM_OFFSET + index)
}

/// Fetch the 2-bit color id of a background or window pixel.
fn fetch_tile_color(
    vram: &[u8],
    tile_map_base: u16,
    tile_data_8000: bool,
    x: u8,
    y: u8,
) -> u8 {
    let map_index = u16::from(y / 8) * 32 + u16::from(x / 8);
    let tile_index = vram_read(vram, tile_map_base + map_index);

    // With the $8800 addressing mode, tile indices are signed around $9000
    let tile_addr = if tile_data_8000 {
        0x8000 + u16::from(tile_index) * 16
    } else {
        (0x9000_i32 + i32::from(tile_index as i8) * 16) as u16
    };

    let row_addr = tile_addr + u16::from(y % 8) * 2;
    let low = vram_read(vram, row_addr);
    let high = vram_read(vram, row_addr + 1);
    tiles::bitplane_pixel(low, high, u32::from(x % 8))
}

/// Collect up to 10 sprites overlapping the scanline, ordered by (x, OAM
/// index) so the leftmost sprite wins overlaps.
fn scan_sprites(vram: &[u8], line: u8, sprite_height: u8) -> Vec<SpriteCandidate> {
    let mut candidates = Vec::with_capacity(MAX_SPRITES_PER_LINE);

    for i in 0..(OAM_LEN / 4) {
        let y = oam_read(vram, 4 * i);
        let x = oam_read(vram, 4 * i + 1);
        let tile = oam_read(vram, 4 * i + 2);
        let attributes = oam_read(vram, 4 * i + 3);

        let sprite_top = i16::from(y) - 16;
        if i16::from(line) < sprite_top || i16::from(line) >= sprite_top + i16::from(sprite_height)
        {
            continue;
        }
        if x == 0 || x >= 168 {
            continue;
        }

        let mut sprite_line = (i16::from(line) - sprite_top) as u8;
        if attributes.bit(6) {
            sprite_line = sprite_height - 1 - sprite_line;
        }

        candidates.push(SpriteCandidate { x, tile, attributes, line: sprite_line });
    }

    // Leftmost sprite wins overlaps, OAM index breaks ties; at most 10
    // sprites survive per line
    candidates.sort_by_key(|candidate| candidate.x);
    candidates.truncate(MAX_SPRITES_PER_LINE);
    candidates
}

fn sprite_pixel(vram: &[u8], candidate: SpriteCandidate, pixel_x: u8, sprite_height: u8) -> u8 {
    let x = if candidate.attributes.bit(5) { 7 - pixel_x } else { pixel_x };

    let mut tile = candidate.tile;
    let mut line = candidate.line;
    if sprite_height == 16 {
        tile = (tile & 0xFE) | u8::from(line >= 8);
        line &= 0x07;
    }

    let row_addr = 0x8000 + u16::from(tile) * 16 + u16::from(line) * 2;
    let low = vram_read(vram, row_addr);
    let high = vram_read(vram, row_addr + 1);
    tiles::bitplane_pixel(low, high, u32::from(x))
}

pub fn render_dmg_line(vram: &[u8], registers: &DmgRegisters, line: u32, fb_row: &mut [Color]) {
    let lcdc = registers.lcdc;
    let line = line as u8;

    let sprite_height = if lcdc.double_height_sprites { 16 } else { 8 };
    let sprites = if lcdc.obj_enabled {
        scan_sprites(vram, line, sprite_height)
    } else {
        Vec::new()
    };

    for x in 0..DMG_SCREEN_WIDTH as u8 {
        let mut bg_color_id = 0;

        if lcdc.bg_enabled {
            let bg_map: u16 = if lcdc.bg_tile_map_high { 0x9C00 } else { 0x9800 };
            bg_color_id = fetch_tile_color(
                vram,
                bg_map,
                lcdc.tile_data_8000,
                x.wrapping_add(registers.scx),
                line.wrapping_add(registers.scy),
            );

            // The window overlays the background from (WX-7, WY) onward
            if lcdc.window_enabled && registers.wy <= line && registers.wx <= 166 {
                let window_left = registers.wx.saturating_sub(7);
                if x >= window_left {
                    let window_map: u16 =
                        if lcdc.window_tile_map_high { 0x9C00 } else { 0x9800 };
                    bg_color_id = fetch_tile_color(
                        vram,
                        window_map,
                        lcdc.tile_data_8000,
                        x - window_left,
                        line - registers.wy,
                    );
                }
            }
        }

        let bg_color = colors::dmg_shade(registers.bgp, bg_color_id);
        let mut final_color = bg_color;

        for candidate in &sprites {
            let sprite_left = i16::from(candidate.x) - 8;
            if i16::from(x) < sprite_left || i16::from(x) >= sprite_left + 8 {
                continue;
            }

            let color_id =
                sprite_pixel(vram, *candidate, (i16::from(x) - sprite_left) as u8, sprite_height);
            if color_id == 0 {
                continue;
            }

            // Attribute bit 7 puts the sprite behind non-zero BG colors
            if !(candidate.attributes.bit(7) && bg_color_id != 0) {
                let palette =
                    if candidate.attributes.bit(4) { registers.obp1 } else { registers.obp0 };
                final_color = colors::dmg_shade(palette, color_id);
            }
            break;
        }

        fb_row[x as usize] = colors::word_to_color(final_color);
    }
}

/// Fill value for a disabled LCD: shade 0 through the background palette.
pub fn disabled_fill(registers: &DmgRegisters) -> Color {
    colors::word_to_color(colors::dmg_shade(registers.bgp, 0))
}
