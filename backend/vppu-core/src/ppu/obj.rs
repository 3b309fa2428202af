//! Sprite (OBJ) scanline evaluation.
//!
//! The 128-entry sprite table is walked last-to-first once per scanline.
//! A candidate pixel replaces the stored one when the column is empty or
//! the stored priority is not better, so at equal priority the
//! lower-indexed sprite wins.

use crate::ppu::registers::{ObjVramMapDimensions, Registers};
use crate::ppu::{GBA_SCREEN_WIDTH, colors, tiles};
use vppu_common::num::GetBit;

pub const OAM_COUNT: usize = 128;

// Sprite tile data occupies the top 32 KiB of the tile/map window
const OBJ_TILE_BASE: u32 = 0x10000;

// [shape][size] => dimensions in pixels
const OBJ_WIDTHS: [[u32; 4]; 3] = [[8, 16, 32, 64], [16, 32, 32, 64], [8, 8, 16, 32]];
const OBJ_HEIGHTS: [[u32; 4]; 3] = [[8, 16, 32, 64], [8, 8, 16, 32], [16, 32, 32, 64]];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjMode {
    Normal,
    SemiTransparent,
    ObjWindow,
    Prohibited,
}

/// One sprite's three attribute half-words.
#[derive(Debug, Clone, Copy)]
struct OamAttributes {
    attr0: u16,
    attr1: u16,
    attr2: u16,
}

impl OamAttributes {
    fn y_raw(self) -> u32 {
        u32::from(self.attr0 & 0xFF)
    }

    fn affine(self) -> bool {
        self.attr0.bit(8)
    }

    fn double_size(self) -> bool {
        self.affine() && self.attr0.bit(9)
    }

    fn hidden(self) -> bool {
        !self.affine() && self.attr0.bit(9)
    }

    fn mode(self) -> ObjMode {
        match (self.attr0 >> 10) & 3 {
            0 => ObjMode::Normal,
            1 => ObjMode::SemiTransparent,
            2 => ObjMode::ObjWindow,
            _ => ObjMode::Prohibited,
        }
    }

    fn bpp8(self) -> bool {
        self.attr0.bit(13)
    }

    fn shape(self) -> usize {
        usize::from(self.attr0 >> 14)
    }

    fn x_raw(self) -> u32 {
        u32::from(self.attr1 & 0x1FF)
    }

    fn affine_group(self) -> usize {
        usize::from((self.attr1 >> 9) & 0x1F)
    }

    fn h_flip(self) -> bool {
        !self.affine() && self.attr1.bit(12)
    }

    fn v_flip(self) -> bool {
        !self.affine() && self.attr1.bit(13)
    }

    fn size(self) -> usize {
        usize::from(self.attr1 >> 14)
    }

    fn tile_number(self) -> u32 {
        u32::from(self.attr2 & 0x3FF)
    }

    fn priority(self) -> u8 {
        ((self.attr2 >> 10) & 3) as u8
    }

    fn palette(self) -> u32 {
        u32::from(self.attr2 >> 12)
    }
}

pub fn render_obj_line(
    vram: &[u8],
    obj_palette: &[u16; 256],
    oam: &[u16; 512],
    registers: &Registers,
    line: u32,
    colors_out: &mut [u32],
    priorities_out: &mut [u8],
    semi_out: &mut [bool],
    window_out: &mut [bool],
) {
    let one_dimensional = registers.obj_vram_map_dimensions == ObjVramMapDimensions::One;

    for i in (0..OAM_COUNT).rev() {
        let attributes = OamAttributes {
            attr0: oam[4 * i],
            attr1: oam[4 * i + 1],
            attr2: oam[4 * i + 2],
        };

        if attributes.hidden() || attributes.mode() == ObjMode::Prohibited {
            continue;
        }

        let width = OBJ_WIDTHS[attributes.shape()][attributes.size()];
        let height = OBJ_HEIGHTS[attributes.shape()][attributes.size()];

        let (bounds_w, bounds_h) = if attributes.double_size() {
            (2 * width, 2 * height)
        } else {
            (width, height)
        };

        // Raw positions fold negative: y in 0..256 with values >= 160
        // wrapping behind the top, x in 0..512 with values >= 240 behind the
        // left edge
        let mut obj_y = attributes.y_raw() as i32;
        if obj_y >= 160 {
            obj_y -= 256;
        }
        if (line as i32) < obj_y || (line as i32) >= obj_y + bounds_h as i32 {
            continue;
        }

        let mut obj_x = attributes.x_raw() as i32;
        if obj_x >= 240 {
            obj_x -= 512;
        }

        let matrix = attributes.affine().then(|| {
            let group = attributes.affine_group();
            // Each matrix occupies the 4th short of 4 consecutive OAM slots
            [
                oam[group * 16 + 3] as i16,
                oam[group * 16 + 7] as i16,
                oam[group * 16 + 11] as i16,
                oam[group * 16 + 15] as i16,
            ]
        });

        let rel_y = line as i32 - obj_y - bounds_h as i32 / 2;
        let tiles_w = width / 8;

        for sx in 0..bounds_w as i32 {
            let screen_x = obj_x + sx;
            if screen_x < 0 || screen_x >= GBA_SCREEN_WIDTH as i32 {
                continue;
            }
            let screen_x = screen_x as usize;

            let (tex_x, tex_y) = if let Some([pa, pb, pc, pd]) = matrix {
                let rel_x = sx - bounds_w as i32 / 2;
                let tex_x = ((i32::from(pa) * rel_x + i32::from(pb) * rel_y) >> 8)
                    + width as i32 / 2;
                let tex_y = ((i32::from(pc) * rel_x + i32::from(pd) * rel_y) >> 8)
                    + height as i32 / 2;
                if tex_x < 0 || tex_x >= width as i32 || tex_y < 0 || tex_y >= height as i32 {
                    continue;
                }
                (tex_x as u32, tex_y as u32)
            } else {
                let tex_x = if attributes.h_flip() { width - 1 - sx as u32 } else { sx as u32 };
                let local_y = (line as i32 - obj_y) as u32;
                let tex_y = if attributes.v_flip() { height - 1 - local_y } else { local_y };
                (tex_x, tex_y)
            };

            let (tile_row, tile_col) = (tex_y / 8, tex_x / 8);
            let tile_number = if one_dimensional {
                if attributes.bpp8() {
                    attributes.tile_number() + 2 * (tile_row * tiles_w + tile_col)
                } else {
                    attributes.tile_number() + tile_row * tiles_w + tile_col
                }
            } else {
                // 2-D mapping: 32 tile slots per row
                if attributes.bpp8() {
                    attributes.tile_number() + tile_row * 32 + 2 * tile_col
                } else {
                    attributes.tile_number() + tile_row * 32 + tile_col
                }
            };

            // Sprite tiles are addressed in 32-byte units regardless of depth
            let tile_addr = OBJ_TILE_BASE + tile_number * 32;
            let color_index = if attributes.bpp8() {
                u32::from(tiles::tile_pixel_8bpp(vram, tile_addr, tex_x % 8, tex_y % 8))
            } else {
                u32::from(tiles::tile_pixel_4bpp(vram, tile_addr, tex_x % 8, tex_y % 8))
            };
            if color_index == 0 {
                continue;
            }

            if attributes.mode() == ObjMode::ObjWindow {
                window_out[screen_x] = true;
                continue;
            }

            let priority = attributes.priority();
            if colors_out[screen_x] != 0 && priorities_out[screen_x] < priority {
                continue;
            }

            let palette_index = if attributes.bpp8() {
                color_index
            } else {
                attributes.palette() * 16 + color_index
            };
            colors_out[screen_x] =
                colors::rgb555_to_rgba8888(obj_palette[palette_index as usize]);
            priorities_out[screen_x] = priority;
            semi_out[screen_x] = attributes.mode() == ObjMode::SemiTransparent;
        }
    }
}
