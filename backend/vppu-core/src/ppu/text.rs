//! Text (tile-and-scroll) background scanline rendering.

use crate::memory;
use crate::ppu::registers::{BitsPerPixel, Registers};
use crate::ppu::{GBA_SCREEN_WIDTH, colors, fixed, tiles};
use vppu_common::num::GetBit;

/// One 16-bit text background tilemap entry.
#[derive(Debug, Clone, Copy)]
pub struct TilemapEntry(pub u16);

impl TilemapEntry {
    pub fn tile_number(self) -> u32 {
        u32::from(self.0 & 0x3FF)
    }

    pub fn h_flip(self) -> bool {
        self.0.bit(10)
    }

    pub fn v_flip(self) -> bool {
        self.0.bit(11)
    }

    pub fn palette(self) -> u32 {
        u32::from(self.0 >> 12)
    }
}

/// Render one scanline of a text BG into the layer's color and priority
/// buffers. Transparent columns are left untouched.
pub fn render_text_bg_line(
    vram: &[u8],
    bg_palette: &[u16; 256],
    registers: &Registers,
    bg: usize,
    line: u32,
    colors_out: &mut [u32],
    priorities_out: &mut [u8],
) {
    let control = registers.bg_control[bg];
    let map_width_pixels = control.size.text_width_tiles() * 8;
    let map_height_pixels = control.size.text_height_tiles() * 8;

    let (mosaic_h, mosaic_v) = if control.mosaic {
        (registers.bg_mosaic_h, registers.bg_mosaic_v)
    } else {
        (1, 1)
    };

    let src_y = (fixed::mosaic_floor(line, mosaic_v) + registers.bg_v_scroll[bg])
        % map_height_pixels;
    let tile_row = src_y / 8;
    let pixel_y = src_y % 8;

    for x in 0..GBA_SCREEN_WIDTH {
        let src_x =
            (fixed::mosaic_floor(x, mosaic_h) + registers.bg_h_scroll[bg]) % map_width_pixels;
        let tile_col = src_x / 8;
        let pixel_x = src_x % 8;

        let entry = TilemapEntry(memory::read_u16_le(
            vram,
            tilemap_entry_addr(control.tile_map_addr, control.size.text_width_tiles(), tile_col, tile_row),
        ));

        let tx = if entry.h_flip() { 7 - pixel_x } else { pixel_x };
        let ty = if entry.v_flip() { 7 - pixel_y } else { pixel_y };

        let tile_addr =
            control.tile_data_addr + entry.tile_number() * control.bpp.tile_size_bytes();
        let color_index = match control.bpp {
            BitsPerPixel::Four => u32::from(tiles::tile_pixel_4bpp(vram, tile_addr, tx, ty)),
            BitsPerPixel::Eight => u32::from(tiles::tile_pixel_8bpp(vram, tile_addr, tx, ty)),
        };
        if color_index == 0 {
            continue;
        }

        let palette_index = match control.bpp {
            BitsPerPixel::Four => entry.palette() * 16 + color_index,
            BitsPerPixel::Eight => color_index,
        };
        colors_out[x as usize] = colors::rgb555_to_rgba8888(bg_palette[palette_index as usize]);
        priorities_out[x as usize] = control.priority;
    }
}

/// Byte address of a tilemap entry under screen-block tiling: the map is
/// partitioned into 32x32-tile blocks of 2 KiB each, packed row-major.
fn tilemap_entry_addr(map_base: u32, map_width_tiles: u32, tile_col: u32, tile_row: u32) -> u32 {
    let screen_block = (tile_col / 32) + (tile_row / 32) * (map_width_tiles / 32);
    map_base + screen_block * 0x800 + 2 * ((tile_row % 32) * 32 + (tile_col % 32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ppu::GBA_VRAM_LEN;

    fn registers_with_bg0(bgcnt: u16, hofs: u16, vofs: u16) -> Registers {
        let mut io = vec![0; 0x400];
        io[0x08..0x0A].copy_from_slice(&bgcnt.to_le_bytes());
        io[0x10..0x12].copy_from_slice(&hofs.to_le_bytes());
        io[0x12..0x14].copy_from_slice(&vofs.to_le_bytes());
        Registers::parse(&io)
    }

    fn render_line(vram: &[u8], palette: &[u16; 256], registers: &Registers, line: u32) -> Vec<u32> {
        let mut colors_out = vec![0; GBA_SCREEN_WIDTH as usize];
        let mut priorities_out = vec![0; GBA_SCREEN_WIDTH as usize];
        render_text_bg_line(vram, palette, registers, 0, line, &mut colors_out, &mut priorities_out);
        colors_out
    }

    #[test]
    fn screen_block_addressing() {
        // 64x64-tile map: block 1 starts at tile column 32, block 2 at row 32
        assert_eq!(tilemap_entry_addr(0, 64, 0, 0), 0);
        assert_eq!(tilemap_entry_addr(0, 64, 32, 0), 0x800);
        assert_eq!(tilemap_entry_addr(0, 64, 0, 32), 0x1000);
        assert_eq!(tilemap_entry_addr(0, 64, 33, 33), 0x1800 + 2 * (1 * 32 + 1));
        // 32x64 map has a single block per row of blocks
        assert_eq!(tilemap_entry_addr(0, 32, 0, 32), 0x800);
    }

    #[test]
    fn scroll_is_periodic_in_map_size() {
        let mut vram = vec![0_u8; GBA_VRAM_LEN];
        // Pseudo-random 4bpp tile data and tilemap
        for (i, byte) in vram.iter_mut().take(0x4000).enumerate() {
            *byte = (i as u8).wrapping_mul(31).wrapping_add(7);
        }
        let mut palette = [0_u16; 256];
        for (i, color) in palette.iter_mut().enumerate() {
            *color = (i as u16) * 97;
        }

        // 32x32 map (256 pixels wide), screen base 2
        let baseline = render_line(&vram, &palette, &registers_with_bg0(2 << 8, 5, 3), 17);
        let shifted_x = render_line(&vram, &palette, &registers_with_bg0(2 << 8, 5 + 256, 3), 17);
        assert_eq!(baseline, shifted_x);
    }

    #[test]
    fn h_flip_is_an_involution() {
        let mut vram = vec![0_u8; GBA_VRAM_LEN];
        vram[0x800] = 0x01; // map entry (0,0): tile 1, no flip
        for (i, byte) in vram[0x20..0x40].iter_mut().enumerate() {
            *byte = i as u8 | 0x11;
        }
        let mut palette = [0_u16; 256];
        for (i, color) in palette.iter_mut().enumerate() {
            *color = i as u16;
        }

        let registers = registers_with_bg0(1 << 8, 0, 0);
        let baseline = render_line(&vram, &palette, &registers, 0);

        // Toggling hflip twice must render identically
        let mut flipped = vram.clone();
        flipped[0x801] = 0x04; // set bit 10
        let once = render_line(&flipped, &palette, &registers, 0);
        assert_ne!(baseline[..8], once[..8]);

        let twice = render_line(&vram, &palette, &registers, 0);
        assert_eq!(baseline, twice);
    }

    #[test]
    fn character_base_past_vram_is_transparent() {
        let mut vram = vec![0_u8; GBA_VRAM_LEN];
        vram[0x800] = 0x01;
        let palette = [0x7FFF_u16; 256];
        // Character base pointing past the end of the region
        let mut registers = registers_with_bg0(1 << 8, 0, 0);
        registers.bg_control[0].tile_data_addr = 0x20000;
        let line = render_line(&vram, &palette, &registers, 0);
        assert!(line.iter().all(|&color| color == 0));
    }
}
