//! Affine (rotation/scaling) background scanline rendering.
//!
//! The texture cursor starts at the 20.8 reference point advanced by the
//! matrix column for the current line, then steps by (pa, pc) per output
//! pixel. Affine tilemaps are flat arrays of 8-bit tile indices and tile
//! data is always 8 bpp.

use crate::memory;
use crate::ppu::registers::{AffineOverflowBehavior, Registers};
use crate::ppu::{GBA_SCREEN_WIDTH, colors, fixed, tiles};

pub fn render_affine_bg_line(
    vram: &[u8],
    bg_palette: &[u16; 256],
    registers: &Registers,
    bg: usize,
    line: u32,
    colors_out: &mut [u32],
    priorities_out: &mut [u8],
) {
    debug_assert!(bg == 2 || bg == 3);

    let control = registers.bg_control[bg];
    let parameters = registers.bg_affine[bg - 2];
    let map_size = control.size.affine_size_pixels();
    let map_tiles = (map_size / 8) as u32;

    let mut tx = parameters.reference_x + parameters.b * line as i32;
    let mut ty = parameters.reference_y + parameters.d * line as i32;

    for x in 0..GBA_SCREEN_WIDTH {
        let mut src_x = fixed::to_int(tx);
        let mut src_y = fixed::to_int(ty);
        tx += parameters.a;
        ty += parameters.c;

        match control.affine_overflow {
            AffineOverflowBehavior::Wrap => {
                src_x = fixed::wrap(src_x, map_size);
                src_y = fixed::wrap(src_y, map_size);
            }
            AffineOverflowBehavior::Transparent => {
                if src_x < 0 || src_x >= map_size || src_y < 0 || src_y >= map_size {
                    continue;
                }
            }
        }

        let (src_x, src_y) = (src_x as u32, src_y as u32);
        let map_addr = control.tile_map_addr + (src_y / 8) * map_tiles + (src_x / 8);
        let tile_number = u32::from(memory::read_u8(vram, map_addr));

        let tile_addr = control.tile_data_addr + tile_number * 64;
        let color_index = tiles::tile_pixel_8bpp(vram, tile_addr, src_x % 8, src_y % 8);
        if color_index == 0 {
            continue;
        }

        colors_out[x as usize] = colors::rgb555_to_rgba8888(bg_palette[color_index as usize]);
        priorities_out[x as usize] = control.priority;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ppu::GBA_VRAM_LEN;
    use crate::ppu::text::render_text_bg_line;

    #[test]
    fn identity_matrix_matches_text_rendering() {
        // An identity-transform affine BG must render exactly like an 8bpp
        // text BG with zero scroll over a single-screen-block map
        let mut vram = vec![0_u8; GBA_VRAM_LEN];
        let mut palette = [0_u16; 256];
        for (i, color) in palette.iter_mut().enumerate() {
            *color = (i as u16).wrapping_mul(211);
        }

        // Affine map at 0x800: 16x16 tiles of 8-bit indices 0..16
        for i in 0..256 {
            vram[0x800 + i] = (i % 16) as u8;
        }
        // Text map at 0x1000: same tiles as 16-bit entries in a 32x32 map
        for i in 0..256 {
            let entry = ((i % 16) as u16).to_le_bytes();
            let row = i / 16;
            let col = i % 16;
            let addr = 0x1000 + 2 * (row * 32 + col);
            vram[addr..addr + 2].copy_from_slice(&entry);
        }
        // 8bpp tile data: tile t pixel (x, y) = t + x + y, truncated
        for t in 0..16_usize {
            for y in 0..8 {
                for x in 0..8 {
                    vram[64 * t + 8 * y + x] = ((t + x + y) % 256) as u8;
                }
            }
        }

        let mut io = vec![0; 0x400];
        // BG2: affine 128x128, screen base 1, wrap
        let bg2cnt: u16 = (1 << 8) | (1 << 13);
        io[0x0C..0x0E].copy_from_slice(&bg2cnt.to_le_bytes());
        // BG1: text 8bpp, screen base 2
        let bg1cnt: u16 = (1 << 7) | (2 << 8);
        io[0x0A..0x0C].copy_from_slice(&bg1cnt.to_le_bytes());
        // Identity matrix, reference point at origin
        io[0x20..0x22].copy_from_slice(&0x0100_u16.to_le_bytes());
        io[0x26..0x28].copy_from_slice(&0x0100_u16.to_le_bytes());
        let registers = Registers::parse(&io);

        for line in [0, 7, 63, 127] {
            let mut affine_colors = vec![0; GBA_SCREEN_WIDTH as usize];
            let mut affine_pri = vec![0xFF; GBA_SCREEN_WIDTH as usize];
            render_affine_bg_line(
                &vram,
                &palette,
                &registers,
                2,
                line,
                &mut affine_colors,
                &mut affine_pri,
            );

            let mut text_colors = vec![0; GBA_SCREEN_WIDTH as usize];
            let mut text_pri = vec![0xFF; GBA_SCREEN_WIDTH as usize];
            render_text_bg_line(
                &vram,
                &palette,
                &registers,
                1,
                line,
                &mut text_colors,
                &mut text_pri,
            );

            // Compare across the affine map width; the affine BG wraps at 128
            assert_eq!(affine_colors[..128], text_colors[..128], "line {line}");
        }
    }

    #[test]
    fn out_of_range_clips_to_transparent() {
        let mut vram = vec![0_u8; GBA_VRAM_LEN];
        vram[0x800] = 1;
        for byte in &mut vram[64..128] {
            *byte = 5;
        }
        let palette = [0x7FFF_u16; 256];

        let mut io = vec![0; 0x400];
        let bg2cnt: u16 = 1 << 8; // 128x128, clip
        io[0x0C..0x0E].copy_from_slice(&bg2cnt.to_le_bytes());
        io[0x20..0x22].copy_from_slice(&0x0100_u16.to_le_bytes());
        io[0x26..0x28].copy_from_slice(&0x0100_u16.to_le_bytes());
        // Reference X = -16 pixels
        io[0x28..0x2C].copy_from_slice(&((-16_i32) << 8).to_le_bytes());
        let registers = Registers::parse(&io);

        let mut colors_out = vec![0; GBA_SCREEN_WIDTH as usize];
        let mut priorities_out = vec![0xFF; GBA_SCREEN_WIDTH as usize];
        render_affine_bg_line(
            &vram,
            &palette,
            &registers,
            2,
            0,
            &mut colors_out,
            &mut priorities_out,
        );

        // The first 16 columns sample outside the map and stay transparent
        assert!(colors_out[..16].iter().all(|&color| color == 0));
        assert_ne!(colors_out[16], 0);
    }
}
