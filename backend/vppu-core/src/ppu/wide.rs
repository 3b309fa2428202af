//! Wide-background superset pipeline (mode 0).
//!
//! Up to four wide backgrounds with 32-bit tilemap entries and per-tile
//! priority, per-line scroll and affine tables, 512 sprites, RGB888 palette
//! banks, and SNES-style color math. All state lives in a fixed record at
//! the start of VRAM (see [`layout`]).

pub mod layout;

use crate::ppu::compose::{brighten, darken, per_channel, per_channel2};
use crate::ppu::wide::layout::{ColorMathMode, TileEntry, WideBg, WideRegisters, WideSprite};
use crate::ppu::{LineBuffers, colors, fixed, tiles};
use std::array;

pub(crate) struct FrameRegisters {
    pub regs: WideRegisters,
    pub bgs: [WideBg; 4],
    // BG indices front-to-back by (layer priority, index)
    pub order: [usize; 4],
}

impl FrameRegisters {
    pub fn parse(vram: &[u8]) -> Self {
        let regs = WideRegisters::parse(vram);
        let bgs: [WideBg; 4] = array::from_fn(|i| WideBg::parse(vram, i));
        let mut order = [0, 1, 2, 3];
        order.sort_by_key(|&i| (bgs[i].layer_priority, i));
        Self { regs, bgs, order }
    }

    fn windows_active(&self) -> bool {
        self.regs.windows[0].enabled
            || self.regs.windows[1].enabled
            || self.regs.obj_window_enabled
    }
}

pub(crate) fn render_wide_line(
    vram: &[u8],
    frame: &FrameRegisters,
    width: u32,
    line: u32,
    buffers: &mut LineBuffers,
    fb_row: &mut [vppu_common::frontend::Color],
) {
    // Skipping blocks hidden behind an opaque upper layer is only valid
    // when nothing can reach through it
    let allow_block_skip =
        frame.regs.color_math.mode == ColorMathMode::Off && !frame.windows_active();
    let mut opaque_mask = 0_u64;

    for &bg in &frame.order {
        let control = &frame.bgs[bg];
        if !control.enabled()
            || frame.regs.master_enable & (1 << bg) == 0
            || usize::from(control.palette_bank) >= layout::PALETTE_BANKS
        {
            continue;
        }

        let colors_row = &mut buffers.bg[bg];
        let priorities_row = &mut buffers.bg_priority[bg];
        if control.flags & layout::BG_AFFINE != 0 {
            render_affine_bg_line(
                vram,
                control,
                bg,
                line,
                width,
                colors_row,
                priorities_row,
                &mut opaque_mask,
                allow_block_skip,
            );
        } else {
            render_text_bg_line(
                vram,
                control,
                bg,
                line,
                width,
                colors_row,
                priorities_row,
                &mut opaque_mask,
                allow_block_skip,
            );
        }
    }

    if frame.regs.master_enable & layout::LAYER_OBJ != 0 {
        render_obj_line(vram, width, line, buffers);
    }

    compose_line(frame, width, line, buffers, fb_row);
}

fn tile_data_region(vram: &[u8]) -> &[u8] {
    let start = layout::TILE_DATA_ADDR as usize;
    vram.get(start..start + layout::TILE_DATA_LEN).unwrap_or(&[])
}

fn map_entry(vram: &[u8], control: &WideBg, bg: usize, map_x: u32, map_y: u32) -> Option<TileEntry> {
    let index = map_y / 8 * u32::from(control.map_width_tiles) + map_x / 8;
    (index < layout::TILEMAP_ENTRIES_PER_BG as u32)
        .then(|| layout::tilemap_entry(vram, bg, index))
}

/// Decode one pixel of a tilemap entry; 0 means transparent.
fn entry_pixel(
    vram: &[u8],
    tile_data: &[u8],
    control: &WideBg,
    entry: TileEntry,
    sub_x: u32,
    sub_y: u32,
) -> u32 {
    let tx = if entry.h_flip() { 7 - sub_x } else { sub_x };
    let ty = if entry.v_flip() { 7 - sub_y } else { sub_y };

    let tile_index = u32::from(control.tile_base) + entry.tile();
    let bank = u32::from(control.palette_bank);
    if control.bpp8() {
        let color_index = tiles::tile_pixel_8bpp(tile_data, tile_index * 64, tx, ty);
        if color_index == 0 {
            return 0;
        }
        layout::palette_color(vram, bank, color_index.into())
    } else {
        let color_index = tiles::tile_pixel_4bpp(tile_data, tile_index * 32, tx, ty);
        if color_index == 0 {
            return 0;
        }
        layout::palette_color(vram, bank, (entry.palette() & 0x0F) * 16 + u32::from(color_index))
    }
}

#[allow(clippy::too_many_arguments)]
fn render_text_bg_line(
    vram: &[u8],
    control: &WideBg,
    bg: usize,
    line: u32,
    width: u32,
    colors_row: &mut [u32],
    priorities_row: &mut [u8],
    opaque_mask: &mut u64,
    allow_block_skip: bool,
) {
    let tile_data = tile_data_region(vram);
    let map_w = u32::from(control.map_width_tiles) * 8;
    let map_h = u32::from(control.map_height_tiles) * 8;
    let (line_scroll_x, line_scroll_y) = layout::line_scroll(vram, bg, line);
    let scroll_x = i32::from(control.scroll_x) + line_scroll_x;
    let scroll_y = i32::from(control.scroll_y) + line_scroll_y;

    let wrap_x = control.flags & layout::BG_WRAP_X != 0;
    let wrap_y = control.flags & layout::BG_WRAP_Y != 0;
    let bg_mosaic = control.flags & layout::BG_MOSAIC != 0;
    let (mosaic_x, mosaic_y) = (u32::from(control.mosaic_x), u32::from(control.mosaic_y));

    let map_coord = |screen: u32, scroll: i32, size: u32, wraps: bool| -> Option<u32> {
        let coord = screen as i32 + scroll;
        if wraps {
            Some(fixed::wrap(coord, size as i32) as u32)
        } else {
            (coord >= 0 && (coord as u32) < size).then_some(coord as u32)
        }
    };

    for block in 0..width.div_ceil(32) {
        if allow_block_skip && block < 64 && *opaque_mask & (1 << block) != 0 {
            continue;
        }

        let x0 = block * 32;
        let count = 32.min(width - x0);
        let mut all_opaque = true;

        for x in x0..x0 + count {
            let (mut screen_x, mut screen_y) = if bg_mosaic {
                (fixed::mosaic_floor(x, mosaic_x), fixed::mosaic_floor(line, mosaic_y))
            } else {
                (x, line)
            };

            let Some(my) = map_coord(screen_y, scroll_y, map_h, wrap_y) else {
                all_opaque = false;
                continue;
            };
            let Some(mx) = map_coord(screen_x, scroll_x, map_w, wrap_x) else {
                all_opaque = false;
                continue;
            };
            let Some(mut entry) = map_entry(vram, control, bg, mx, my) else {
                all_opaque = false;
                continue;
            };

            // A tile's mosaic bit pixelates it even without the BG-level flag
            let (mut mx, mut my) = (mx, my);
            if !bg_mosaic && entry.mosaic() && (mosaic_x > 1 || mosaic_y > 1) {
                screen_x = fixed::mosaic_floor(x, mosaic_x);
                screen_y = fixed::mosaic_floor(line, mosaic_y);
                if let (Some(fx), Some(fy)) = (
                    map_coord(screen_x, scroll_x, map_w, wrap_x),
                    map_coord(screen_y, scroll_y, map_h, wrap_y),
                ) && let Some(floored) = map_entry(vram, control, bg, fx, fy)
                {
                    entry = floored;
                    (mx, my) = (fx, fy);
                }
            }

            let color = entry_pixel(vram, tile_data, control, entry, mx % 8, my % 8);
            if color == 0 {
                all_opaque = false;
                continue;
            }
            colors_row[x as usize] = color;
            priorities_row[x as usize] = entry.priority();
        }

        if block < 64 && all_opaque && count == 32 {
            *opaque_mask |= 1 << block;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn render_affine_bg_line(
    vram: &[u8],
    control: &WideBg,
    bg: usize,
    line: u32,
    width: u32,
    colors_row: &mut [u32],
    priorities_row: &mut [u8],
    opaque_mask: &mut u64,
    allow_block_skip: bool,
) {
    let tile_data = tile_data_region(vram);
    let map_w = i32::from(control.map_width_tiles) * 8;
    let map_h = i32::from(control.map_height_tiles) * 8;
    let [a, b, c, d] = control.matrix.map(i32::from);

    // The per-line table, when enabled, replaces the line's texture origin
    let (mut cursor_x, mut cursor_y) = if control.flags & layout::BG_LINE_AFFINE != 0 {
        layout::line_affine(vram, bg, line)
    } else {
        (control.tx + b * line as i32, control.ty + d * line as i32)
    };

    let wrap_x = control.flags & layout::BG_WRAP_X != 0;
    let wrap_y = control.flags & layout::BG_WRAP_Y != 0;

    for block in 0..width.div_ceil(32) {
        let x0 = block * 32;
        let count = 32.min(width - x0);

        if allow_block_skip && block < 64 && *opaque_mask & (1 << block) != 0 {
            cursor_x += a * count as i32;
            cursor_y += c * count as i32;
            continue;
        }

        let mut all_opaque = true;
        for x in x0..x0 + count {
            let mut src_x = fixed::to_int(cursor_x);
            let mut src_y = fixed::to_int(cursor_y);
            cursor_x += a;
            cursor_y += c;

            if wrap_x {
                src_x = fixed::wrap(src_x, map_w);
            } else if src_x < 0 || src_x >= map_w {
                all_opaque = false;
                continue;
            }
            if wrap_y {
                src_y = fixed::wrap(src_y, map_h);
            } else if src_y < 0 || src_y >= map_h {
                all_opaque = false;
                continue;
            }

            let (src_x, src_y) = (src_x as u32, src_y as u32);
            let Some(entry) = map_entry(vram, control, bg, src_x, src_y) else {
                all_opaque = false;
                continue;
            };
            let color = entry_pixel(vram, tile_data, control, entry, src_x % 8, src_y % 8);
            if color == 0 {
                all_opaque = false;
                continue;
            }
            colors_row[x as usize] = color;
            priorities_row[x as usize] = entry.priority();
        }

        if block < 64 && all_opaque && count == 32 {
            *opaque_mask |= 1 << block;
        }
    }
}

fn render_obj_line(vram: &[u8], width: u32, line: u32, buffers: &mut LineBuffers) {
    let tile_data = tile_data_region(vram);

    for i in (0..layout::OAM_COUNT).rev() {
        let sprite = WideSprite::parse(vram, i);
        if !sprite.flag(layout::OBJ_ENABLED) {
            continue;
        }

        let sprite_w = u32::from(sprite.width_blocks) * 8;
        let sprite_h = u32::from(sprite.height_blocks) * 8;
        if sprite_w == 0 || sprite_h == 0 {
            continue;
        }

        let affine = sprite.flag(layout::OBJ_AFFINE);
        let (bounds_w, bounds_h) = if affine && sprite.flag(layout::OBJ_DOUBLE_SIZE) {
            (2 * sprite_w, 2 * sprite_h)
        } else {
            (sprite_w, sprite_h)
        };

        let (obj_x, obj_y) = (i32::from(sprite.x), i32::from(sprite.y));
        if (line as i32) < obj_y || (line as i32) >= obj_y + bounds_h as i32 {
            continue;
        }

        let matrix = affine
            .then(|| layout::obj_affine_matrix(vram, usize::from(sprite.affine_index) % layout::OBJ_AFFINE_COUNT));
        let rel_y = line as i32 - obj_y - bounds_h as i32 / 2;

        let bank = u32::from(sprite.palette >> 8) & 0x07;
        if bank as usize >= layout::PALETTE_BANKS {
            continue;
        }
        let palette_group = u32::from(sprite.palette) & 0x0F;
        let bpp8 = sprite.flag(layout::OBJ_BPP8);

        for sx in 0..bounds_w as i32 {
            let screen_x = obj_x + sx;
            if screen_x < 0 || screen_x >= width as i32 {
                continue;
            }
            let screen_x = screen_x as usize;

            let (tex_x, tex_y) = if let Some([pa, pb, pc, pd]) = matrix {
                let rel_x = sx - bounds_w as i32 / 2;
                let tex_x = ((i32::from(pa) * rel_x + i32::from(pb) * rel_y) >> 8)
                    + sprite_w as i32 / 2;
                let tex_y = ((i32::from(pc) * rel_x + i32::from(pd) * rel_y) >> 8)
                    + sprite_h as i32 / 2;
                if tex_x < 0 || tex_x >= sprite_w as i32 || tex_y < 0 || tex_y >= sprite_h as i32 {
                    continue;
                }
                (tex_x as u32, tex_y as u32)
            } else {
                let tex_x = if sprite.flag(layout::OBJ_HFLIP) {
                    sprite_w - 1 - sx as u32
                } else {
                    sx as u32
                };
                let local_y = (line as i32 - obj_y) as u32;
                let tex_y = if sprite.flag(layout::OBJ_VFLIP) {
                    sprite_h - 1 - local_y
                } else {
                    local_y
                };
                (tex_x, tex_y)
            };

            let tile_index =
                u32::from(sprite.tile) + tex_y / 8 * u32::from(sprite.width_blocks) + tex_x / 8;
            let color_index = if bpp8 {
                u32::from(tiles::tile_pixel_8bpp(tile_data, tile_index * 64, tex_x % 8, tex_y % 8))
            } else {
                u32::from(tiles::tile_pixel_4bpp(tile_data, tile_index * 32, tex_x % 8, tex_y % 8))
            };
            if color_index == 0 {
                continue;
            }

            if sprite.flag(layout::OBJ_WINDOW) {
                buffers.obj_window[screen_x] = true;
                continue;
            }

            if buffers.obj[screen_x] != 0 && buffers.obj_priority[screen_x] < sprite.priority {
                continue;
            }

            let palette_index = if bpp8 { color_index } else { palette_group * 16 + color_index };
            buffers.obj[screen_x] = layout::palette_color(vram, bank, palette_index);
            buffers.obj_priority[screen_x] = sprite.priority;
            buffers.obj_semi[screen_x] = sprite.flag(layout::OBJ_SEMI_TRANSPARENT);
        }
    }
}

fn compose_line(
    frame: &FrameRegisters,
    width: u32,
    line: u32,
    buffers: &LineBuffers,
    fb_row: &mut [vppu_common::frontend::Color],
) {
    let regs = &frame.regs;
    let math = &regs.color_math;
    let [br, bg_chan, bb] = regs.backdrop;
    let backdrop =
        0xFF00_0000 | (u32::from(bb) << 16) | (u32::from(bg_chan) << 8) | u32::from(br);
    let windows_active = frame.windows_active();

    for x in 0..width {
        let xi = x as usize;

        let mask = if !windows_active {
            layout::LAYER_ALL
        } else if regs.windows[0].enabled
            && regs.windows[0].contains(x, line, width, crate::ppu::MAX_FRAME_HEIGHT)
        {
            regs.windows[0].enable_mask
        } else if regs.windows[1].enabled
            && regs.windows[1].contains(x, line, width, crate::ppu::MAX_FRAME_HEIGHT)
        {
            regs.windows[1].enable_mask
        } else if regs.obj_window_enabled && buffers.obj_window[xi] {
            regs.obj_window_mask
        } else {
            regs.outside_mask
        };

        // Select the two frontmost contributors. Sort key packs
        // (priority class, BG-behind-sprite, tile priority, BG index);
        // lower wins.
        let mut top_key = u32::MAX;
        let mut top = (backdrop, None::<u16>, false);
        let mut bottom_key = u32::MAX;
        let mut bottom = (backdrop, None::<u16>, false);

        let mut consider = |key: u32, candidate: (u32, Option<u16>, bool)| {
            if key < top_key {
                bottom_key = top_key;
                bottom = top;
                top_key = key;
                top = candidate;
            } else if key < bottom_key {
                bottom_key = key;
                bottom = candidate;
            }
        };

        if regs.master_enable & layout::LAYER_OBJ != 0
            && mask & layout::LAYER_OBJ != 0
            && buffers.obj[xi] != 0
        {
            let key = u32::from(buffers.obj_priority[xi]) << 16;
            consider(key, (buffers.obj[xi], Some(layout::LAYER_OBJ), buffers.obj_semi[xi]));
        }

        for bg in 0..4 {
            let layer_bit = 1_u16 << bg;
            if regs.master_enable & layer_bit == 0
                || mask & layer_bit == 0
                || buffers.bg[bg][xi] == 0
            {
                continue;
            }
            let key = (u32::from(frame.bgs[bg].layer_priority) << 16)
                | (1 << 12)
                | (u32::from(buffers.bg_priority[bg][xi]) << 4)
                | bg as u32;
            consider(key, (buffers.bg[bg][xi], Some(layer_bit), false));
        }

        let (top_color, top_bit, top_semi) = top;
        let (bottom_color, bottom_bit, _) = bottom;

        let math_allowed = mask & layout::LAYER_COLOR_MATH != 0;
        let bottom_is_target = bottom_bit.is_some_and(|bit| math.target_b & bit != 0);
        let top_is_target = top_bit.is_some_and(|bit| math.target_a & bit != 0);

        let mut color = top_color;
        if math_allowed {
            if top_semi && bottom_is_target {
                // Semi-transparent sprites blend regardless of target A
                color = per_channel2(top_color, bottom_color, |a, b| {
                    ((a * math.eva + b * math.evb + 8) >> 4).min(255)
                });
            } else if math.mode != ColorMathMode::Off && top_is_target && bottom_is_target {
                color = apply_color_math(math.mode, math.half, math.eva, math.evb, top_color, bottom_color);
            }
        }

        if math.fade_white {
            color = brighten(color, math.fade_factor);
        } else if math.fade_black {
            color = darken(color, math.fade_factor);
        }

        fb_row[xi] = colors::word_to_color(color);
    }
}

fn apply_color_math(
    mode: ColorMathMode,
    half: bool,
    eva: u32,
    evb: u32,
    top: u32,
    bottom: u32,
) -> u32 {
    let result = match mode {
        ColorMathMode::Off => return top,
        ColorMathMode::Add => per_channel2(top, bottom, |a, b| (a + b).min(255)),
        ColorMathMode::Subtract => per_channel2(top, bottom, |a, b| a.saturating_sub(b)),
        ColorMathMode::Average => per_channel2(top, bottom, |a, b| (a + b) / 2),
        ColorMathMode::Coefficients => {
            per_channel2(top, bottom, |a, b| ((a * eva + b * evb + 8) >> 4).min(255))
        }
    };

    if half && matches!(mode, ColorMathMode::Add | ColorMathMode::Subtract) {
        per_channel(result, |ch| ch / 2)
    } else {
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::VppuConfig;
    use crate::ppu::Ppu;
    use crate::ppu::wide::layout::{
        BG_AFFINE, BG_ENABLED, BG_LINE_AFFINE, BG_WRAP_X, BG_WRAP_Y, LAYER_ALL, LAYER_BG0,
        LAYER_BG1, OBJ_ENABLED, OBJ_SEMI_TRANSPARENT,
    };

    const WIDTH: u16 = 64;

    fn wide_ppu() -> Ppu {
        let mut ppu = Ppu::new(VppuConfig::default());
        ppu.set_mode(0);
        ppu.set_frame_width(WIDTH);
        ppu.set_wide_registers(&WideRegisters {
            master_enable: LAYER_ALL,
            ..Default::default()
        });
        ppu
    }

    /// An 8x8-tile map filled with tile 1; tile 1's pixel (x, y) has color
    /// index x + 1, so rows are uniform and columns vary.
    fn uniform_bg(ppu: &mut Ppu, bg: usize, flags: u16) {
        ppu.set_wide_bg(bg, &WideBg {
            flags: BG_ENABLED | flags,
            map_width_tiles: 8,
            map_height_tiles: 8,
            matrix: [0x100, 0, 0, 0x100],
            ..Default::default()
        })
        .unwrap();
        for index in 0..64 {
            ppu.set_wide_tilemap_entry(bg, index, TileEntry::new(1, 0, 0, false, false, false))
                .unwrap();
        }
        let mut tile = [0_u8; 32];
        for y in 0..8 {
            for x in 0..4 {
                tile[y * 4 + x] = ((2 * x + 1) | ((2 * x + 2) << 4)) as u8;
            }
        }
        ppu.load_wide_tiles(32, &tile).unwrap();
        for index in 0..16 {
            ppu.set_wide_palette(0, index, [index as u8 * 10, 0, index as u8]).unwrap();
        }
    }

    fn row(ppu: &Ppu, line: usize) -> Vec<u32> {
        let width = WIDTH as usize;
        ppu.frame_buffer()[line * width..(line + 1) * width]
            .iter()
            .map(|color| color.to_word())
            .collect()
    }

    #[test]
    fn per_line_scroll_shifts_only_that_line() {
        let mut ppu = wide_ppu();
        uniform_bg(&mut ppu, 0, BG_WRAP_X | BG_WRAP_Y);
        ppu.set_wide_line_scroll(0, 100, 3, 0).unwrap();
        ppu.render_frame();

        let line0 = row(&ppu, 0);
        let line100 = row(&ppu, 100);
        let line200 = row(&ppu, 200);

        // Rows of the tile are uniform, so an unscrolled line equals line 0
        assert_eq!(line0, line200);
        // The scrolled line is line 0 rotated left by 3 with wrapping
        let mut expected = line0.clone();
        expected.rotate_left(3);
        assert_eq!(line100, expected);
        assert_ne!(line100, line0);
    }

    #[test]
    fn tile_priority_composes_with_layer_priority() {
        let mut ppu = wide_ppu();
        // Both BGs at layer priority 0, full-coverage single tiles
        for bg in 0..2 {
            ppu.set_wide_bg(bg, &WideBg {
                flags: BG_ENABLED | BG_WRAP_X | BG_WRAP_Y,
                map_width_tiles: 8,
                map_height_tiles: 8,
                tile_base: (bg + 1) as u16,
                ..Default::default()
            })
            .unwrap();
        }
        // BG0 tiles carry tile priority 1, BG1 tiles tile priority 0
        for index in 0..64 {
            ppu.set_wide_tilemap_entry(0, index, TileEntry::new(0, 0, 1, false, false, false))
                .unwrap();
            ppu.set_wide_tilemap_entry(1, index, TileEntry::new(0, 0, 0, false, false, false))
                .unwrap();
        }
        // Tile 1 solid color 1, tile 2 solid color 2
        ppu.load_wide_tiles(32, &[0x11; 32]).unwrap();
        ppu.load_wide_tiles(64, &[0x22; 32]).unwrap();
        ppu.set_wide_palette(0, 1, [255, 0, 0]).unwrap();
        ppu.set_wide_palette(0, 2, [0, 255, 0]).unwrap();

        ppu.render_frame();
        // BG1 wins: same layer priority, lower tile priority
        assert_eq!(row(&ppu, 0)[0], 0xFF00FF00);

        // With equal tile priorities the lower BG index wins
        for index in 0..64 {
            ppu.set_wide_tilemap_entry(0, index, TileEntry::new(0, 0, 0, false, false, false))
                .unwrap();
        }
        ppu.render_frame();
        assert_eq!(row(&ppu, 0)[0], 0xFF0000FF);
    }

    #[test]
    fn coefficient_blend_halves_channels() {
        let mut ppu = wide_ppu();
        ppu.set_wide_registers(&WideRegisters {
            master_enable: LAYER_ALL,
            color_math: layout::ColorMathControl {
                mode: ColorMathMode::Coefficients,
                eva: 8,
                evb: 8,
                target_a: LAYER_BG0,
                target_b: LAYER_BG1,
                ..Default::default()
            },
            ..Default::default()
        });
        for bg in 0..2 {
            ppu.set_wide_bg(bg, &WideBg {
                flags: BG_ENABLED | BG_WRAP_X | BG_WRAP_Y,
                map_width_tiles: 8,
                map_height_tiles: 8,
                tile_base: (bg + 1) as u16,
                layer_priority: bg as u8,
                ..Default::default()
            })
            .unwrap();
            for index in 0..64 {
                ppu.set_wide_tilemap_entry(bg, index, TileEntry::new(0, 0, 0, false, false, false))
                    .unwrap();
            }
        }
        ppu.load_wide_tiles(32, &[0x11; 32]).unwrap();
        ppu.load_wide_tiles(64, &[0x22; 32]).unwrap();
        // BG0 red, BG1 green
        ppu.set_wide_palette(0, 1, [255, 0, 0]).unwrap();
        ppu.set_wide_palette(0, 2, [0, 255, 0]).unwrap();

        ppu.render_frame();
        assert_eq!(row(&ppu, 10)[5], 0xFF008080);
    }

    #[test]
    fn line_affine_table_overrides_texture_origin() {
        let mut ppu = wide_ppu();
        uniform_bg(&mut ppu, 0, BG_WRAP_X | BG_WRAP_Y | BG_AFFINE | BG_LINE_AFFINE);
        // Line 50's origin shifted right by 5 source pixels
        ppu.set_wide_line_affine(0, 50, 5 << 8, 0).unwrap();
        ppu.render_frame();

        let line0 = row(&ppu, 0);
        let line50 = row(&ppu, 50);
        let mut expected = line0.clone();
        expected.rotate_left(5);
        assert_eq!(line50, expected);
    }

    #[test]
    fn sprites_and_semi_transparency() {
        let mut ppu = wide_ppu();
        ppu.set_wide_registers(&WideRegisters {
            master_enable: LAYER_ALL,
            color_math: layout::ColorMathControl {
                eva: 8,
                evb: 8,
                target_b: LAYER_BG0,
                ..Default::default()
            },
            ..Default::default()
        });
        uniform_bg(&mut ppu, 0, BG_WRAP_X | BG_WRAP_Y);
        // Overwrite BG0's palette so every BG pixel is solid blue
        for index in 1..16 {
            ppu.set_wide_palette(0, index, [0, 0, 255]).unwrap();
        }

        // 8x8 semi-transparent sprite at (4, 4), solid red from bank 1
        let mut tile = [0_u8; 32];
        tile.fill(0x33);
        ppu.load_wide_tiles(320, &tile).unwrap();
        ppu.set_wide_palette(1, 3, [255, 0, 0]).unwrap();
        ppu.set_wide_sprite(0, &WideSprite {
            x: 4,
            y: 4,
            width_blocks: 1,
            height_blocks: 1,
            tile: 10,
            palette: 1 << 8,
            flags: OBJ_ENABLED | OBJ_SEMI_TRANSPARENT,
            ..Default::default()
        })
        .unwrap();

        ppu.render_frame();
        // Half red + half blue
        assert_eq!(row(&ppu, 6)[6], 0xFF800080);
        // Outside the sprite the BG shows pure blue
        assert_eq!(row(&ppu, 6)[20], 0xFFFF0000);
    }

    #[test]
    fn wide_forced_blank_is_white() {
        let mut ppu = wide_ppu();
        uniform_bg(&mut ppu, 0, BG_WRAP_X | BG_WRAP_Y);
        ppu.set_wide_registers(&WideRegisters {
            master_enable: LAYER_ALL,
            forced_blank: true,
            ..Default::default()
        });
        ppu.render_frame();
        assert!(row(&ppu, 0).iter().all(|&word| word == 0xFFFFFFFF));
        assert!(row(&ppu, 359).iter().all(|&word| word == 0xFFFFFFFF));
    }
}
