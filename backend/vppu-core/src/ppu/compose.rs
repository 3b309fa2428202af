//! Final per-scanline composition for the GBA-style modes.
//!
//! For each column the top two non-transparent contributors are selected in
//! priority-class order, with sprites drawn in front of backgrounds of the
//! same class and backgrounds ordered by (priority register, BG index). The
//! backdrop (BG palette slot 0) sits under everything. Color math is then
//! applied per the blend-control registers and the per-pixel window mask.

use crate::ppu::registers::{BlendMode, BlendTargets, Registers};
use crate::ppu::{GBA_SCREEN_WIDTH, LineBuffers, colors};
use vppu_common::frontend::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
    Bg(usize),
    Obj,
    Backdrop,
}

impl Layer {
    fn targeted_by(self, targets: BlendTargets) -> bool {
        match self {
            Self::Bg(bg) => targets.bg[bg],
            Self::Obj => targets.obj,
            Self::Backdrop => targets.backdrop,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Contributor {
    color: u32,
    layer: Layer,
    semi_transparent: bool,
}

pub fn compose_gba_line(
    bg_palette: &[u16; 256],
    registers: &Registers,
    active_bgs: [bool; 4],
    line: u32,
    buffers: &LineBuffers,
    fb_row: &mut [Color],
) {
    let backdrop = colors::rgb555_to_rgba8888(bg_palette[0]);

    for x in 0..GBA_SCREEN_WIDTH {
        let xi = x as usize;
        let enabled = registers.window_layers_at(x, line, buffers.obj_window[xi]);

        let mut top = Contributor { color: backdrop, layer: Layer::Backdrop, semi_transparent: false };
        let mut bottom = top;
        let mut found_top = false;

        'classes: for class in 0..4_u8 {
            // Sprites draw in front of same-class backgrounds
            if registers.obj_enabled
                && enabled.obj
                && buffers.obj[xi] != 0
                && buffers.obj_priority[xi] == class
            {
                let contributor = Contributor {
                    color: buffers.obj[xi],
                    layer: Layer::Obj,
                    semi_transparent: buffers.obj_semi[xi],
                };
                if !found_top {
                    top = contributor;
                    found_top = true;
                } else {
                    bottom = contributor;
                    break 'classes;
                }
            }

            for bg in 0..4 {
                if !active_bgs[bg]
                    || !registers.bg_enabled[bg]
                    || !enabled.bg[bg]
                    || registers.bg_control[bg].priority != class
                    || buffers.bg[bg][xi] == 0
                {
                    continue;
                }
                let contributor = Contributor {
                    color: buffers.bg[bg][xi],
                    layer: Layer::Bg(bg),
                    semi_transparent: false,
                };
                if !found_top {
                    top = contributor;
                    found_top = true;
                } else {
                    bottom = contributor;
                    break 'classes;
                }
            }
        }

        let blend = registers.blend;
        let force_alpha = top.semi_transparent && bottom.layer.targeted_by(blend.second_target);

        let pixel = if enabled.blend && force_alpha {
            alpha_blend(top.color, bottom.color, blend.alpha_a, blend.alpha_b)
        } else if enabled.blend {
            match blend.mode {
                BlendMode::None => top.color,
                BlendMode::AlphaBlending => {
                    if top.layer.targeted_by(blend.first_target)
                        && bottom.layer.targeted_by(blend.second_target)
                    {
                        alpha_blend(top.color, bottom.color, blend.alpha_a, blend.alpha_b)
                    } else {
                        top.color
                    }
                }
                BlendMode::BrightnessIncrease => {
                    if top.layer.targeted_by(blend.first_target) {
                        brighten(top.color, blend.brightness)
                    } else {
                        top.color
                    }
                }
                BlendMode::BrightnessDecrease => {
                    if top.layer.targeted_by(blend.first_target) {
                        darken(top.color, blend.brightness)
                    } else {
                        top.color
                    }
                }
            }
        } else {
            top.color
        };

        fb_row[xi] = colors::word_to_color(pixel);
    }
}

/// `(top * eva + bottom * evb) / 16` per channel, rounded to nearest and
/// saturated at 255.
pub fn alpha_blend(top: u32, bottom: u32, eva: u32, evb: u32) -> u32 {
    per_channel2(top, bottom, |a, b| ((a * eva + b * evb + 8) >> 4).min(255))
}

/// `ch + (255 - ch) * evy / 16` per channel.
pub fn brighten(color: u32, evy: u32) -> u32 {
    per_channel(color, |ch| ch + (255 - ch) * evy / 16)
}

/// `ch - ch * evy / 16` per channel.
pub fn darken(color: u32, evy: u32) -> u32 {
    per_channel(color, |ch| ch - ch * evy / 16)
}

pub(crate) fn per_channel(color: u32, op: impl Fn(u32) -> u32) -> u32 {
    let r = op(color & 0xFF);
    let g = op((color >> 8) & 0xFF);
    let b = op((color >> 16) & 0xFF);
    0xFF00_0000 | (b << 16) | (g << 8) | r
}

pub(crate) fn per_channel2(first: u32, second: u32, op: impl Fn(u32, u32) -> u32) -> u32 {
    let r = op(first & 0xFF, second & 0xFF);
    let g = op((first >> 8) & 0xFF, (second >> 8) & 0xFF);
    let b = op((first >> 16) & 0xFF, (second >> 16) & 0xFF);
    0xFF00_0000 | (b << 16) | (g << 8) | r
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ppu::LineBuffers;

    const RED: u32 = 0xFF0000FF;
    const GREEN: u32 = 0xFF00FF00;

    fn io_with(writes: &[(u32, u16)]) -> Vec<u8> {
        let mut io = vec![0; 0x400];
        for &(offset, value) in writes {
            io[offset as usize..offset as usize + 2].copy_from_slice(&value.to_le_bytes());
        }
        io
    }

    fn compose_single_pixel(registers: &Registers, buffers: &LineBuffers) -> u32 {
        let palette = [0_u16; 256];
        let mut fb_row = vec![Color::TRANSPARENT; GBA_SCREEN_WIDTH as usize];
        compose_gba_line(&palette, registers, [true; 4], 0, buffers, &mut fb_row);
        fb_row[0].to_word()
    }

    #[test]
    fn half_and_half_alpha_blend() {
        assert_eq!(alpha_blend(RED, GREEN, 8, 8), 0xFF008080);
    }

    #[test]
    fn brighten_and_darken_extremes() {
        assert_eq!(brighten(RED, 16), 0xFFFFFFFF);
        assert_eq!(brighten(RED, 0), RED);
        assert_eq!(darken(RED, 16), 0xFF000000);
        assert_eq!(darken(GREEN, 0), GREEN);
    }

    #[test]
    fn alpha_applies_only_between_configured_targets() {
        // BG0 first target, BG1 second target, alpha mode, eva = evb = 8
        let io = io_with(&[
            (0x00, 0x0300),
            (0x50, 0x0001 | (1 << 6) | (1 << 9)),
            (0x52, 0x0808),
        ]);
        let registers = Registers::parse(&io);

        let mut buffers = LineBuffers::new();
        buffers.bg[0][0] = RED;
        buffers.bg_priority[0][0] = 0;
        buffers.bg[1][0] = GREEN;
        buffers.bg_priority[1][0] = 1;
        assert_eq!(compose_single_pixel(&registers, &buffers), 0xFF008080);

        // Swapping the layer priorities puts BG1 on top; BG1 is not a first
        // target, so no blending occurs
        let io = io_with(&[
            (0x00, 0x0300),
            (0x08, 1),
            (0x50, 0x0001 | (1 << 6) | (1 << 9)),
            (0x52, 0x0808),
        ]);
        let registers = Registers::parse(&io);
        assert_eq!(compose_single_pixel(&registers, &buffers), GREEN);
    }

    #[test]
    fn raising_priority_value_never_moves_a_bg_forward() {
        // BG0 and BG1 both opaque; walk BG0's priority value up and check
        // BG0 never reappears in front once behind
        let mut buffers = LineBuffers::new();
        buffers.bg[0][0] = RED;
        buffers.bg[1][0] = GREEN;

        let mut was_front = true;
        for priority in 0..4_u16 {
            let io = io_with(&[(0x00, 0x0300), (0x08, priority), (0x0A, 1)]);
            let registers = Registers::parse(&io);
            let front = compose_single_pixel(&registers, &buffers) == RED;
            assert!(was_front || !front, "BG0 moved forward at priority {priority}");
            was_front = front;
        }
        assert!(!was_front);
    }

    #[test]
    fn semi_transparent_sprite_forces_alpha() {
        // No blend mode configured, but the sprite is semi-transparent and
        // BG0 is a second target
        let io = io_with(&[(0x00, 0x1100), (0x50, 1 << 8), (0x52, 0x0808)]);
        let registers = Registers::parse(&io);

        let mut buffers = LineBuffers::new();
        buffers.obj[0] = GREEN;
        buffers.obj_priority[0] = 0;
        buffers.obj_semi[0] = true;
        buffers.bg[0][0] = RED;
        buffers.bg_priority[0][0] = 0;
        assert_eq!(compose_single_pixel(&registers, &buffers), 0xFF008080);
    }

    #[test]
    fn object_window_masks_layers() {
        // OBJ window enabled, outside region allows BG0 only, OBJ window
        // region allows nothing => a flagged pixel falls through to backdrop
        let io = io_with(&[(0x00, 0x0100 | (1 << 15)), (0x4A, 0x0001)]);
        let registers = Registers::parse(&io);

        let mut buffers = LineBuffers::new();
        buffers.bg[0][0] = RED;
        buffers.bg_priority[0][0] = 0;
        buffers.obj_window[0] = true;
        // Backdrop is palette slot 0 = black
        assert_eq!(compose_single_pixel(&registers, &buffers), 0xFF000000);

        buffers.obj_window[0] = false;
        assert_eq!(compose_single_pixel(&registers, &buffers), RED);
    }
}
