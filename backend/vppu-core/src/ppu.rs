//! PPU state, mode dispatch, and the per-frame scanline loop.

mod affine;
mod colors;
mod compose;
mod dmg;
mod fixed;
mod obj;
mod registers;
mod text;
mod tiles;
pub(crate) mod wide;

use crate::api::{VppuConfig, VppuError};
use bincode::{Decode, Encode};
use std::ops::{Deref, DerefMut};
use vppu_common::boxedarray::{BoxedByteArray, BoxedWordArray};
use vppu_common::frontend::{Color, FrameSize};
use vppu_proc_macros::{FakeDecode, FakeEncode};

pub use wide::layout::{
    ColorMathControl, ColorMathMode, TileEntry, WideBg, WideRegisters, WideSprite, WindowControl,
};

pub const MAX_FRAME_WIDTH: u32 = 1280;
pub const MAX_FRAME_HEIGHT: u32 = 360;
pub const FRAME_BUFFER_LEN: usize = (MAX_FRAME_WIDTH * MAX_FRAME_HEIGHT) as usize;

pub(crate) const GBA_SCREEN_WIDTH: u32 = 240;
pub(crate) const GBA_SCREEN_HEIGHT: u32 = 160;
pub(crate) const DMG_SCREEN_WIDTH: u32 = 160;
pub(crate) const DMG_SCREEN_HEIGHT: u32 = 144;

pub const GBA_FRAME_SIZE: FrameSize =
    FrameSize { width: GBA_SCREEN_WIDTH, height: GBA_SCREEN_HEIGHT };
pub const DMG_FRAME_SIZE: FrameSize =
    FrameSize { width: DMG_SCREEN_WIDTH, height: DMG_SCREEN_HEIGHT };

pub(crate) const VRAM_LEN: usize = 4 * 1024 * 1024;
pub(crate) const GBA_VRAM_LEN: usize = 0x18000;
pub(crate) const IO_LEN: usize = 0x400;
pub(crate) const PALETTE_LEN: usize = 256;
pub(crate) const OAM_LEN_WORDS: usize = 512;

/// Rendering pipeline selected by the mode register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Wide,
    GbaText,
    GbaMixed,
    Dmg,
}

impl Mode {
    pub fn from_register(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Wide),
            1 => Some(Self::GbaText),
            2 => Some(Self::GbaMixed),
            7 => Some(Self::Dmg),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FakeEncode, FakeDecode)]
struct FrameBuffer(Box<[Color; FRAME_BUFFER_LEN]>);

impl Default for FrameBuffer {
    fn default() -> Self {
        Self(vec![Color::BLACK; FRAME_BUFFER_LEN].into_boxed_slice().try_into().unwrap())
    }
}

impl Deref for FrameBuffer {
    type Target = [Color; FRAME_BUFFER_LEN];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for FrameBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Per-scanline scratch. One instance per render worker; rows of layer
/// color words (0 = transparent) plus priority bytes, and the sprite layer
/// with its semi-transparency and object-window flags.
pub(crate) struct LineBuffers {
    pub bg: [[u32; MAX_FRAME_WIDTH as usize]; 4],
    pub bg_priority: [[u8; MAX_FRAME_WIDTH as usize]; 4],
    pub obj: [u32; MAX_FRAME_WIDTH as usize],
    pub obj_priority: [u8; MAX_FRAME_WIDTH as usize],
    pub obj_semi: [bool; MAX_FRAME_WIDTH as usize],
    pub obj_window: [bool; MAX_FRAME_WIDTH as usize],
}

impl LineBuffers {
    pub fn new() -> Self {
        Self {
            bg: [[0; MAX_FRAME_WIDTH as usize]; 4],
            bg_priority: [[0; MAX_FRAME_WIDTH as usize]; 4],
            obj: [0; MAX_FRAME_WIDTH as usize],
            obj_priority: [0xFF; MAX_FRAME_WIDTH as usize],
            obj_semi: [false; MAX_FRAME_WIDTH as usize],
            obj_window: [false; MAX_FRAME_WIDTH as usize],
        }
    }

    pub fn clear(&mut self) {
        for bg in &mut self.bg {
            bg.fill(0);
        }
        for priorities in &mut self.bg_priority {
            priorities.fill(0);
        }
        self.obj.fill(0);
        self.obj_priority.fill(0xFF);
        self.obj_semi.fill(false);
        self.obj_window.fill(false);
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Ppu {
    config: VppuConfig,
    mode: u8,
    frame_width: u16,
    vram: BoxedByteArray<VRAM_LEN>,
    io: BoxedByteArray<IO_LEN>,
    gba_vram: BoxedByteArray<GBA_VRAM_LEN>,
    bg_palette: BoxedWordArray<PALETTE_LEN>,
    obj_palette: BoxedWordArray<PALETTE_LEN>,
    oam: BoxedWordArray<OAM_LEN_WORDS>,
    frame_buffer: FrameBuffer,
}

impl Ppu {
    pub fn new(config: VppuConfig) -> Self {
        Self {
            config,
            mode: 1,
            frame_width: GBA_SCREEN_WIDTH as u16,
            vram: BoxedByteArray::new(),
            io: BoxedByteArray::new(),
            gba_vram: BoxedByteArray::new(),
            bg_palette: BoxedWordArray::new(),
            obj_palette: BoxedWordArray::new(),
            oam: BoxedWordArray::new(),
            frame_buffer: FrameBuffer::default(),
        }
    }

    pub fn reload_config(&mut self, config: VppuConfig) {
        self.config = config;
    }

    /// Render one frame into the framebuffer using the current registers
    /// and video memory. Pixels outside the selected mode's output
    /// rectangle are left untouched.
    pub fn render_frame(&mut self) {
        match Mode::from_register(self.mode) {
            Some(Mode::GbaText) => self.render_gba_frame([true, true, true, true], [
                BgPipeline::Text,
                BgPipeline::Text,
                BgPipeline::Text,
                BgPipeline::Text,
            ]),
            Some(Mode::GbaMixed) => self.render_gba_frame([true, true, true, false], [
                BgPipeline::Text,
                BgPipeline::Text,
                BgPipeline::Affine,
                BgPipeline::Disabled,
            ]),
            Some(Mode::Wide) => self.render_wide_frame(),
            Some(Mode::Dmg) => self.render_dmg_frame(),
            None => {
                log::warn!("ignoring render request for unsupported mode {}", self.mode);
            }
        }
    }

    fn render_gba_frame(&mut self, active_bgs: [bool; 4], pipelines: [BgPipeline; 4]) {
        let registers = registers::Registers::parse(self.io.as_slice());
        let (width, height) = (GBA_SCREEN_WIDTH, GBA_SCREEN_HEIGHT);

        if registers.forced_blanking {
            fill_rect(&mut self.frame_buffer[..], width, height, Color::WHITE);
            return;
        }

        let vram = self.gba_vram.as_slice();
        let bg_palette: &[u16; PALETTE_LEN] = &self.bg_palette;
        let obj_palette: &[u16; PALETTE_LEN] = &self.obj_palette;
        let oam: &[u16; OAM_LEN_WORDS] = &self.oam;
        let registers = &registers;

        render_lines(
            &mut self.frame_buffer[..],
            width,
            height,
            self.config.render_threads.get().into(),
            move |line, buffers, fb_row| {
                buffers.clear();

                for bg in 0..4 {
                    if !registers.bg_enabled[bg] {
                        continue;
                    }
                    let (colors_row, priorities_row) =
                        (&mut buffers.bg[bg], &mut buffers.bg_priority[bg]);
                    match pipelines[bg] {
                        BgPipeline::Text => text::render_text_bg_line(
                            vram,
                            bg_palette,
                            registers,
                            bg,
                            line,
                            colors_row,
                            priorities_row,
                        ),
                        BgPipeline::Affine => affine::render_affine_bg_line(
                            vram,
                            bg_palette,
                            registers,
                            bg,
                            line,
                            colors_row,
                            priorities_row,
                        ),
                        BgPipeline::Disabled => {}
                    }
                }

                if registers.obj_enabled {
                    obj::render_obj_line(
                        vram,
                        obj_palette,
                        oam,
                        registers,
                        line,
                        &mut buffers.obj,
                        &mut buffers.obj_priority,
                        &mut buffers.obj_semi,
                        &mut buffers.obj_window,
                    );
                }

                compose::compose_gba_line(bg_palette, registers, active_bgs, line, buffers, fb_row);
            },
        );
    }

    fn render_wide_frame(&mut self) {
        let vram = self.vram.as_slice();
        let frame = wide::FrameRegisters::parse(vram);
        let width = u32::from(self.frame_width).clamp(1, MAX_FRAME_WIDTH);
        let height = MAX_FRAME_HEIGHT;

        if frame.regs.forced_blank {
            fill_rect(&mut self.frame_buffer[..], width, height, Color::WHITE);
            return;
        }

        let frame = &frame;
        render_lines(
            &mut self.frame_buffer[..],
            width,
            height,
            self.config.render_threads.get().into(),
            move |line, buffers, fb_row| {
                buffers.clear();
                wide::render_wide_line(vram, frame, width, line, buffers, fb_row);
            },
        );
    }

    fn render_dmg_frame(&mut self) {
        let vram = self.vram.as_slice();
        let registers = dmg::DmgRegisters::parse(vram);
        let (width, height) = (DMG_SCREEN_WIDTH, DMG_SCREEN_HEIGHT);

        if !registers.lcdc.enabled {
            fill_rect(&mut self.frame_buffer[..], width, height, dmg::disabled_fill(&registers));
            return;
        }

        let registers = &registers;
        render_lines(
            &mut self.frame_buffer[..],
            width,
            height,
            self.config.render_threads.get().into(),
            move |line, _buffers, fb_row| {
                dmg::render_dmg_line(vram, registers, line, fb_row);
            },
        );
    }

    pub fn frame_buffer(&self) -> &[Color] {
        &self.frame_buffer[..]
    }

    /// Output dimensions of the currently selected mode.
    pub fn frame_size(&self) -> FrameSize {
        match Mode::from_register(self.mode) {
            Some(Mode::GbaText | Mode::GbaMixed) => GBA_FRAME_SIZE,
            Some(Mode::Dmg) => DMG_FRAME_SIZE,
            Some(Mode::Wide) | None => FrameSize {
                width: u32::from(self.frame_width).clamp(1, MAX_FRAME_WIDTH),
                height: MAX_FRAME_HEIGHT,
            },
        }
    }

    pub fn set_mode(&mut self, mode: u8) {
        self.mode = mode;
    }

    pub fn mode(&self) -> u8 {
        self.mode
    }

    pub fn set_frame_width(&mut self, width: u16) {
        self.frame_width = width;
    }
}

/// Host-facing region interface. Single-value writes outside a region are
/// ignored; bulk loads validate up front and report overflow.
impl Ppu {
    pub fn write_vram8(&mut self, address: u32, value: u8) {
        if let Some(byte) = self.vram.get_mut(address as usize) {
            *byte = value;
        }
    }

    pub fn load_vram(&mut self, offset: usize, data: &[u8]) -> Result<(), VppuError> {
        copy_into("vram", &mut self.vram[..], offset, data)
    }

    pub fn write_io8(&mut self, offset: u32, value: u8) {
        if let Some(byte) = self.io.get_mut(offset as usize) {
            *byte = value;
        }
    }

    pub fn write_io16(&mut self, offset: u32, value: u16) {
        let offset = (offset & !1) as usize;
        if offset < IO_LEN {
            self.io[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
        }
    }

    pub fn write_gba_vram8(&mut self, address: u32, value: u8) {
        if let Some(byte) = self.gba_vram.get_mut(address as usize) {
            *byte = value;
        }
    }

    pub fn load_gba_vram(&mut self, offset: usize, data: &[u8]) -> Result<(), VppuError> {
        copy_into("tile/map vram", &mut self.gba_vram[..], offset, data)
    }

    pub fn write_bg_palette(&mut self, index: usize, color: u16) {
        if let Some(entry) = self.bg_palette.get_mut(index) {
            *entry = color;
        }
    }

    pub fn write_obj_palette(&mut self, index: usize, color: u16) {
        if let Some(entry) = self.obj_palette.get_mut(index) {
            *entry = color;
        }
    }

    pub fn write_oam(&mut self, index: usize, value: u16) {
        if let Some(entry) = self.oam.get_mut(index) {
            *entry = value;
        }
    }

    pub fn set_wide_registers(&mut self, registers: &WideRegisters) {
        registers.write(&mut self.vram[..]);
    }

    pub fn set_wide_bg(&mut self, bg: usize, control: &WideBg) -> Result<(), VppuError> {
        check_index("BG index", bg, 4)?;
        control.write(&mut self.vram[..], bg);
        Ok(())
    }

    pub fn set_wide_tilemap_entry(
        &mut self,
        bg: usize,
        index: usize,
        entry: TileEntry,
    ) -> Result<(), VppuError> {
        check_index("BG index", bg, 4)?;
        check_index("tilemap entry", index, wide::layout::TILEMAP_ENTRIES_PER_BG)?;
        wide::layout::write_tilemap_entry(&mut self.vram[..], bg, index, entry);
        Ok(())
    }

    pub fn load_wide_tiles(&mut self, offset: usize, data: &[u8]) -> Result<(), VppuError> {
        if offset + data.len() > wide::layout::TILE_DATA_LEN {
            return Err(VppuError::RegionOverflow {
                region: "tile data",
                offset,
                len: data.len(),
                capacity: wide::layout::TILE_DATA_LEN,
            });
        }
        let base = wide::layout::TILE_DATA_ADDR as usize + offset;
        self.vram[base..base + data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn set_wide_palette(
        &mut self,
        bank: usize,
        index: usize,
        rgb: [u8; 3],
    ) -> Result<(), VppuError> {
        check_index("palette bank", bank, wide::layout::PALETTE_BANKS)?;
        check_index("palette index", index, 256)?;
        wide::layout::write_palette_entry(&mut self.vram[..], bank, index, rgb);
        Ok(())
    }

    pub fn set_wide_sprite(&mut self, index: usize, sprite: &WideSprite) -> Result<(), VppuError> {
        check_index("sprite index", index, wide::layout::OAM_COUNT)?;
        sprite.write(&mut self.vram[..], index);
        Ok(())
    }

    pub fn set_wide_obj_affine(
        &mut self,
        index: usize,
        matrix: [i16; 4],
    ) -> Result<(), VppuError> {
        check_index("affine matrix index", index, wide::layout::OBJ_AFFINE_COUNT)?;
        wide::layout::write_obj_affine(&mut self.vram[..], index, matrix);
        Ok(())
    }

    pub fn set_wide_line_scroll(
        &mut self,
        bg: usize,
        line: usize,
        scroll_x: i16,
        scroll_y: i16,
    ) -> Result<(), VppuError> {
        check_index("BG index", bg, 4)?;
        check_index("line", line, MAX_FRAME_HEIGHT as usize)?;
        wide::layout::write_line_scroll(&mut self.vram[..], bg, line, scroll_x, scroll_y);
        Ok(())
    }

    pub fn set_wide_line_affine(
        &mut self,
        bg: usize,
        line: usize,
        tx: i32,
        ty: i32,
    ) -> Result<(), VppuError> {
        check_index("BG index", bg, 4)?;
        check_index("line", line, MAX_FRAME_HEIGHT as usize)?;
        wide::layout::write_line_affine(&mut self.vram[..], bg, line, tx, ty);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BgPipeline {
    Disabled,
    Text,
    Affine,
}

fn fill_rect(fb: &mut [Color], width: u32, height: u32, color: Color) {
    fb[..(width * height) as usize].fill(color);
}

fn copy_into(
    region: &'static str,
    target: &mut [u8],
    offset: usize,
    data: &[u8],
) -> Result<(), VppuError> {
    if offset + data.len() > target.len() {
        return Err(VppuError::RegionOverflow {
            region,
            offset,
            len: data.len(),
            capacity: target.len(),
        });
    }
    target[offset..offset + data.len()].copy_from_slice(data);
    Ok(())
}

fn check_index(what: &'static str, index: usize, limit: usize) -> Result<(), VppuError> {
    if index < limit {
        Ok(())
    } else {
        Err(VppuError::IndexOutOfRange { what, index, limit })
    }
}

/// Run the per-line closure over every scanline of the output rectangle.
/// With more than one worker the rectangle is split into contiguous bands
/// of rows; each worker owns a disjoint slice of the framebuffer, so no
/// synchronization is needed.
fn render_lines<F>(fb: &mut [Color], width: u32, height: u32, workers: usize, render_line: F)
where
    F: Fn(u32, &mut LineBuffers, &mut [Color]) + Sync,
{
    let width = width as usize;
    let fb = &mut fb[..width * height as usize];

    if workers <= 1 || height <= 1 {
        let mut buffers = Box::new(LineBuffers::new());
        for (line, fb_row) in fb.chunks_mut(width).enumerate() {
            render_line(line as u32, &mut buffers, fb_row);
        }
        return;
    }

    let rows_per_band = (height as usize).div_ceil(workers);
    let render_line = &render_line;
    std::thread::scope(|scope| {
        for (band, fb_band) in fb.chunks_mut(width * rows_per_band).enumerate() {
            scope.spawn(move || {
                let mut buffers = Box::new(LineBuffers::new());
                for (row, fb_row) in fb_band.chunks_mut(width).enumerate() {
                    render_line((band * rows_per_band + row) as u32, &mut buffers, fb_row);
                }
            });
        }
    });
}
