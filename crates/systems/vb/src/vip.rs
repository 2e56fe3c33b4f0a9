//! VIP video display processor.
//!
//! The VIP owns 256 KiB of VRAM and steps through a fixed per-frame phase
//! sequence on the master clock: drawing, left eye display, right eye
//! display, idle. Phase boundaries raise interrupt pending bits; source 4
//! is asserted whenever `INTPND & INTENB` is non-zero. The end of the idle
//! phase marks frame completion, which the frame driver uses to stop the
//! CPU run loop.
//!
//! Rendering is display-side only: the two 384x224 2 bpp column-major
//! framebuffers selected for display are pushed through the brightness
//! registers and combined into an anaglyph RGB image. The drawing engine's
//! world/object compositing is not modeled; software that draws directly
//! into the framebuffers displays correctly.

use crate::irq::{IrqLines, IrqSource};
use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

pub const DISPLAY_WIDTH: usize = 384;
pub const DISPLAY_HEIGHT: usize = 224;

/// Master cycles per frame (20 MHz / ~50.27 Hz).
pub const FRAME_CYCLES: i32 = 397_824;
/// Phase boundaries within a frame, in master cycles from frame start.
const DRAW_END: i32 = 100_000;
const LEFT_END: i32 = 200_000;
const RIGHT_END: i32 = 300_000;

// INTPND/INTENB/INTCLR bits
pub const INT_SCANERR: u16 = 0x0001;
pub const INT_LFBEND: u16 = 0x0002;
pub const INT_RFBEND: u16 = 0x0004;
pub const INT_GAMESTART: u16 = 0x0008;
pub const INT_FRAMESTART: u16 = 0x0010;
pub const INT_SBHIT: u16 = 0x2000;
pub const INT_XPEND: u16 = 0x4000;
pub const INT_TIMEERR: u16 = 0x8000;

const VRAM_SIZE: usize = 0x40000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Phase {
    Drawing,
    LeftDisplay,
    RightDisplay,
    Idle,
}

/// VIP video unit
#[derive(Debug, Serialize, Deserialize)]
pub struct Vip {
    vram: Vec<u8>,

    intpnd: u16,
    intenb: u16,
    dpctrl: u16,
    xpctrl: u16,
    brta: u8,
    brtb: u8,
    brtc: u8,
    rest: u8,
    frmcyc: u16,
    bkcol: u8,
    spt: [u16; 4],
    gplt: [u16; 4],
    jplt: [u16; 4],

    phase: Phase,
    /// Master-clock timestamp of the current frame's start
    frame_base: i32,
    /// Timestamp of the next phase boundary
    phase_ts: i32,
    /// Which framebuffer pair is being displayed this frame (0 or 1)
    display_fb: u8,
    /// Frames left until the next game start interrupt
    game_start_counter: u16,
    frame_done: bool,

    /// Anaglyph colors for the left and right eye (0xRRGGBB)
    color_left: u32,
    color_right: u32,

    #[serde(skip, default = "blank_pixels")]
    pixels: Vec<u32>,
}

fn blank_pixels() -> Vec<u32> {
    vec![0; DISPLAY_WIDTH * DISPLAY_HEIGHT]
}

impl Vip {
    pub fn new() -> Self {
        let mut vip = Self {
            vram: vec![0; VRAM_SIZE],
            intpnd: 0,
            intenb: 0,
            dpctrl: 0,
            xpctrl: 0,
            brta: 0,
            brtb: 0,
            brtc: 0,
            rest: 0,
            frmcyc: 0,
            bkcol: 0,
            spt: [0; 4],
            gplt: [0; 4],
            jplt: [0; 4],
            phase: Phase::Drawing,
            frame_base: 0,
            phase_ts: DRAW_END,
            display_fb: 0,
            game_start_counter: 0,
            frame_done: false,
            color_left: 0xFF0000,
            color_right: 0x0000B6,
            pixels: vec![0; DISPLAY_WIDTH * DISPLAY_HEIGHT],
        };
        vip.intpnd = INT_FRAMESTART | INT_GAMESTART;
        vip
    }

    pub fn power(&mut self, irq: &mut IrqLines) {
        let left = self.color_left;
        let right = self.color_right;
        let pixels = std::mem::take(&mut self.pixels);
        *self = Self::new();
        self.color_left = left;
        self.color_right = right;
        self.pixels = pixels;
        self.update_irq(irq);
    }

    /// Configure the anaglyph palette (left/right eye RGB).
    pub fn set_anaglyph_colors(&mut self, left: u32, right: u32) {
        self.color_left = left;
        self.color_right = right;
    }

    /// Called by the frame driver at the top of every frame.
    pub fn start_frame(&mut self) {
        self.frame_done = false;
    }

    /// Has the current frame's display sequence completed?
    #[inline]
    pub fn frame_done(&self) -> bool {
        self.frame_done
    }

    /// Rendered output of the most recently completed frame.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    fn update_irq(&mut self, irq: &mut IrqLines) {
        irq.assert_irq(IrqSource::Vip, self.intpnd & self.intenb != 0);
    }

    fn raise(&mut self, bits: u16, irq: &mut IrqLines) {
        self.intpnd |= bits;
        self.update_irq(irq);
    }

    fn display_enabled(&self) -> bool {
        self.dpctrl & 0x0002 != 0
    }

    fn drawing_enabled(&self) -> bool {
        self.xpctrl & 0x0002 != 0
    }

    /// Advance the phase machine to `timestamp`; returns the next due
    /// timestamp.
    pub fn update(&mut self, timestamp: i32, irq: &mut IrqLines) -> i32 {
        while timestamp >= self.phase_ts {
            match self.phase {
                Phase::Drawing => {
                    if self.drawing_enabled() {
                        self.raise(INT_XPEND, irq);
                    }
                    self.phase = Phase::LeftDisplay;
                    self.phase_ts = self.frame_base + LEFT_END;
                }
                Phase::LeftDisplay => {
                    if self.display_enabled() {
                        self.raise(INT_LFBEND, irq);
                    }
                    self.phase = Phase::RightDisplay;
                    self.phase_ts = self.frame_base + RIGHT_END;
                }
                Phase::RightDisplay => {
                    if self.display_enabled() {
                        self.raise(INT_RFBEND, irq);
                    }
                    self.render();
                    self.phase = Phase::Idle;
                    self.phase_ts = self.frame_base + FRAME_CYCLES;
                }
                Phase::Idle => {
                    self.frame_done = true;
                    self.frame_base += FRAME_CYCLES;
                    self.display_fb ^= 1;

                    let mut bits = INT_FRAMESTART;
                    if self.game_start_counter == 0 {
                        bits |= INT_GAMESTART;
                        self.game_start_counter = self.frmcyc & 0x0F;
                    } else {
                        self.game_start_counter -= 1;
                    }
                    self.raise(bits, irq);

                    self.phase = Phase::Drawing;
                    self.phase_ts = self.frame_base + DRAW_END;
                }
            }
        }
        self.phase_ts
    }

    pub fn next_event(&self) -> i32 {
        self.phase_ts
    }

    pub fn read16(&mut self, timestamp: i32, addr: u32, irq: &mut IrqLines) -> u16 {
        let a = addr & 0x7FFFF;
        if (0x5F800..0x60000).contains(&a) {
            self.update(timestamp, irq);
            return self.reg_read(a & 0x7E);
        }
        let i = (a & 0x3FFFE) as usize;
        u16::from_le_bytes([self.vram[i], self.vram[i + 1]])
    }

    pub fn write16(&mut self, timestamp: i32, addr: u32, value: u16, irq: &mut IrqLines) {
        let a = addr & 0x7FFFF;
        if (0x5F800..0x60000).contains(&a) {
            self.update(timestamp, irq);
            self.reg_write(a & 0x7E, value, irq);
            return;
        }
        let i = (a & 0x3FFFE) as usize;
        self.vram[i] = value as u8;
        self.vram[i + 1] = (value >> 8) as u8;
    }

    pub fn read8(&mut self, timestamp: i32, addr: u32, irq: &mut IrqLines) -> u8 {
        let half = self.read16(timestamp, addr & !1, irq);
        (half >> ((addr & 1) * 8)) as u8
    }

    pub fn write8(&mut self, timestamp: i32, addr: u32, value: u8, irq: &mut IrqLines) {
        let a = addr & 0x7FFFF;
        if (0x5F800..0x60000).contains(&a) {
            self.update(timestamp, irq);
            // Registers are 16-bit; byte writes merge into the halfword.
            let old = self.reg_read(a & 0x7E);
            let new = if addr & 1 == 0 {
                (old & 0xFF00) | u16::from(value)
            } else {
                (old & 0x00FF) | (u16::from(value) << 8)
            };
            self.reg_write(a & 0x7E, new, irq);
            return;
        }
        self.vram[(a & 0x3FFFF) as usize] = value;
    }

    fn reg_read(&self, offset: u32) -> u16 {
        match offset {
            0x00 => self.intpnd,
            0x02 => self.intenb,
            0x20 => {
                // DPSTTS: display control readback plus phase busy flags.
                let mut v = self.dpctrl & 0x0702;
                v |= 0x0040; // SCANRDY
                match self.phase {
                    Phase::LeftDisplay => v |= 0x0004 << (self.display_fb * 2),
                    Phase::RightDisplay => v |= 0x0008 << (self.display_fb * 2),
                    _ => {}
                }
                v
            }
            0x22 => self.dpctrl,
            0x24 => u16::from(self.brta),
            0x26 => u16::from(self.brtb),
            0x28 => u16::from(self.brtc),
            0x2A => u16::from(self.rest),
            0x2E => self.frmcyc,
            0x40 => {
                // XPSTTS: drawing control readback plus busy flag.
                let mut v = self.xpctrl & 0x0002;
                if self.phase == Phase::Drawing && self.drawing_enabled() {
                    v |= 0x0004 << (self.display_fb ^ 1);
                }
                v
            }
            0x42 => self.xpctrl,
            0x44 => 2, // VER
            0x48 | 0x4A | 0x4C | 0x4E => self.spt[((offset - 0x48) >> 1) as usize],
            0x60 | 0x62 | 0x64 | 0x66 => self.gplt[((offset - 0x60) >> 1) as usize],
            0x68 | 0x6A | 0x6C | 0x6E => self.jplt[((offset - 0x68) >> 1) as usize],
            0x70 => u16::from(self.bkcol),
            _ => 0,
        }
    }

    fn reg_write(&mut self, offset: u32, value: u16, irq: &mut IrqLines) {
        match offset {
            // INTPND is read-only; INTCLR clears pending bits.
            0x00 => {}
            0x02 => {
                self.intenb = value;
                self.update_irq(irq);
            }
            0x04 => {
                self.intpnd &= !value;
                self.update_irq(irq);
            }
            0x22 => {
                self.dpctrl = value & 0x0702;
                if value & 0x0001 != 0 {
                    // DPRST: clear the display interrupt group.
                    self.intpnd &=
                        !(INT_LFBEND | INT_RFBEND | INT_FRAMESTART | INT_GAMESTART | INT_SCANERR);
                    self.update_irq(irq);
                }
            }
            0x24 => self.brta = value as u8,
            0x26 => self.brtb = value as u8,
            0x28 => self.brtc = value as u8,
            0x2A => self.rest = value as u8,
            0x2E => self.frmcyc = value & 0x0F,
            0x42 => {
                self.xpctrl = value & 0x0002;
                if value & 0x0001 != 0 {
                    // XPRST: stop drawing and clear its interrupt group.
                    self.intpnd &= !(INT_XPEND | INT_SBHIT | INT_TIMEERR);
                    self.update_irq(irq);
                }
            }
            0x48 | 0x4A | 0x4C | 0x4E => self.spt[((offset - 0x48) >> 1) as usize] = value,
            0x60 | 0x62 | 0x64 | 0x66 => self.gplt[((offset - 0x60) >> 1) as usize] = value & 0xFC,
            0x68 | 0x6A | 0x6C | 0x6E => self.jplt[((offset - 0x68) >> 1) as usize] = value & 0xFC,
            0x70 => self.bkcol = (value & 3) as u8,
            _ => {
                log(LogCategory::VIP, LogLevel::Trace, || {
                    format!("VIP: write to unhandled register {:#04X} = {:#06X}", offset, value)
                });
            }
        }
    }

    /// Push the displayed framebuffer pair through the brightness registers
    /// into the anaglyph output image.
    fn render(&mut self) {
        if !self.display_enabled() {
            for px in &mut self.pixels {
                *px = 0;
            }
            return;
        }

        // Brightness levels for 2 bpp values 0..3, scaled to 0..255.
        let a = u16::from(self.brta);
        let b = u16::from(self.brtb);
        let levels = [
            0u8,
            scale_brightness(a),
            scale_brightness(b),
            scale_brightness(a + b + u16::from(self.brtc)),
        ];

        let left_base = usize::from(self.display_fb) * 0x8000;
        let right_base = 0x10000 + usize::from(self.display_fb) * 0x8000;

        for x in 0..DISPLAY_WIDTH {
            // Column-major, 4 pixels per byte, 64 bytes per column.
            let col = x * 64;
            for y in 0..DISPLAY_HEIGHT {
                let byte = col + (y >> 2);
                let shift = ((y & 3) * 2) as u8;
                let l = levels[usize::from((self.vram[left_base + byte] >> shift) & 3)];
                let r = levels[usize::from((self.vram[right_base + byte] >> shift) & 3)];
                self.pixels[y * DISPLAY_WIDTH + x] =
                    tint(self.color_left, l) | tint(self.color_right, r);
            }
        }
    }

    /// Frame rebase: shift the phase machine's absolute timestamps down.
    pub fn reset_ts(&mut self, base: i32) {
        self.frame_base -= base;
        self.phase_ts -= base;
    }
}

fn scale_brightness(level: u16) -> u8 {
    (level.min(127) * 2).min(255) as u8
}

fn tint(color: u32, intensity: u8) -> u32 {
    let i = u32::from(intensity);
    let r = ((color >> 16) & 0xFF) * i / 255;
    let g = ((color >> 8) & 0xFF) * i / 255;
    let b = (color & 0xFF) * i / 255;
    (r << 16) | (g << 8) | b
}

impl Default for Vip {
    fn default() -> Self {
        Self::new()
    }
}
