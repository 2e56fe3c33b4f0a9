//! VSU audio synthesis unit.
//!
//! The VSU runs at a quarter of the master clock; the bus converts
//! timestamps into this domain before forwarding writes (its registers are
//! write-only from the bus side). Five wavetable channels plus one noise
//! channel mix into a stereo pair, one sample per VSU clock. Samples
//! accumulate in two independent channel buffers that the frame driver
//! drains at the end of every frame.
//!
//! Register file (byte offsets within the region, 4-byte stride):
//! - `$000-$27F`: wave RAM, 5 tables of 32 six-bit samples
//! - `$400 + ch*$40`: per-channel registers
//!   - `+$00 INT`: bit 7 start, bit 5 timed, bits 4-0 interval
//!   - `+$04 LRV`: left volume high nybble, right volume low nybble
//!   - `+$08 FQL` / `+$0C FQH`: 11-bit frequency divider
//!   - `+$10 EV0`: initial envelope bits 7-4, direction bit 3, step bits 2-0
//!   - `+$14 EV1`: envelope enable bit 0, repeat bit 1, noise tap bits 6-4
//!   - `+$18 RAM`: wave table select
//!   - `+$1C SWP`: sweep/modulation (channel 4)
//! - `$580 SSTOP`: bit 0 stops every channel
//!
//! Synthesis here is deliberately plain: waveform, envelope and length
//! timing are cycle-counted and deterministic, which is what the scheduler
//! and the save-state machinery care about.

use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

/// VSU clocks per wave-position step is `2048 - frequency`.
const FREQ_RANGE: i32 = 2048;
/// VSU clocks per envelope step unit.
const ENV_UNIT: i32 = 4096;
/// VSU clocks per interval (timed sound) unit.
const DUR_UNIT: i32 = 1920;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Channel {
    enabled: bool,
    /// Timed mode: channel stops itself after the interval elapses
    timed: bool,
    interval: u8,
    left_vol: u8,
    right_vol: u8,
    freq: u16,
    env_val: u8,
    env_grow: bool,
    env_step: u8,
    env_enabled: bool,
    env_repeat: bool,
    wave: u8,
    /// Noise feedback tap selector (channel 5)
    tap: u8,
    sweep: u8,

    // Runtime counters, all in VSU clocks
    phase: u8,
    phase_divider: i32,
    env_divider: i32,
    dur_divider: i32,
    lfsr: u16,
}

impl Channel {
    fn new() -> Self {
        Self {
            enabled: false,
            timed: false,
            interval: 0,
            left_vol: 0,
            right_vol: 0,
            freq: 0,
            env_val: 0,
            env_grow: false,
            env_step: 0,
            env_enabled: false,
            env_repeat: false,
            wave: 0,
            tap: 0,
            sweep: 0,
            phase: 0,
            phase_divider: FREQ_RANGE,
            env_divider: 0,
            dur_divider: 0,
            lfsr: 0x7FFF,
        }
    }

    fn start(&mut self) {
        self.enabled = true;
        self.phase = 0;
        self.phase_divider = FREQ_RANGE - i32::from(self.freq);
        self.env_divider = (i32::from(self.env_step) + 1) * ENV_UNIT;
        self.dur_divider = (i32::from(self.interval) + 1) * DUR_UNIT;
        self.lfsr = 0x7FFF;
    }

    /// Advance one VSU clock; returns the 6-bit waveform level, or None
    /// when the channel contributes silence.
    fn clock(&mut self, wave_ram: &[[u8; 32]; 5], noise: bool) -> Option<u8> {
        if !self.enabled {
            return None;
        }

        if self.timed {
            self.dur_divider -= 1;
            if self.dur_divider <= 0 {
                self.enabled = false;
                return None;
            }
        }

        self.phase_divider -= 1;
        if self.phase_divider <= 0 {
            self.phase_divider = FREQ_RANGE - i32::from(self.freq);
            if noise {
                let tap_bit = 7 + u16::from(self.tap & 7);
                let fb = ((self.lfsr >> 7) ^ (self.lfsr >> tap_bit)) & 1;
                self.lfsr = (self.lfsr << 1) | fb;
            } else {
                self.phase = (self.phase + 1) & 31;
            }
        }

        if self.env_enabled {
            self.env_divider -= 1;
            if self.env_divider <= 0 {
                self.env_divider = (i32::from(self.env_step) + 1) * ENV_UNIT;
                if self.env_grow {
                    if self.env_val < 15 {
                        self.env_val += 1;
                    } else if self.env_repeat {
                        self.env_val = 0;
                    }
                } else if self.env_val > 0 {
                    self.env_val -= 1;
                } else if self.env_repeat {
                    self.env_val = 15;
                }
            }
        }

        let level = if noise {
            if self.lfsr & 1 != 0 {
                63
            } else {
                0
            }
        } else {
            let table = usize::from(self.wave & 7);
            if table >= 5 {
                return None;
            }
            wave_ram[table][usize::from(self.phase)] & 0x3F
        };
        Some(level)
    }
}

/// VSU audio unit
#[derive(Debug, Serialize, Deserialize)]
pub struct Vsu {
    wave_ram: [[u8; 32]; 5],
    channels: [Channel; 6],
    /// VSU-domain timestamp the synthesizer has run to
    last_ts: i32,
    /// Per-channel output buffers (left, right), drained each frame
    #[serde(skip)]
    buffers: [Vec<i16>; 2],
}

impl Vsu {
    pub fn new() -> Self {
        Self {
            wave_ram: [[0; 32]; 5],
            channels: [
                Channel::new(),
                Channel::new(),
                Channel::new(),
                Channel::new(),
                Channel::new(),
                Channel::new(),
            ],
            last_ts: 0,
            buffers: [Vec::new(), Vec::new()],
        }
    }

    pub fn power(&mut self) {
        let buffers = std::mem::take(&mut self.buffers);
        *self = Self::new();
        self.buffers = buffers;
        for buf in &mut self.buffers {
            buf.clear();
        }
    }

    /// Register write at a VSU-domain timestamp.
    pub fn write(&mut self, timestamp: i32, addr: u32, value: u8) {
        self.run_to(timestamp);

        let a = addr & 0x7FF;
        match a {
            0x000..=0x27F => {
                let table = (a >> 7) as usize;
                if table < 5 {
                    self.wave_ram[table][((a & 0x7F) >> 2) as usize] = value & 0x3F;
                }
            }
            0x400..=0x57F => {
                let ch = ((a - 0x400) >> 6) as usize;
                let reg = (a & 0x3F) >> 2;
                let c = &mut self.channels[ch];
                match reg {
                    0 => {
                        c.timed = value & 0x20 != 0;
                        c.interval = value & 0x1F;
                        if value & 0x80 != 0 {
                            c.start();
                        } else {
                            c.enabled = false;
                        }
                    }
                    1 => {
                        c.left_vol = value >> 4;
                        c.right_vol = value & 0x0F;
                    }
                    2 => c.freq = (c.freq & 0x700) | u16::from(value),
                    3 => c.freq = (c.freq & 0x0FF) | (u16::from(value & 0x07) << 8),
                    4 => {
                        c.env_val = value >> 4;
                        c.env_grow = value & 0x08 != 0;
                        c.env_step = value & 0x07;
                    }
                    5 => {
                        c.env_enabled = value & 0x01 != 0;
                        c.env_repeat = value & 0x02 != 0;
                        c.tap = (value >> 4) & 0x07;
                    }
                    6 => c.wave = value & 0x07,
                    7 => c.sweep = value,
                    // Each channel block spans 0x40 bytes but only the
                    // first 0x20 decode to registers; the rest is ignored.
                    _ => {
                        log(LogCategory::VSU, LogLevel::Trace, || {
                            format!("VSU: write to unmapped offset {:#05X} = {:#04X}", a, value)
                        });
                    }
                }
            }
            0x580 => {
                if value & 1 != 0 {
                    for c in &mut self.channels {
                        c.enabled = false;
                    }
                }
            }
            _ => {}
        }
    }

    /// Synthesize up to `timestamp`, one stereo sample per VSU clock.
    fn run_to(&mut self, timestamp: i32) {
        while self.last_ts < timestamp {
            let mut left = 0i32;
            let mut right = 0i32;

            for (i, c) in self.channels.iter_mut().enumerate() {
                let noise = i == 5;
                if let Some(level) = c.clock(&self.wave_ram, noise) {
                    let centered = i32::from(level) - 32;
                    let env = i32::from(c.env_val);
                    left += centered * env * i32::from(c.left_vol);
                    right += centered * env * i32::from(c.right_vol);
                }
            }

            self.buffers[0].push(saturate(left));
            self.buffers[1].push(saturate(right));
            self.last_ts += 1;
        }
    }

    /// Close out the frame at the final VSU-domain timestamp and reset the
    /// clock base for the next frame.
    pub fn end_frame(&mut self, timestamp: i32) {
        self.run_to(timestamp);
        self.last_ts = 0;
    }

    /// Drain one channel's buffered samples (0 = left, 1 = right).
    pub fn read_samples(&mut self, channel: usize, out: &mut Vec<i16>) -> usize {
        let buf = &mut self.buffers[channel];
        let n = buf.len();
        out.append(buf);
        n
    }

    /// Buffered sample count for one channel without draining.
    pub fn buffered(&self, channel: usize) -> usize {
        self.buffers[channel].len()
    }
}

fn saturate(v: i32) -> i16 {
    // Six channels at full scale stay inside i16; clamp anyway.
    v.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

impl Default for Vsu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_count_matches_clock() {
        let mut vsu = Vsu::new();
        vsu.end_frame(1000);
        assert_eq!(vsu.buffered(0), 1000);
        assert_eq!(vsu.buffered(1), 1000);

        // Next frame starts from a fresh base.
        vsu.end_frame(250);
        assert_eq!(vsu.buffered(0), 1250);
    }

    #[test]
    fn test_silence_when_no_channel_enabled() {
        let mut vsu = Vsu::new();
        vsu.end_frame(100);
        let mut out = Vec::new();
        vsu.read_samples(0, &mut out);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_drain_empties_buffers() {
        let mut vsu = Vsu::new();
        vsu.end_frame(64);
        let mut out = Vec::new();
        assert_eq!(vsu.read_samples(0, &mut out), 64);
        assert_eq!(vsu.buffered(0), 0);
        assert_eq!(vsu.buffered(1), 64);
    }

    #[test]
    fn test_enabled_channel_produces_output() {
        let mut vsu = Vsu::new();
        // Flat maximum waveform in table 0.
        for i in 0..32 {
            vsu.write(0, i * 4, 0x3F);
        }
        vsu.write(0, 0x418, 0x00); // wave table 0
        vsu.write(0, 0x404, 0xFF); // full stereo volume
        vsu.write(0, 0x410, 0xF0); // envelope at maximum, held
        vsu.write(0, 0x400, 0x80); // start

        vsu.end_frame(100);
        let mut out = Vec::new();
        vsu.read_samples(0, &mut out);
        assert!(out.iter().any(|&s| s != 0));
    }

    #[test]
    fn test_stop_all_register() {
        let mut vsu = Vsu::new();
        vsu.write(0, 0x400, 0x80);
        vsu.write(0, 0x440, 0x80);
        assert!(vsu.channels[0].enabled);
        assert!(vsu.channels[1].enabled);

        vsu.write(0, 0x580, 0x01);
        assert!(vsu.channels.iter().all(|c| !c.enabled));
    }

    #[test]
    fn test_timed_channel_stops_itself() {
        let mut vsu = Vsu::new();
        vsu.write(0, 0x400, 0xA0); // start, timed, interval 0
        assert!(vsu.channels[0].enabled);

        vsu.end_frame(DUR_UNIT + 1);
        assert!(!vsu.channels[0].enabled);
    }

    #[test]
    fn test_unmapped_channel_offsets_ignored() {
        let mut vsu = Vsu::new();
        vsu.write(0, 0x400, 0x80);
        let before = vsu.channels[0].clone();

        // Upper half of a channel block has no registers behind it.
        vsu.write(0, 0x420, 0xFF);
        vsu.write(0, 0x43C, 0xFF);
        vsu.write(0, 0x57C, 0xFF);

        let after = &vsu.channels[0];
        assert_eq!(after.enabled, before.enabled);
        assert_eq!(after.freq, before.freq);
        assert_eq!(after.left_vol, before.left_vol);
        assert_eq!(after.sweep, before.sweep);
    }

    #[test]
    fn test_frequency_register_assembly() {
        let mut vsu = Vsu::new();
        vsu.write(0, 0x408, 0xAB);
        vsu.write(0, 0x40C, 0x05);
        assert_eq!(vsu.channels[0].freq, 0x5AB);
    }

    #[test]
    fn test_writes_are_clock_ordered() {
        let mut vsu = Vsu::new();
        // A write at t=50 forces synthesis of the first 50 samples with the
        // channel still silent.
        vsu.write(50, 0x400, 0x80);
        assert_eq!(vsu.buffered(0), 50);
    }
}
