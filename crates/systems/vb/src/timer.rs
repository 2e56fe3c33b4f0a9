//! Hardware timer.
//!
//! A 16-bit down-counter ticking at a selectable 20 µs (400 master cycles)
//! or 100 µs (2000 master cycles) rate. Reaching zero sets the zero status
//! flag, asserts the timer interrupt when enabled, and reloads the counter
//! from the latch. Writing either half of the reload latch also loads the
//! live counter.
//!
//! Registers in the hardware-control space:
//! - `$18 (TLR)`: reload/counter low byte
//! - `$1C (THR)`: reload/counter high byte
//! - `$20 (TCR)`: control
//!   - Bit 0: T-Enb (timer enable)
//!   - Bit 1: Z-Stat (zero status, read-only)
//!   - Bit 2: Z-Stat-Clr (write 1 to clear zero status)
//!   - Bit 3: Tim-Z-Int (interrupt enable)
//!   - Bit 4: T-Clk-Sel (1 = 20 µs tick, 0 = 100 µs tick)
//!
//! The timer is serviced lazily: register accesses and scheduler updates
//! first advance it to the live timestamp, so the counter always reads as
//! if it were clocked continuously.

use crate::irq::{IrqLines, IrqSource};
use crate::scheduler::EVENT_NONE;
use serde::{Deserialize, Serialize};

const TICK_20US: i32 = 400;
const TICK_100US: i32 = 2000;

/// Virtual Boy hardware timer
#[derive(Debug, Serialize, Deserialize)]
pub struct VbTimer {
    /// Reload latch (TLR/THR)
    reload: u16,
    /// Live counter
    counter: u16,
    /// Master cycles accumulated toward the next tick
    divider: i32,
    /// Timestamp the timer was last advanced to
    last_ts: i32,
    enabled: bool,
    /// Zero status flag
    zstat: bool,
    int_enabled: bool,
    /// true = 20 µs tick, false = 100 µs tick
    clk_20us: bool,
}

impl VbTimer {
    pub fn new() -> Self {
        Self {
            reload: 0,
            counter: 0,
            divider: 0,
            last_ts: 0,
            enabled: false,
            zstat: false,
            int_enabled: false,
            clk_20us: false,
        }
    }

    /// Power-on state
    pub fn power(&mut self, irq: &mut IrqLines) {
        *self = Self::new();
        irq.assert_irq(IrqSource::Timer, false);
    }

    fn period(&self) -> i32 {
        if self.clk_20us {
            TICK_20US
        } else {
            TICK_100US
        }
    }

    /// Advance the counter to `timestamp`.
    fn catch_up(&mut self, timestamp: i32, irq: &mut IrqLines) {
        let elapsed = timestamp - self.last_ts;
        self.last_ts = timestamp;

        if !self.enabled || elapsed <= 0 {
            return;
        }

        self.divider += elapsed;
        let period = self.period();
        while self.divider >= period {
            self.divider -= period;
            self.tick(irq);
        }
    }

    fn tick(&mut self, irq: &mut IrqLines) {
        if self.counter == 0 {
            // Reload tick; a zero latch leaves the counter parked.
            self.counter = self.reload;
        } else {
            self.counter -= 1;
            if self.counter == 0 {
                self.zstat = true;
                if self.int_enabled {
                    irq.assert_irq(IrqSource::Timer, true);
                }
            }
        }
    }

    /// Service the timer at `timestamp` and return its next due timestamp.
    pub fn update(&mut self, timestamp: i32, irq: &mut IrqLines) -> i32 {
        self.catch_up(timestamp, irq);
        self.next_event(timestamp)
    }

    /// Absolute timestamp of the next zero crossing, or the sentinel when
    /// the timer cannot fire.
    pub fn next_event(&self, timestamp: i32) -> i32 {
        if !self.enabled {
            return EVENT_NONE;
        }
        let ticks = if self.counter > 0 {
            i32::from(self.counter)
        } else if self.reload > 0 {
            // One reload tick, then a full count down.
            i32::from(self.reload) + 1
        } else {
            return EVENT_NONE;
        };
        timestamp + ticks * self.period() - self.divider
    }

    pub fn read(&mut self, timestamp: i32, addr: u32, irq: &mut IrqLines) -> u8 {
        self.catch_up(timestamp, irq);
        match addr & 0xFF {
            0x18 => self.counter as u8,
            0x1C => (self.counter >> 8) as u8,
            0x20 => {
                0xE4 | u8::from(self.enabled)
                    | (u8::from(self.zstat) << 1)
                    | (u8::from(self.int_enabled) << 3)
                    | (u8::from(self.clk_20us) << 4)
            }
            _ => 0,
        }
    }

    pub fn write(&mut self, timestamp: i32, addr: u32, value: u8, irq: &mut IrqLines) {
        self.catch_up(timestamp, irq);
        match addr & 0xFF {
            0x18 => {
                self.reload = (self.reload & 0xFF00) | u16::from(value);
                self.counter = self.reload;
            }
            0x1C => {
                self.reload = (self.reload & 0x00FF) | (u16::from(value) << 8);
                self.counter = self.reload;
            }
            0x20 => {
                self.enabled = value & 0x01 != 0;
                if value & 0x04 != 0 {
                    self.zstat = false;
                    irq.assert_irq(IrqSource::Timer, false);
                }
                self.int_enabled = value & 0x08 != 0;
                if !self.int_enabled {
                    irq.assert_irq(IrqSource::Timer, false);
                } else if self.zstat {
                    irq.assert_irq(IrqSource::Timer, true);
                }
                let clk = value & 0x10 != 0;
                if clk != self.clk_20us {
                    self.clk_20us = clk;
                    self.divider = 0;
                }
            }
            _ => {}
        }
    }

    /// Frame rebase: the caller has already serviced the timer at the old
    /// stop timestamp, so only the base moves.
    pub fn reset_ts(&mut self) {
        self.last_ts = 0;
    }
}

impl Default for VbTimer {
    fn default() -> Self {
        Self::new()
    }
}
