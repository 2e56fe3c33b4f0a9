//! Game pad serial interface.
//!
//! The controller is read over a serial link: software kicks off a hardware
//! read through the serial control register, the transfer completes a fixed
//! number of cycles later, and the 16 button bits become readable in the
//! serial data registers. Completion can raise the game pad interrupt
//! (source 0) so games can sleep through the transfer.
//!
//! Registers in the hardware-control space:
//! - `$10 (SDLR)`: serial data low byte
//! - `$14 (SDHR)`: serial data high byte
//! - `$28 (SCR)`: serial control
//!   - Bit 1: SI-Stat (hardware read in progress, read-only)
//!   - Bit 2: HW-SI (write 1 to start a hardware read)
//!   - Bit 7: K-Int-Inh (inhibit the game pad interrupt)
//!
//! The latched value always carries the signature bit (bit 0) and, when the
//! frontend reports it, the low battery bit (bit 1).

use crate::irq::{IrqLines, IrqSource};
use crate::scheduler::EVENT_NONE;
use serde::{Deserialize, Serialize};

/// Cycles a hardware read takes to latch the buttons.
const HW_READ_CYCLES: i32 = 640;

/// Signature bit: always reads 1 on a real pad.
const PAD_SIGNATURE: u16 = 0x0001;
/// Low battery indicator bit.
const PAD_LOW_BATTERY: u16 = 0x0002;

/// Game pad serial unit
#[derive(Debug, Serialize, Deserialize)]
pub struct GamePad {
    /// Button snapshot for the current frame (polled once per frame)
    frame_buttons: u16,
    /// Latched serial data visible through SDLR/SDHR
    latched: u16,
    /// Hardware read completion timestamp, if one is in flight
    pending_done: Option<i32>,
    /// K-Int-Inh
    int_inhibit: bool,
    /// Low battery reported by the frontend
    low_battery: bool,
    /// Config: latch immediately instead of after the transfer delay
    instant_read: bool,
}

impl GamePad {
    pub fn new() -> Self {
        Self {
            frame_buttons: 0,
            latched: PAD_SIGNATURE,
            pending_done: None,
            int_inhibit: false,
            low_battery: false,
            instant_read: false,
        }
    }

    pub fn power(&mut self, irq: &mut IrqLines) {
        let instant = self.instant_read;
        let battery = self.low_battery;
        *self = Self::new();
        self.instant_read = instant;
        self.low_battery = battery;
        irq.assert_irq(IrqSource::GamePad, false);
    }

    /// Per-frame button snapshot from the frontend.
    pub fn set_frame_buttons(&mut self, buttons: u16) {
        self.frame_buttons = buttons;
    }

    /// Config: make hardware reads complete immediately. Some games poll in
    /// a tight loop and this trades accuracy for latency.
    pub fn set_instant_read(&mut self, on: bool) {
        self.instant_read = on;
    }

    pub fn set_low_battery(&mut self, on: bool) {
        self.low_battery = on;
    }

    fn latch_value(&self) -> u16 {
        let mut v = self.frame_buttons | PAD_SIGNATURE;
        if self.low_battery {
            v |= PAD_LOW_BATTERY;
        }
        v
    }

    fn complete_read(&mut self, irq: &mut IrqLines) {
        self.latched = self.latch_value();
        self.pending_done = None;
        if !self.int_inhibit {
            irq.assert_irq(IrqSource::GamePad, true);
        }
    }

    /// Service the pad at `timestamp` and return its next due timestamp.
    pub fn update(&mut self, timestamp: i32, irq: &mut IrqLines) -> i32 {
        if let Some(done) = self.pending_done {
            if timestamp >= done {
                self.complete_read(irq);
            }
        }
        self.next_event()
    }

    pub fn next_event(&self) -> i32 {
        self.pending_done.unwrap_or(EVENT_NONE)
    }

    pub fn read(&mut self, timestamp: i32, addr: u32) -> u8 {
        match addr & 0xFF {
            0x10 => self.latched as u8,
            0x14 => (self.latched >> 8) as u8,
            0x28 => {
                let busy = match self.pending_done {
                    Some(done) => timestamp < done,
                    None => false,
                };
                0x58 | (u8::from(busy) << 1) | (u8::from(self.int_inhibit) << 7)
            }
            _ => 0,
        }
    }

    pub fn write(&mut self, timestamp: i32, addr: u32, value: u8, irq: &mut IrqLines) {
        match addr & 0xFF {
            // Serial data registers are read-only.
            0x10 | 0x14 => {}
            0x28 => {
                self.int_inhibit = value & 0x80 != 0;
                // Any control write acknowledges the game pad interrupt.
                irq.assert_irq(IrqSource::GamePad, false);

                if value & 0x04 != 0 {
                    if self.instant_read {
                        self.latched = self.latch_value();
                        self.pending_done = None;
                    } else {
                        self.pending_done = Some(timestamp + HW_READ_CYCLES);
                    }
                }
            }
            _ => {}
        }
    }

    /// Frame rebase: shift any in-flight completion down with the counter.
    pub fn reset_ts(&mut self, base: i32) {
        if let Some(done) = self.pending_done.as_mut() {
            *done -= base;
        }
    }
}

impl Default for GamePad {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_pad_reads_signature() {
        let mut pad = GamePad::new();
        assert_eq!(pad.read(0, 0x10), 0x01);
        assert_eq!(pad.read(0, 0x14), 0x00);
        assert_eq!(pad.next_event(), EVENT_NONE);
    }

    #[test]
    fn test_hardware_read_latches_after_delay() {
        let mut pad = GamePad::new();
        let mut irq = IrqLines::new();
        pad.set_frame_buttons(0xA5A0);

        pad.write(100, 0x28, 0x04, &mut irq);
        assert_eq!(pad.next_event(), 100 + HW_READ_CYCLES);
        // Busy flag while the transfer is in flight.
        assert_eq!(pad.read(100, 0x28) & 0x02, 0x02);
        // Old data until completion.
        assert_eq!(pad.read(100, 0x10), 0x01);

        pad.update(100 + HW_READ_CYCLES, &mut irq);
        assert_eq!(pad.read(800, 0x10), 0xA1); // buttons | signature
        assert_eq!(pad.read(800, 0x14), 0xA5);
        assert_eq!(pad.read(800, 0x28) & 0x02, 0);
        assert_eq!(irq.level(), Some(0));
    }

    #[test]
    fn test_interrupt_inhibited() {
        let mut pad = GamePad::new();
        let mut irq = IrqLines::new();

        pad.write(0, 0x28, 0x84, &mut irq); // K-Int-Inh + HW-SI
        pad.update(HW_READ_CYCLES, &mut irq);
        assert_eq!(irq.level(), None);
    }

    #[test]
    fn test_control_write_acknowledges_interrupt() {
        let mut pad = GamePad::new();
        let mut irq = IrqLines::new();

        pad.write(0, 0x28, 0x04, &mut irq);
        pad.update(HW_READ_CYCLES, &mut irq);
        assert_eq!(irq.level(), Some(0));

        pad.write(1000, 0x28, 0x00, &mut irq);
        assert_eq!(irq.level(), None);
    }

    #[test]
    fn test_instant_read_hack() {
        let mut pad = GamePad::new();
        let mut irq = IrqLines::new();
        pad.set_instant_read(true);
        pad.set_frame_buttons(0x0300);

        pad.write(0, 0x28, 0x04, &mut irq);
        assert_eq!(pad.next_event(), EVENT_NONE);
        assert_eq!(pad.read(0, 0x14), 0x03);
    }

    #[test]
    fn test_low_battery_bit() {
        let mut pad = GamePad::new();
        let mut irq = IrqLines::new();
        pad.set_low_battery(true);
        pad.set_instant_read(true);

        pad.write(0, 0x28, 0x04, &mut irq);
        assert_eq!(pad.read(0, 0x10) & 0x02, 0x02);
    }

    #[test]
    fn test_reset_ts_shifts_pending() {
        let mut pad = GamePad::new();
        let mut irq = IrqLines::new();

        pad.write(1000, 0x28, 0x04, &mut irq);
        assert_eq!(pad.next_event(), 1640);

        pad.reset_ts(1500);
        assert_eq!(pad.next_event(), 140);
    }

    #[test]
    fn test_data_writes_ignored() {
        let mut pad = GamePad::new();
        let mut irq = IrqLines::new();
        pad.write(0, 0x10, 0xFF, &mut irq);
        pad.write(0, 0x14, 0xFF, &mut irq);
        assert_eq!(pad.read(0, 0x10), 0x01);
        assert_eq!(pad.read(0, 0x14), 0x00);
    }
}
