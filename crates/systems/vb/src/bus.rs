//! System bus: address decoding and peripheral dispatch.
//!
//! The CPU sees a 27-bit physical window, mirrored across the 32-bit space.
//! Bits 24-26 select one of eight 16 MiB regions:
//!
//! | Region | Contents                         |
//! |--------|----------------------------------|
//! | 0      | VIP (VRAM + display registers)   |
//! | 1      | VSU (write-only audio registers) |
//! | 2      | Hardware control (pad/timer/WCR) |
//! | 3, 4   | Unmapped                         |
//! | 5      | WRAM (64 KiB, mirrored)          |
//! | 6      | Cartridge RAM                    |
//! | 7      | Cartridge ROM                    |
//!
//! Accesses carry a live `&mut i32` timestamp so peripherals can be
//! serviced lazily at the exact cycle of the access. The 32-bit data bus
//! is not modeled; the CPU issues words as two halfword accesses.
//!
//! The bus also owns the event scheduler, the interrupt lines and all
//! peripherals, and hosts the due-event service pass.

use crate::cartridge::Cartridge;
use crate::input::GamePad;
use crate::irq::IrqLines;
use crate::scheduler::{EventKind, EventScheduler};
use crate::timer::VbTimer;
use crate::vip::Vip;
use crate::vsu::Vsu;
use emu_core::logging::{log, LogCategory, LogLevel};

pub const WRAM_SIZE: usize = 0x10000;
pub const GPRAM_SIZE: usize = 0x10000;

/// Physical address window.
const ADDR_MASK: u32 = 0x07FF_FFFF;

/// The eight 16 MiB regions selected by address bits 24-26.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Vip,
    Vsu,
    HwCtrl,
    Unmapped3,
    Unmapped4,
    Wram,
    CartRam,
    CartRom,
}

impl Region {
    #[inline]
    fn decode(addr: u32) -> Self {
        match (addr >> 24) & 7 {
            0 => Region::Vip,
            1 => Region::Vsu,
            2 => Region::HwCtrl,
            3 => Region::Unmapped3,
            4 => Region::Unmapped4,
            5 => Region::Wram,
            6 => Region::CartRam,
            _ => Region::CartRom,
        }
    }
}

/// The Virtual Boy memory bus and everything hanging off it.
#[derive(Debug)]
pub struct VbBus {
    pub(crate) wram: Vec<u8>,
    pub(crate) cart: Option<Cartridge>,
    pub(crate) gpram: Option<Vec<u8>>,
    /// Wait-state control register (2 writable bits)
    pub(crate) wcr: u8,
    /// Master-clock remainder carried between frames so the VSU clock
    /// never drifts: VSU timestamps are `(ts + fix) >> 2`.
    pub(crate) vsu_cycle_fix: i32,

    pub(crate) vip: Vip,
    pub(crate) vsu: Vsu,
    pub(crate) timer: VbTimer,
    pub(crate) pad: GamePad,
    pub(crate) irq: IrqLines,
    pub(crate) scheduler: EventScheduler,

    exit_requested: bool,
}

impl VbBus {
    pub fn new() -> Self {
        Self {
            wram: vec![0; WRAM_SIZE],
            cart: None,
            gpram: None,
            wcr: 0,
            vsu_cycle_fix: 0,
            vip: Vip::new(),
            vsu: Vsu::new(),
            timer: VbTimer::new(),
            pad: GamePad::new(),
            irq: IrqLines::new(),
            scheduler: EventScheduler::new(),
            exit_requested: false,
        }
    }

    /// Power-on: zero memories, reset peripherals and the scheduler.
    /// Cartridge contents are untouched.
    pub fn power(&mut self) {
        self.wram.iter_mut().for_each(|b| *b = 0);
        if let Some(gpram) = self.gpram.as_mut() {
            gpram.iter_mut().for_each(|b| *b = 0);
        }
        self.wcr = 0;
        self.vsu_cycle_fix = 0;
        self.irq.clear();
        self.vip.power(&mut self.irq);
        self.vsu.power();
        self.timer.power(&mut self.irq);
        self.pad.power(&mut self.irq);
        self.scheduler.reset();
        self.exit_requested = false;
        self.force_update_all(0);
    }

    pub fn set_cartridge(&mut self, cart: Option<Cartridge>) {
        self.gpram = cart.as_ref().map(|_| vec![0; GPRAM_SIZE]);
        self.cart = cart;
    }

    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cart.as_ref()
    }

    pub fn read8(&mut self, timestamp: &mut i32, addr: u32) -> u8 {
        let addr = addr & ADDR_MASK;
        match Region::decode(addr) {
            Region::Vip => self.vip.read8(*timestamp, addr, &mut self.irq),
            // VSU registers are write-only.
            Region::Vsu => 0,
            Region::HwCtrl => self.hwctrl_read(*timestamp, addr),
            Region::Unmapped3 | Region::Unmapped4 => 0,
            Region::Wram => self.wram[(addr & 0xFFFF) as usize],
            Region::CartRam => match &self.gpram {
                Some(gpram) => gpram[(addr & 0xFFFF) as usize],
                None => 0,
            },
            Region::CartRom => match &self.cart {
                Some(cart) => cart.read8(addr),
                None => 0,
            },
        }
    }

    pub fn read16(&mut self, timestamp: &mut i32, addr: u32) -> u16 {
        let addr = addr & ADDR_MASK & !1;
        match Region::decode(addr) {
            Region::Vip => self.vip.read16(*timestamp, addr, &mut self.irq),
            Region::Vsu => 0,
            Region::HwCtrl => u16::from(self.hwctrl_read(*timestamp, addr)),
            Region::Unmapped3 | Region::Unmapped4 => 0,
            Region::Wram => {
                let i = (addr & 0xFFFF) as usize;
                u16::from_le_bytes([self.wram[i], self.wram[i | 1]])
            }
            Region::CartRam => match &self.gpram {
                Some(gpram) => {
                    let i = (addr & 0xFFFF) as usize;
                    u16::from_le_bytes([gpram[i], gpram[i | 1]])
                }
                None => 0,
            },
            Region::CartRom => match &self.cart {
                Some(cart) => cart.read16(addr),
                None => 0,
            },
        }
    }

    pub fn write8(&mut self, timestamp: &mut i32, addr: u32, value: u8) {
        let addr = addr & ADDR_MASK;
        match Region::decode(addr) {
            Region::Vip => self.vip.write8(*timestamp, addr, value, &mut self.irq),
            Region::Vsu => {
                let ts_vsu = (*timestamp + self.vsu_cycle_fix) >> 2;
                self.vsu.write(ts_vsu, addr, value);
            }
            Region::HwCtrl => self.hwctrl_write(*timestamp, addr, value),
            Region::Unmapped3 | Region::Unmapped4 => {}
            Region::Wram => self.wram[(addr & 0xFFFF) as usize] = value,
            Region::CartRam => {
                if let Some(gpram) = self.gpram.as_mut() {
                    gpram[(addr & 0xFFFF) as usize] = value;
                }
            }
            // ROM writes fall off the bus.
            Region::CartRom => {}
        }
    }

    pub fn write16(&mut self, timestamp: &mut i32, addr: u32, value: u16) {
        let addr = addr & ADDR_MASK & !1;
        match Region::decode(addr) {
            Region::Vip => self.vip.write16(*timestamp, addr, value, &mut self.irq),
            Region::Vsu => {
                let ts_vsu = (*timestamp + self.vsu_cycle_fix) >> 2;
                self.vsu.write(ts_vsu, addr, value as u8);
            }
            Region::HwCtrl => self.hwctrl_write(*timestamp, addr, value as u8),
            Region::Unmapped3 | Region::Unmapped4 => {}
            Region::Wram => {
                let i = (addr & 0xFFFF) as usize;
                self.wram[i] = value as u8;
                self.wram[i | 1] = (value >> 8) as u8;
            }
            Region::CartRam => {
                if let Some(gpram) = self.gpram.as_mut() {
                    let i = (addr & 0xFFFF) as usize;
                    gpram[i] = value as u8;
                    gpram[i | 1] = (value >> 8) as u8;
                }
            }
            Region::CartRom => {}
        }
    }

    /// Direct memory poke bypassing the bus clock (cheats, tests).
    /// Only WRAM and cartridge RAM are patchable.
    pub fn poke8(&mut self, addr: u32, value: u8) {
        let addr = addr & ADDR_MASK;
        match Region::decode(addr) {
            Region::Wram => self.wram[(addr & 0xFFFF) as usize] = value,
            Region::CartRam => {
                if let Some(gpram) = self.gpram.as_mut() {
                    gpram[(addr & 0xFFFF) as usize] = value;
                }
            }
            _ => {}
        }
    }

    fn hwctrl_read(&mut self, timestamp: i32, addr: u32) -> u8 {
        // Hardware quirk: only word-aligned control accesses decode.
        if addr & 3 != 0 {
            log(LogCategory::Bus, LogLevel::Warn, || {
                format!("bogus hardware control read at {:#010X}", addr)
            });
            return 0;
        }
        match addr & 0xFF {
            0x10 | 0x14 | 0x28 => self.pad.read(timestamp, addr),
            0x18 | 0x1C | 0x20 => self.timer.read(timestamp, addr, &mut self.irq),
            0x24 => self.wcr | 0xFC,
            // Link port and the rest of the decode space.
            _ => 0,
        }
    }

    fn hwctrl_write(&mut self, timestamp: i32, addr: u32, value: u8) {
        if addr & 3 != 0 {
            log(LogCategory::Bus, LogLevel::Warn, || {
                format!("bogus hardware control write at {:#010X}", addr)
            });
            return;
        }
        match addr & 0xFF {
            0x10 | 0x14 | 0x28 => {
                self.pad.write(timestamp, addr, value, &mut self.irq);
                self.scheduler.set_event(EventKind::Input, self.pad.next_event());
            }
            0x18 | 0x1C | 0x20 => {
                self.timer.write(timestamp, addr, value, &mut self.irq);
                self.scheduler
                    .set_event(EventKind::Timer, self.timer.next_event(timestamp));
            }
            0x24 => self.wcr = value & 3,
            _ => {}
        }
    }

    /// Service every peripheral whose pending timestamp has come due, in
    /// slot order, and recompute the horizon. A completed video frame
    /// requests a run-loop exit.
    pub fn handle_events(&mut self, timestamp: i32) -> i32 {
        if self.scheduler.due(EventKind::Vip, timestamp) {
            let next = self.vip.update(timestamp, &mut self.irq);
            self.scheduler.store_next(EventKind::Vip, next);
        }
        if self.scheduler.due(EventKind::Timer, timestamp) {
            let next = self.timer.update(timestamp, &mut self.irq);
            self.scheduler.store_next(EventKind::Timer, next);
        }
        if self.scheduler.due(EventKind::Input, timestamp) {
            let next = self.pad.update(timestamp, &mut self.irq);
            self.scheduler.store_next(EventKind::Input, next);
        }
        if self.vip.frame_done() {
            self.exit_requested = true;
        }
        self.scheduler.recalc()
    }

    /// Unconditionally service all peripherals at `timestamp`. Used once
    /// per frame after the run loop stops and after a state load, where
    /// the pending timestamps cannot be trusted.
    pub fn force_update_all(&mut self, timestamp: i32) -> i32 {
        let next = self.vip.update(timestamp, &mut self.irq);
        self.scheduler.store_next(EventKind::Vip, next);
        let next = self.timer.update(timestamp, &mut self.irq);
        self.scheduler.store_next(EventKind::Timer, next);
        let next = self.pad.update(timestamp, &mut self.irq);
        self.scheduler.store_next(EventKind::Input, next);
        self.scheduler.recalc()
    }

    /// Ask the CPU run loop to stop at the next instruction boundary.
    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    /// Consume a pending exit request.
    pub fn take_exit(&mut self) -> bool {
        std::mem::replace(&mut self.exit_requested, false)
    }
}

impl Default for VbBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus_with_cart() -> VbBus {
        let mut rom = vec![0u8; 256];
        for (i, b) in rom.iter_mut().enumerate() {
            *b = i as u8;
        }
        let mut bus = VbBus::new();
        bus.set_cartridge(Some(Cartridge::load(&rom).unwrap()));
        bus
    }

    #[test]
    fn test_wram_round_trip() {
        let mut bus = VbBus::new();
        let mut ts = 0;
        bus.write16(&mut ts, 0x0500_1234, 0xCAFE);
        assert_eq!(bus.read16(&mut ts, 0x0500_1234), 0xCAFE);
        assert_eq!(bus.read8(&mut ts, 0x0500_1234), 0xFE);
        // WRAM mirrors through the full region.
        assert_eq!(bus.read16(&mut ts, 0x05FF_1234), 0xCAFE);
    }

    #[test]
    fn test_address_mirrors_to_27_bits() {
        let mut bus = VbBus::new();
        let mut ts = 0;
        bus.write8(&mut ts, 0x0500_0000, 0x42);
        assert_eq!(bus.read8(&mut ts, 0xFD00_0000), 0x42);
    }

    #[test]
    fn test_rom_reads_and_ignores_writes() {
        let mut bus = bus_with_cart();
        let mut ts = 0;
        assert_eq!(bus.read8(&mut ts, 0x0700_0003), 3);
        bus.write8(&mut ts, 0x0700_0003, 0xFF);
        assert_eq!(bus.read8(&mut ts, 0x0700_0003), 3);
    }

    #[test]
    fn test_rom_absent_reads_zero() {
        let mut bus = VbBus::new();
        let mut ts = 0;
        assert_eq!(bus.read16(&mut ts, 0x0700_0000), 0);
    }

    #[test]
    fn test_gpram_present_only_with_cartridge() {
        let mut bus = VbBus::new();
        let mut ts = 0;
        bus.write8(&mut ts, 0x0600_0000, 0x99);
        assert_eq!(bus.read8(&mut ts, 0x0600_0000), 0);

        let mut bus = bus_with_cart();
        bus.write8(&mut ts, 0x0600_0000, 0x99);
        assert_eq!(bus.read8(&mut ts, 0x0600_0000), 0x99);
        // Mirrored through the region like WRAM.
        assert_eq!(bus.read8(&mut ts, 0x06FF_0000), 0x99);
    }

    #[test]
    fn test_unmapped_regions() {
        let mut bus = VbBus::new();
        let mut ts = 0;
        bus.write16(&mut ts, 0x0300_0000, 0xFFFF);
        bus.write16(&mut ts, 0x0400_0000, 0xFFFF);
        assert_eq!(bus.read16(&mut ts, 0x0300_0000), 0);
        assert_eq!(bus.read16(&mut ts, 0x0400_0000), 0);
    }

    #[test]
    fn test_bogus_control_access() {
        let mut bus = VbBus::new();
        let mut ts = 0;
        // Misaligned control accesses neither decode nor disturb state.
        bus.write8(&mut ts, 0x0200_0025, 0xFF);
        assert_eq!(bus.read8(&mut ts, 0x0200_0025), 0);
        assert_eq!(bus.read8(&mut ts, 0x0200_0024), 0xFC);
    }

    #[test]
    fn test_wcr_two_writable_bits() {
        let mut bus = VbBus::new();
        let mut ts = 0;
        bus.write8(&mut ts, 0x0200_0024, 0xFF);
        assert_eq!(bus.read8(&mut ts, 0x0200_0024), 0xFF);
        bus.write8(&mut ts, 0x0200_0024, 0x01);
        assert_eq!(bus.read8(&mut ts, 0x0200_0024), 0xFD);
    }

    #[test]
    fn test_vsu_write_clock_conversion() {
        let mut bus = VbBus::new();
        bus.vsu_cycle_fix = 3;
        // (13 + 3) >> 2 = 4 VSU clocks synthesized before the write lands.
        let mut ts = 13;
        bus.write8(&mut ts, 0x0100_0400, 0x00);
        assert_eq!(bus.vsu.buffered(0), 4);
    }

    #[test]
    fn test_vsu_reads_zero() {
        let mut bus = VbBus::new();
        let mut ts = 0;
        assert_eq!(bus.read8(&mut ts, 0x0100_0400), 0);
        assert_eq!(bus.read16(&mut ts, 0x0100_0400), 0);
    }

    #[test]
    fn test_timer_write_schedules_event() {
        let mut bus = VbBus::new();
        let mut ts = 0;
        bus.write8(&mut ts, 0x0200_0018, 5);
        bus.write8(&mut ts, 0x0200_0020, 0x01);
        assert_eq!(bus.scheduler.pending(EventKind::Timer), 5 * 2000);
    }

    #[test]
    fn test_frame_completion_requests_exit() {
        let mut bus = VbBus::new();
        bus.power();
        bus.vip.start_frame();
        assert!(!bus.take_exit());

        bus.handle_events(crate::vip::FRAME_CYCLES);
        assert!(bus.take_exit());
        // The request is edge-consumed.
        assert!(!bus.take_exit());
    }

    #[test]
    fn test_power_clears_memories() {
        let mut bus = bus_with_cart();
        let mut ts = 0;
        bus.write8(&mut ts, 0x0500_0000, 0xAA);
        bus.write8(&mut ts, 0x0600_0000, 0xBB);
        bus.wcr = 3;
        bus.vsu_cycle_fix = 2;

        bus.power();
        assert_eq!(bus.read8(&mut ts, 0x0500_0000), 0);
        assert_eq!(bus.read8(&mut ts, 0x0600_0000), 0);
        assert_eq!(bus.wcr, 0);
        assert_eq!(bus.vsu_cycle_fix, 0);
        // ROM survives power cycling.
        assert_eq!(bus.read8(&mut ts, 0x0700_0003), 3);
    }
}
