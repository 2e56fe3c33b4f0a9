//! Interrupt priority resolution.
//!
//! Five interrupt sources feed the CPU through a single priority encoder:
//! the highest asserted source index is the active level. The level is
//! recomputed synchronously on every assert/deassert and is never cached
//! past a mutation; the CPU samples it at instruction boundaries.

use emu_core::logging::{log, LogCategory, LogLevel};

/// Interrupt sources in priority order (higher index wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqSource {
    GamePad = 0,
    Timer = 1,
    Expansion = 2,
    Link = 3,
    Vip = 4,
}

/// The five interrupt request lines and their resolved priority level.
#[derive(Debug, Default)]
pub struct IrqLines {
    asserted: u8,
    level: Option<u8>,
}

impl IrqLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert or deassert one source and recompute the active level.
    pub fn assert_irq(&mut self, source: IrqSource, on: bool) {
        let bit = 1u8 << (source as u8);
        let before = self.asserted;

        self.asserted &= !bit;
        if on {
            self.asserted |= bit;
        }

        if self.asserted != before {
            self.recalc();
            log(LogCategory::Interrupts, LogLevel::Debug, || {
                format!(
                    "IRQ: {:?} {} -> level {:?}",
                    source,
                    if on { "asserted" } else { "deasserted" },
                    self.level
                )
            });
        }
    }

    /// The currently active priority level, or `None` when no source is
    /// asserted (interrupt delivery disabled).
    #[inline]
    pub fn level(&self) -> Option<u8> {
        self.level
    }

    /// Raw asserted bitset, for save states.
    pub fn asserted_bits(&self) -> u8 {
        self.asserted
    }

    /// Restore the asserted bitset from a save state and rederive the level.
    pub fn restore(&mut self, bits: u8) {
        self.asserted = bits & 0x1F;
        self.recalc();
    }

    /// Drop all assertions (power-on).
    pub fn clear(&mut self) {
        self.asserted = 0;
        self.recalc();
    }

    fn recalc(&mut self) {
        self.level = None;
        for i in (0..5).rev() {
            if self.asserted & (1 << i) != 0 {
                self.level = Some(i);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_sources_no_level() {
        let irq = IrqLines::new();
        assert_eq!(irq.level(), None);
    }

    #[test]
    fn test_highest_source_wins() {
        let mut irq = IrqLines::new();
        irq.assert_irq(IrqSource::Timer, true);
        irq.assert_irq(IrqSource::Link, true);
        assert_eq!(irq.level(), Some(3));

        irq.assert_irq(IrqSource::Link, false);
        assert_eq!(irq.level(), Some(1));
    }

    #[test]
    fn test_deassert_all_clears_level() {
        let mut irq = IrqLines::new();
        irq.assert_irq(IrqSource::Vip, true);
        assert_eq!(irq.level(), Some(4));
        irq.assert_irq(IrqSource::Vip, false);
        assert_eq!(irq.level(), None);
    }

    #[test]
    fn test_reassert_is_idempotent() {
        let mut irq = IrqLines::new();
        irq.assert_irq(IrqSource::GamePad, true);
        irq.assert_irq(IrqSource::GamePad, true);
        assert_eq!(irq.level(), Some(0));
        assert_eq!(irq.asserted_bits(), 0x01);
    }

    #[test]
    fn test_restore_rederives_level() {
        let mut irq = IrqLines::new();
        irq.restore(0b01010);
        assert_eq!(irq.level(), Some(3));
        assert_eq!(irq.asserted_bits(), 0b01010);

        irq.restore(0);
        assert_eq!(irq.level(), None);
    }

    #[test]
    fn test_restore_masks_to_five_bits() {
        let mut irq = IrqLines::new();
        irq.restore(0xFF);
        assert_eq!(irq.asserted_bits(), 0x1F);
        assert_eq!(irq.level(), Some(4));
    }
}
