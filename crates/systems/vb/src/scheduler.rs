//! Timestamp-based event scheduling.
//!
//! Each peripheral that needs servicing (VIP, timer, game pad) owns one
//! pending timestamp: the absolute cycle count at which it next requires an
//! update. The CPU runs freely until its cycle counter reaches the minimum
//! of the pending timestamps (the "horizon"), services whatever is due, and
//! picks up the new minimum.
//!
//! Timestamps are signed 32-bit cycle counts rebased to zero once per frame
//! so they stay small. `EVENT_NONE` is a sentinel far outside the legal
//! range meaning "nothing pending"; `clamp_distant` keeps drifting
//! timestamps from ever colliding with its bit pattern.

/// Sentinel pending value: no event scheduled.
pub const EVENT_NONE: i32 = 0x7FFF_FFFF;

/// Any pending timestamp with this bit set is treated as effectively
/// infinite and collapsed back to the sentinel before rebasing arithmetic
/// can push it into sentinel territory.
const DISTANT_BIT: i32 = 0x4000_0000;

/// Peripheral event slots, in service order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Vip = 0,
    Timer = 1,
    Input = 2,
}

const SLOT_COUNT: usize = 3;

/// Pending event timestamps for all peripherals plus the CPU-visible
/// horizon (the next timestamp at which the CPU must hand control back).
#[derive(Debug)]
pub struct EventScheduler {
    pending: [i32; SLOT_COUNT],
    horizon: i32,
}

impl Default for EventScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventScheduler {
    pub fn new() -> Self {
        Self {
            pending: [EVENT_NONE; SLOT_COUNT],
            horizon: EVENT_NONE,
        }
    }

    /// Clear every slot to the sentinel (power-on).
    pub fn reset(&mut self) {
        self.pending = [EVENT_NONE; SLOT_COUNT];
        self.horizon = EVENT_NONE;
    }

    /// A peripheral schedules (or reschedules) its own next wake-up.
    ///
    /// The horizon only ever moves earlier here; if the new timestamp is
    /// later than the current horizon the CPU will simply find nothing due
    /// at the old horizon and recompute.
    pub fn set_event(&mut self, kind: EventKind, timestamp: i32) {
        self.pending[kind as usize] = timestamp;
        if timestamp < self.horizon {
            self.horizon = timestamp;
        }
    }

    /// Is this peripheral due for service at `timestamp`?
    #[inline]
    pub fn due(&self, kind: EventKind, timestamp: i32) -> bool {
        timestamp >= self.pending[kind as usize]
    }

    /// Store the next-due timestamp a peripheral returned from `update`.
    /// Unlike [`set_event`] this does not touch the horizon; callers
    /// recompute it with [`recalc`] after a service pass.
    ///
    /// [`set_event`]: EventScheduler::set_event
    /// [`recalc`]: EventScheduler::recalc
    pub fn store_next(&mut self, kind: EventKind, timestamp: i32) {
        self.pending[kind as usize] = timestamp;
    }

    /// Recompute the global minimum and make it the new horizon.
    /// Ties keep the first slot in service order (VIP, timer, input).
    pub fn recalc(&mut self) -> i32 {
        let mut min = self.pending[0];
        if self.pending[1] < min {
            min = self.pending[1];
        }
        if self.pending[2] < min {
            min = self.pending[2];
        }
        self.horizon = min;
        min
    }

    /// The timestamp at which the CPU must next hand control back.
    #[inline]
    pub fn horizon(&self) -> i32 {
        self.horizon
    }

    /// Current pending timestamp of one slot.
    pub fn pending(&self, kind: EventKind) -> i32 {
        self.pending[kind as usize]
    }

    /// Shift every pending timestamp down by `timestamp` so the CPU's cycle
    /// counter can restart from zero.
    ///
    /// Every slot must be strictly in the future: a slot at or before the
    /// rebase point means a peripheral was never serviced and the scheduler
    /// is inconsistent. That is a programming defect, not a runtime
    /// condition, so it only trips a debug assertion.
    pub fn rebase(&mut self, timestamp: i32) {
        for ts in &mut self.pending {
            debug_assert!(
                *ts > timestamp,
                "pending event at {} not serviced before rebase to {}",
                *ts,
                timestamp
            );
            *ts -= timestamp;
        }
        self.recalc();
    }

    /// Collapse any pending timestamp that has drifted far into the future
    /// back to the sentinel, so that later rebase arithmetic can never
    /// produce a value colliding with the sentinel's bit pattern.
    pub fn clamp_distant(&mut self) {
        for ts in &mut self.pending {
            if *ts & DISTANT_BIT != 0 {
                *ts = EVENT_NONE;
            }
        }
    }
}
