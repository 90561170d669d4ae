//! World clock.
//!
//! The tick counter is the single source of time for the core. Re-grouping
//! intervals, relay expiry, raid countdowns and sweeps are all measured in
//! ticks read from here. The counter only moves forward and uses checked
//! arithmetic.

/// Errors that can occur during clock operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,
}

/// Monotonic simulation tick counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorldClock {
    /// Current tick number (0-indexed, incremented at the start of each step).
    tick: u64,
}

impl WorldClock {
    /// Create a clock at tick 0.
    pub const fn new() -> Self {
        Self { tick: 0 }
    }

    /// Create a clock at an arbitrary tick (state restoration, tests).
    pub const fn from_tick(tick: u64) -> Self {
        Self { tick }
    }

    /// Advance the clock by one tick. Returns the new tick number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the tick counter would exceed
    /// `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        Ok(self.tick)
    }

    /// Return the current tick number.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Whether the current tick falls on a multiple of `interval`.
    ///
    /// An interval of 0 never matches.
    pub const fn is_every(&self, interval: u64) -> bool {
        match self.tick.checked_rem(interval) {
            Some(rem) => rem == 0,
            None => false,
        }
    }
}
