// Button Debounce Module
// Turns a tick-sampled raw button level into single confirmed presses

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Button up
    Idle,
    /// Button down since the given time, not yet confirmed
    Holding(Duration),
    /// Press already reported; waits for release before arming again
    Latched,
}

/// Edge-triggered hold debouncer.
///
/// A press is confirmed once the raw input has stayed asserted for at least
/// `min_hold`; any release before that discards it. One continuous assertion
/// yields at most one press.
#[derive(Debug, Clone)]
pub struct ButtonDebouncer {
    phase: Phase,
}

impl ButtonDebouncer {
    pub fn new() -> Self {
        Self { phase: Phase::Idle }
    }

    /// Feed one sample; returns true on the tick a press is confirmed
    pub fn poll(&mut self, raw_pressed: bool, now: Duration, min_hold: Duration) -> bool {
        if !raw_pressed {
            self.phase = Phase::Idle;
            return false;
        }

        match self.phase {
            Phase::Idle => {
                if min_hold.is_zero() {
                    self.phase = Phase::Latched;
                    return true;
                }
                self.phase = Phase::Holding(now);
                false
            }
            Phase::Holding(since) => {
                if now.saturating_sub(since) >= min_hold {
                    self.phase = Phase::Latched;
                    true
                } else {
                    false
                }
            }
            Phase::Latched => false,
        }
    }

    pub fn is_held(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }
}

impl Default for ButtonDebouncer {
    fn default() -> Self {
        Self::new()
    }
}
