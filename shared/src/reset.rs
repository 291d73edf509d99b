// Reset State Machine Module
// Two-stage button ritual guarding the credential wipe
// Normal --(5 presses / 5s)--> WaitingConfirm --(3 presses / 5s)--> Wiping

use std::collections::VecDeque;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Deserialize;

/// Thresholds and windows of the reset ritual
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResetPolicy {
    /// Sliding window for both press counts
    #[serde(with = "crate::config::millis")]
    pub press_window: Duration,
    pub entry_presses: usize,
    pub confirm_presses: usize,
    /// Leave WaitingConfirm after this long without a confirm press
    #[serde(with = "crate::config::millis")]
    pub abandon_after: Duration,
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self {
            press_window: Duration::from_secs(5),
            entry_presses: 5,
            confirm_presses: 3,
            abandon_after: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetState {
    Normal,
    WaitingConfirm,
    /// Wipe issued; input is ignored until the device restarts
    Wiping,
}

/// Transition reported by [`ResetStateMachine::evaluate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTransition {
    EnteredWaiting,
    Abandoned,
    WipeConfirmed,
}

/// Feedback owed for a single accepted press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressFeedback {
    /// Counted silently toward entering WaitingConfirm
    Counted(usize),
    /// Counted toward the wipe; the caller sounds a short alert
    Confirming(usize),
    Ignored,
}

/// Everything one tick produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub press: Option<PressFeedback>,
    pub transition: Option<ResetTransition>,
}

#[derive(Debug, Clone)]
pub struct ResetStateMachine {
    policy: ResetPolicy,
    state: ResetState,
    entry_timestamps: VecDeque<Duration>,
    confirm_timestamps: VecDeque<Duration>,
    waiting_since: Duration,
    last_confirm_press: Option<Duration>,
}

impl ResetStateMachine {
    pub fn new(policy: ResetPolicy) -> Self {
        Self {
            policy,
            state: ResetState::Normal,
            entry_timestamps: VecDeque::new(),
            confirm_timestamps: VecDeque::new(),
            waiting_since: Duration::ZERO,
            last_confirm_press: None,
        }
    }

    pub fn state(&self) -> ResetState {
        self.state
    }

    pub fn is_waiting(&self) -> bool {
        self.state == ResetState::WaitingConfirm
    }

    pub fn entry_count(&self) -> usize {
        self.entry_timestamps.len()
    }

    pub fn confirm_count(&self) -> usize {
        self.confirm_timestamps.len()
    }

    /// Record a debounced press at `now`
    pub fn register_press(&mut self, now: Duration) -> PressFeedback {
        match self.state {
            ResetState::Normal => {
                self.entry_timestamps.push_back(now);
                debug!("Reset entry press {}", self.entry_timestamps.len());
                PressFeedback::Counted(self.entry_timestamps.len())
            }
            ResetState::WaitingConfirm => {
                self.confirm_timestamps.push_back(now);
                self.last_confirm_press = Some(now);
                info!("to reset for {}", self.confirm_timestamps.len());
                PressFeedback::Confirming(self.confirm_timestamps.len())
            }
            ResetState::Wiping => PressFeedback::Ignored,
        }
    }

    /// Drop timestamps older than the press window from both sequences
    pub fn evict_expired(&mut self, now: Duration) {
        let window = self.policy.press_window;
        for timestamps in [&mut self.entry_timestamps, &mut self.confirm_timestamps] {
            while let Some(&oldest) = timestamps.front() {
                if now.saturating_sub(oldest) > window {
                    timestamps.pop_front();
                } else {
                    break;
                }
            }
        }
    }

    /// Apply at most one state transition for this tick
    pub fn evaluate(&mut self, now: Duration) -> Option<ResetTransition> {
        match self.state {
            ResetState::Normal => {
                if self.entry_timestamps.len() >= self.policy.entry_presses {
                    self.entry_timestamps.clear();
                    self.confirm_timestamps.clear();
                    self.waiting_since = now;
                    self.last_confirm_press = None;
                    self.state = ResetState::WaitingConfirm;
                    warn!("Reset requested, waiting for confirmation");
                    return Some(ResetTransition::EnteredWaiting);
                }
                None
            }
            ResetState::WaitingConfirm => {
                if self.confirm_timestamps.len() >= self.policy.confirm_presses {
                    self.state = ResetState::Wiping;
                    warn!("Reset confirmed, wiping WiFi configuration");
                    return Some(ResetTransition::WipeConfirmed);
                }

                let last_activity = self
                    .last_confirm_press
                    .map_or(self.waiting_since, |t| t.max(self.waiting_since));
                if now.saturating_sub(last_activity) >= self.policy.abandon_after {
                    self.confirm_timestamps.clear();
                    self.last_confirm_press = None;
                    self.state = ResetState::Normal;
                    info!("clear waiting reset mode...");
                    return Some(ResetTransition::Abandoned);
                }
                None
            }
            ResetState::Wiping => None,
        }
    }

    /// One scheduler step: optional press, eviction, then transition
    pub fn tick(&mut self, now: Duration, pressed: bool) -> TickReport {
        let press = pressed.then(|| self.register_press(now));
        self.evict_expired(now);
        let transition = self.evaluate(now);
        TickReport { press, transition }
    }
}

impl Default for ResetStateMachine {
    fn default() -> Self {
        Self::new(ResetPolicy::default())
    }
}
