// Scheduler Module
// Single-threaded cooperative run loop
// Per tick: waiting indication, button, reset ritual, then the heartbeat

use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{error, info};

use crate::alert::{Alert, DeviceIo, Output};
use crate::config::RuntimeConfig;
use crate::debounce::ButtonDebouncer;
use crate::heartbeat::Heartbeat;
use crate::network::{HardwareId, HttpClient};
use crate::reset::{PressFeedback, ResetStateMachine, ResetTransition};
use crate::storage::ProfileStorage;
use crate::store::CredentialStore;

/// Monotonic and wall-clock time for the loop
pub trait Clock {
    /// Time since boot
    fn monotonic(&self) -> Duration;

    /// `None` until the clock has been synchronised
    fn wall_clock(&self) -> Option<DateTime<Utc>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    /// Credentials wiped; the caller must restart the device
    Restart,
}

/// Mutable state carried across ticks, owned by the scheduler
#[derive(Debug, Clone)]
pub struct RuntimeState {
    pub debouncer: ButtonDebouncer,
    pub reset: ResetStateMachine,
    pub heartbeat: Heartbeat,
}

impl RuntimeState {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            debouncer: ButtonDebouncer::new(),
            reset: ResetStateMachine::new(config.reset.clone()),
            heartbeat: Heartbeat::new(
                config.heartbeat_url.clone(),
                config.heartbeat_interval,
                config.http_timeout,
            ),
        }
    }
}

pub struct Scheduler<S, H, C> {
    config: RuntimeConfig,
    state: RuntimeState,
    store: CredentialStore<S, H>,
    http: C,
}

impl<S, H, C> Scheduler<S, H, C>
where
    S: ProfileStorage,
    H: HardwareId,
    C: HttpClient,
{
    pub fn new(config: RuntimeConfig, store: CredentialStore<S, H>, http: C) -> Self {
        let state = RuntimeState::new(&config);
        Self {
            config,
            state,
            store,
            http,
        }
    }

    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    pub fn http(&self) -> &C {
        &self.http
    }

    pub fn store_mut(&mut self) -> &mut CredentialStore<S, H> {
        &mut self.store
    }

    /// Run one loop iteration at `now`
    pub fn tick<IO>(
        &mut self,
        now: Duration,
        wall_clock: Option<DateTime<Utc>>,
        io: &mut IO,
    ) -> LoopControl
    where
        IO: DeviceIo,
    {
        if self.state.reset.is_waiting() {
            io.toggle_led();
        }

        let raw = io.button_pressed();
        let pressed = self.state.debouncer.poll(raw, now, self.config.min_hold);
        let report = self.state.reset.tick(now, pressed);

        if let Some(PressFeedback::Confirming(_)) = report.press {
            io.play(Alert::Short);
        }

        match report.transition {
            Some(ResetTransition::EnteredWaiting) => io.play(Alert::Short),
            Some(ResetTransition::Abandoned) => io.set_output(Output::Led, true),
            Some(ResetTransition::WipeConfirmed) => {
                io.play(Alert::Wipe);
                self.store.delete();
                info!("Restarting after factory reset");
                return LoopControl::Restart;
            }
            None => {}
        }

        let offset = self.config.utc_offset();
        if let Some(Err(e)) = self
            .state
            .heartbeat
            .poll(now, wall_clock, offset, &mut self.http)
        {
            error!("Heartbeat failed, retrying in {:?}: {}", self.config.heartbeat_interval, e);
        }

        LoopControl::Continue
    }

    /// Tick at the configured cadence until a wipe asks for a restart
    pub fn run_until_restart<IO, K>(&mut self, io: &mut IO, clock: &K)
    where
        IO: DeviceIo,
        K: Clock,
    {
        info!("Run loop started, tick {:?}", self.config.tick_interval);
        loop {
            let control = self.tick(clock.monotonic(), clock.wall_clock(), io);
            if control == LoopControl::Restart {
                return;
            }
            io.delay(self.config.tick_interval);
        }
    }
}
