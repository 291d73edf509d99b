// Alert Module
// Buzzer and LED patterns, the only feedback channel a headless board has

use std::time::Duration;

/// Boolean output driven by an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Buzzer,
    Led,
}

/// One segment of a pattern: drive the output, then hold for `millis`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub on: bool,
    pub millis: u64,
}

const fn step(on: bool, millis: u64) -> Step {
    Step { on, millis }
}

const SHORT: [Step; 2] = [step(true, 250), step(false, 0)];

const WIPE: [Step; 4] = [
    step(true, 500),
    step(false, 500),
    step(true, 2_000),
    step(false, 0),
];

// Ten buzzer toggles at 125ms
const CONFIG_MISSING: [Step; 11] = [
    step(true, 125),
    step(false, 125),
    step(true, 125),
    step(false, 125),
    step(true, 125),
    step(false, 125),
    step(true, 125),
    step(false, 125),
    step(true, 125),
    step(false, 125),
    step(false, 0),
];

const CONNECT_FAILED: [Step; 10] = [
    step(true, 500),
    step(false, 250),
    step(true, 500),
    step(false, 250),
    step(true, 500),
    step(false, 250),
    step(true, 500),
    step(false, 250),
    step(true, 500),
    step(false, 0),
];

// Twenty LED toggles at 250ms while an old link is dropped
const LINK_RESET: [Step; 20] = [
    step(false, 250),
    step(true, 250),
    step(false, 250),
    step(true, 250),
    step(false, 250),
    step(true, 250),
    step(false, 250),
    step(true, 250),
    step(false, 250),
    step(true, 250),
    step(false, 250),
    step(true, 250),
    step(false, 250),
    step(true, 250),
    step(false, 250),
    step(true, 250),
    step(false, 250),
    step(true, 250),
    step(false, 250),
    step(true, 250),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    /// Reset ritual feedback: entered waiting, or a confirm press counted
    Short,
    /// Wipe confirmed, played right before deleting credentials
    Wipe,
    ConfigMissing,
    ConnectFailed,
    LinkReset,
}

impl Alert {
    pub fn output(self) -> Output {
        match self {
            Alert::LinkReset => Output::Led,
            _ => Output::Buzzer,
        }
    }

    pub fn steps(self) -> &'static [Step] {
        match self {
            Alert::Short => &SHORT,
            Alert::Wipe => &WIPE,
            Alert::ConfigMissing => &CONFIG_MISSING,
            Alert::ConnectFailed => &CONNECT_FAILED,
            Alert::LinkReset => &LINK_RESET,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::from_millis(self.steps().iter().map(|s| s.millis).sum())
    }
}

/// Board outputs and input as seen by the run loop
pub trait DeviceIo {
    /// Raw button level, true while held down
    fn button_pressed(&mut self) -> bool;

    fn set_output(&mut self, output: Output, on: bool);

    fn toggle_led(&mut self);

    /// Block the loop; used only inside alert patterns and boot waits
    fn delay(&mut self, duration: Duration);

    /// Play a pattern to completion
    fn play(&mut self, alert: Alert) {
        let output = alert.output();
        for step in alert.steps() {
            self.set_output(output, step.on);
            if step.millis > 0 {
                self.delay(Duration::from_millis(step.millis));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        writes: Vec<(Output, bool)>,
        slept: Duration,
    }

    impl DeviceIo for Recorder {
        fn button_pressed(&mut self) -> bool {
            false
        }

        fn set_output(&mut self, output: Output, on: bool) {
            self.writes.push((output, on));
        }

        fn toggle_led(&mut self) {}

        fn delay(&mut self, duration: Duration) {
            self.slept += duration;
        }
    }

    #[test]
    fn buzzer_patterns_end_silent() {
        for alert in [Alert::Short, Alert::Wipe, Alert::ConfigMissing, Alert::ConnectFailed] {
            let last = alert.steps().last().unwrap();
            assert!(!last.on, "{:?} leaves the buzzer on", alert);
        }
    }

    #[test]
    fn link_reset_leaves_led_on() {
        assert_eq!(Alert::LinkReset.output(), Output::Led);
        assert!(Alert::LinkReset.steps().last().unwrap().on);
        assert_eq!(Alert::LinkReset.duration(), Duration::from_secs(5));
    }

    #[test]
    fn config_missing_buzzes_five_times() {
        let buzzes = Alert::ConfigMissing.steps().iter().filter(|s| s.on).count();
        assert_eq!(buzzes, 5);
        assert_eq!(Alert::ConfigMissing.duration(), Duration::from_millis(1_250));
    }

    #[test]
    fn play_drives_output_and_sleeps() {
        let mut io = Recorder::default();
        io.play(Alert::Wipe);
        assert_eq!(
            io.writes,
            vec![
                (Output::Buzzer, true),
                (Output::Buzzer, false),
                (Output::Buzzer, true),
                (Output::Buzzer, false)
            ]
        );
        assert_eq!(io.slept, Duration::from_millis(3_000));
    }
}
