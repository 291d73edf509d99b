// Import GPIO driver types for the button, status LED and buzzer
use esp_idf_svc::hal::gpio::{Gpio16, Gpio2, Gpio25, Input, Output, PinDriver, Pull};

// Import logging macros
use log::{info, warn};

// Import the hardware seams implemented by this board
use porchlight_shared::alert::{DeviceIo, Output as AlertOutput};
use porchlight_shared::network::HardwareId;
use porchlight_shared::scheduler::Clock;

use chrono::{DateTime, Datelike, Utc};
use rand_core::{CryptoRng, RngCore};
use std::thread;
use std::time::{Duration, Instant};

/// Any wall clock earlier than this has not been set by SNTP yet
const MIN_SYNCED_YEAR: i32 = 2020;

/// Button, status LED and buzzer wired to fixed GPIOs.
///
/// The button is active low with the internal pull-up enabled.
pub struct Board {
    button: PinDriver<'static, Gpio16, Input>,
    led: PinDriver<'static, Gpio2, Output>,
    buzzer: PinDriver<'static, Gpio25, Output>,
}

impl Board {
    pub fn new(button: Gpio16, led: Gpio2, buzzer: Gpio25) -> anyhow::Result<Self> {
        let mut button = PinDriver::input(button)?;
        button.set_pull(Pull::Up)?;

        let mut led = PinDriver::output(led)?;
        led.set_low()?;

        let mut buzzer = PinDriver::output(buzzer)?;
        buzzer.set_low()?;

        info!("Board initialized: button GPIO16, LED GPIO2, buzzer GPIO25");
        Ok(Self {
            button,
            led,
            buzzer,
        })
    }
}

impl DeviceIo for Board {
    fn button_pressed(&mut self) -> bool {
        self.button.is_low()
    }

    fn set_output(&mut self, output: AlertOutput, on: bool) {
        let result = match (output, on) {
            (AlertOutput::Led, true) => self.led.set_high(),
            (AlertOutput::Led, false) => self.led.set_low(),
            (AlertOutput::Buzzer, true) => self.buzzer.set_high(),
            (AlertOutput::Buzzer, false) => self.buzzer.set_low(),
        };
        if let Err(e) = result {
            warn!("Failed to drive {:?}: {:?}", output, e);
        }
    }

    fn toggle_led(&mut self) {
        if let Err(e) = self.led.toggle() {
            warn!("Failed to toggle LED: {:?}", e);
        }
    }

    fn delay(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Factory MAC burned into eFuse, unique per chip
pub struct EfuseHardwareId;

impl HardwareId for EfuseHardwareId {
    fn hardware_id(&self) -> Vec<u8> {
        let mut mac = [0u8; 6];
        unsafe {
            esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
        }
        mac.to_vec()
    }
}

/// Hardware RNG. Output is cryptographically strong while the radio is enabled.
pub struct EspRandom;

impl RngCore for EspRandom {
    fn next_u32(&mut self) -> u32 {
        unsafe { esp_idf_svc::sys::esp_random() }
    }

    fn next_u64(&mut self) -> u64 {
        (u64::from(self.next_u32()) << 32) | u64::from(self.next_u32())
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        unsafe {
            esp_idf_svc::sys::esp_fill_random(dest.as_mut_ptr() as *mut _, dest.len());
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for EspRandom {}

/// Monotonic time from boot plus the SNTP-driven system clock
pub struct BootClock {
    started: Instant,
}

impl BootClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Clock for BootClock {
    fn monotonic(&self) -> Duration {
        self.started.elapsed()
    }

    fn wall_clock(&self) -> Option<DateTime<Utc>> {
        let now = Utc::now();
        (now.year() >= MIN_SYNCED_YEAR).then_some(now)
    }
}

/// Reboot the chip; never returns
pub fn restart() -> ! {
    info!("🔄 Restarting device...");
    unsafe { esp_idf_svc::sys::esp_restart() }
}
