use std::io;

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};

use porchlight_shared::boot::{boot_or_provision, BootOutcome};
use porchlight_shared::config::RuntimeConfig;
use porchlight_shared::console::SerialConsole;
use porchlight_shared::scheduler::Scheduler;
use porchlight_shared::store::CredentialStore;

mod board;
mod http;
mod nvs_storage;
mod time_sync;
mod wifi;

use board::{restart, Board, BootClock, EfuseHardwareId, EspRandom};
use http::EspHttpClient;
use nvs_storage::NvsStorage;
use wifi::WifiDriver;

fn main() -> anyhow::Result<()> {
    // It is necessary to call this function once. Otherwise some patches to the runtime
    // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_svc::sys::link_patches();

    // Bind the log crate to the ESP Logging facilities
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("🚀 Porchlight starting");

    let clock = BootClock::new();
    let config = load_config();

    // Take the peripherals and system singletons
    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    let mut board = Board::new(
        peripherals.pins.gpio16,
        peripherals.pins.gpio2,
        peripherals.pins.gpio25,
    )?;
    let mut wifi = WifiDriver::new(peripherals.modem, sys_loop, nvs_partition.clone())?;
    let mut store = CredentialStore::new(NvsStorage::new(nvs_partition)?, EfuseHardwareId);

    // UART console; stdin reads are non-blocking under ESP-IDF
    let mut console = SerialConsole::new(io::stdin().lock(), io::stdout());
    match boot_or_provision(
        &mut store,
        &mut wifi,
        &mut board,
        &mut EspRandom,
        &mut console,
        config.link_timeout,
    ) {
        BootOutcome::Online(ssid) => info!("✅ WiFi link up on {}", ssid),
        BootOutcome::Reprovisioned => restart(),
    }

    // Held for the lifetime of the loop
    let _sntp = time_sync::start(&config.ntp_server);

    let mut scheduler = Scheduler::new(config, store, EspHttpClient);
    scheduler.run_until_restart(&mut board, &clock);

    restart();
}

/// Runtime tunables baked in at build time through `PORCHLIGHT_CONFIG`
fn load_config() -> RuntimeConfig {
    match option_env!("PORCHLIGHT_CONFIG") {
        Some(json) => RuntimeConfig::from_json(json).unwrap_or_else(|e| {
            warn!("Ignoring PORCHLIGHT_CONFIG, using defaults: {}", e);
            RuntimeConfig::default()
        }),
        None => RuntimeConfig::default(),
    }
}
