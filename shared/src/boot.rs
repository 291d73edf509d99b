// Boot Module
// Startup sequence from stored profile to a live WiFi link
// Every failure ends with an audible pattern since the board has no display

use std::io::{BufRead, Write};
use std::time::Duration;

use log::{error, info, warn};
use rand_core::{CryptoRng, RngCore};

use crate::alert::{Alert, DeviceIo, Output};
use crate::console::SerialConsole;
use crate::error::VaultError;
use crate::network::{HardwareId, NetworkDriver};
use crate::storage::ProfileStorage;
use crate::store::{ApplyResult, CredentialStore};

/// Interval between link checks while waiting for association
const LINK_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootOutcome {
    /// Link is up on this SSID
    Online(String),
    /// A new profile was provisioned; the chip must restart to use it
    Reprovisioned,
}

/// Bring the link up from storage, falling back to the provisioning console.
///
/// Any boot failure (missing, unreadable or undecryptable profile, or a link
/// that never comes up) serves the console so a new profile can replace it.
pub fn boot_or_provision<S, H, N, IO, R, B, W>(
    store: &mut CredentialStore<S, H>,
    network: &mut N,
    io: &mut IO,
    rng: &mut R,
    console: &mut SerialConsole<B, W>,
    link_timeout: Duration,
) -> BootOutcome
where
    S: ProfileStorage,
    H: HardwareId,
    N: NetworkDriver,
    IO: DeviceIo,
    R: RngCore + CryptoRng,
    B: BufRead,
    W: Write,
{
    match connect_from_storage(store, network, io, link_timeout) {
        Ok(ssid) => BootOutcome::Online(ssid),
        Err(e) => {
            warn!("Boot failed ({}), waiting for provisioning", e);
            console.serve(store, network, io, rng);
            BootOutcome::Reprovisioned
        }
    }
}

/// Load the stored profile, apply it and wait for the link.
///
/// Returns the SSID on success. `ConfigMissing` means the device has not been
/// provisioned; every other error is a failed connection attempt.
pub fn connect_from_storage<S, H, N, IO>(
    store: &mut CredentialStore<S, H>,
    network: &mut N,
    io: &mut IO,
    link_timeout: Duration,
) -> Result<String, VaultError>
where
    S: ProfileStorage,
    H: HardwareId,
    N: NetworkDriver,
    IO: DeviceIo,
{
    let profile = match store.load() {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            error!("Config file not found, device is not provisioned");
            io.play(Alert::ConfigMissing);
            return Err(VaultError::ConfigMissing);
        }
        Err(e) => {
            error!("Stored WiFi configuration unreadable: {}", e);
            io.play(Alert::ConnectFailed);
            return Err(e);
        }
    };

    if network.is_connected() {
        warn!("WiFi already connected, dropping the existing link");
        if let Err(e) = network.disconnect() {
            warn!("Disconnect failed: {:#}", e);
        }
        io.play(Alert::LinkReset);
    }

    let ssid = match store.apply(&profile, network) {
        ApplyResult::Connecting(ssid) => ssid,
        ApplyResult::Failed(e) => {
            error!("WiFi connected fail: {}", e);
            io.play(Alert::ConnectFailed);
            return Err(e);
        }
    };

    if let Err(e) = wait_for_link(network, io, link_timeout) {
        error!("WiFi connected fail: {}", e);
        io.play(Alert::ConnectFailed);
        return Err(e);
    }

    info!("Connected to {}", ssid);
    io.set_output(Output::Led, true);
    Ok(ssid)
}

fn wait_for_link<N, IO>(network: &mut N, io: &mut IO, timeout: Duration) -> Result<(), VaultError>
where
    N: NetworkDriver,
    IO: DeviceIo,
{
    let mut waited = Duration::ZERO;
    while !network.is_connected() {
        if waited >= timeout {
            return Err(VaultError::NetworkConnectFailed(format!(
                "link not up after {:?}",
                timeout
            )));
        }
        io.delay(LINK_POLL_INTERVAL);
        waited += LINK_POLL_INTERVAL;
    }
    Ok(())
}
