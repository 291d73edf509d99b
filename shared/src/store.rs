// Credential Store Module
// Save, load, apply and delete the WiFi profile
// Passwords are sealed with a key re-derived from the hardware id on every use

use log::{error, info, warn};
use rand_core::{CryptoRng, RngCore};

use crate::crypto::{decrypt_password, derive_key, encrypt_password, SymmetricKey};
use crate::error::VaultError;
use crate::network::{HardwareId, NetworkDriver};
use crate::profile::{NetworkProfile, RawConfig};
use crate::storage::ProfileStorage;

/// Outcome of applying a profile to the radio
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// Association started for this SSID
    Connecting(String),
    Failed(VaultError),
}

pub struct CredentialStore<S, H> {
    storage: S,
    hardware: H,
}

impl<S, H> CredentialStore<S, H>
where
    S: ProfileStorage,
    H: HardwareId,
{
    pub fn new(storage: S, hardware: H) -> Self {
        Self { storage, hardware }
    }

    fn key(&self) -> SymmetricKey {
        derive_key(&self.hardware.hardware_id())
    }

    /// Parse a provisioning document, seal its password and persist it.
    ///
    /// On any failure the previously stored profile is left untouched.
    pub fn save<R>(&mut self, raw_json: &str, rng: &mut R) -> Result<NetworkProfile, VaultError>
    where
        R: RngCore + CryptoRng,
    {
        let raw = RawConfig::from_json(raw_json).map_err(|e| {
            error!("Error saving WiFi config: {}", e);
            e
        })?;

        let wifi_password_encrypted = match raw.wifi_password.as_deref() {
            Some(password) if !password.is_empty() => {
                Some(encrypt_password(password, &self.key(), rng))
            }
            _ => None,
        };

        let profile = NetworkProfile {
            wifi_ssid: raw.wifi_ssid,
            wifi_password_encrypted,
            use_static_ip: raw.use_static_ip,
            static_ip: raw.static_ip,
            subnet_mask: raw.subnet_mask,
            gateway: raw.gateway,
            dns_server: raw.dns_server,
        };

        let json = profile.to_json()?;
        self.storage.write(&json).map_err(|e| {
            error!("Error saving WiFi config: {:#}", e);
            VaultError::Storage(format!("{:#}", e))
        })?;

        info!("WiFi configuration saved for SSID: {}", profile.wifi_ssid);
        Ok(profile)
    }

    /// Stored profile, or `Ok(None)` when the device has not been provisioned
    pub fn load(&mut self) -> Result<Option<NetworkProfile>, VaultError> {
        let contents = self
            .storage
            .read()
            .map_err(|e| VaultError::Storage(format!("{:#}", e)))?;

        match contents {
            Some(json) => NetworkProfile::from_json(&json).map(Some),
            None => {
                info!("No stored WiFi configuration");
                Ok(None)
            }
        }
    }

    /// Configure the interface for `profile` and start association.
    ///
    /// Does not wait for the link to come up. Any existing link must already
    /// have been dropped by the caller.
    pub fn apply<N>(&self, profile: &NetworkProfile, network: &mut N) -> ApplyResult
    where
        N: NetworkDriver,
    {
        match self.try_apply(profile, network) {
            Ok(()) => {
                info!("Connecting to {}...", profile.wifi_ssid);
                ApplyResult::Connecting(profile.wifi_ssid.clone())
            }
            Err(e) => {
                error!("Applying WiFi configuration failed: {}", e);
                ApplyResult::Failed(e)
            }
        }
    }

    fn try_apply<N>(&self, profile: &NetworkProfile, network: &mut N) -> Result<(), VaultError>
    where
        N: NetworkDriver,
    {
        if profile.wifi_ssid.trim().is_empty() {
            return Err(VaultError::ConfigMalformed("wifi_ssid is empty".to_string()));
        }

        let password = match &profile.wifi_password_encrypted {
            Some(blob) => Some(decrypt_password(blob, &self.key())?),
            None => None,
        };

        // Fail closed before touching the radio
        let static_ip = profile.static_ip()?;

        network.activate().map_err(connect_failed)?;

        match static_ip {
            Some(settings) => {
                info!(
                    "Using static IP: {}, GW: {}, Subnet: {}, DNS: {}",
                    settings.ip, settings.gateway, settings.subnet_mask, settings.dns
                );
                network
                    .configure_static(
                        settings.ip,
                        settings.subnet_mask,
                        settings.gateway,
                        settings.dns,
                    )
                    .map_err(connect_failed)?;
            }
            None => {
                info!("Using DHCP");
                network.configure_dhcp().map_err(connect_failed)?;
            }
        }

        network
            .connect(&profile.wifi_ssid, password.as_deref())
            .map_err(connect_failed)
    }

    /// Remove the stored profile. Absence is not an error.
    pub fn delete(&mut self) {
        match self.storage.remove() {
            Ok(()) => info!("Stored WiFi configuration deleted"),
            Err(e) => warn!("Deleting WiFi configuration failed: {:#}", e),
        }
    }
}

fn connect_failed(e: anyhow::Error) -> VaultError {
    VaultError::NetworkConnectFailed(format!("{:#}", e))
}
