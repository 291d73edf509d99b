// Import ESP-IDF's NVS (Non-Volatile Storage) functionality
// Data stored in NVS survives device reboots and power cycles
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

// Import logging macros for debug output
use log::{info, warn};

use anyhow::{Context, Result};

// Import the storage seam used by the credential store
use porchlight_shared::storage::ProfileStorage;

// NVS storage keys
const NVS_NAMESPACE: &str = "wifi_config";
const PROFILE_KEY: &str = "profile";

/// Upper bound for the serialized profile, including the encrypted password
const MAX_PROFILE_LEN: usize = 1024;

/// Serialized WiFi profile kept as one JSON string in NVS
pub struct NvsStorage {
    nvs: EspNvs<NvsDefault>,
}

impl NvsStorage {
    /// Open the profile namespace on a partition shared with the WiFi driver
    pub fn new(nvs_partition: EspDefaultNvsPartition) -> Result<Self> {
        let nvs = EspNvs::new(nvs_partition, NVS_NAMESPACE, true)
            .context("failed to open NVS namespace for the WiFi profile")?;
        info!("Profile storage opened (namespace '{}')", NVS_NAMESPACE);
        Ok(Self { nvs })
    }
}

impl ProfileStorage for NvsStorage {
    fn read(&mut self) -> Result<Option<String>> {
        let mut buffer = vec![0u8; MAX_PROFILE_LEN];
        let stored = self
            .nvs
            .get_str(PROFILE_KEY, &mut buffer)
            .context("failed to read stored profile")?;

        match stored {
            Some(json) => {
                info!("Loaded stored profile ({} bytes)", json.len());
                Ok(Some(json.to_string()))
            }
            None => {
                info!("No profile found in NVS");
                Ok(None)
            }
        }
    }

    fn write(&mut self, contents: &str) -> Result<()> {
        if contents.len() >= MAX_PROFILE_LEN {
            anyhow::bail!(
                "profile too large for NVS: {} bytes (max {})",
                contents.len(),
                MAX_PROFILE_LEN - 1
            );
        }
        self.nvs
            .set_str(PROFILE_KEY, contents)
            .context("failed to write profile")?;
        info!("Profile stored in NVS");
        Ok(())
    }

    fn remove(&mut self) -> Result<()> {
        let existed = self
            .nvs
            .remove(PROFILE_KEY)
            .context("failed to remove profile")?;
        if existed {
            info!("Profile removed from NVS");
        } else {
            warn!("No profile to remove");
        }
        Ok(())
    }
}
