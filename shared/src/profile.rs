// Profile Module
// Stored WiFi profile and the provisioning document it is built from

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::crypto::EncryptedBlob;
use crate::error::VaultError;

/// Provisioning input as received from the console, password still in clear
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    pub wifi_ssid: String,
    #[serde(default)]
    pub wifi_password: Option<String>,
    #[serde(default)]
    pub use_static_ip: bool,
    #[serde(default)]
    pub static_ip: Option<String>,
    #[serde(default)]
    pub subnet_mask: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub dns_server: Option<String>,
}

impl RawConfig {
    pub fn from_json(json: &str) -> Result<Self, VaultError> {
        let raw: RawConfig =
            serde_json::from_str(json).map_err(|e| VaultError::ConfigMalformed(e.to_string()))?;

        if raw.wifi_ssid.trim().is_empty() {
            return Err(VaultError::ConfigMalformed("wifi_ssid is empty".to_string()));
        }

        Ok(raw)
    }
}

/// WiFi profile as persisted on flash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    pub wifi_ssid: String,
    /// Absent for open networks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_password_encrypted: Option<EncryptedBlob>,
    #[serde(default)]
    pub use_static_ip: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_mask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_server: Option<String>,
}

/// Parsed static addressing, only built when every field is present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticIp {
    pub ip: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub dns: Ipv4Addr,
}

impl NetworkProfile {
    pub fn from_json(json: &str) -> Result<Self, VaultError> {
        serde_json::from_str(json).map_err(|e| VaultError::ConfigMalformed(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, VaultError> {
        serde_json::to_string(self).map_err(|e| VaultError::ConfigMalformed(e.to_string()))
    }

    /// Static addressing for this profile.
    ///
    /// `Ok(None)` means DHCP. With `use_static_ip` set, any missing or empty
    /// field is `StaticIpIncomplete`; there is no fallback to DHCP.
    pub fn static_ip(&self) -> Result<Option<StaticIp>, VaultError> {
        if !self.use_static_ip {
            return Ok(None);
        }

        let fields = [
            ("static_ip", &self.static_ip),
            ("subnet_mask", &self.subnet_mask),
            ("gateway", &self.gateway),
            ("dns_server", &self.dns_server),
        ];

        let mut parsed = [Ipv4Addr::UNSPECIFIED; 4];
        for (slot, (name, value)) in parsed.iter_mut().zip(fields) {
            let text = match value.as_deref().map(str::trim) {
                Some(text) if !text.is_empty() => text,
                _ => return Err(VaultError::StaticIpIncomplete),
            };
            *slot = text.parse().map_err(|_| VaultError::StaticIpInvalid(name))?;
        }

        Ok(Some(StaticIp {
            ip: parsed[0],
            subnet_mask: parsed[1],
            gateway: parsed[2],
            dns: parsed[3],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn static_profile() -> NetworkProfile {
        NetworkProfile {
            wifi_ssid: "Home".to_string(),
            wifi_password_encrypted: None,
            use_static_ip: true,
            static_ip: Some("192.168.1.100".to_string()),
            subnet_mask: Some("255.255.255.0".to_string()),
            gateway: Some("192.168.1.1".to_string()),
            dns_server: Some("192.168.1.1".to_string()),
        }
    }

    #[test]
    fn raw_config_defaults_optional_fields() {
        let raw = RawConfig::from_json(r#"{"wifi_ssid":"Cafe"}"#).unwrap();
        assert_eq!(raw.wifi_ssid, "Cafe");
        assert!(raw.wifi_password.is_none());
        assert!(!raw.use_static_ip);
    }

    #[test]
    fn raw_config_rejects_bad_input() {
        assert!(matches!(
            RawConfig::from_json("{not json"),
            Err(VaultError::ConfigMalformed(_))
        ));
        assert!(matches!(
            RawConfig::from_json(r#"{"wifi_password":"x"}"#),
            Err(VaultError::ConfigMalformed(_))
        ));
        assert!(matches!(
            RawConfig::from_json(r#"{"wifi_ssid":"  "}"#),
            Err(VaultError::ConfigMalformed(_))
        ));
    }

    #[test]
    fn dhcp_profile_has_no_static_settings() {
        let mut profile = static_profile();
        profile.use_static_ip = false;
        profile.gateway = None;
        assert_eq!(profile.static_ip(), Ok(None));
    }

    #[test]
    fn complete_static_settings_parse() {
        let settings = static_profile().static_ip().unwrap().unwrap();
        assert_eq!(settings.ip, Ipv4Addr::new(192, 168, 1, 100));
        assert_eq!(settings.subnet_mask, Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(settings.gateway, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(settings.dns, Ipv4Addr::new(192, 168, 1, 1));
    }

    #[test]
    fn missing_static_field_is_incomplete() {
        let mut profile = static_profile();
        profile.dns_server = None;
        assert_eq!(profile.static_ip(), Err(VaultError::StaticIpIncomplete));

        let mut profile = static_profile();
        profile.gateway = Some(String::new());
        assert_eq!(profile.static_ip(), Err(VaultError::StaticIpIncomplete));
    }

    #[test]
    fn unparsable_static_field_is_named() {
        let mut profile = static_profile();
        profile.subnet_mask = Some("255.255.0".to_string());
        assert_eq!(
            profile.static_ip(),
            Err(VaultError::StaticIpInvalid("subnet_mask"))
        );
    }

    #[test]
    fn open_network_serializes_without_password_key() {
        let mut profile = static_profile();
        profile.use_static_ip = false;
        profile.static_ip = None;
        profile.subnet_mask = None;
        profile.gateway = None;
        profile.dns_server = None;

        let json = profile.to_json().unwrap();
        assert_eq!(json, r#"{"wifi_ssid":"Home","use_static_ip":false}"#);
        assert_eq!(NetworkProfile::from_json(&json).unwrap(), profile);
    }
}
