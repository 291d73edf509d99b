// Network Module
// Collaborator seams for the WiFi radio, HTTP client and device identity
// Implemented over ESP-IDF in the firmware and by fakes in tests

use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::Result;

/// One entry of a WiFi scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    pub ssid: String,
    pub signal_strength: i8,
    pub bssid: [u8; 6],
}

/// Station-mode WiFi radio.
///
/// `connect` starts association and returns; completion is observed through
/// `is_connected`.
pub trait NetworkDriver {
    fn activate(&mut self) -> Result<()>;
    fn is_connected(&mut self) -> bool;
    fn disconnect(&mut self) -> Result<()>;
    fn configure_static(
        &mut self,
        ip: Ipv4Addr,
        subnet_mask: Ipv4Addr,
        gateway: Ipv4Addr,
        dns: Ipv4Addr,
    ) -> Result<()>;
    fn configure_dhcp(&mut self) -> Result<()>;
    fn connect(&mut self, ssid: &str, password: Option<&str>) -> Result<()>;
    fn scan(&mut self) -> Result<Vec<AccessPoint>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Blocking HTTP GET bounded by `timeout`
pub trait HttpClient {
    fn get(&mut self, url: &str, timeout: Duration) -> Result<HttpResponse>;
}

/// Source of the per-device identifier the password key is derived from
pub trait HardwareId {
    fn hardware_id(&self) -> Vec<u8>;
}

/// Render RSSI (dBm) as a ten character bar, e.g. `____******`
pub fn rssi_to_stars(rssi: i8) -> String {
    let clamped = i32::from(rssi).clamp(-100, -30);
    let level = ((clamped + 100) / 7) as usize;
    format!("{}{}", "_".repeat(10 - level), "*".repeat(level))
}

pub fn format_bssid(bssid: &[u8; 6]) -> String {
    bssid
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Console line for one scan result: `<bar>/<ssid>(BSSID: ..)`
pub fn format_scan_line(ap: &AccessPoint) -> String {
    format!(
        "{}/{}(BSSID: {})",
        rssi_to_stars(ap.signal_strength),
        ap.ssid,
        format_bssid(&ap.bssid)
    )
}
