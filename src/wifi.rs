// Import ESP-IDF event loop for handling system events
// The event loop manages WiFi connection events, IP assignment, etc.
use esp_idf_svc::eventloop::EspSystemEventLoop;

// Import peripheral trait for hardware access
use esp_idf_svc::hal::peripheral::Peripheral;

// Import IPv4 and network interface configuration for static addressing
use esp_idf_svc::ipv4::{
    ClientConfiguration as IpClientConfiguration, ClientSettings as IpClientSettings,
    Configuration as IpConfiguration, Mask, Subnet,
};
use esp_idf_svc::netif::{EspNetif, NetifConfiguration, NetifStack};

// Import NVS partition for WiFi driver storage needs
use esp_idf_svc::nvs::EspDefaultNvsPartition;

// Import WiFi-related types from ESP-IDF
// - BlockingWifi: Synchronous WiFi operations wrapper
// - ClientConfiguration: WiFi station mode config
// - EspWifi: Low-level WiFi driver
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use std::net::Ipv4Addr;

use porchlight_shared::network::{AccessPoint, NetworkDriver};

/// Station-mode radio over the ESP-IDF WiFi driver
pub struct WifiDriver {
    wifi: BlockingWifi<EspWifi<'static>>,
    /// Station interface currently carries a fixed address
    static_netif: bool,
}

impl WifiDriver {
    pub fn new(
        modem: impl Peripheral<P = esp_idf_svc::hal::modem::Modem> + 'static,
        sys_loop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> Result<Self> {
        info!("Initializing WiFi driver");

        let wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs))?;
        let wifi = BlockingWifi::wrap(wifi, sys_loop)?;

        Ok(Self {
            wifi,
            static_netif: false,
        })
    }

    /// Replace the station netif; the driver must be stopped while swapping
    fn swap_sta_netif(&mut self, conf: &NetifConfiguration) -> Result<()> {
        if self.wifi.is_started()? {
            self.wifi.stop()?;
        }
        let netif = EspNetif::new_with_conf(conf).context("failed to create station netif")?;
        self.wifi
            .wifi_mut()
            .swap_netif_sta(netif)
            .context("failed to swap station netif")?;
        Ok(())
    }
}

impl NetworkDriver for WifiDriver {
    fn activate(&mut self) -> Result<()> {
        if self.wifi.is_started()? {
            return Ok(());
        }
        if !matches!(self.wifi.get_configuration()?, Configuration::Client(_)) {
            self.wifi
                .set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
        }
        self.wifi.start()?;
        info!("WiFi started in station mode");
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }

    fn disconnect(&mut self) -> Result<()> {
        info!("Disconnecting from WiFi...");
        if self.wifi.is_connected()? {
            self.wifi.disconnect()?;
        }
        Ok(())
    }

    fn configure_static(
        &mut self,
        ip: Ipv4Addr,
        subnet_mask: Ipv4Addr,
        gateway: Ipv4Addr,
        dns: Ipv4Addr,
    ) -> Result<()> {
        let mask =
            Mask::try_from(subnet_mask).map_err(|_| anyhow!("invalid subnet mask: {}", subnet_mask))?;

        let mut conf = NetifConfiguration::wifi_default_client();
        conf.key = "WIFI_STA_STATIC"
            .try_into()
            .map_err(|_| anyhow!("netif key too long"))?;
        conf.ip_configuration = Some(IpConfiguration::Client(IpClientConfiguration::Fixed(
            IpClientSettings {
                ip,
                subnet: Subnet { gateway, mask },
                dns: Some(dns),
                secondary_dns: None,
            },
        )));

        self.swap_sta_netif(&conf)?;
        self.static_netif = true;
        info!("Static IP {} / {} via {}", ip, subnet_mask, gateway);
        Ok(())
    }

    fn configure_dhcp(&mut self) -> Result<()> {
        if self.static_netif {
            let netif = EspNetif::new(NetifStack::Sta).context("failed to create DHCP netif")?;
            if self.wifi.is_started()? {
                self.wifi.stop()?;
            }
            self.wifi
                .wifi_mut()
                .swap_netif_sta(netif)
                .context("failed to restore DHCP netif")?;
            self.static_netif = false;
        }
        info!("Using DHCP");
        Ok(())
    }

    fn connect(&mut self, ssid: &str, password: Option<&str>) -> Result<()> {
        let password = password.unwrap_or("");
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        let wifi_config = Configuration::Client(ClientConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| anyhow!("SSID too long: {} bytes", ssid.len()))?,
            password: password
                .try_into()
                .map_err(|_| anyhow!("password too long"))?,
            channel: None,
            auth_method,
            ..Default::default()
        });

        self.wifi.set_configuration(&wifi_config)?;
        if !self.wifi.is_started()? {
            self.wifi.start()?;
        }

        info!("Attempting to connect to WiFi network: {}", ssid);
        // Association completes in the background; callers poll is_connected
        self.wifi.wifi_mut().connect()?;
        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<AccessPoint>> {
        let results = self.wifi.scan()?;
        if results.is_empty() {
            warn!("Scan returned no networks");
        }
        info!("Found {} networks", results.len());

        Ok(results
            .into_iter()
            .map(|ap| AccessPoint {
                ssid: ap.ssid.to_string(),
                signal_strength: ap.signal_strength,
                bssid: ap.bssid,
            })
            .collect())
    }
}
