use anyhow::{Context, Result};
use embedded_svc::http::client::Client;
use embedded_svc::io::Read;
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
use log::{debug, warn};
use std::time::Duration;

use porchlight_shared::network::{HttpClient, HttpResponse};

/// Response bodies beyond this are cut off
const MAX_BODY_LEN: usize = 16 * 1024;
const BUFFER_SIZE: usize = 1024;

/// Blocking GET over the ESP-IDF HTTP client, one connection per request
#[derive(Default)]
pub struct EspHttpClient;

impl EspHttpClient {
    fn connection(timeout: Duration) -> Result<EspHttpConnection> {
        let http_config = Configuration {
            timeout: Some(timeout),
            buffer_size: Some(BUFFER_SIZE),
            buffer_size_tx: Some(BUFFER_SIZE),
            // Certificate bundle so https endpoints verify
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };

        EspHttpConnection::new(&http_config).context("failed to create HTTP connection")
    }
}

impl HttpClient for EspHttpClient {
    fn get(&mut self, url: &str, timeout: Duration) -> Result<HttpResponse> {
        debug!("GET request to: {}", url);

        let mut client = Client::wrap(Self::connection(timeout)?);
        let request = client.get(url).context("failed to open request")?;
        let mut response = request.submit().context("request failed")?;
        let status = response.status();

        let mut buffer = [0u8; BUFFER_SIZE];
        let mut body = Vec::new();
        loop {
            match response.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => {
                    body.extend_from_slice(&buffer[..read]);
                    if body.len() > MAX_BODY_LEN {
                        warn!("Response body too large, truncating at {} bytes", MAX_BODY_LEN);
                        body.truncate(MAX_BODY_LEN);
                        break;
                    }
                }
                Err(e) => {
                    warn!("Error reading response body: {:?}", e);
                    break;
                }
            }
        }

        Ok(HttpResponse {
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}
