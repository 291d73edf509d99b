// Heartbeat Module
// Rate-limited periodic HTTP GET issued from the run loop

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use log::{info, warn};

use crate::error::VaultError;
use crate::network::{HttpClient, HttpResponse};

/// Longest response body echoed to the log
const MAX_LOGGED_BODY: usize = 256;

#[derive(Debug, Clone)]
pub struct Heartbeat {
    url: String,
    interval: Duration,
    timeout: Duration,
    /// `None` until the first attempt
    last_access: Option<Duration>,
}

impl Heartbeat {
    pub fn new(url: impl Into<String>, interval: Duration, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            interval,
            timeout,
            last_access: None,
        }
    }

    pub fn last_access(&self) -> Option<Duration> {
        self.last_access
    }

    pub fn is_due(&self, now: Duration) -> bool {
        match self.last_access {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.interval,
        }
    }

    /// Issue the request if due. The attempt time is recorded before the
    /// request, so a failing endpoint waits a full interval before the retry.
    pub fn poll<C>(
        &mut self,
        now: Duration,
        wall_clock: Option<DateTime<Utc>>,
        offset: FixedOffset,
        client: &mut C,
    ) -> Option<Result<HttpResponse, VaultError>>
    where
        C: HttpClient,
    {
        if !self.is_due(now) {
            return None;
        }
        self.last_access = Some(now);

        match wall_clock {
            Some(time) => info!(
                "try access for {}: {}",
                self.url,
                format_local_time(time, offset)
            ),
            None => info!("try access for {}", self.url),
        }

        let result = client
            .get(&self.url, self.timeout)
            .map_err(|e| VaultError::HeartbeatFailed(format!("{:#}", e)));

        match &result {
            Ok(response) => {
                info!("Response Status: {}", response.status);
                info!("Response Content: {}", truncate(&response.body, MAX_LOGGED_BODY));
            }
            Err(e) => warn!("Error: {}", e),
        }

        Some(result)
    }
}

/// `YYYY-MM-DD HH:MM:SS (+HH:MM)` in the given offset
pub fn format_local_time(time: DateTime<Utc>, offset: FixedOffset) -> String {
    time.with_timezone(&offset)
        .format("%Y-%m-%d %H:%M:%S (%:z)")
        .to_string()
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
