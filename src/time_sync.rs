use esp_idf_svc::sntp::{EspSntp, SntpConf, SyncStatus};
use log::{info, warn};
use std::thread;
use std::time::{Duration, Instant};

const SYNC_TIMEOUT: Duration = Duration::from_secs(10);
const SYNC_POLL: Duration = Duration::from_millis(200);

/// Start SNTP against `server` and wait briefly for the first sync.
///
/// Failure is not fatal: heartbeat logs simply omit the wall-clock time.
/// The returned handle keeps the service running and must be held.
pub fn start(server: &str) -> Option<EspSntp<'static>> {
    let mut conf = SntpConf::default();
    conf.servers[0] = server;

    let sntp = match EspSntp::new(&conf) {
        Ok(sntp) => sntp,
        Err(e) => {
            warn!("NTP: failed to start against {}: {:?}", server, e);
            return None;
        }
    };
    info!("NTP: started against {}", server);

    let started = Instant::now();
    while sntp.get_sync_status() != SyncStatus::Completed {
        if started.elapsed() >= SYNC_TIMEOUT {
            warn!("NTP: no sync after {:?}, continuing without wall clock", SYNC_TIMEOUT);
            return Some(sntp);
        }
        thread::sleep(SYNC_POLL);
    }

    info!("NTP: time synchronized");
    Some(sntp)
}
