// Console Module
// Line-oriented provisioning over the wired serial console
// Served whenever boot cannot bring the link up

use std::io::{BufRead, ErrorKind, Write};
use std::time::Duration;

use log::{info, warn};
use rand_core::{CryptoRng, RngCore};

use crate::alert::{Alert, DeviceIo};
use crate::network::{format_scan_line, HardwareId, NetworkDriver};
use crate::storage::ProfileStorage;
use crate::store::CredentialStore;

pub const HELP_TEXT: &str = "commands: scan | save <json> | restart | help";

/// Idle wait between reads while no complete line is available
const INPUT_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Scan,
    /// Provisioning document with the password still in clear
    Save(String),
    Restart,
    Help,
}

impl ConsoleCommand {
    /// Parse one input line; blank lines yield `Ok(None)`
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "scan" => ConsoleCommand::Scan,
            "restart" => ConsoleCommand::Restart,
            "help" => ConsoleCommand::Help,
            "save" if rest.is_empty() => return Err("save needs a JSON document".to_string()),
            "save" => ConsoleCommand::Save(rest.to_string()),
            other => return Err(format!("unknown command '{}'", other)),
        };

        Ok(Some(command))
    }
}

/// Console output for one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsoleReply {
    pub lines: Vec<String>,
    /// Device should restart once the reply is printed
    pub restart: bool,
}

impl ConsoleReply {
    fn line(text: impl Into<String>) -> Self {
        Self {
            lines: vec![text.into()],
            restart: false,
        }
    }
}

/// Execute one console line against the store and radio
pub fn handle_line<S, H, N, R>(
    line: &str,
    store: &mut CredentialStore<S, H>,
    network: &mut N,
    rng: &mut R,
) -> ConsoleReply
where
    S: ProfileStorage,
    H: HardwareId,
    N: NetworkDriver,
    R: RngCore + CryptoRng,
{
    let command = match ConsoleCommand::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return ConsoleReply::default(),
        Err(e) => {
            warn!("Console: {}", e);
            return ConsoleReply {
                lines: vec![format!("error: {}", e), HELP_TEXT.to_string()],
                restart: false,
            };
        }
    };

    match command {
        ConsoleCommand::Help => ConsoleReply::line(HELP_TEXT),
        ConsoleCommand::Restart => ConsoleReply {
            lines: vec!["restarting".to_string()],
            restart: true,
        },
        ConsoleCommand::Scan => scan(network),
        ConsoleCommand::Save(json) => {
            // The hardware RNG is only fully seeded while the radio runs
            if let Err(e) = network.activate() {
                warn!("Wi-Fi activation before save failed: {:#}", e);
            }
            match store.save(&json, rng) {
                Ok(profile) => {
                    info!("Console provisioning stored SSID {}", profile.wifi_ssid);
                    ConsoleReply {
                        lines: vec![format!(
                            "WiFi configuration saved for '{}', restarting",
                            profile.wifi_ssid
                        )],
                        restart: true,
                    }
                }
                Err(e) => ConsoleReply::line(format!("error: {}", e)),
            }
        }
    }
}

/// Console session over a byte stream pair, typically the UART stdin/stdout.
///
/// Reads are non-blocking: a line may arrive in several fragments, separated
/// by `WouldBlock` or empty reads. Fragments accumulate until a newline.
pub struct SerialConsole<B, W> {
    input: B,
    output: W,
    pending: Vec<u8>,
}

impl<B, W> SerialConsole<B, W>
where
    B: BufRead,
    W: Write,
{
    pub fn new(input: B, output: W) -> Self {
        Self {
            input,
            output,
            pending: Vec::new(),
        }
    }

    /// Next complete line, or `None` while the current one is still arriving
    pub fn poll_line(&mut self) -> Option<String> {
        match self.input.read_until(b'\n', &mut self.pending) {
            Ok(_) => {}
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) => {}
            Err(e) => warn!("Console read failed: {}", e),
        }

        if !self.pending.ends_with(b"\n") {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }

    /// Serve commands until one asks for a restart
    pub fn serve<S, H, N, IO, R>(
        &mut self,
        store: &mut CredentialStore<S, H>,
        network: &mut N,
        io: &mut IO,
        rng: &mut R,
    ) where
        S: ProfileStorage,
        H: HardwareId,
        N: NetworkDriver,
        IO: DeviceIo,
        R: RngCore + CryptoRng,
    {
        info!("📟 Provisioning console ready");
        self.emit(HELP_TEXT);
        self.prompt();

        loop {
            let line = match self.poll_line() {
                Some(line) => line,
                None => {
                    io.delay(INPUT_POLL);
                    continue;
                }
            };

            let reply = handle_line(&line, store, network, rng);
            for reply_line in &reply.lines {
                self.emit(reply_line);
            }

            if reply.restart {
                io.play(Alert::Short);
                return;
            }
            self.prompt();
        }
    }

    fn emit(&mut self, text: &str) {
        if let Err(e) = writeln!(self.output, "{}", text) {
            warn!("Console write failed: {}", e);
        }
    }

    fn prompt(&mut self) {
        let written = write!(self.output, "> ").and_then(|_| self.output.flush());
        if let Err(e) = written {
            warn!("Console write failed: {}", e);
        }
    }
}

fn scan<N: NetworkDriver>(network: &mut N) -> ConsoleReply {
    info!("start Wi-Fi SSID scan...");
    if let Err(e) = network.activate() {
        return ConsoleReply::line(format!("error: Wi-Fi activation failed: {:#}", e));
    }

    match network.scan() {
        Ok(networks) if networks.is_empty() => ConsoleReply::line("No Wi-Fi networks found."),
        Ok(mut networks) => {
            networks.sort_by(|a, b| b.signal_strength.cmp(&a.signal_strength));
            let mut lines = vec!["find Wi-Fi SSID Name and rssi:".to_string()];
            lines.extend(networks.iter().map(format_scan_line));
            ConsoleReply {
                lines,
                restart: false,
            }
        }
        Err(e) => ConsoleReply::line(format!("error: Wi-Fi scan failed: {:#}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::AccessPoint;
    use crate::alert::Output;
    use crate::store::tests::{FakeRadio, FixedId, MemoryStorage, RadioCall};
    use anyhow::anyhow;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::VecDeque;
    use std::io::{self, BufReader, Read};
    use std::net::Ipv4Addr;

    /// UART-like reader: each step yields a fragment, or `None` for "no data yet"
    struct Uart(VecDeque<Option<&'static [u8]>>);

    impl Read for Uart {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(Some(chunk)) => {
                    buf[..chunk.len()].copy_from_slice(chunk);
                    Ok(chunk.len())
                }
                Some(None) => Err(io::Error::from(ErrorKind::WouldBlock)),
                None => Ok(0),
            }
        }
    }

    fn uart(steps: &[Option<&'static [u8]>]) -> BufReader<Uart> {
        BufReader::new(Uart(steps.iter().copied().collect()))
    }

    #[derive(Default)]
    struct Idle {
        waits: usize,
        alerts: Vec<Alert>,
    }

    impl DeviceIo for Idle {
        fn button_pressed(&mut self) -> bool {
            false
        }

        fn set_output(&mut self, _output: Output, _on: bool) {}

        fn toggle_led(&mut self) {}

        fn delay(&mut self, _duration: Duration) {
            self.waits += 1;
        }

        fn play(&mut self, alert: Alert) {
            self.alerts.push(alert);
        }
    }

    struct ScanRadio(anyhow::Result<Vec<AccessPoint>>);

    impl NetworkDriver for ScanRadio {
        fn activate(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        fn is_connected(&mut self) -> bool {
            false
        }

        fn disconnect(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        fn configure_static(
            &mut self,
            _ip: Ipv4Addr,
            _subnet_mask: Ipv4Addr,
            _gateway: Ipv4Addr,
            _dns: Ipv4Addr,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        fn configure_dhcp(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        fn connect(&mut self, _ssid: &str, _password: Option<&str>) -> anyhow::Result<()> {
            Ok(())
        }

        fn scan(&mut self) -> anyhow::Result<Vec<AccessPoint>> {
            match &self.0 {
                Ok(list) => Ok(list.clone()),
                Err(e) => Err(anyhow!("{}", e)),
            }
        }
    }

    fn store() -> CredentialStore<MemoryStorage, FixedId> {
        CredentialStore::new(MemoryStorage::default(), FixedId(b"board"))
    }

    #[test]
    fn parses_commands() {
        assert_eq!(ConsoleCommand::parse("  "), Ok(None));
        assert_eq!(ConsoleCommand::parse("SCAN"), Ok(Some(ConsoleCommand::Scan)));
        assert_eq!(ConsoleCommand::parse("help\r\n"), Ok(Some(ConsoleCommand::Help)));
        assert_eq!(
            ConsoleCommand::parse(r#"save {"wifi_ssid": "Home"}"#),
            Ok(Some(ConsoleCommand::Save(r#"{"wifi_ssid": "Home"}"#.to_string())))
        );
        assert!(ConsoleCommand::parse("save").is_err());
        assert!(ConsoleCommand::parse("format flash").is_err());
    }

    #[test]
    fn save_stores_profile_and_requests_restart() {
        let mut store = store();
        let mut radio = FakeRadio::default();
        let reply = handle_line(
            r#"save {"wifi_ssid":"Home","wifi_password":"secret123"}"#,
            &mut store,
            &mut radio,
            &mut StdRng::seed_from_u64(9),
        );

        assert!(reply.restart);
        assert!(reply.lines[0].contains("'Home'"));
        assert!(store.load().unwrap().unwrap().wifi_password_encrypted.is_some());
        // Radio is running before the IV is drawn
        assert_eq!(radio.calls, vec![RadioCall::Activate]);
    }

    #[test]
    fn bad_save_reports_error_without_restart() {
        let mut store = store();
        let reply = handle_line(
            "save {broken",
            &mut store,
            &mut FakeRadio::default(),
            &mut StdRng::seed_from_u64(9),
        );

        assert!(!reply.restart);
        assert!(reply.lines[0].starts_with("error: malformed WiFi configuration"));
        assert_eq!(store.load(), Ok(None));
    }

    #[test]
    fn scan_lists_strongest_first() {
        let mut radio = ScanRadio(Ok(vec![
            AccessPoint {
                ssid: "Far".to_string(),
                signal_strength: -90,
                bssid: [0, 0, 0, 0, 0, 1],
            },
            AccessPoint {
                ssid: "Near".to_string(),
                signal_strength: -40,
                bssid: [0, 0, 0, 0, 0, 2],
            },
        ]));
        let reply = handle_line("scan", &mut store(), &mut radio, &mut StdRng::seed_from_u64(9));

        assert_eq!(reply.lines.len(), 3);
        assert_eq!(reply.lines[1], "__********/Near(BSSID: 00:00:00:00:00:02)");
        assert_eq!(reply.lines[2], "_________*/Far(BSSID: 00:00:00:00:00:01)");
    }

    #[test]
    fn empty_and_failed_scans() {
        let mut empty = ScanRadio(Ok(Vec::new()));
        let reply = handle_line("scan", &mut store(), &mut empty, &mut StdRng::seed_from_u64(9));
        assert_eq!(reply.lines, vec!["No Wi-Fi networks found.".to_string()]);

        let mut broken = ScanRadio(Err(anyhow!("radio busy")));
        let reply = handle_line("scan", &mut store(), &mut broken, &mut StdRng::seed_from_u64(9));
        assert!(reply.lines[0].contains("radio busy"));
    }

    #[test]
    fn unknown_command_prints_help() {
        let reply = handle_line(
            "reboot now",
            &mut store(),
            &mut FakeRadio::default(),
            &mut StdRng::seed_from_u64(9),
        );
        assert_eq!(reply.lines[1], HELP_TEXT);
        assert!(!reply.restart);
    }

    #[test]
    fn fragmented_input_is_reassembled() {
        let mut console = SerialConsole::new(
            uart(&[Some(b"sc"), None, Some(b""), Some(b"an\r\nhe"), None, Some(b"lp\n")]),
            Vec::new(),
        );

        assert_eq!(console.poll_line(), None);
        assert_eq!(console.poll_line(), None);
        assert_eq!(console.poll_line(), Some("scan\r\n".to_string()));
        assert_eq!(console.poll_line(), None);
        assert_eq!(console.poll_line(), Some("help\n".to_string()));
        assert_eq!(console.poll_line(), None);
    }

    #[test]
    fn serve_handles_split_commands_until_restart() {
        let mut output = Vec::new();
        let mut console = SerialConsole::new(
            uart(&[
                Some(b"sc"),
                None,
                Some(b"an\n"),
                Some(b"rest"),
                None,
                None,
                Some(b"art\n"),
            ]),
            &mut output,
        );
        let mut radio = ScanRadio(Ok(vec![AccessPoint {
            ssid: "Porch".to_string(),
            signal_strength: -58,
            bssid: [0, 0, 0, 0, 0, 3],
        }]));
        let mut io = Idle::default();

        console.serve(&mut store(), &mut radio, &mut io, &mut StdRng::seed_from_u64(9));
        drop(console);

        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with(HELP_TEXT));
        assert!(text.contains("Porch(BSSID: 00:00:00:00:00:03)"));
        assert!(text.contains("restarting"));
        assert!(!text.contains("unknown command"));
        assert_eq!(io.waits, 3);
        assert_eq!(io.alerts, vec![Alert::Short]);
    }
}
