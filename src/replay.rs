use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};
use wpa_events::SupplicantTransport;

/// Line handed out once the capture is exhausted.
pub const END_OF_CAPTURE: &str = "CTRL-EVENT-TERMINATING - signal 15";

/// Plays back a captured event log, one line per event.
///
/// Lines without an `IFNAME=` prefix are attributed to `interface`. Blank
/// lines and `#` comments are skipped. Commands are never answered, so
/// follow-up queries (ANQP elements, icons) come back empty.
pub struct ReplayTransport {
    interface: String,
    lines: Mutex<Lines<Box<dyn BufRead + Send>>>,
}

impl ReplayTransport {
    pub fn open(path: &Path, interface: &str) -> io::Result<Self> {
        let file = File::open(path)?;
        info!("Replaying {}", path.display());
        Ok(Self::from_reader(BufReader::new(file), interface))
    }

    pub fn from_reader(reader: impl BufRead + Send + 'static, interface: &str) -> Self {
        let reader: Box<dyn BufRead + Send> = Box::new(reader);
        Self {
            interface: interface.to_string(),
            lines: Mutex::new(reader.lines()),
        }
    }

    fn next_line(&self) -> Option<String> {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            let line = match lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    debug!("Capture read failed: {}", e);
                    return None;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return Some(trimmed.to_string());
        }
    }
}

impl SupplicantTransport for ReplayTransport {
    fn connect(&self) -> io::Result<()> {
        Ok(())
    }

    fn wait_for_event(&self) -> String {
        match self.next_line() {
            Some(line) if line.starts_with("IFNAME=") => line,
            Some(line) => format!("IFNAME={} {}", self.interface, line),
            None => END_OF_CAPTURE.to_string(),
        }
    }

    fn query(&self, command: &str) -> Option<String> {
        debug!("Ignoring '{}' during replay", command);
        None
    }

    fn disconnect(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn transport(capture: &str) -> ReplayTransport {
        ReplayTransport::from_reader(Cursor::new(capture.to_string()), "wlan0")
    }

    #[test]
    fn lines_are_attributed_to_the_interface() {
        let replay = transport(
            "# captured on a laptop\n\
             CTRL-EVENT-SCAN-RESULTS \n\
             \n\
             IFNAME=p2p-wlan0-0 AP-STA-CONNECTED 02:00:00:00:00:01\n",
        );

        assert_eq!(replay.wait_for_event(), "IFNAME=wlan0 CTRL-EVENT-SCAN-RESULTS");
        assert_eq!(
            replay.wait_for_event(),
            "IFNAME=p2p-wlan0-0 AP-STA-CONNECTED 02:00:00:00:00:01"
        );
        assert_eq!(replay.wait_for_event(), END_OF_CAPTURE);
        assert_eq!(replay.wait_for_event(), END_OF_CAPTURE);
    }

    #[test]
    fn queries_are_unanswered() {
        assert_eq!(transport("").query("BSS 00:11:22:33:44:55"), None);
    }

    #[test]
    fn opens_capture_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "WPS-SUCCESS").unwrap();

        let replay = ReplayTransport::open(file.path(), "wlan1").unwrap();
        assert_eq!(replay.wait_for_event(), "IFNAME=wlan1 WPS-SUCCESS");
    }
}
