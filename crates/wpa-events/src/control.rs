//! The `CTRL-EVENT-*` family: connection state, supplicant state changes and
//! the terminating notification that ends the reader loop.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::event::{AuthFailureReason, StateChangeResult, SupplicantState, WpaEvent};
use crate::mac::MacAddress;
use crate::parser::{EventParser, Outcome};

pub(crate) const EVENT_PREFIX: &str = "CTRL-EVENT-";

const CONNECT_PREFIX: &str = "Connection to ";
const CONNECT_SUFFIX: &str = " completed";
const RECV_ERROR: &str = "recv error";
const EAP_AUTH_FAILURE: &str = "EAP authentication failed";

/// `CTRL-EVENT-CONNECTED - Connection to 00:1e:58:ec:d5:6d completed [id=1 id_str=]`
static CONNECTED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"((?:[0-9a-f]{2}:){5}[0-9a-f]{2}) .* \[id=([0-9]+) ")
        .expect("valid connected regex")
});

/// `CTRL-EVENT-DISCONNECTED bssid=ac:22:0b:24:70:74 reason=3 locally_generated=1`
static DISCONNECTED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"((?:[0-9a-f]{2}:){5}[0-9a-f]{2}) +reason=([0-9]+) +locally_generated=([0-1])")
        .expect("valid disconnected regex")
});

/// Older supplicants omit the BSSID.
static ASSOC_REJECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:((?:[0-9a-f]{2}:){5}[0-9a-f]{2}) +)?status_code=([0-9]+)")
        .expect("valid assoc reject regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlEvent {
    Connected,
    Disconnected,
    StateChange,
    LinkSpeed,
    Terminating,
    DriverState,
    EapFailure,
    AssocReject,
    TempDisabled,
    Reenabled,
    BssAdded,
    BssRemoved,
    ScanResults,
    ScanFailed,
    Unknown,
}

impl ControlEvent {
    fn from_name(name: &str) -> Self {
        match name {
            "CONNECTED" => ControlEvent::Connected,
            "DISCONNECTED" => ControlEvent::Disconnected,
            "STATE-CHANGE" => ControlEvent::StateChange,
            "LINK-SPEED" => ControlEvent::LinkSpeed,
            "TERMINATING" => ControlEvent::Terminating,
            "DRIVER-STATE" => ControlEvent::DriverState,
            "EAP-FAILURE" => ControlEvent::EapFailure,
            "ASSOC-REJECT" => ControlEvent::AssocReject,
            "SSID-TEMP-DISABLED" => ControlEvent::TempDisabled,
            "SSID-REENABLED" => ControlEvent::Reenabled,
            "BSS-ADDED" => ControlEvent::BssAdded,
            "BSS-REMOVED" => ControlEvent::BssRemoved,
            "SCAN-RESULTS" => ControlEvent::ScanResults,
            "SCAN-FAILED" => ControlEvent::ScanFailed,
            _ => ControlEvent::Unknown,
        }
    }

    /// The part of the line each kind parses.
    fn payload(self, line: &str) -> Option<&str> {
        match self {
            ControlEvent::DriverState | ControlEvent::LinkSpeed => line.split(' ').nth(1),
            ControlEvent::StateChange | ControlEvent::EapFailure => {
                Some(line.split_once(' ').map_or(line, |(_, rest)| rest))
            }
            _ => Some(line.split_once(" - ").map_or(line, |(_, rest)| rest)),
        }
    }
}

impl EventParser {
    pub(crate) fn handle_control_event(&mut self, line: &str, iface: &str) -> Outcome {
        let name = line[EVENT_PREFIX.len()..].split(' ').next().unwrap_or_default();
        if name.is_empty() {
            info!("Received wpa_supplicant event with empty event name");
            return Outcome::Unrecognized;
        }

        let kind = ControlEvent::from_name(name);
        if kind == ControlEvent::Connected {
            self.remember_connected_bssid(line, iface);
        }
        let Some(payload) = kind.payload(line) else {
            debug!("No payload in {}", line);
            return Outcome::Silent;
        };

        match kind {
            ControlEvent::Connected => Outcome::Event(network_connection(payload)),
            ControlEvent::Disconnected => Outcome::Event(network_disconnection(payload)),
            ControlEvent::StateChange => match state_change(payload) {
                Some(result) => Outcome::Event(WpaEvent::SupplicantStateChange(result)),
                None => Outcome::Silent,
            },
            ControlEvent::DriverState if payload == "HANGED" => {
                Outcome::Event(WpaEvent::DriverHung)
            }
            ControlEvent::Terminating => self.terminating(payload),
            ControlEvent::EapFailure if payload.starts_with(EAP_AUTH_FAILURE) => {
                Outcome::Event(WpaEvent::AuthenticationFailure {
                    reason: AuthFailureReason::EapFailure,
                })
            }
            ControlEvent::AssocReject => Outcome::Event(association_rejection(payload)),
            ControlEvent::TempDisabled | ControlEvent::Reenabled => {
                let detail = line.split_once(' ').map(|(_, rest)| rest.to_string());
                let network_id = detail.as_deref().map_or(-1, network_id_field);
                Outcome::Event(if kind == ControlEvent::TempDisabled {
                    WpaEvent::SsidTempDisabled { network_id, detail }
                } else {
                    WpaEvent::SsidReenabled { network_id, detail }
                })
            }
            ControlEvent::ScanResults => Outcome::Event(WpaEvent::ScanResults),
            ControlEvent::ScanFailed => Outcome::Event(WpaEvent::ScanFailed),
            ControlEvent::Unknown => {
                if self.verbose {
                    warn!("Unknown control event: {}", line);
                }
                Outcome::Unrecognized
            }
            ControlEvent::DriverState
            | ControlEvent::EapFailure
            | ControlEvent::LinkSpeed
            | ControlEvent::BssAdded
            | ControlEvent::BssRemoved => Outcome::Silent,
        }
    }

    fn remember_connected_bssid(&mut self, line: &str, iface: &str) {
        let bssid = line.find(CONNECT_PREFIX).and_then(|start| {
            let rest = &line[start + CONNECT_PREFIX.len()..];
            let end = rest.find(CONNECT_SUFFIX)?;
            MacAddress::parse(&rest[..end]).ok()
        });
        if bssid.is_none() {
            warn!("Failed to parse out BSSID from '{}'", line);
        }
        self.last_connected.insert(iface.to_string(), bssid);
    }

    /// Receive errors only end the connection once they pile up.
    fn terminating(&mut self, payload: &str) -> Outcome {
        if payload.starts_with(RECV_ERROR) {
            self.recv_errors += 1;
            if self.recv_errors <= self.max_recv_errors {
                return Outcome::RecvError;
            }
            debug!("Too many receive errors, closing connection");
        }
        Outcome::Terminate
    }
}

fn network_connection(payload: &str) -> WpaEvent {
    match CONNECTED_RE.captures(payload) {
        Some(caps) => WpaEvent::NetworkConnection {
            network_id: caps[2].parse().unwrap_or(-1),
            bssid: Some(caps[1].to_string()),
        },
        None => {
            debug!("Couldn't find BSSID in event string");
            WpaEvent::NetworkConnection {
                network_id: -1,
                bssid: None,
            }
        }
    }
}

fn network_disconnection(payload: &str) -> WpaEvent {
    match DISCONNECTED_RE.captures(payload) {
        Some(caps) => WpaEvent::NetworkDisconnection {
            bssid: caps[1].to_string(),
            reason: caps[2].parse().unwrap_or(-1),
            locally_generated: &caps[3] == "1",
        },
        None => {
            debug!("Could not parse disconnect string");
            WpaEvent::NetworkDisconnection {
                bssid: String::new(),
                reason: 0,
                locally_generated: false,
            }
        }
    }
}

fn association_rejection(payload: &str) -> WpaEvent {
    let Some(caps) = ASSOC_REJECT_RE.captures(payload) else {
        debug!("Could not parse assoc reject string");
        return WpaEvent::AssociationRejection {
            bssid: String::new(),
            status: -1,
        };
    };
    WpaEvent::AssociationRejection {
        bssid: caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
        status: caps[2].parse().unwrap_or(-1),
    }
}

/// `id=<n>` with its leading digits only; -1 without the token.
fn network_id_field(detail: &str) -> i32 {
    detail
        .split(' ')
        .filter_map(|token| token.strip_prefix("id="))
        .last()
        .map_or(-1, |value| {
            let digits: String = value.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().unwrap_or(0)
        })
}

/// `id=3 state=2 BSSID=aa:bb:cc:dd:ee:ff SSID=foo`; no `state=` means no event.
fn state_change(payload: &str) -> Option<StateChangeResult> {
    let mut bssid = None;
    let mut network_id = -1;
    let mut state = None;

    for token in payload.split(' ') {
        let parts: Vec<&str> = token.split('=').collect();
        let [name, value] = parts.as_slice() else {
            continue;
        };
        match *name {
            "BSSID" => bssid = Some(value.to_string()),
            "id" => network_id = value.parse().unwrap_or(network_id),
            "state" => state = value.parse::<i64>().ok().or(state),
            _ => {}
        }
    }

    let index = state?;
    let state = SupplicantState::from_index(index);
    if state == SupplicantState::Invalid {
        warn!("Invalid supplicant state: {}", index);
    }
    Some(StateChangeResult {
        network_id,
        ssid: ssid_value(payload).map(|raw| decode_ssid(raw)),
        bssid,
        state,
    })
}

/// Value of the last standalone `SSID=` key, up to the next known key.
fn ssid_value(payload: &str) -> Option<&str> {
    let start = payload
        .match_indices("SSID=")
        .map(|(i, _)| i)
        .filter(|&i| i == 0 || payload.as_bytes()[i - 1] == b' ')
        .last()?
        + "SSID=".len();
    let rest = &payload[start..];
    let end = [" BSSID=", " id=", " state="]
        .iter()
        .filter_map(|key| rest.find(key))
        .min()
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Undo the supplicant's printf-style escaping of SSID bytes.
pub(crate) fn decode_ssid(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 == bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        i += 1;
        match bytes[i] {
            b'"' => out.push(b'"'),
            b'\\' => out.push(b'\\'),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'e' => out.push(0x1b),
            b'x' => {
                let hex = raw.get(i + 1..i + 3).and_then(|h| u8::from_str_radix(h, 16).ok());
                match hex {
                    Some(byte) => {
                        out.push(byte);
                        i += 2;
                    }
                    None => out.extend_from_slice(b"\\x"),
                }
            }
            b'0'..=b'7' => {
                let len = bytes[i..]
                    .iter()
                    .take(3)
                    .take_while(|b| (b'0'..=b'7').contains(*b))
                    .count();
                let value = raw[i..i + len]
                    .chars()
                    .fold(0u32, |acc, c| acc * 8 + c.to_digit(8).unwrap_or(0));
                out.push(value as u8);
                i += len - 1;
            }
            other => {
                out.push(b'\\');
                out.push(other);
            }
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
