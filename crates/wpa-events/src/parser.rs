//! Turns one raw supplicant line into a target interface and a typed event.
//!
//! Families are matched against an ordered table; the first rule that
//! matches owns the line, even if it then fails to produce an event.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, trace, warn};

use crate::config::MonitorConfig;
use crate::control::EVENT_PREFIX;
use crate::event::{AuthFailureReason, WpaEvent, WpsFailReason};
use crate::hotspot;
use crate::mac::MacAddress;
use crate::p2p::{self, P2pDevice};
use crate::registry::SubscriptionRegistry;
use crate::request;
use crate::transport::{InterfaceCommands, SupplicantTransport};

const IFNAME_PREFIX: &str = "IFNAME=";

static WPS_FAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"WPS-FAIL msg=\d+(?: config_error=(\d+))?(?: reason=(\d+))?")
        .expect("valid WPS-FAIL regex")
});

static MAC_AFTER_PHRASE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:Trying to associate with|Associated with) ((?:[0-9a-f]{2}:){5}[0-9a-f]{2})")
        .expect("valid BSSID phrase regex")
});

/// What the reader loop should do after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Continue,
    /// The supplicant connection is gone; stop reading.
    Terminate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    /// `None` means every monitoring interface.
    pub interface: Option<String>,
    pub event: Option<WpaEvent>,
    pub signal: ControlSignal,
}

impl Classified {
    fn dropped() -> Self {
        Self {
            interface: None,
            event: None,
            signal: ControlSignal::Continue,
        }
    }
}

/// Result of a family handler.
#[derive(Debug)]
pub(crate) enum Outcome {
    Event(WpaEvent),
    /// Understood, nothing to deliver.
    Silent,
    /// A receive error still under the threshold.
    RecvError,
    Terminate,
    /// Unknown sub-event or a payload that failed to parse.
    Unrecognized,
}

struct Line<'a> {
    text: &'a str,
    interface: &'a str,
    transport: &'a dyn SupplicantTransport,
}

impl<'a> Line<'a> {
    fn commands(&self) -> InterfaceCommands<'a> {
        InterfaceCommands::new(self.transport, self.interface)
    }
}

enum Rule {
    Prefix(&'static str),
    /// Starts with the first, ends with the second.
    Framed(&'static str, &'static str),
}

impl Rule {
    fn matches(&self, line: &str) -> bool {
        match self {
            Rule::Prefix(prefix) => line.starts_with(prefix),
            Rule::Framed(prefix, suffix) => line.starts_with(prefix) && line.ends_with(suffix),
        }
    }
}

type FamilyHandler = fn(&mut EventParser, &Line<'_>) -> Outcome;

const FAMILIES: &[(Rule, FamilyHandler)] = &[
    (Rule::Prefix(EVENT_PREFIX), control_event),
    (Rule::Prefix("WPS-SUCCESS"), wps_success),
    (Rule::Prefix("WPS-FAIL"), wps_fail),
    (Rule::Prefix("WPS-OVERLAP-DETECTED"), wps_overlap),
    (Rule::Prefix("WPS-TIMEOUT"), wps_timeout),
    (Rule::Prefix("P2P"), p2p_event),
    (Rule::Prefix("AP"), host_ap_event),
    (Rule::Prefix("ANQP-QUERY-DONE"), anqp_done),
    (Rule::Prefix("RX-HS20-ICON"), icon_done),
    (Rule::Prefix("HS20-SUBSCRIPTION-REMEDIATION"), subscription_remediation),
    (Rule::Prefix("HS20-DEAUTH-IMMINENT-NOTICE"), deauth_imminent),
    (Rule::Prefix("CTRL-REQ-"), credential_request),
    (Rule::Prefix("Trying to associate with "), target_bssid),
    (Rule::Prefix("Associated with "), associated_bssid),
    (Rule::Framed("Authentication with", "timed out."), auth_timeout),
    (Rule::Framed("WPA:", "pre-shared key may be incorrect"), wrong_password),
];

/// Stateful classifier: owns the receive-error counter and the per-interface
/// cache of the last BSSID connected to.
pub struct EventParser {
    p2p_interface: String,
    dynamic_p2p_prefix: String,
    icon_chunk_size: usize,
    pub(crate) max_recv_errors: u32,
    pub(crate) recv_errors: u32,
    /// `None` records a connection whose BSSID could not be parsed.
    pub(crate) last_connected: HashMap<String, Option<MacAddress>>,
    pub(crate) verbose: bool,
}

impl EventParser {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            p2p_interface: config.p2p_interface.clone(),
            dynamic_p2p_prefix: config.dynamic_p2p_prefix.clone(),
            icon_chunk_size: config.icon_chunk_size,
            max_recv_errors: config.max_recv_errors,
            recv_errors: 0,
            last_connected: HashMap::new(),
            verbose: config.verbose,
        }
    }

    pub fn recv_errors(&self) -> u32 {
        self.recv_errors
    }

    pub fn reset_recv_errors(&mut self) {
        self.recv_errors = 0;
    }

    pub fn last_connected_bssid(&self, interface: &str) -> Option<MacAddress> {
        self.last_connected.get(interface).copied().flatten()
    }

    pub fn classify_and_parse(
        &mut self,
        raw: &str,
        registry: &SubscriptionRegistry,
        transport: &dyn SupplicantTransport,
    ) -> Classified {
        let raw = raw.trim_end_matches(['\r', '\n']);
        let Some((interface, text)) = self.resolve_interface(raw, registry) else {
            error!("Dropping malformed event (unparsable iface): {}", raw);
            return Classified::dropped();
        };

        if self.verbose && !text.contains("CTRL-EVENT-BSS-ADDED") {
            debug!("{} event: {}", interface, text);
        }

        let line = Line {
            text,
            interface: &interface,
            transport,
        };
        let outcome = match FAMILIES.iter().find(|(rule, _)| rule.matches(text)) {
            Some((_, handler)) => handler(self, &line),
            None => {
                if self.verbose {
                    warn!("Unidentified event: {}", text);
                }
                Outcome::Unrecognized
            }
        };
        trace!("{} -> {:?}", text, outcome);

        match outcome {
            Outcome::Event(event) => {
                self.recv_errors = 0;
                Classified {
                    interface: Some(interface),
                    event: Some(event),
                    signal: ControlSignal::Continue,
                }
            }
            Outcome::Silent => {
                self.recv_errors = 0;
                Classified {
                    interface: Some(interface),
                    event: None,
                    signal: ControlSignal::Continue,
                }
            }
            Outcome::RecvError | Outcome::Unrecognized => Classified {
                interface: Some(interface),
                event: None,
                signal: ControlSignal::Continue,
            },
            Outcome::Terminate => Classified {
                interface: None,
                event: Some(WpaEvent::SupplicantDisconnection),
                signal: ControlSignal::Terminate,
            },
        }
    }

    /// Split off `IFNAME=<name> `; unprefixed lines belong to the P2P device.
    fn resolve_interface<'a>(
        &self,
        raw: &'a str,
        registry: &SubscriptionRegistry,
    ) -> Option<(String, &'a str)> {
        let Some(prefixed) = raw.strip_prefix(IFNAME_PREFIX) else {
            return Some((self.p2p_interface.clone(), raw));
        };
        let (name, text) = prefixed.split_once(' ')?;
        // Group interfaces come and go; their events belong to the P2P device.
        if !registry.has_interface(name) && name.starts_with(&self.dynamic_p2p_prefix) {
            return Some((self.p2p_interface.clone(), text));
        }
        Some((name.to_string(), text))
    }
}

fn control_event(parser: &mut EventParser, line: &Line<'_>) -> Outcome {
    parser.handle_control_event(line.text, line.interface)
}

fn wps_success(_: &mut EventParser, _: &Line<'_>) -> Outcome {
    Outcome::Event(WpaEvent::WpsSuccess)
}

/// `WPS-FAIL msg=%d [config_error=%d] [reason=%d (%s)]`
fn wps_fail(_: &mut EventParser, line: &Line<'_>) -> Outcome {
    let (mut config_error, mut vendor_error) = (0, 0);
    if let Some(caps) = WPS_FAIL_RE.captures(line.text) {
        let code = |i: usize| -> i32 {
            caps.get(i)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0)
        };
        config_error = code(1);
        vendor_error = code(2);
    }
    Outcome::Event(WpaEvent::WpsFail(wps_fail_reason(config_error, vendor_error)))
}

pub(crate) fn wps_fail_reason(config_error: i32, vendor_error: i32) -> WpsFailReason {
    match (vendor_error, config_error) {
        (1, _) => WpsFailReason::TkipOnlyProhibited,
        (2, _) => WpsFailReason::WepProhibited,
        (_, 18) => WpsFailReason::AuthFailure,
        // Multiple push-button sessions detected.
        (_, 12) => WpsFailReason::OverlapError,
        (0, code) => WpsFailReason::Generic { code },
        (code, _) => WpsFailReason::Generic { code },
    }
}

fn wps_overlap(_: &mut EventParser, _: &Line<'_>) -> Outcome {
    Outcome::Event(WpaEvent::WpsOverlap)
}

fn wps_timeout(_: &mut EventParser, _: &Line<'_>) -> Outcome {
    Outcome::Event(WpaEvent::WpsTimeout)
}

fn p2p_event(_: &mut EventParser, line: &Line<'_>) -> Outcome {
    p2p::parse_p2p_event(line.text).map_or(Outcome::Unrecognized, Outcome::Event)
}

/// `AP-STA-CONNECTED 42:fc:89:a8:96:09 p2p_dev_addr=02:90:4c:a0:92:54`
fn host_ap_event(_: &mut EventParser, line: &Line<'_>) -> Outcome {
    let event = match line.text.split(' ').next() {
        Some("AP-STA-CONNECTED") => P2pDevice::parse(line.text).map(WpaEvent::ApStaConnected),
        Some("AP-STA-DISCONNECTED") => P2pDevice::parse(line.text).map(WpaEvent::ApStaDisconnected),
        _ => None,
    };
    event.map_or(Outcome::Unrecognized, Outcome::Event)
}

fn anqp_done(_: &mut EventParser, line: &Line<'_>) -> Outcome {
    match hotspot::parse_anqp_done(line.text, line.commands()) {
        Ok(event) => Outcome::Event(event),
        Err(e) => {
            error!("Bad ANQP event string: '{}': {}", line.text, e);
            Outcome::Unrecognized
        }
    }
}

fn icon_done(parser: &mut EventParser, line: &Line<'_>) -> Outcome {
    match hotspot::parse_icon_done(line.text, line.commands(), parser.icon_chunk_size) {
        Ok(event) => Outcome::Event(event),
        Err(e) => {
            error!("Bad Icon event string: '{}': {}", line.text, e);
            Outcome::Unrecognized
        }
    }
}

fn subscription_remediation(parser: &mut EventParser, line: &Line<'_>) -> Outcome {
    let bssid = parser.last_connected_bssid(line.interface).unwrap_or(MacAddress::ZERO);
    hotspot::parse_subscription_remediation(line.text, bssid)
        .map_or(Outcome::Unrecognized, Outcome::Event)
}

fn deauth_imminent(parser: &mut EventParser, line: &Line<'_>) -> Outcome {
    let bssid = parser.last_connected_bssid(line.interface).unwrap_or(MacAddress::ZERO);
    hotspot::parse_deauth_imminent(line.text, bssid).map_or(Outcome::Unrecognized, Outcome::Event)
}

fn credential_request(_: &mut EventParser, line: &Line<'_>) -> Outcome {
    request::parse_request(line.text).map_or(Outcome::Unrecognized, Outcome::Event)
}

fn phrase_bssid(text: &str) -> Option<String> {
    MAC_AFTER_PHRASE_RE
        .captures(text)
        .map(|caps| caps[1].to_string())
}

fn target_bssid(_: &mut EventParser, line: &Line<'_>) -> Outcome {
    Outcome::Event(WpaEvent::TargetBssid {
        bssid: phrase_bssid(line.text),
    })
}

fn associated_bssid(_: &mut EventParser, line: &Line<'_>) -> Outcome {
    Outcome::Event(WpaEvent::AssociatedBssid {
        bssid: phrase_bssid(line.text),
    })
}

fn auth_timeout(_: &mut EventParser, _: &Line<'_>) -> Outcome {
    Outcome::Event(WpaEvent::AuthenticationFailure {
        reason: AuthFailureReason::Timeout,
    })
}

fn wrong_password(_: &mut EventParser, _: &Line<'_>) -> Outcome {
    Outcome::Event(WpaEvent::AuthenticationFailure {
        reason: AuthFailureReason::WrongPassword,
    })
}
