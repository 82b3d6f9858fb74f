//! Peer-to-peer (Wi-Fi Direct) event payloads and the second-level parser
//! for `P2P-*` lines.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{error, warn};

use crate::event::WpaEvent;
use crate::mac::MacAddress;

/// Status codes reported by negotiation and invitation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum P2pStatus {
    Success,
    InformationIsCurrentlyUnavailable,
    IncompatibleParameters,
    LimitReached,
    InvalidParameter,
    UnableToAccommodateRequest,
    PreviousProtocolError,
    NoCommonChannel,
    UnknownP2pGroup,
    BothGoIntent15,
    IncompatibleProvisioningMethod,
    RejectedByUser,
    Unknown,
}

impl P2pStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => P2pStatus::Success,
            1 => P2pStatus::InformationIsCurrentlyUnavailable,
            2 => P2pStatus::IncompatibleParameters,
            3 => P2pStatus::LimitReached,
            4 => P2pStatus::InvalidParameter,
            5 => P2pStatus::UnableToAccommodateRequest,
            6 => P2pStatus::PreviousProtocolError,
            7 => P2pStatus::NoCommonChannel,
            8 => P2pStatus::UnknownP2pGroup,
            9 => P2pStatus::BothGoIntent15,
            10 => P2pStatus::IncompatibleProvisioningMethod,
            11 => P2pStatus::RejectedByUser,
            _ => P2pStatus::Unknown,
        }
    }

    /// Decode `<event> status=<n>` or `<event> reason=FREQ_CONFLICT`.
    ///
    /// Never fails: anything unexpected is `Unknown`.
    pub fn from_event(line: &str) -> Self {
        let Some(token) = line.split(' ').nth(1) else {
            return P2pStatus::Unknown;
        };
        let parts: Vec<&str> = token.split('=').collect();
        if parts.len() != 2 {
            return P2pStatus::Unknown;
        }
        if parts[1] == "FREQ_CONFLICT" {
            return P2pStatus::NoCommonChannel;
        }
        match parts[1].parse::<i32>() {
            Ok(code) => P2pStatus::from_code(code),
            Err(_) => {
                warn!("Non-numeric P2P status {:?}", parts[1]);
                P2pStatus::Unknown
            }
        }
    }
}

/// A peer descriptor, as carried by device-found/lost and AP station lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct P2pDevice {
    pub device_address: String,
    pub primary_device_type: Option<String>,
    pub device_name: Option<String>,
    pub config_methods: u32,
    pub device_capability: u32,
    pub group_capability: u32,
}

impl P2pDevice {
    pub fn parse(line: &str) -> Option<Self> {
        let fields = Fields::parse(line);
        let device_address = fields
            .get("p2p_dev_addr")
            .or_else(|| fields.get("dev_addr"))
            .map(str::to_string)
            .or_else(|| first_mac(line))?;

        Some(Self {
            device_address,
            primary_device_type: fields.get("pri_dev_type").map(str::to_string),
            device_name: fields.get("name").map(str::to_string),
            config_methods: fields.hex("config_methods"),
            device_capability: fields.hex("dev_capab"),
            group_capability: fields.hex("group_capab"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WpsSetup {
    PushButton,
    Display,
    Keypad,
}

/// Group owner negotiation request from a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct P2pConfig {
    pub device_address: String,
    pub wps_setup: WpsSetup,
}

impl P2pConfig {
    /// `P2P-GO-NEG-REQUEST 42:fc:89:a8:96:09 dev_passwd_id=4`
    pub fn parse(line: &str) -> Option<Self> {
        let device_address = line.split_whitespace().nth(1)?;
        MacAddress::parse(device_address).ok()?;
        let wps_setup = match Fields::parse(line).get("dev_passwd_id") {
            Some("1") => WpsSetup::Keypad,
            Some("5") => WpsSetup::Display,
            _ => WpsSetup::PushButton,
        };
        Some(Self {
            device_address: device_address.to_string(),
            wps_setup,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct P2pGroup {
    pub interface: Option<String>,
    pub is_group_owner: bool,
    pub network_name: Option<String>,
    pub frequency: Option<u32>,
    pub psk: Option<String>,
    pub passphrase: Option<String>,
    pub owner_address: Option<String>,
    pub persistent: bool,
    /// Persistent network id offered by an invitation.
    pub network_id: Option<i32>,
    pub bssid: Option<String>,
    pub reason: Option<String>,
}

impl P2pGroup {
    /// Accepts `P2P-GROUP-STARTED`/`P2P-GROUP-REMOVED` and
    /// `P2P-INVITATION-RECEIVED` lines.
    pub fn parse(line: &str) -> Option<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 3 {
            return None;
        }
        let fields = Fields::parse(line);

        if tokens[0].starts_with("P2P-GROUP") {
            Some(Self {
                interface: Some(tokens[1].to_string()),
                is_group_owner: tokens[2] == "GO",
                network_name: fields.get("ssid").map(str::to_string),
                frequency: fields.get("freq").and_then(|f| f.parse().ok()),
                psk: fields.get("psk").map(str::to_string),
                passphrase: fields.get("passphrase").map(str::to_string),
                owner_address: fields.get("go_dev_addr").map(str::to_string),
                persistent: tokens.contains(&"[PERSISTENT]"),
                reason: fields.get("reason").map(str::to_string),
                ..Self::default()
            })
        } else if tokens[0] == "P2P-INVITATION-RECEIVED" {
            let network_id = fields.get("persistent").and_then(|id| id.parse().ok());
            Some(Self {
                owner_address: fields
                    .get("go_dev_addr")
                    .or_else(|| fields.get("sa"))
                    .map(str::to_string),
                bssid: fields.get("bssid").map(str::to_string),
                persistent: network_id.is_some(),
                network_id,
                ..Self::default()
            })
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvDiscKind {
    PbcRequest,
    PbcResponse,
    EnterPin,
    ShowPin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvDiscEvent {
    pub kind: ProvDiscKind,
    pub device_address: String,
    pub pin: Option<String>,
}

impl ProvDiscEvent {
    pub fn parse(line: &str) -> Option<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 2 {
            return None;
        }
        let kind = if tokens[0].ends_with("PBC-REQ") {
            ProvDiscKind::PbcRequest
        } else if tokens[0].ends_with("PBC-RESP") {
            ProvDiscKind::PbcResponse
        } else if tokens[0].ends_with("ENTER-PIN") {
            ProvDiscKind::EnterPin
        } else if tokens[0].ends_with("SHOW-PIN") {
            ProvDiscKind::ShowPin
        } else {
            return None;
        };
        let pin = match kind {
            ProvDiscKind::ShowPin => tokens.get(2).map(|p| p.to_string()),
            _ => None,
        };
        Some(Self {
            kind,
            device_address: tokens[1].to_string(),
            pin,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    All,
    Bonjour,
    Upnp,
    VendorSpecific,
    Other(u8),
}

impl From<u8> for ServiceType {
    fn from(value: u8) -> Self {
        match value {
            0 => ServiceType::All,
            1 => ServiceType::Bonjour,
            2 => ServiceType::Upnp,
            255 => ServiceType::VendorSpecific,
            other => ServiceType::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceResponse {
    pub device_address: String,
    pub service_type: ServiceType,
    pub transaction_id: u8,
    pub status: u8,
    pub data: Vec<u8>,
}

impl ServiceResponse {
    /// `P2P-SERV-DISC-RESP <addr> <update indicator> <hex TLVs>`
    ///
    /// Each TLV is a little-endian u16 length (covering type, transaction id,
    /// status and data), then those three bytes, then the data.
    pub fn parse_list(line: &str) -> Option<Vec<Self>> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 4 {
            return None;
        }
        let device_address = tokens[1];
        let bin = hex::decode(tokens[3]).ok()?;

        let mut responses = Vec::new();
        let mut rest = bin.as_slice();
        while !rest.is_empty() {
            let [lo, hi, service_type, transaction_id, status, tail @ ..] = rest else {
                return None;
            };
            let length = usize::from(u16::from_le_bytes([*lo, *hi])).checked_sub(3)?;
            if tail.len() < length {
                return None;
            }
            let (data, remaining) = tail.split_at(length);
            rest = remaining;

            if data.is_empty() && *status != 0 {
                continue;
            }
            responses.push(Self {
                device_address: device_address.to_string(),
                service_type: ServiceType::from(*service_type),
                transaction_id: *transaction_id,
                status: *status,
                data: data.to_vec(),
            });
        }
        Some(responses)
    }
}

type P2pHandler = fn(&str) -> Option<WpaEvent>;

/// Checked in order; first prefix match wins.
const P2P_EVENTS: &[(&str, P2pHandler)] = &[
    ("P2P-DEVICE-FOUND", device_found),
    ("P2P-DEVICE-LOST", device_lost),
    ("P2P-FIND-STOPPED", find_stopped),
    ("P2P-GO-NEG-REQUEST", go_negotiation_request),
    ("P2P-GO-NEG-SUCCESS", go_negotiation_success),
    ("P2P-GO-NEG-FAILURE", go_negotiation_failure),
    ("P2P-GROUP-FORMATION-SUCCESS", group_formation_success),
    ("P2P-GROUP-FORMATION-FAILURE", group_formation_failure),
    ("P2P-GROUP-STARTED", group_started),
    ("P2P-GROUP-REMOVED", group_removed),
    ("P2P-INVITATION-RECEIVED", invitation_received),
    ("P2P-INVITATION-RESULT", invitation_result),
    ("P2P-PROV-DISC-PBC-REQ", prov_disc),
    ("P2P-PROV-DISC-PBC-RESP", prov_disc),
    ("P2P-PROV-DISC-ENTER-PIN", prov_disc),
    ("P2P-PROV-DISC-SHOW-PIN", prov_disc),
    ("P2P-PROV-DISC-FAILURE", prov_disc_failure),
    ("P2P-SERV-DISC-RESP", service_discovery_response),
];

/// Second-level dispatch for the peer-discovery family.
///
/// Returns `None` for unknown sub-events and for payloads that fail to parse.
pub fn parse_p2p_event(line: &str) -> Option<WpaEvent> {
    let (_, handler) = P2P_EVENTS.iter().find(|(prefix, _)| line.starts_with(prefix))?;
    handler(line)
}

fn device_found(line: &str) -> Option<WpaEvent> {
    P2pDevice::parse(line).map(WpaEvent::P2pDeviceFound)
}

fn device_lost(line: &str) -> Option<WpaEvent> {
    P2pDevice::parse(line).map(WpaEvent::P2pDeviceLost)
}

fn find_stopped(_: &str) -> Option<WpaEvent> {
    Some(WpaEvent::P2pFindStopped)
}

fn go_negotiation_request(line: &str) -> Option<WpaEvent> {
    P2pConfig::parse(line).map(WpaEvent::P2pGoNegotiationRequest)
}

fn go_negotiation_success(_: &str) -> Option<WpaEvent> {
    Some(WpaEvent::P2pGoNegotiationSuccess)
}

fn go_negotiation_failure(line: &str) -> Option<WpaEvent> {
    Some(WpaEvent::P2pGoNegotiationFailure(P2pStatus::from_event(line)))
}

fn group_formation_success(_: &str) -> Option<WpaEvent> {
    Some(WpaEvent::P2pGroupFormationSuccess)
}

fn group_formation_failure(line: &str) -> Option<WpaEvent> {
    Some(WpaEvent::P2pGroupFormationFailure(P2pStatus::from_event(line)))
}

fn group_started(line: &str) -> Option<WpaEvent> {
    P2pGroup::parse(line).map(WpaEvent::P2pGroupStarted)
}

fn group_removed(line: &str) -> Option<WpaEvent> {
    P2pGroup::parse(line).map(WpaEvent::P2pGroupRemoved)
}

fn invitation_received(line: &str) -> Option<WpaEvent> {
    P2pGroup::parse(line).map(WpaEvent::P2pInvitationReceived)
}

fn invitation_result(line: &str) -> Option<WpaEvent> {
    Some(WpaEvent::P2pInvitationResult(P2pStatus::from_event(line)))
}

fn prov_disc(line: &str) -> Option<WpaEvent> {
    let event = ProvDiscEvent::parse(line)?;
    Some(match event.kind {
        ProvDiscKind::PbcRequest => WpaEvent::P2pProvDiscPbcRequest(event),
        ProvDiscKind::PbcResponse => WpaEvent::P2pProvDiscPbcResponse(event),
        ProvDiscKind::EnterPin => WpaEvent::P2pProvDiscEnterPin(event),
        ProvDiscKind::ShowPin => WpaEvent::P2pProvDiscShowPin(event),
    })
}

fn prov_disc_failure(_: &str) -> Option<WpaEvent> {
    Some(WpaEvent::P2pProvDiscFailure)
}

fn service_discovery_response(line: &str) -> Option<WpaEvent> {
    match ServiceResponse::parse_list(line) {
        Some(list) => Some(WpaEvent::P2pServiceDiscoveryResponse(list)),
        None => {
            error!("Empty service response: {}", line);
            None
        }
    }
}

fn first_mac(line: &str) -> Option<String> {
    line.split_whitespace()
        .skip(1)
        .find(|t| MacAddress::parse(t).is_ok())
        .map(str::to_string)
}

/// `key=value` pairs of an event line; values may be single- or
/// double-quoted and contain spaces.
struct Fields<'a>(HashMap<&'a str, &'a str>);

impl<'a> Fields<'a> {
    fn parse(line: &'a str) -> Self {
        let mut map = HashMap::new();
        let mut rest = line.trim_start();
        while !rest.is_empty() {
            let token_end = rest.find(' ').unwrap_or(rest.len());
            let Some(eq) = rest[..token_end].find('=') else {
                rest = rest[token_end..].trim_start();
                continue;
            };
            let key = &rest[..eq];
            let after = &rest[eq + 1..];
            let quote = after.chars().next().filter(|c| *c == '\'' || *c == '"');
            let closing = quote.and_then(|q| after[1..].find(q));
            let (value, consumed) = match closing {
                Some(end) => (&after[1..=end], eq + 1 + end + 2),
                None => {
                    let end = after.find(' ').unwrap_or(after.len());
                    (&after[..end], eq + 1 + end)
                }
            };
            map.insert(key, value);
            rest = rest[consumed.min(rest.len())..].trim_start();
        }
        Self(map)
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.0.get(key).copied()
    }

    fn hex(&self, key: &str) -> u32 {
        self.get(key)
            .and_then(|v| u32::from_str_radix(v.trim_start_matches("0x"), 16).ok())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("P2P-GO-NEG-FAILURE status=1", P2pStatus::InformationIsCurrentlyUnavailable)]
    #[case("P2P-GROUP-FORMATION-FAILURE reason=FREQ_CONFLICT", P2pStatus::NoCommonChannel)]
    #[case("P2P-INVITATION-RESULT status=abc", P2pStatus::Unknown)]
    #[case("P2P-INVITATION-RESULT status=99", P2pStatus::Unknown)]
    #[case("P2P-GO-NEG-FAILURE", P2pStatus::Unknown)]
    #[case("P2P-GO-NEG-FAILURE status", P2pStatus::Unknown)]
    fn status_codes(#[case] line: &str, #[case] expected: P2pStatus) {
        assert_eq!(P2pStatus::from_event(line), expected);
    }

    #[test]
    fn device_found_with_quoted_name() {
        let line = "P2P-DEVICE-FOUND fa:7b:7a:42:02:13 p2p_dev_addr=fa:7b:7a:42:02:13 \
                    pri_dev_type=1-0050F204-1 name='p2p TEST1' config_methods=0x188 \
                    dev_capab=0x27 group_capab=0x0";
        let Some(WpaEvent::P2pDeviceFound(device)) = parse_p2p_event(line) else {
            panic!("expected device found");
        };
        assert_eq!(device.device_address, "fa:7b:7a:42:02:13");
        assert_eq!(device.device_name.as_deref(), Some("p2p TEST1"));
        assert_eq!(device.primary_device_type.as_deref(), Some("1-0050F204-1"));
        assert_eq!(device.config_methods, 0x188);
        assert_eq!(device.device_capability, 0x27);
        assert_eq!(device.group_capability, 0);
    }

    #[test]
    fn device_without_address_is_dropped() {
        assert_eq!(parse_p2p_event("P2P-DEVICE-LOST nothing-here"), None);
    }

    #[test]
    fn go_negotiation_request_maps_password_id() {
        let Some(WpaEvent::P2pGoNegotiationRequest(config)) =
            parse_p2p_event("P2P-GO-NEG-REQUEST 42:fc:89:a8:96:09 dev_passwd_id=1")
        else {
            panic!("expected negotiation request");
        };
        assert_eq!(config.device_address, "42:fc:89:a8:96:09");
        assert_eq!(config.wps_setup, WpsSetup::Keypad);
    }

    #[test]
    fn group_started() {
        let line = "P2P-GROUP-STARTED p2p-wlan0-0 GO ssid=\"DIRECT-W8\" freq=2437 \
                    passphrase=\"fKG4jMe3\" go_dev_addr=fa:7b:7a:42:02:13 [PERSISTENT]";
        let Some(WpaEvent::P2pGroupStarted(group)) = parse_p2p_event(line) else {
            panic!("expected group started");
        };
        assert_eq!(group.interface.as_deref(), Some("p2p-wlan0-0"));
        assert!(group.is_group_owner);
        assert_eq!(group.network_name.as_deref(), Some("DIRECT-W8"));
        assert_eq!(group.frequency, Some(2437));
        assert_eq!(group.passphrase.as_deref(), Some("fKG4jMe3"));
        assert_eq!(group.owner_address.as_deref(), Some("fa:7b:7a:42:02:13"));
        assert!(group.persistent);
    }

    #[test]
    fn invitation_received() {
        let line = "P2P-INVITATION-RECEIVED sa=fa:7b:7a:42:02:13 go_dev_addr=f8:7b:7a:42:02:13 \
                    bssid=fa:7b:7a:42:82:13 persistent=3";
        let Some(WpaEvent::P2pInvitationReceived(group)) = parse_p2p_event(line) else {
            panic!("expected invitation");
        };
        assert_eq!(group.owner_address.as_deref(), Some("f8:7b:7a:42:02:13"));
        assert_eq!(group.network_id, Some(3));
        assert!(group.persistent);
    }

    #[test]
    fn show_pin_carries_pin() {
        let line = "P2P-PROV-DISC-SHOW-PIN 42:fc:89:e1:e2:27 44490607 \
                    p2p_dev_addr=42:fc:89:e1:e2:27";
        let Some(WpaEvent::P2pProvDiscShowPin(event)) = parse_p2p_event(line) else {
            panic!("expected show pin");
        };
        assert_eq!(event.kind, ProvDiscKind::ShowPin);
        assert_eq!(event.pin.as_deref(), Some("44490607"));
    }

    #[test]
    fn service_discovery_tlvs() {
        let Some(WpaEvent::P2pServiceDiscoveryResponse(list)) =
            parse_p2p_event("P2P-SERV-DISC-RESP 58:17:0c:bc:dd:ca 21 0500010200abcd")
        else {
            panic!("expected service response");
        };
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].service_type, ServiceType::Bonjour);
        assert_eq!(list[0].transaction_id, 2);
        assert_eq!(list[0].status, 0);
        assert_eq!(list[0].data, vec![0xab, 0xcd]);
    }

    #[test]
    fn unavailable_service_protocol_is_skipped() {
        let Some(WpaEvent::P2pServiceDiscoveryResponse(list)) =
            parse_p2p_event("P2P-SERV-DISC-RESP 42:fc:89:e1:e2:27 1 0300000101")
        else {
            panic!("expected service response");
        };
        assert!(list.is_empty());
    }

    #[test]
    fn truncated_service_tlv_is_dropped() {
        assert_eq!(parse_p2p_event("P2P-SERV-DISC-RESP 42:fc:89:e1:e2:27 1 0900010200ab"), None);
        assert_eq!(parse_p2p_event("P2P-SERV-DISC-RESP 42:fc:89:e1:e2:27 1 zz"), None);
    }
}
