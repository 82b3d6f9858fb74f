use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};

use crate::mac::MacAddress;
use crate::p2p::{P2pConfig, P2pDevice, P2pGroup, P2pStatus, ProvDiscEvent, ServiceResponse};

/// Stable numeric code for every notification a subscriber can register for.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    IntoStaticStr,
    Serialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum EventType {
    SupplicantConnection = 1,
    SupplicantDisconnection = 2,
    NetworkConnection = 3,
    NetworkDisconnection = 4,
    ScanResults = 5,
    SupplicantStateChange = 6,
    AuthenticationFailure = 7,
    WpsSuccess = 8,
    WpsFail = 9,
    WpsOverlap = 10,
    WpsTimeout = 11,
    DriverHung = 12,
    SsidTempDisabled = 13,
    SsidReenabled = 14,
    RequestIdentity = 15,
    RequestSimAuth = 16,
    ScanFailed = 17,
    P2pDeviceFound = 21,
    P2pDeviceLost = 22,
    P2pGoNegotiationRequest = 23,
    P2pGoNegotiationSuccess = 25,
    P2pGoNegotiationFailure = 26,
    P2pGroupFormationSuccess = 27,
    P2pGroupFormationFailure = 28,
    P2pGroupStarted = 29,
    P2pGroupRemoved = 30,
    P2pInvitationReceived = 31,
    P2pInvitationResult = 32,
    P2pProvDiscPbcRequest = 33,
    P2pProvDiscPbcResponse = 34,
    P2pProvDiscEnterPin = 35,
    P2pProvDiscShowPin = 36,
    P2pFindStopped = 37,
    P2pServiceDiscoveryResponse = 38,
    P2pProvDiscFailure = 39,
    ApStaDisconnected = 41,
    ApStaConnected = 42,
    AssociationRejection = 43,
    AnqpDone = 44,
    Hs20IconDone = 53,
    Hs20Wnm = 61,
    TargetBssid = 71,
    AssociatedBssid = 72,
}

impl EventType {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::iter().find(|t| t.code() == code)
    }
}

/// Supplicant connection states, in the order the daemon numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplicantState {
    Disconnected,
    InterfaceDisabled,
    Inactive,
    Scanning,
    Authenticating,
    Associating,
    Associated,
    FourWayHandshake,
    GroupHandshake,
    Completed,
    Dormant,
    Uninitialized,
    Invalid,
}

impl SupplicantState {
    /// Map the numeric `state=` index; anything out of range is `Invalid`.
    pub fn from_index(index: i64) -> Self {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::iter().nth(i))
            .unwrap_or(Self::Invalid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateChangeResult {
    pub network_id: i32,
    pub ssid: Option<String>,
    pub bssid: Option<String>,
    pub state: SupplicantState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuthFailureReason {
    Default = 0,
    Timeout = 1,
    WrongPassword = 2,
    EapFailure = 3,
}

/// Outcome reported for a `WPS-FAIL` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WpsFailReason {
    TkipOnlyProhibited,
    WepProhibited,
    AuthFailure,
    OverlapError,
    /// Anything else, carrying the vendor code if set, else the config error.
    Generic { code: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimAuthMethod {
    /// GSM authentication (EAP-SIM).
    Sim,
    /// UMTS authentication (EAP-AKA).
    Aka,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimAuthRequest {
    pub network_id: i32,
    pub method: SimAuthMethod,
    pub ssid: String,
    /// RAND values for GSM, `[rand, autn]` for UMTS.
    pub data: Vec<String>,
}

/// Result of an ANQP query, with elements pulled from the `BSS` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnqpEvent {
    pub bssid: MacAddress,
    /// `None` when the query failed or was never issued.
    pub elements: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IconEvent {
    pub bssid: MacAddress,
    pub file_name: String,
    pub size: u32,
    /// `None` when retrieval failed.
    pub data: Option<Vec<u8>>,
}

/// Hotspot 2.0 wireless network management frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WnmData {
    SubscriptionRemediation {
        bssid: MacAddress,
        url: String,
        method: i32,
    },
    DeauthImminent {
        bssid: MacAddress,
        url: String,
        /// The whole ESS is affected rather than just this BSS.
        ess: bool,
        delay_secs: i32,
    },
}

/// A parsed supplicant notification, independent of the raw line it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WpaEvent {
    SupplicantConnection,
    SupplicantDisconnection,
    NetworkConnection {
        network_id: i32,
        /// `None` when no BSSID could be extracted.
        bssid: Option<String>,
    },
    NetworkDisconnection {
        bssid: String,
        reason: i32,
        locally_generated: bool,
    },
    ScanResults,
    ScanFailed,
    SupplicantStateChange(StateChangeResult),
    AuthenticationFailure {
        reason: AuthFailureReason,
    },
    WpsSuccess,
    WpsFail(WpsFailReason),
    WpsOverlap,
    WpsTimeout,
    DriverHung,
    SsidTempDisabled {
        network_id: i32,
        detail: Option<String>,
    },
    SsidReenabled {
        network_id: i32,
        detail: Option<String>,
    },
    RequestIdentity {
        network_id: i32,
        ssid: Option<String>,
    },
    RequestSimAuth(SimAuthRequest),
    TargetBssid {
        bssid: Option<String>,
    },
    AssociatedBssid {
        bssid: Option<String>,
    },
    AssociationRejection {
        bssid: String,
        status: i32,
    },
    ApStaConnected(P2pDevice),
    ApStaDisconnected(P2pDevice),
    AnqpDone(AnqpEvent),
    IconDone(IconEvent),
    Wnm(WnmData),
    P2pDeviceFound(P2pDevice),
    P2pDeviceLost(P2pDevice),
    P2pFindStopped,
    P2pGoNegotiationRequest(P2pConfig),
    P2pGoNegotiationSuccess,
    P2pGoNegotiationFailure(P2pStatus),
    P2pGroupFormationSuccess,
    P2pGroupFormationFailure(P2pStatus),
    P2pGroupStarted(P2pGroup),
    P2pGroupRemoved(P2pGroup),
    P2pInvitationReceived(P2pGroup),
    P2pInvitationResult(P2pStatus),
    P2pProvDiscPbcRequest(ProvDiscEvent),
    P2pProvDiscPbcResponse(ProvDiscEvent),
    P2pProvDiscEnterPin(ProvDiscEvent),
    P2pProvDiscShowPin(ProvDiscEvent),
    P2pProvDiscFailure,
    P2pServiceDiscoveryResponse(Vec<ServiceResponse>),
}

impl WpaEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            WpaEvent::SupplicantConnection => EventType::SupplicantConnection,
            WpaEvent::SupplicantDisconnection => EventType::SupplicantDisconnection,
            WpaEvent::NetworkConnection { .. } => EventType::NetworkConnection,
            WpaEvent::NetworkDisconnection { .. } => EventType::NetworkDisconnection,
            WpaEvent::ScanResults => EventType::ScanResults,
            WpaEvent::ScanFailed => EventType::ScanFailed,
            WpaEvent::SupplicantStateChange(_) => EventType::SupplicantStateChange,
            WpaEvent::AuthenticationFailure { .. } => EventType::AuthenticationFailure,
            WpaEvent::WpsSuccess => EventType::WpsSuccess,
            WpaEvent::WpsFail(_) => EventType::WpsFail,
            WpaEvent::WpsOverlap => EventType::WpsOverlap,
            WpaEvent::WpsTimeout => EventType::WpsTimeout,
            WpaEvent::DriverHung => EventType::DriverHung,
            WpaEvent::SsidTempDisabled { .. } => EventType::SsidTempDisabled,
            WpaEvent::SsidReenabled { .. } => EventType::SsidReenabled,
            WpaEvent::RequestIdentity { .. } => EventType::RequestIdentity,
            WpaEvent::RequestSimAuth(_) => EventType::RequestSimAuth,
            WpaEvent::TargetBssid { .. } => EventType::TargetBssid,
            WpaEvent::AssociatedBssid { .. } => EventType::AssociatedBssid,
            WpaEvent::AssociationRejection { .. } => EventType::AssociationRejection,
            WpaEvent::ApStaConnected(_) => EventType::ApStaConnected,
            WpaEvent::ApStaDisconnected(_) => EventType::ApStaDisconnected,
            WpaEvent::AnqpDone(_) => EventType::AnqpDone,
            WpaEvent::IconDone(_) => EventType::Hs20IconDone,
            WpaEvent::Wnm(_) => EventType::Hs20Wnm,
            WpaEvent::P2pDeviceFound(_) => EventType::P2pDeviceFound,
            WpaEvent::P2pDeviceLost(_) => EventType::P2pDeviceLost,
            WpaEvent::P2pFindStopped => EventType::P2pFindStopped,
            WpaEvent::P2pGoNegotiationRequest(_) => EventType::P2pGoNegotiationRequest,
            WpaEvent::P2pGoNegotiationSuccess => EventType::P2pGoNegotiationSuccess,
            WpaEvent::P2pGoNegotiationFailure(_) => EventType::P2pGoNegotiationFailure,
            WpaEvent::P2pGroupFormationSuccess => EventType::P2pGroupFormationSuccess,
            WpaEvent::P2pGroupFormationFailure(_) => EventType::P2pGroupFormationFailure,
            WpaEvent::P2pGroupStarted(_) => EventType::P2pGroupStarted,
            WpaEvent::P2pGroupRemoved(_) => EventType::P2pGroupRemoved,
            WpaEvent::P2pInvitationReceived(_) => EventType::P2pInvitationReceived,
            WpaEvent::P2pInvitationResult(_) => EventType::P2pInvitationResult,
            WpaEvent::P2pProvDiscPbcRequest(_) => EventType::P2pProvDiscPbcRequest,
            WpaEvent::P2pProvDiscPbcResponse(_) => EventType::P2pProvDiscPbcResponse,
            WpaEvent::P2pProvDiscEnterPin(_) => EventType::P2pProvDiscEnterPin,
            WpaEvent::P2pProvDiscShowPin(_) => EventType::P2pProvDiscShowPin,
            WpaEvent::P2pProvDiscFailure => EventType::P2pProvDiscFailure,
            WpaEvent::P2pServiceDiscoveryResponse(_) => EventType::P2pServiceDiscoveryResponse,
        }
    }
}

impl fmt::Display for WpaEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WpaEvent::NetworkConnection { network_id, bssid } => write!(
                f,
                "{} id={} bssid={}",
                self.event_type(),
                network_id,
                bssid.as_deref().unwrap_or("unknown")
            ),
            WpaEvent::NetworkDisconnection { bssid, reason, locally_generated } => write!(
                f,
                "{} bssid={} reason={} local={}",
                self.event_type(),
                bssid,
                reason,
                locally_generated
            ),
            WpaEvent::SupplicantStateChange(result) => write!(
                f,
                "{} id={} state={}",
                self.event_type(),
                result.network_id,
                result.state
            ),
            WpaEvent::AuthenticationFailure { reason } => {
                write!(f, "{} reason={}", self.event_type(), reason)
            }
            _ => write!(f, "{}", self.event_type()),
        }
    }
}
