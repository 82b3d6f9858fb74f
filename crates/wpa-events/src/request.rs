use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{error, warn};

use crate::event::{SimAuthMethod, SimAuthRequest, WpaEvent};

const REQUEST_PREFIX: &str = "CTRL-REQ-";

static IDENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"IDENTITY-([0-9]+):Identity needed for SSID (.+)").expect("valid identity regex")
});

static GSM_AUTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"SIM-([0-9]*):GSM-AUTH((?::[0-9a-f]+)+) needed for SSID (.+)")
        .expect("valid GSM auth regex")
});

static UMTS_AUTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"SIM-([0-9]*):UMTS-AUTH:([0-9a-f]+):([0-9a-f]+) needed for SSID (.+)")
        .expect("valid UMTS auth regex")
});

/// Credential requests, e.g.
/// `CTRL-REQ-SIM-0:GSM-AUTH:<rand1>:<rand2> needed for SSID eduroam`.
pub fn parse_request(line: &str) -> Option<WpaEvent> {
    let request = line.strip_prefix(REQUEST_PREFIX)?;
    if request.is_empty() {
        return None;
    }

    if request.starts_with("IDENTITY") {
        let (network_id, ssid) = match IDENTITY_RE.captures(request) {
            Some(caps) => (network_id(&caps[1]), Some(caps[2].to_string())),
            None => {
                error!("No SSID in identity request: {}", request);
                (-2, None)
            }
        };
        return Some(WpaEvent::RequestIdentity { network_id, ssid });
    }

    if request.starts_with("SIM") {
        if let Some(caps) = GSM_AUTH_RE.captures(request) {
            let data = caps[2]
                .split(':')
                .filter(|rand| !rand.is_empty())
                .map(str::to_string)
                .collect();
            return Some(sim_auth(&caps[1], SimAuthMethod::Sim, &caps[3], data));
        }
        if let Some(caps) = UMTS_AUTH_RE.captures(request) {
            let data = vec![caps[2].to_string(), caps[3].to_string()];
            return Some(sim_auth(&caps[1], SimAuthMethod::Aka, &caps[4], data));
        }
        error!("Unparsable SIM auth request: {}", request);
        return None;
    }

    warn!("Unknown request type: {}", line);
    None
}

fn sim_auth(id: &str, method: SimAuthMethod, ssid: &str, data: Vec<String>) -> WpaEvent {
    WpaEvent::RequestSimAuth(SimAuthRequest {
        network_id: network_id(id),
        method,
        ssid: ssid.to_string(),
        data,
    })
}

fn network_id(digits: &str) -> i32 {
    digits.parse().unwrap_or(-1)
}
