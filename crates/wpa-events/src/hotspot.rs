use std::collections::BTreeMap;

use tracing::{error, warn};

use crate::error::ParseError;
use crate::event::{AnqpEvent, IconEvent, WnmData, WpaEvent};
use crate::icon::IconFetcher;
use crate::mac::MacAddress;
use crate::transport::InterfaceCommands;

const ADDR: &str = "addr=";
const RESULT: &str = "result=";

/// `ANQP-QUERY-DONE addr=18:cf:5e:26:a4:88 result=SUCCESS`
///
/// On success the elements are pulled with `BSS <addr>`; every other outcome,
/// including an unanswered `BSS`, still yields an event so subscribers learn
/// the query finished.
pub fn parse_anqp_done(
    line: &str,
    commands: InterfaceCommands<'_>,
) -> Result<WpaEvent, ParseError> {
    let addr = field_value(line, ADDR);
    let result = field_value(line, RESULT);
    let (Some(addr), Some(result)) = (addr, result) else {
        return Err(ParseError::AnqpNotification(line.to_string()));
    };

    let bssid = match MacAddress::parse(addr) {
        Ok(bssid) => bssid,
        Err(e) => {
            error!("Bad MAC address in ANQP response: {}", e);
            return Ok(WpaEvent::AnqpDone(AnqpEvent {
                bssid: MacAddress::ZERO,
                elements: None,
            }));
        }
    };

    let elements = if !bssid.is_zero() && result.eq_ignore_ascii_case("success") {
        commands
            .query(&format!("BSS {bssid}"))
            .map(|bss| anqp_elements(&bss))
    } else {
        None
    };
    Ok(WpaEvent::AnqpDone(AnqpEvent { bssid, elements }))
}

fn field_value<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let start = line.find(marker)? + marker.len();
    let rest = &line[start..];
    Some(rest.split(' ').next().unwrap_or(rest))
}

/// Pull the ANQP and Hotspot 2.0 fields out of a `BSS` reply.
fn anqp_elements(bss: &str) -> BTreeMap<String, String> {
    bss.lines()
        .filter_map(|line| line.split_once('='))
        .filter(|(key, _)| key.starts_with("anqp_") || key.starts_with("hs20_"))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// `RX-HS20-ICON c0:c5:20:27:d1:e8 <file> <size>`
pub fn parse_icon_done(
    line: &str,
    commands: InterfaceCommands<'_>,
    chunk_size: usize,
) -> Result<WpaEvent, ParseError> {
    let segments: Vec<&str> = line.split(' ').collect();
    if segments.len() != 4 {
        return Err(ParseError::IconSegments(segments.len()));
    }
    let (bssid, file_name) = (segments[1], segments[2]);
    let size: u32 = segments[3].parse().map_err(|_| ParseError::InvalidNumber {
        field: "icon size",
        value: segments[3].to_string(),
    })?;
    let bssid = MacAddress::parse(bssid)?;

    let mut data = None;
    if !file_name.is_empty() && size > 0 {
        match IconFetcher::new(commands)
            .with_chunk_size(chunk_size)
            .fetch(bssid, file_name, size as usize)
        {
            Ok(bytes) => data = Some(bytes),
            Err(e) => error!("Failed to retrieve icon: {}: {}", e, file_name),
        }
    }

    Ok(WpaEvent::IconDone(IconEvent {
        bssid,
        file_name: file_name.to_string(),
        size,
        data,
    }))
}

/// `HS20-SUBSCRIPTION-REMEDIATION <method> <url>`, tagged with the BSSID the
/// interface last connected to since the frame does not name one.
pub fn parse_subscription_remediation(
    line: &str,
    bssid: MacAddress,
) -> Result<WpaEvent, ParseError> {
    let segments: Vec<&str> = line.split(' ').collect();
    if segments.len() != 3 {
        return Err(ParseError::Wnm(line.to_string()));
    }
    let method = wnm_number(segments[1], line)?;
    Ok(WpaEvent::Wnm(WnmData::SubscriptionRemediation {
        bssid,
        url: segments[2].to_string(),
        method,
    }))
}

/// `HS20-DEAUTH-IMMINENT-NOTICE <code> <delay> <url>`
pub fn parse_deauth_imminent(line: &str, bssid: MacAddress) -> Result<WpaEvent, ParseError> {
    let segments: Vec<&str> = line.split(' ').collect();
    if segments.len() != 4 {
        return Err(ParseError::Wnm(line.to_string()));
    }
    let code = wnm_number(segments[1], line)?;
    let delay_secs = wnm_number(segments[2], line)?;
    Ok(WpaEvent::Wnm(WnmData::DeauthImminent {
        bssid,
        url: segments[3].to_string(),
        ess: code == 1,
        delay_secs,
    }))
}

fn wnm_number(value: &str, line: &str) -> Result<i32, ParseError> {
    value.parse().map_err(|_| {
        warn!("Bad WNM event: '{}'", line);
        ParseError::Wnm(line.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SupplicantTransport;
    use std::io;
    use std::sync::Mutex;

    struct BssOnly {
        reply: Option<String>,
        commands: Mutex<Vec<String>>,
    }

    impl BssOnly {
        fn new(reply: Option<&str>) -> Self {
            Self {
                reply: reply.map(str::to_string),
                commands: Mutex::default(),
            }
        }

        fn scoped(&self) -> InterfaceCommands<'_> {
            InterfaceCommands::new(self, "wlan0")
        }

        fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    impl SupplicantTransport for BssOnly {
        fn connect(&self) -> io::Result<()> {
            Ok(())
        }

        fn wait_for_event(&self) -> String {
            String::new()
        }

        fn query(&self, command: &str) -> Option<String> {
            self.commands.lock().unwrap().push(command.to_string());
            self.reply.clone()
        }

        fn disconnect(&self) {}
    }

    const BSS_REPLY: &str = "id=1\nbssid=18:cf:5e:26:a4:88\nfreq=2412\nssid=hotspot\n\
                             anqp_venue_name=0200656e\nhs20_operator_friendly_name=11656e\n";

    const SUCCESS_LINE: &str = "ANQP-QUERY-DONE addr=18:cf:5e:26:a4:88 result=SUCCESS";

    #[test]
    fn anqp_success_queries_bss() {
        let transport = BssOnly::new(Some(BSS_REPLY));
        let event = parse_anqp_done(SUCCESS_LINE, transport.scoped()).unwrap();

        let WpaEvent::AnqpDone(anqp) = event else {
            panic!("expected ANQP event");
        };
        assert_eq!(anqp.bssid.to_string(), "18:cf:5e:26:a4:88");
        let elements = anqp.elements.unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements["anqp_venue_name"], "0200656e");
        assert_eq!(transport.commands(), vec!["IFNAME=wlan0 BSS 18:cf:5e:26:a4:88"]);
    }

    #[test]
    fn anqp_unanswered_bss_still_emits() {
        let transport = BssOnly::new(None);
        let event = parse_anqp_done(SUCCESS_LINE, transport.scoped()).unwrap();

        assert_eq!(
            event,
            WpaEvent::AnqpDone(AnqpEvent {
                bssid: MacAddress::parse("18:cf:5e:26:a4:88").unwrap(),
                elements: None,
            })
        );
        assert_eq!(transport.commands(), vec!["IFNAME=wlan0 BSS 18:cf:5e:26:a4:88"]);
    }

    #[test]
    fn anqp_failure_skips_query() {
        let transport = BssOnly::new(Some(BSS_REPLY));
        let line = "ANQP-QUERY-DONE addr=18:cf:5e:26:a4:88 result=FAILURE";
        let event = parse_anqp_done(line, transport.scoped()).unwrap();
        assert!(matches!(event, WpaEvent::AnqpDone(AnqpEvent { elements: None, .. })));
        assert!(transport.commands().is_empty());
    }

    #[test]
    fn anqp_bad_mac_yields_zero_sentinel() {
        let transport = BssOnly::new(None);
        let event =
            parse_anqp_done("ANQP-QUERY-DONE addr=zz result=SUCCESS", transport.scoped()).unwrap();
        assert_eq!(
            event,
            WpaEvent::AnqpDone(AnqpEvent {
                bssid: MacAddress::ZERO,
                elements: None
            })
        );
    }

    #[test]
    fn anqp_missing_markers_is_an_error() {
        let transport = BssOnly::new(None);
        assert!(matches!(
            parse_anqp_done("ANQP-QUERY-DONE addr=18:cf:5e:26:a4:88", transport.scoped()),
            Err(ParseError::AnqpNotification(_))
        ));
    }

    #[test]
    fn icon_event_shape_errors() {
        let transport = BssOnly::new(None);
        assert_eq!(
            parse_icon_done("RX-HS20-ICON c0:c5:20:27:d1:e8 icon.png", transport.scoped(), 1400),
            Err(ParseError::IconSegments(3))
        );
        assert!(matches!(
            parse_icon_done(
                "RX-HS20-ICON c0:c5:20:27:d1:e8 icon.png big",
                transport.scoped(),
                1400
            ),
            Err(ParseError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn icon_fetch_failure_still_emits() {
        let transport = BssOnly::new(None);
        let line = "RX-HS20-ICON c0:c5:20:27:d1:e8 icon.png 10";
        let event = parse_icon_done(line, transport.scoped(), 1400).unwrap();
        let WpaEvent::IconDone(icon) = event else {
            panic!("expected icon event");
        };
        assert_eq!(icon.size, 10);
        assert_eq!(icon.data, None);
        assert_eq!(
            transport.commands().last().map(String::as_str),
            Some("IFNAME=wlan0 DEL_HS20_ICON c0:c5:20:27:d1:e8 icon.png")
        );
    }

    #[test]
    fn zero_size_icon_is_not_fetched() {
        let transport = BssOnly::new(None);
        parse_icon_done("RX-HS20-ICON c0:c5:20:27:d1:e8 icon.png 0", transport.scoped(), 1400)
            .unwrap();
        assert!(transport.commands().is_empty());
    }

    #[test]
    fn wnm_frames() {
        let bssid = MacAddress::parse("00:11:22:33:44:55").unwrap();
        assert_eq!(
            parse_subscription_remediation(
                "HS20-SUBSCRIPTION-REMEDIATION 1 https://r.example",
                bssid
            ),
            Ok(WpaEvent::Wnm(WnmData::SubscriptionRemediation {
                bssid,
                url: "https://r.example".to_string(),
                method: 1
            }))
        );
        assert_eq!(
            parse_deauth_imminent("HS20-DEAUTH-IMMINENT-NOTICE 1 60 https://d.example", bssid),
            Ok(WpaEvent::Wnm(WnmData::DeauthImminent {
                bssid,
                url: "https://d.example".to_string(),
                ess: true,
                delay_secs: 60
            }))
        );
        assert!(parse_deauth_imminent("HS20-DEAUTH-IMMINENT-NOTICE x 60 u", bssid).is_err());
        assert!(parse_subscription_remediation("HS20-SUBSCRIPTION-REMEDIATION 1", bssid).is_err());
    }
}
