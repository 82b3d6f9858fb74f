use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::ParseError;

/// A 6-octet IEEE 802 MAC address.
///
/// Parsed from colon-separated hex in either case and always rendered in the
/// supplicant's lower-case form, e.g. `aa:bb:cc:dd:ee:ff`.
#[derive(Clone, Copy, Default, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// All-zero address, used where the supplicant gave us no usable BSSID.
    pub const ZERO: MacAddress = MacAddress([0; 6]);

    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for byte in bytes.iter_mut() {
            let part = parts
                .next()
                .filter(|p| p.len() == 2)
                .ok_or_else(|| ParseError::InvalidMac(s.to_string()))?;
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| ParseError::InvalidMac(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(ParseError::InvalidMac(s.to_string()));
        }
        Ok(Self(bytes))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({self})")
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
