//! MAC address type with parsing and formatting.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 48-bit Ethernet MAC address.
///
/// # Examples
///
/// ```
/// use p4ctl_types::MacAddress;
///
/// let mac: MacAddress = "08:00:00:00:02:22".parse().unwrap();
/// assert_eq!(mac.to_string(), "08:00:00:00:02:22");
/// assert_eq!(mac.octets()[5], 0x22);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// The zero address (00:00:00:00:00:00).
    pub const ZERO: MacAddress = MacAddress([0; 6]);

    /// Width of a MAC address in bits.
    pub const BITS: u32 = 48;

    pub const fn new(octets: [u8; 6]) -> Self {
        MacAddress(octets)
    }

    /// Returns the address in network byte order.
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Builds an address from a byte slice of exactly six bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 6]>::try_from(bytes).ok().map(MacAddress)
    }

    /// Returns true if the group bit (LSB of the first octet) is set.
    pub const fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let separator = if s.contains(':') { ':' } else { '-' };

        let mut octets = [0u8; 6];
        let mut count = 0;
        for part in s.split(separator) {
            if count == 6 || part.is_empty() || part.len() > 2 {
                return Err(ParseError::InvalidMacAddress(s.to_string()));
            }
            octets[count] = u8::from_str_radix(part, 16)
                .map_err(|_| ParseError::InvalidMacAddress(s.to_string()))?;
            count += 1;
        }

        if count != 6 {
            return Err(ParseError::InvalidMacAddress(s.to_string()));
        }
        Ok(MacAddress(octets))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> String {
        mac.to_string()
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(octets: [u8; 6]) -> Self {
        MacAddress(octets)
    }
}
