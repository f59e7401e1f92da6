//! Typed inputs for match fields and action parameters.
//!
//! Values are address-family agnostic: whatever the input type, it is
//! encoded as a big-endian byte string left-padded to the declared width of
//! the field or parameter it is bound to.

use p4ctl_types::{IpPrefix, MacAddress};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use thiserror::Error;

/// A scalar bound to a match field or action parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Int(u128),
    Mac(MacAddress),
    Ip(IpAddr),
    /// Raw big-endian bytes.
    Bytes(Vec<u8>),
}

impl Value {
    /// Big-endian bytes of the value, before width adjustment.
    pub fn to_be_bytes(&self) -> Vec<u8> {
        match self {
            Value::Int(n) => n.to_be_bytes().to_vec(),
            Value::Mac(mac) => mac.octets().to_vec(),
            Value::Ip(IpAddr::V4(v4)) => v4.octets().to_vec(),
            Value::Ip(IpAddr::V6(v6)) => v6.octets().to_vec(),
            Value::Bytes(bytes) => bytes.clone(),
        }
    }

    /// Number of significant bits (0 for a zero value).
    pub fn significant_bits(&self) -> u32 {
        significant_bits(&self.to_be_bytes())
    }

    /// Encodes the value for a field of `bitwidth` bits.
    ///
    /// Returns the number of significant bits as the error when the value
    /// does not fit.
    pub fn encode(&self, bitwidth: u32) -> Result<Vec<u8>, u32> {
        let bytes = self.to_be_bytes();
        let bits = significant_bits(&bytes);
        if bits > bitwidth {
            return Err(bits);
        }
        Ok(fit_to_width(&bytes, bitwidth))
    }
}

/// Counts significant bits of a big-endian byte string.
pub(crate) fn significant_bits(bytes: &[u8]) -> u32 {
    match bytes.iter().position(|&b| b != 0) {
        Some(first) => {
            let remaining = (bytes.len() - first - 1) as u32;
            remaining * 8 + (8 - bytes[first].leading_zeros())
        }
        None => 0,
    }
}

/// Left-pads or strips leading zero bytes so the result is exactly
/// `ceil(bitwidth / 8)` bytes long. The caller has checked the fit.
fn fit_to_width(bytes: &[u8], bitwidth: u32) -> Vec<u8> {
    let len = bitwidth.div_ceil(8) as usize;
    if bytes.len() >= len {
        bytes[bytes.len() - len..].to_vec()
    } else {
        let mut out = vec![0u8; len - bytes.len()];
        out.extend_from_slice(bytes);
        out
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Mac(mac) => write!(f, "{mac}"),
            Value::Ip(ip) => write!(f, "{ip}"),
            Value::Bytes(bytes) => {
                write!(f, "0x")?;
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse '{0}' as a MAC, IP address or integer")]
pub struct ParseValueError(pub String);

impl FromStr for Value {
    type Err = ParseValueError;

    /// Accepts MAC addresses, IPv4/IPv6 addresses, decimal integers and
    /// `0x`-prefixed hex strings of any length.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(mac) = s.parse::<MacAddress>() {
            return Ok(Value::Mac(mac));
        }
        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Value::Ip(ip));
        }
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return parse_hex(hex).map(Value::Bytes).ok_or_else(|| ParseValueError(s.to_string()));
        }
        s.parse::<u128>()
            .map(Value::Int)
            .map_err(|_| ParseValueError(s.to_string()))
    }
}

fn parse_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let padded = if hex.len() % 2 == 1 {
        format!("0{hex}")
    } else {
        hex.to_string()
    };
    (0..padded.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&padded[i..i + 2], 16).ok())
        .collect()
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Int(u128::from(n))
            }
        })*
    };
}

value_from_int!(u8, u16, u32, u64, u128);

impl From<MacAddress> for Value {
    fn from(mac: MacAddress) -> Self {
        Value::Mac(mac)
    }
}

impl From<IpAddr> for Value {
    fn from(ip: IpAddr) -> Self {
        Value::Ip(ip)
    }
}

impl From<Ipv4Addr> for Value {
    fn from(ip: Ipv4Addr) -> Self {
        Value::Ip(IpAddr::V4(ip))
    }
}

impl From<Ipv6Addr> for Value {
    fn from(ip: Ipv6Addr) -> Self {
        Value::Ip(IpAddr::V6(ip))
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

/// Input for one match field: a scalar for exact fields or a
/// (value, prefix length) pair for longest-prefix fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchInput {
    Exact(Value),
    Lpm(Value, u32),
}

impl MatchInput {
    pub fn exact(value: impl Into<Value>) -> Self {
        MatchInput::Exact(value.into())
    }

    pub fn lpm(value: impl Into<Value>, prefix_len: u32) -> Self {
        MatchInput::Lpm(value.into(), prefix_len)
    }

    pub fn value(&self) -> &Value {
        match self {
            MatchInput::Exact(value) | MatchInput::Lpm(value, _) => value,
        }
    }
}

impl From<Value> for MatchInput {
    fn from(value: Value) -> Self {
        MatchInput::Exact(value)
    }
}

impl From<IpPrefix> for MatchInput {
    fn from(prefix: IpPrefix) -> Self {
        MatchInput::Lpm(Value::Ip(prefix.address()), u32::from(prefix.prefix_len()))
    }
}

impl From<(Ipv4Addr, u32)> for MatchInput {
    fn from((ip, prefix_len): (Ipv4Addr, u32)) -> Self {
        MatchInput::lpm(ip, prefix_len)
    }
}

impl From<(Value, u32)> for MatchInput {
    fn from((value, prefix_len): (Value, u32)) -> Self {
        MatchInput::Lpm(value, prefix_len)
    }
}

impl FromStr for MatchInput {
    type Err = ParseValueError;

    /// `value/len` parses as a prefix, anything else as a scalar.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().rsplit_once('/') {
            Some((value, len)) => {
                let prefix_len = len
                    .parse::<u32>()
                    .map_err(|_| ParseValueError(s.to_string()))?;
                Ok(MatchInput::Lpm(value.parse()?, prefix_len))
            }
            None => Ok(MatchInput::Exact(s.parse()?)),
        }
    }
}

impl fmt::Display for MatchInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchInput::Exact(value) => write!(f, "{value}"),
            MatchInput::Lpm(value, len) => write!(f, "{value}/{len}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_pads_to_width() {
        assert_eq!(Value::from(2u32).encode(9), Ok(vec![0, 2]));
        assert_eq!(Value::from(100u32).encode(32), Ok(vec![0, 0, 0, 100]));
        assert_eq!(
            Value::from(Ipv4Addr::new(10, 0, 1, 1)).encode(32),
            Ok(vec![10, 0, 1, 1])
        );
        assert_eq!(Value::from(0u8).encode(16), Ok(vec![0, 0]));
    }

    #[test]
    fn test_encode_rejects_wide_values() {
        // 9-bit port field
        assert_eq!(Value::from(511u32).encode(9), Ok(vec![1, 0xff]));
        assert_eq!(Value::from(512u32).encode(9), Err(10));
        let mac: MacAddress = "08:00:00:00:01:01".parse().unwrap();
        assert_eq!(Value::from(mac).encode(32), Err(44));
    }

    #[test]
    fn test_significant_bits() {
        assert_eq!(significant_bits(&[]), 0);
        assert_eq!(significant_bits(&[0, 0]), 0);
        assert_eq!(significant_bits(&[0, 1]), 1);
        assert_eq!(significant_bits(&[0x80, 0]), 16);
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(
            "08:00:00:00:02:22".parse::<Value>().unwrap(),
            Value::Mac("08:00:00:00:02:22".parse().unwrap())
        );
        assert_eq!(
            "10.0.2.2".parse::<Value>().unwrap(),
            Value::Ip("10.0.2.2".parse().unwrap())
        );
        assert_eq!(
            "2001:db8::1".parse::<Value>().unwrap(),
            Value::Ip("2001:db8::1".parse().unwrap())
        );
        assert_eq!("42".parse::<Value>().unwrap(), Value::Int(42));
        assert_eq!("0xabc".parse::<Value>().unwrap(), Value::Bytes(vec![0x0a, 0xbc]));
        assert!("0x".parse::<Value>().is_err());
        assert!("ten".parse::<Value>().is_err());
    }

    #[test]
    fn test_parse_match_input() {
        assert_eq!(
            "10.0.1.1/32".parse::<MatchInput>().unwrap(),
            MatchInput::lpm(Ipv4Addr::new(10, 0, 1, 1), 32)
        );
        assert_eq!("7".parse::<MatchInput>().unwrap(), MatchInput::exact(7u32));
        assert!("10.0.1.1/x".parse::<MatchInput>().is_err());
    }

    #[test]
    fn test_prefix_conversion() {
        let prefix: IpPrefix = "10.0.2.0/24".parse().unwrap();
        let input = MatchInput::from(prefix);
        assert_eq!(input.to_string(), "10.0.2.0/24");
    }
}
