//! Network value types used when writing P4Runtime policy.
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`IpPrefix`]: IPv4/IPv6 destination prefixes (CIDR notation)
//!
//! Both parse from and render to their conventional text forms, and both
//! expose the big-endian byte layout that match keys and action parameters
//! are encoded with.

mod mac;
mod prefix;

pub use mac::MacAddress;
pub use prefix::IpPrefix;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),
}
