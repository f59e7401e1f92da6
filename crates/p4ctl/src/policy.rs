//! Policy definitions.
//!
//! Policies name switches, not sessions; the controller resolves the names
//! against the connected switches before handing them to the engine. A
//! [`PolicySet`] is installed strictly in the order it was written.

use p4ctl_types::{IpPrefix, MacAddress};
use serde::Deserialize;
use std::fmt;
use std::net::Ipv4Addr;

/// Unidirectional tunnel from the host behind `egress`'s peer to `dst_ip`.
///
/// Tunnel ids are not checked for uniqueness; installing two tunnels with
/// the same id leaves the last one in place.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tunnel {
    /// Switch that encapsulates.
    pub ingress: String,
    /// Switch that decapsulates and delivers to the host.
    pub egress: String,
    pub tunnel_id: u32,
    pub dst_eth: MacAddress,
    pub dst_ip: Ipv4Addr,
    /// Port on `ingress` towards `egress`.
    pub egress_port: u32,
}

impl Tunnel {
    /// Counter index the tunnel's traffic is accounted under.
    pub fn counter_index(&self) -> i64 {
        i64::from(self.tunnel_id)
    }
}

impl fmt::Display for Tunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tunnel {} ({} -> {})", self.tunnel_id, self.ingress, self.egress)
    }
}

/// One ECMP member, selected when the flow hash equals `select`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NextHop {
    pub select: u32,
    pub dmac: MacAddress,
    pub ipv4: Ipv4Addr,
    pub port: u32,
}

/// Traffic to `dst` is hashed over `count` next hops starting at `base`.
///
/// The next hops must cover `[base, base + count)`; nothing checks it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EcmpGroup {
    pub switch: String,
    pub dst: IpPrefix,
    pub base: u32,
    pub count: u32,
    #[serde(default)]
    pub next_hops: Vec<NextHop>,
}

impl fmt::Display for EcmpGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ECMP group {} on {}", self.dst, self.switch)
    }
}

/// Source MAC rewrite for frames leaving through `port`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EgressRewrite {
    pub switch: String,
    pub port: u32,
    pub smac: MacAddress,
}

impl fmt::Display for EgressRewrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "egress rewrite for port {} on {}", self.port, self.switch)
    }
}

/// Plain IPv4 forwarding rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ForwardRule {
    pub switch: String,
    pub dst_eth: MacAddress,
    pub dst: IpPrefix,
    pub port: u32,
}

impl fmt::Display for ForwardRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "forward rule {} on {}", self.dst, self.switch)
    }
}

/// One configured policy, tagged by `kind` in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Policy {
    Tunnel(Tunnel),
    EcmpGroup(EcmpGroup),
    EgressRewrite(EgressRewrite),
    ForwardRule(ForwardRule),
}

impl Policy {
    /// Switches the policy writes to, ingress first for tunnels.
    pub fn switches(&self) -> Vec<&str> {
        match self {
            Policy::Tunnel(t) => vec![t.ingress.as_str(), t.egress.as_str()],
            Policy::EcmpGroup(g) => vec![g.switch.as_str()],
            Policy::EgressRewrite(r) => vec![r.switch.as_str()],
            Policy::ForwardRule(r) => vec![r.switch.as_str()],
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Tunnel(t) => t.fmt(f),
            Policy::EcmpGroup(g) => g.fmt(f),
            Policy::EgressRewrite(r) => r.fmt(f),
            Policy::ForwardRule(r) => r.fmt(f),
        }
    }
}

/// Every policy of a run, installed in list order whatever its kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PolicySet {
    policies: Vec<Policy>,
}

impl PolicySet {
    pub fn new(policies: Vec<Policy>) -> Self {
        Self { policies }
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Policy> {
        self.policies.iter()
    }

    /// Tunnels in list order.
    pub fn tunnels(&self) -> impl Iterator<Item = &Tunnel> {
        self.policies.iter().filter_map(|p| match p {
            Policy::Tunnel(t) => Some(t),
            _ => None,
        })
    }

    /// Every switch name a policy refers to, with the policy referring to it.
    pub fn switch_references(&self) -> Vec<(&str, String)> {
        self.policies
            .iter()
            .flat_map(|p| p.switches().into_iter().map(move |s| (s, p.to_string())))
            .collect()
    }
}

impl FromIterator<Policy> for PolicySet {
    fn from_iter<I: IntoIterator<Item = Policy>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a PolicySet {
    type Item = &'a Policy;
    type IntoIter = std::slice::Iter<'a, Policy>;

    fn into_iter(self) -> Self::IntoIter {
        self.policies.iter()
    }
}
