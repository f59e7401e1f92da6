//! `p4.config.v1.P4Info`: the pipeline descriptor.
//!
//! Only the parts of the descriptor the controller reads or must hand back to
//! the device on pipeline installation are modelled: package info, tables,
//! actions, counters, direct counters, meters and direct meters.
//!
//! Fields the model does not carry (type info, registers, digests, ...) are
//! dropped on decode. Text and JSON descriptors are read against the full
//! schema in [`crate::format`] and then transcoded into these types.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct P4Info {
    #[prost(message, optional, tag = "1")]
    pub pkg_info: Option<PkgInfo>,
    #[prost(message, repeated, tag = "2")]
    pub tables: Vec<Table>,
    #[prost(message, repeated, tag = "3")]
    pub actions: Vec<Action>,
    #[prost(message, repeated, tag = "5")]
    pub counters: Vec<Counter>,
    #[prost(message, repeated, tag = "6")]
    pub direct_counters: Vec<DirectCounter>,
    #[prost(message, repeated, tag = "7")]
    pub meters: Vec<Meter>,
    #[prost(message, repeated, tag = "8")]
    pub direct_meters: Vec<DirectMeter>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PkgInfo {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub version: String,
    #[prost(string, tag = "5")]
    pub arch: String,
}

/// Common header of every named P4 entity.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Preamble {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    /// Fully qualified name, e.g. `MyIngress.ipv4_lpm`.
    #[prost(string, tag = "2")]
    pub name: String,
    /// Shortest unambiguous suffix, e.g. `ipv4_lpm`.
    #[prost(string, tag = "3")]
    pub alias: String,
    #[prost(string, repeated, tag = "4")]
    pub annotations: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Table {
    #[prost(message, optional, tag = "1")]
    pub preamble: Option<Preamble>,
    #[prost(message, repeated, tag = "2")]
    pub match_fields: Vec<MatchField>,
    #[prost(message, repeated, tag = "3")]
    pub action_refs: Vec<ActionRef>,
    #[prost(uint32, tag = "4")]
    pub const_default_action_id: u32,
    #[prost(uint32, tag = "6")]
    pub implementation_id: u32,
    #[prost(uint32, repeated, tag = "7")]
    pub direct_resource_ids: Vec<u32>,
    #[prost(int64, tag = "8")]
    pub size: i64,
    #[prost(enumeration = "IdleTimeoutBehavior", tag = "9")]
    pub idle_timeout_behavior: i32,
    #[prost(bool, tag = "10")]
    pub is_const_table: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MatchField {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, repeated, tag = "3")]
    pub annotations: Vec<String>,
    #[prost(int32, tag = "4")]
    pub bitwidth: i32,
    #[prost(enumeration = "MatchType", tag = "5")]
    pub match_type: i32,
    #[prost(message, optional, tag = "8")]
    pub type_name: Option<P4NamedType>,
}

/// Reference to a named P4 type, e.g. a `type bit<48> macAddr_t` declaration.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct P4NamedType {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum MatchType {
    Unspecified = 0,
    Exact = 2,
    Lpm = 3,
    Ternary = 4,
    Range = 5,
    Optional = 6,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum IdleTimeoutBehavior {
    NoTimeout = 0,
    NotifyControl = 1,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ActionRef {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(string, repeated, tag = "2")]
    pub annotations: Vec<String>,
    #[prost(enumeration = "ActionRefScope", tag = "3")]
    pub scope: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ActionRefScope {
    TableAndDefault = 0,
    TableOnly = 1,
    DefaultOnly = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Action {
    #[prost(message, optional, tag = "1")]
    pub preamble: Option<Preamble>,
    #[prost(message, repeated, tag = "2")]
    pub params: Vec<action::Param>,
}

pub mod action {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Param {
        #[prost(uint32, tag = "1")]
        pub id: u32,
        #[prost(string, tag = "2")]
        pub name: String,
        #[prost(string, repeated, tag = "3")]
        pub annotations: Vec<String>,
        #[prost(int32, tag = "4")]
        pub bitwidth: i32,
        #[prost(message, optional, tag = "6")]
        pub type_name: Option<super::P4NamedType>,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CounterSpec {
    #[prost(enumeration = "CounterUnit", tag = "1")]
    pub unit: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum CounterUnit {
    Unspecified = 0,
    Bytes = 1,
    Packets = 2,
    Both = 3,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Counter {
    #[prost(message, optional, tag = "1")]
    pub preamble: Option<Preamble>,
    #[prost(message, optional, tag = "2")]
    pub spec: Option<CounterSpec>,
    #[prost(int64, tag = "3")]
    pub size: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DirectCounter {
    #[prost(message, optional, tag = "1")]
    pub preamble: Option<Preamble>,
    #[prost(message, optional, tag = "2")]
    pub spec: Option<CounterSpec>,
    #[prost(uint32, tag = "3")]
    pub direct_table_id: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MeterSpec {
    #[prost(enumeration = "MeterUnit", tag = "1")]
    pub unit: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum MeterUnit {
    Unspecified = 0,
    Bytes = 1,
    Packets = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Meter {
    #[prost(message, optional, tag = "1")]
    pub preamble: Option<Preamble>,
    #[prost(message, optional, tag = "2")]
    pub spec: Option<MeterSpec>,
    #[prost(int64, tag = "3")]
    pub size: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DirectMeter {
    #[prost(message, optional, tag = "1")]
    pub preamble: Option<Preamble>,
    #[prost(message, optional, tag = "2")]
    pub spec: Option<MeterSpec>,
    #[prost(uint32, tag = "3")]
    pub direct_table_id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use prost::Message;

    #[test]
    fn test_binary_encoding_keeps_descriptor() {
        let p4info = P4Info {
            pkg_info: Some(PkgInfo {
                arch: "v1model".to_string(),
                ..Default::default()
            }),
            tables: vec![Table {
                preamble: Some(Preamble {
                    id: 37375156,
                    name: "MyIngress.ipv4_lpm".to_string(),
                    alias: "ipv4_lpm".to_string(),
                    ..Default::default()
                }),
                match_fields: vec![MatchField {
                    id: 1,
                    name: "hdr.ipv4.dstAddr".to_string(),
                    bitwidth: 32,
                    match_type: MatchType::Lpm.into(),
                    ..Default::default()
                }],
                size: 1024,
                ..Default::default()
            }],
            ..Default::default()
        };
        let decoded = P4Info::decode(p4info.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, p4info);
        assert_eq!(decoded.tables[0].match_fields[0].match_type(), MatchType::Lpm);
    }
}
