//! Text-format and JSON readers for P4Info.
//!
//! Both readers parse against the full `p4.config.v1` schema compiled into
//! the crate, so unknown fields, misspelt enum values and wrongly shaped
//! repeated fields are rejected with the parser's position. The result is
//! then transcoded into the [`P4Info`] model.

use crate::p4info::P4Info;
use prost_reflect::text_format;
use prost_reflect::{DescriptorError, DescriptorPool, DynamicMessage, MessageDescriptor};
use thiserror::Error;

const FILE_DESCRIPTOR_SET: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/p4info_descriptor.bin"));

/// Fully qualified name of the descriptor message.
pub const P4INFO_MESSAGE: &str = "p4.config.v1.P4Info";

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("embedded P4Info schema is invalid: {0}")]
    Schema(#[from] DescriptorError),

    #[error("embedded P4Info schema has no message {0}")]
    MissingMessage(&'static str),

    #[error(transparent)]
    Text(#[from] text_format::ParseError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("descriptor does not fit the P4Info model: {0}")]
    Transcode(#[from] prost::DecodeError),
}

/// Descriptor of `p4.config.v1.P4Info` from the embedded schema.
pub fn p4info_descriptor() -> Result<MessageDescriptor, FormatError> {
    let pool = DescriptorPool::decode(FILE_DESCRIPTOR_SET)?;
    pool.get_message_by_name(P4INFO_MESSAGE)
        .ok_or(FormatError::MissingMessage(P4INFO_MESSAGE))
}

/// Parses a protobuf text-format descriptor, as written by `p4c`.
pub fn p4info_from_text(text: &str) -> Result<P4Info, FormatError> {
    let message = DynamicMessage::parse_text_format(p4info_descriptor()?, text)?;
    Ok(message.transcode_to()?)
}

/// Parses a descriptor in the protobuf JSON mapping.
pub fn p4info_from_json(json: &[u8]) -> Result<P4Info, FormatError> {
    let mut deserializer = serde_json::Deserializer::from_slice(json);
    let message = DynamicMessage::deserialize(p4info_descriptor()?, &mut deserializer)?;
    deserializer.end()?;
    Ok(message.transcode_to()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::p4info::{ActionRefScope, CounterUnit, MatchType};
    use pretty_assertions::assert_eq;

    const IPV4_LPM_TEXT: &str = r#"
pkg_info {
  arch: "v1model"
}
tables {
  preamble {
    id: 37375156
    name: "MyIngress.ipv4_lpm"
    alias: "ipv4_lpm"
  }
  match_fields {
    id: 1
    name: "hdr.ipv4.dstAddr"
    bitwidth: 32
    match_type: LPM
  }
  action_refs {
    id: 28792405
  }
  action_refs {
    id: 25652968
    scope: DEFAULT_ONLY
    annotations: "@defaultonly"
  }
  size: 1024
}
actions {
  preamble {
    id: 28792405
    name: "MyIngress.ipv4_forward"
    alias: "ipv4_forward"
  }
  params {
    id: 1
    name: "dstAddr"
    bitwidth: 48
    type_name {
      name: "macAddr_t"
    }
  }
  params {
    id: 2
    name: "port"
    bitwidth: 9
  }
}
counters {
  preamble {
    id: 302003196
    name: "MyIngress.ingressTunnelCounter"
    alias: "ingressTunnelCounter"
  }
  spec {
    unit: BOTH
  }
  size: 65536
}
type_info {
}
"#;

    const IPV4_LPM_JSON: &str = r#"{
        "pkgInfo": { "arch": "v1model" },
        "tables": [{
            "preamble": { "id": 37375156, "name": "MyIngress.ipv4_lpm", "alias": "ipv4_lpm" },
            "matchFields": [{ "id": 1, "name": "hdr.ipv4.dstAddr", "bitwidth": 32, "matchType": "LPM" }],
            "actionRefs": [
                { "id": 28792405 },
                { "id": 25652968, "scope": "DEFAULT_ONLY", "annotations": ["@defaultonly"] }
            ],
            "size": "1024"
        }],
        "actions": [{
            "preamble": { "id": 28792405, "name": "MyIngress.ipv4_forward", "alias": "ipv4_forward" },
            "params": [
                { "id": 1, "name": "dstAddr", "bitwidth": 48, "typeName": { "name": "macAddr_t" } },
                { "id": 2, "name": "port", "bitwidth": 9 }
            ]
        }],
        "counters": [{
            "preamble": {
                "id": 302003196,
                "name": "MyIngress.ingressTunnelCounter",
                "alias": "ingressTunnelCounter"
            },
            "spec": { "unit": "BOTH" },
            "size": "65536"
        }],
        "typeInfo": {}
    }"#;

    #[test]
    fn test_text_format() {
        let p4info = p4info_from_text(IPV4_LPM_TEXT).unwrap();
        let table = &p4info.tables[0];
        assert_eq!(table.size, 1024);
        assert_eq!(table.match_fields[0].match_type(), MatchType::Lpm);
        assert_eq!(table.action_refs[1].scope(), ActionRefScope::DefaultOnly);
        assert_eq!(p4info.actions[0].params[1].bitwidth, 9);
        assert_eq!(
            p4info.actions[0].params[0].type_name.as_ref().unwrap().name,
            "macAddr_t"
        );
        assert_eq!(p4info.counters[0].spec.as_ref().unwrap().unit(), CounterUnit::Both);
        assert_eq!(p4info.pkg_info.unwrap().arch, "v1model");
    }

    #[test]
    fn test_json_matches_text() {
        assert_eq!(
            p4info_from_json(IPV4_LPM_JSON.as_bytes()).unwrap(),
            p4info_from_text(IPV4_LPM_TEXT).unwrap()
        );
    }

    #[test]
    fn test_single_occurrence_of_repeated_field_is_a_list() {
        let text = r#"tables { preamble { id: 1 name: "t" } }"#;
        let p4info = p4info_from_text(text).unwrap();
        assert_eq!(p4info.tables.len(), 1);
        assert_eq!(p4info.tables[0].preamble.as_ref().unwrap().name, "t");
    }

    #[test]
    fn test_unknown_enum_name_is_rejected() {
        let json = r#"{ "tables": [{ "matchFields": [{ "matchType": "FUZZY" }] }] }"#;
        let err = p4info_from_json(json.as_bytes()).unwrap_err();
        assert!(matches!(err, FormatError::Json(_)), "{err}");

        let text = "tables { match_fields { match_type: FUZZY } }";
        let err = p4info_from_text(text).unwrap_err();
        assert!(matches!(err, FormatError::Text(_)), "{err}");
    }

    #[test]
    fn test_repeated_field_given_as_object_is_rejected() {
        let json = r#"{ "tables": { "preamble": { "id": 1, "name": "t" } } }"#;
        assert!(matches!(
            p4info_from_json(json.as_bytes()),
            Err(FormatError::Json(_))
        ));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = p4info_from_text("tables { bogus: 1 }").unwrap_err();
        assert!(matches!(err, FormatError::Text(_)), "{err}");
        assert!(p4info_from_text("tables { preamble { id: 1 }").is_err());
    }

    #[test]
    fn test_schema_has_p4info() {
        let descriptor = p4info_descriptor().unwrap();
        assert_eq!(descriptor.full_name(), P4INFO_MESSAGE);
        assert!(descriptor.get_field_by_name("type_info").is_some());
    }
}
