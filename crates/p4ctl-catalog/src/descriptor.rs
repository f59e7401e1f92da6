//! Descriptor file decoding.

use crate::catalog::Catalog;
use crate::error::{CatalogResult, DescriptorError};
use p4ctl_proto::{format, P4Info};
use prost::Message;
use std::path::Path;
use tracing::info;

/// Encoding of a P4Info file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorFormat {
    /// `.json`: protobuf JSON mapping.
    Json,
    /// `.txt`, `.pbtxt`, `.p4info`: protobuf text format.
    Text,
    /// `.bin`, `.pb`: binary protobuf.
    Binary,
}

impl DescriptorFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(DescriptorFormat::Json),
            "txt" | "pbtxt" | "textproto" | "p4info" => Some(DescriptorFormat::Text),
            "bin" | "pb" => Some(DescriptorFormat::Binary),
            _ => None,
        }
    }
}

/// Decodes a P4Info message from raw file contents.
pub fn decode(bytes: &[u8], format: DescriptorFormat) -> Result<P4Info, DescriptorError> {
    match format {
        DescriptorFormat::Json => Ok(format::p4info_from_json(bytes)?),
        DescriptorFormat::Text => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| DescriptorError::invalid(format!("text descriptor is not UTF-8: {e}")))?;
            Ok(format::p4info_from_text(text)?)
        }
        DescriptorFormat::Binary => Ok(P4Info::decode(bytes)?),
    }
}

/// Reads and decodes the P4Info file at `path`.
pub fn read(path: &Path) -> Result<P4Info, DescriptorError> {
    let format = DescriptorFormat::from_path(path).ok_or_else(|| DescriptorError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let bytes = std::fs::read(path).map_err(|source| DescriptorError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode(&bytes, format)
}

impl Catalog {
    /// Loads the descriptor at `path` and indexes it.
    pub fn load(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let path = path.as_ref();
        let catalog = Catalog::from_p4info(read(path)?)?;
        info!(
            path = %path.display(),
            tables = catalog.tables().count(),
            actions = catalog.actions().count(),
            counters = catalog.counters().count(),
            "Loaded P4Info"
        );
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const TEXT: &str = r#"
tables {
  preamble { id: 33574068 name: "MyIngress.ecmp_group" alias: "ecmp_group" }
  match_fields { id: 1 name: "hdr.ipv4.dstAddr" bitwidth: 32 match_type: LPM }
  action_refs { id: 16805608 }
  size: 1024
}
actions {
  preamble { id: 16805608 name: "MyIngress.set_ecmp_select" alias: "set_ecmp_select" }
  params { id: 1 name: "ecmp_base" bitwidth: 14 }
  params { id: 2 name: "ecmp_count" bitwidth: 14 }
}
"#;

    fn write_temp(suffix: &str, contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            DescriptorFormat::from_path(Path::new("build/basic.p4.p4info.txt")),
            Some(DescriptorFormat::Text)
        );
        assert_eq!(
            DescriptorFormat::from_path(Path::new("p4info.JSON")),
            Some(DescriptorFormat::Json)
        );
        assert_eq!(DescriptorFormat::from_path(Path::new("p4info.yaml")), None);
        assert_eq!(DescriptorFormat::from_path(Path::new("p4info")), None);
    }

    #[test]
    fn test_text_json_and_binary_agree() {
        let from_text = decode(TEXT.as_bytes(), DescriptorFormat::Text).unwrap();
        assert_eq!(from_text.actions[0].params.len(), 2);
        assert_eq!(from_text.tables[0].size, 1024);

        let binary = from_text.encode_to_vec();
        assert_eq!(decode(&binary, DescriptorFormat::Binary).unwrap(), from_text);

        let json = r#"{
            "tables": [{
                "preamble": { "id": 33574068, "name": "MyIngress.ecmp_group", "alias": "ecmp_group" },
                "matchFields": [{ "id": 1, "name": "hdr.ipv4.dstAddr", "bitwidth": 32, "matchType": "LPM" }],
                "actionRefs": [{ "id": 16805608 }],
                "size": "1024"
            }],
            "actions": [{
                "preamble": { "id": 16805608, "name": "MyIngress.set_ecmp_select", "alias": "set_ecmp_select" },
                "params": [
                    { "id": 1, "name": "ecmp_base", "bitwidth": 14 },
                    { "id": 2, "name": "ecmp_count", "bitwidth": 14 }
                ]
            }]
        }"#;
        assert_eq!(decode(json.as_bytes(), DescriptorFormat::Json).unwrap(), from_text);
    }

    #[test]
    fn test_load_from_file() {
        let file = write_temp(".p4info.txt", TEXT.as_bytes());
        let catalog = Catalog::load(file.path()).unwrap();
        assert_eq!(catalog.resolve_table("ecmp_group").unwrap().as_raw(), 33574068);
        assert_eq!(catalog.tables().count(), 1);
        assert_eq!(catalog.actions().count(), 1);
        assert_eq!(catalog.counters().count(), 0);
        assert_eq!(
            catalog
                .resolve_action_param("MyIngress.set_ecmp_select", "ecmp_count")
                .unwrap()
                .as_raw(),
            2
        );
    }

    #[test]
    fn test_load_errors() {
        let err = Catalog::load("/nonexistent/p4info.txt").unwrap_err();
        assert!(err.to_string().contains("failed to read descriptor"));

        let file = write_temp(".yaml", b"tables: []");
        let err = Catalog::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported descriptor format"));

        let file = write_temp(".txt", b"tables { preamble { id: 1 }");
        assert!(Catalog::load(file.path()).is_err());
    }

    #[test]
    fn test_misspelt_enum_is_a_format_error() {
        let err = decode(
            b"tables { match_fields { name: \"x\" match_type: FUZZY } }",
            DescriptorFormat::Text,
        )
        .unwrap_err();
        assert!(matches!(err, DescriptorError::Format(_)), "{err}");

        let json = br#"{ "tables": [{ "matchFields": [{ "matchType": "FUZZY" }] }] }"#;
        let err = decode(json, DescriptorFormat::Json).unwrap_err();
        assert!(err.to_string().starts_with("invalid P4Info"), "{err}");
    }

    #[test]
    fn test_single_table_json() {
        let json = br#"{ "tables": [{ "preamble": { "id": 7, "name": "MyIngress.only" } }] }"#;
        let p4info = decode(json, DescriptorFormat::Json).unwrap();
        assert_eq!(p4info.tables.len(), 1);
        assert_eq!(p4info.tables[0].preamble.as_ref().unwrap().id, 7);
    }
}
