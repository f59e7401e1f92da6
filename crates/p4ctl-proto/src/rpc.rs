//! `google.rpc.Status` and the P4Runtime per-update error payload.

use prost::Message;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Status {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(message, repeated, tag = "3")]
    pub details: Vec<::prost_types::Any>,
}

/// `p4.v1.Error`: one entry per update of a failed batch write.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct P4Error {
    #[prost(int32, tag = "1")]
    pub canonical_code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(string, tag = "3")]
    pub space: String,
    #[prost(int32, tag = "4")]
    pub code: i32,
    #[prost(message, optional, tag = "5")]
    pub details: Option<::prost_types::Any>,
}

impl P4Error {
    pub const TYPE_URL: &'static str = "type.googleapis.com/p4.v1.Error";
}

/// Decodes the per-update errors carried in the binary details of a gRPC
/// status. Entries that are not `p4.v1.Error` or fail to decode are skipped,
/// as are entries whose canonical code is OK.
pub fn p4_errors(details: &[u8]) -> Vec<P4Error> {
    let Ok(status) = Status::decode(details) else {
        return Vec::new();
    };
    status
        .details
        .iter()
        .filter(|any| any.type_url == P4Error::TYPE_URL)
        .filter_map(|any| P4Error::decode(any.value.as_slice()).ok())
        .filter(|err| err.canonical_code != 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn any(err: &P4Error) -> ::prost_types::Any {
        ::prost_types::Any {
            type_url: P4Error::TYPE_URL.to_string(),
            value: err.encode_to_vec(),
        }
    }

    #[test]
    fn test_p4_errors_from_status_details() {
        let ok = P4Error::default();
        let dup = P4Error {
            canonical_code: 6,
            message: "Match entry exists, use MODIFY if you wish to change action".to_string(),
            ..Default::default()
        };
        let status = Status {
            code: 2,
            message: "Write failure.".to_string(),
            details: vec![any(&ok), any(&dup)],
        };

        let errors = p4_errors(&status.encode_to_vec());
        assert_eq!(errors, vec![dup]);
    }

    #[test]
    fn test_garbage_details_yield_nothing() {
        assert!(p4_errors(&[0xff, 0xff, 0xff]).is_empty());
        assert!(p4_errors(&[]).is_empty());
    }
}
