//! Catalog and entry-construction errors.

use crate::catalog::MatchKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a descriptor, resolving names or building
/// entries. None of them involve a device.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A symbolic name is absent from the descriptor.
    #[error("{kind} '{name}' not found{}", scope_suffix(.scope))]
    NotFound {
        kind: &'static str,
        name: String,
        /// Owning table or action for match fields and parameters.
        scope: Option<String>,
    },

    /// The supplied match fields or parameters do not fit the declaration.
    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

fn scope_suffix(scope: &Option<String>) -> String {
    match scope {
        Some(scope) => format!(" in '{scope}'"),
        None => String::new(),
    }
}

impl CatalogError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        CatalogError::NotFound {
            kind,
            name: name.into(),
            scope: None,
        }
    }

    pub fn not_found_in(kind: &'static str, name: impl Into<String>, scope: impl Into<String>) -> Self {
        CatalogError::NotFound {
            kind,
            name: name.into(),
            scope: Some(scope.into()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound { .. })
    }

    pub fn is_shape(&self) -> bool {
        matches!(self, CatalogError::Shape(_))
    }
}

/// A match-field or parameter set that does not match its declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("table '{table}' has no match field '{field}'")]
    UnknownMatchField { table: String, field: String },

    #[error("table '{table}' requires exact match field '{field}'")]
    MissingMatchField { table: String, field: String },

    #[error("match field '{field}' of '{table}' is {expected}, got {supplied} input")]
    MatchKindMismatch {
        table: String,
        field: String,
        expected: MatchKind,
        supplied: MatchKind,
    },

    #[error("match field '{field}' of '{table}' is {kind}, which cannot be supplied")]
    UnsupportedMatchKind {
        table: String,
        field: String,
        kind: MatchKind,
    },

    #[error("action '{action}' is not permitted for table '{table}'")]
    ActionNotPermitted { table: String, action: String },

    #[error("action '{action}' has no parameter '{param}'")]
    UnknownParam { action: String, param: String },

    #[error("action '{action}' requires parameter '{param}'")]
    MissingParam { action: String, param: String },

    #[error("'{key}' supplied more than once for '{owner}'")]
    DuplicateKey { owner: String, key: String },

    #[error("value for '{name}' needs {bits} bits, declared width is {width}")]
    ValueTooWide { name: String, bits: u32, width: u32 },

    #[error("prefix length {prefix_len} for '{field}' exceeds width {width}")]
    PrefixTooLong {
        field: String,
        prefix_len: u32,
        width: u32,
    },
}

/// Problems with the descriptor file itself.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("failed to read descriptor {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported descriptor format: {}", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("invalid P4Info: {0}")]
    Format(#[from] p4ctl_proto::FormatError),

    #[error("invalid P4Info binary: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("invalid P4Info: {message}")]
    Invalid { message: String },
}

impl DescriptorError {
    pub fn invalid(message: impl Into<String>) -> Self {
        DescriptorError::Invalid {
            message: message.into(),
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
