//! Controller errors.

use p4ctl_catalog::CatalogError;
use p4ctl_runtime::RpcError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to install one policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// An entry of the policy could not be built. Nothing was written.
    #[error("{policy}: {source}")]
    Build {
        policy: String,
        #[source]
        source: CatalogError,
    },

    /// A write failed after `written` of `total` entries were installed.
    /// Installed entries are left in place.
    #[error("{policy}: {source} ({written} of {total} entries written)")]
    Rpc {
        policy: String,
        written: usize,
        total: usize,
        #[source]
        source: RpcError,
    },

    /// The policy names a switch that is not connected.
    #[error("{policy}: unknown switch '{switch}'")]
    UnknownSwitch { policy: String, switch: String },
}

impl PolicyError {
    pub fn policy(&self) -> &str {
        match self {
            PolicyError::Build { policy, .. }
            | PolicyError::Rpc { policy, .. }
            | PolicyError::UnknownSwitch { policy, .. } => policy,
        }
    }

    /// Number of entries of the policy that reached a device.
    pub fn written(&self) -> usize {
        match self {
            PolicyError::Rpc { written, .. } => *written,
            _ => 0,
        }
    }
}

pub type PolicyResult<T> = Result<T, PolicyError>;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("telemetry refers to unknown switch '{0}'")]
    UnknownSwitch(String),
}

pub type TelemetryResult<T> = Result<T, TelemetryError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// A build output the controller needs does not exist.
    #[error("{what} file not found: {}\nHave you run 'make'?", .path.display())]
    MissingInput { what: &'static str, path: PathBuf },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Anything that ends a controller run early.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

pub type ControllerResult<T> = Result<T, ControllerError>;
