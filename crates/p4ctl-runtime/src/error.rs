//! Device-side errors.
//!
//! Every error names the device and the operation that failed, so a failed
//! run can report where it stopped without further context.

use std::fmt;
use thiserror::Error;

/// gRPC canonical status codes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcCode {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl RpcCode {
    /// Maps a raw code; anything out of range is `Unknown`.
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => RpcCode::Ok,
            1 => RpcCode::Cancelled,
            2 => RpcCode::Unknown,
            3 => RpcCode::InvalidArgument,
            4 => RpcCode::DeadlineExceeded,
            5 => RpcCode::NotFound,
            6 => RpcCode::AlreadyExists,
            7 => RpcCode::PermissionDenied,
            8 => RpcCode::ResourceExhausted,
            9 => RpcCode::FailedPrecondition,
            10 => RpcCode::Aborted,
            11 => RpcCode::OutOfRange,
            12 => RpcCode::Unimplemented,
            13 => RpcCode::Internal,
            14 => RpcCode::Unavailable,
            15 => RpcCode::DataLoss,
            16 => RpcCode::Unauthenticated,
            _ => RpcCode::Unknown,
        }
    }

    pub fn is_ok(&self) -> bool {
        *self == RpcCode::Ok
    }

    /// Transient conditions worth retrying. The controller itself never
    /// retries; this is for callers that want to.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RpcCode::Unavailable
                | RpcCode::ResourceExhausted
                | RpcCode::Aborted
                | RpcCode::DeadlineExceeded
        )
    }
}

impl From<tonic::Code> for RpcCode {
    fn from(code: tonic::Code) -> Self {
        RpcCode::from_raw(code as i32)
    }
}

impl fmt::Display for RpcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RpcCode::Ok => "OK",
            RpcCode::Cancelled => "CANCELLED",
            RpcCode::Unknown => "UNKNOWN",
            RpcCode::InvalidArgument => "INVALID_ARGUMENT",
            RpcCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            RpcCode::NotFound => "NOT_FOUND",
            RpcCode::AlreadyExists => "ALREADY_EXISTS",
            RpcCode::PermissionDenied => "PERMISSION_DENIED",
            RpcCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            RpcCode::FailedPrecondition => "FAILED_PRECONDITION",
            RpcCode::Aborted => "ABORTED",
            RpcCode::OutOfRange => "OUT_OF_RANGE",
            RpcCode::Unimplemented => "UNIMPLEMENTED",
            RpcCode::Internal => "INTERNAL",
            RpcCode::Unavailable => "UNAVAILABLE",
            RpcCode::DataLoss => "DATA_LOSS",
            RpcCode::Unauthenticated => "UNAUTHENTICATED",
        };
        write!(f, "{s}")
    }
}

/// The session operation an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    Arbitrate,
    SetPipeline,
    Write,
    ReadEntries,
    ReadCounters,
    Close,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Connect => "connect",
            Operation::Arbitrate => "arbitration",
            Operation::SetPipeline => "SetForwardingPipelineConfig",
            Operation::Write => "Write",
            Operation::ReadEntries => "Read(table entries)",
            Operation::ReadCounters => "Read(counters)",
            Operation::Close => "close",
        };
        write!(f, "{s}")
    }
}

/// One per-update failure reported in the details of a failed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateError {
    pub code: RpcCode,
    pub message: String,
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// The device answered with a non-OK status.
    #[error("{device}: {operation} failed with {code}: {message}{}", details_suffix(.details))]
    Status {
        device: String,
        operation: Operation,
        code: RpcCode,
        message: String,
        details: Vec<UpdateError>,
    },

    #[error("{device}: cannot connect to {address}: {message}")]
    Connect {
        device: String,
        address: String,
        message: String,
    },

    /// Arbitration completed but another controller is primary.
    #[error("{device}: not primary ({code}: {message})")]
    NotPrimary {
        device: String,
        code: RpcCode,
        message: String,
    },

    #[error("{device}: stream channel closed during {operation}")]
    StreamClosed { device: String, operation: Operation },

    /// The device answered with something that cannot be interpreted.
    #[error("{device}: malformed {operation} response: {message}")]
    Malformed {
        device: String,
        operation: Operation,
        message: String,
    },
}

fn details_suffix(details: &[UpdateError]) -> String {
    if details.is_empty() {
        return String::new();
    }
    let joined: Vec<String> = details.iter().map(ToString::to_string).collect();
    format!(" [{}]", joined.join("; "))
}

impl RpcError {
    pub fn status(
        device: impl Into<String>,
        operation: Operation,
        code: RpcCode,
        message: impl Into<String>,
    ) -> Self {
        RpcError::Status {
            device: device.into(),
            operation,
            code,
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn malformed(device: impl Into<String>, operation: Operation, message: impl Into<String>) -> Self {
        RpcError::Malformed {
            device: device.into(),
            operation,
            message: message.into(),
        }
    }

    pub fn stream_closed(device: impl Into<String>, operation: Operation) -> Self {
        RpcError::StreamClosed {
            device: device.into(),
            operation,
        }
    }

    /// Name of the device the error came from.
    pub fn device(&self) -> &str {
        match self {
            RpcError::Status { device, .. }
            | RpcError::Connect { device, .. }
            | RpcError::NotPrimary { device, .. }
            | RpcError::StreamClosed { device, .. }
            | RpcError::Malformed { device, .. } => device,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            RpcError::Status { operation, .. }
            | RpcError::StreamClosed { operation, .. }
            | RpcError::Malformed { operation, .. } => *operation,
            RpcError::Connect { .. } => Operation::Connect,
            RpcError::NotPrimary { .. } => Operation::Arbitrate,
        }
    }

    /// Status code, when the device answered with one.
    pub fn code(&self) -> Option<RpcCode> {
        match self {
            RpcError::Status { code, .. } | RpcError::NotPrimary { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Status { code, .. } => code.is_retryable(),
            RpcError::Connect { .. } | RpcError::StreamClosed { .. } => true,
            _ => false,
        }
    }
}

pub type RpcResult<T> = Result<T, RpcError>;
