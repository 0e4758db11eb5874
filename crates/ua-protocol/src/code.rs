//! Machine-readable RPC status codes
//!
//! Mirrors the gRPC status code space so that callers outside this crate can
//! classify failures without depending on tonic directly.

use std::fmt;

use serde::{Deserialize, Serialize};

/// gRPC status code reported by the control-plane peer or the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
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
    /// The peer does not implement the requested method
    Unimplemented = 12,
    Internal = 13,
    /// The peer could not be reached
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl RpcCode {
    /// Whether the peer reported the operation as not implemented
    pub fn is_unimplemented(&self) -> bool {
        matches!(self, Self::Unimplemented)
    }

    /// Canonical upper-snake name, as printed by gRPC tooling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Aborted => "ABORTED",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Internal => "INTERNAL",
            Self::Unavailable => "UNAVAILABLE",
            Self::DataLoss => "DATA_LOSS",
            Self::Unauthenticated => "UNAUTHENTICATED",
        }
    }
}

impl fmt::Display for RpcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<tonic::Code> for RpcCode {
    fn from(code: tonic::Code) -> Self {
        match code {
            tonic::Code::Ok => Self::Ok,
            tonic::Code::Cancelled => Self::Cancelled,
            tonic::Code::Unknown => Self::Unknown,
            tonic::Code::InvalidArgument => Self::InvalidArgument,
            tonic::Code::DeadlineExceeded => Self::DeadlineExceeded,
            tonic::Code::NotFound => Self::NotFound,
            tonic::Code::AlreadyExists => Self::AlreadyExists,
            tonic::Code::PermissionDenied => Self::PermissionDenied,
            tonic::Code::ResourceExhausted => Self::ResourceExhausted,
            tonic::Code::FailedPrecondition => Self::FailedPrecondition,
            tonic::Code::Aborted => Self::Aborted,
            tonic::Code::OutOfRange => Self::OutOfRange,
            tonic::Code::Unimplemented => Self::Unimplemented,
            tonic::Code::Internal => Self::Internal,
            tonic::Code::Unavailable => Self::Unavailable,
            tonic::Code::DataLoss => Self::DataLoss,
            tonic::Code::Unauthenticated => Self::Unauthenticated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unimplemented_maps_through() {
        let code = RpcCode::from(tonic::Code::Unimplemented);
        assert_eq!(code, RpcCode::Unimplemented);
        assert!(code.is_unimplemented());
    }

    #[test]
    fn test_other_codes_are_not_unimplemented() {
        for code in [
            tonic::Code::Unavailable,
            tonic::Code::Internal,
            tonic::Code::DeadlineExceeded,
            tonic::Code::Unknown,
        ] {
            assert!(!RpcCode::from(code).is_unimplemented());
        }
    }

    #[test]
    fn test_numeric_values_match_grpc() {
        assert_eq!(RpcCode::Unimplemented as u8, tonic::Code::Unimplemented as u8);
        assert_eq!(RpcCode::Unavailable as u8, tonic::Code::Unavailable as u8);
        assert_eq!(RpcCode::Unauthenticated as u8, tonic::Code::Unauthenticated as u8);
    }

    #[test]
    fn test_display() {
        assert_eq!(RpcCode::Unimplemented.to_string(), "UNIMPLEMENTED");
    }

    #[test]
    fn test_serializes_by_name() {
        let json = serde_json::to_string(&RpcCode::Unimplemented).unwrap();
        assert_eq!(json, "\"Unimplemented\"");

        let code: RpcCode = serde_json::from_str("\"Unavailable\"").unwrap();
        assert_eq!(code, RpcCode::Unavailable);
        assert!(serde_json::from_str::<RpcCode>("\"NoSuchCode\"").is_err());
    }
}
