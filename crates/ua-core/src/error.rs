//! Core error types for the upgrade agent

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use ua_protocol::{ProtocolError, Rpc, RpcCode};

/// Top-level error type for the upgrade agent
#[derive(Error, Debug)]
pub enum UaError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Control-plane error
    #[error("Control-plane error: {0}")]
    ControlPlane(#[from] ControlPlaneError),

    /// Durable state error
    #[error("Upgrade state error: {0}")]
    State(#[from] StateError),

    /// Config watcher error
    #[error("Config watcher error: {0}")]
    Watch(#[from] WatchError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by control-plane calls
#[derive(Error, Debug, Clone)]
pub enum ControlPlaneError {
    /// The peer (or the transport on its behalf) returned a status
    #[error("{rpc} failed with {code}: {message}")]
    Status {
        rpc: Rpc,
        code: RpcCode,
        message: String,
    },

    /// The call did not finish within its deadline
    #[error("{rpc} timed out after {after:?}")]
    Timeout { rpc: Rpc, after: Duration },

    /// The peer sent a message that could not be decoded
    #[error("{rpc} returned a malformed message: {source}")]
    Malformed {
        rpc: Rpc,
        #[source]
        source: ProtocolError,
    },

    /// The control-plane target could not be used to build a channel
    #[error("Invalid control-plane target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },
}

impl ControlPlaneError {
    /// Build a status error
    pub fn status(rpc: Rpc, code: RpcCode, message: impl Into<String>) -> Self {
        Self::Status {
            rpc,
            code,
            message: message.into(),
        }
    }

    /// Machine-readable status code, if the error carries one
    pub fn code(&self) -> Option<RpcCode> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether the peer reported the operation as not implemented
    pub fn is_unimplemented(&self) -> bool {
        self.code().is_some_and(|c| c.is_unimplemented())
    }
}

/// Durable upgrade-state errors
#[derive(Error, Debug)]
pub enum StateError {
    /// Reading or writing the state file failed
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state file exists but does not contain a valid record
    #[error("Corrupt upgrade state in {path:?}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The record could not be encoded
    #[error("Failed to encode upgrade state: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// YAML parse or serialize error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Config file watcher errors
#[derive(Error, Debug)]
pub enum WatchError {
    /// The filesystem notification backend failed
    #[error("Filesystem watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// The config path has no parent directory to watch
    #[error("Config path has no parent directory: {0}")]
    NoParent(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unimplemented_status() {
        let err = ControlPlaneError::status(Rpc::Reboot, RpcCode::Unimplemented, "not here");
        assert!(err.is_unimplemented());
        assert_eq!(err.code(), Some(RpcCode::Unimplemented));
    }

    #[test]
    fn test_timeout_has_no_code() {
        let err = ControlPlaneError::Timeout {
            rpc: Rpc::GetTime,
            after: Duration::from_secs(30),
        };
        assert!(!err.is_unimplemented());
        assert_eq!(err.code(), None);
    }

    #[test]
    fn test_status_display() {
        let err = ControlPlaneError::status(Rpc::GetRebootStatus, RpcCode::Unavailable, "down");
        assert_eq!(
            err.to_string(),
            "GetRebootStatus failed with UNAVAILABLE: down"
        );
    }
}
