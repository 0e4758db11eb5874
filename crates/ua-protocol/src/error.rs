//! Protocol error types

use thiserror::Error;

/// Errors raised while translating wire messages into control-plane types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The update stream carried a state value this build does not know
    #[error("Unknown firmware update state: {0}")]
    UnknownUpdateState(i32),
}
