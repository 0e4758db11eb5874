//! ua-protocol: Control-plane wire protocol for the firmware upgrade agent
//!
//! This crate compiles the gNOI `System` and `OS` services and the
//! `SonicUpgradeService` firmware stream into tonic stubs, and defines the
//! transport-independent types the orchestrator works with.

pub mod code;
pub mod convert;
pub mod error;
pub mod message;
pub mod proto;

pub use code::RpcCode;
pub use error::ProtocolError;
pub use message::{
    FirmwareRequest, OsVersion, RebootMethod, RebootRequest, RebootStatus, Rpc, UpdatePhase,
    UpdateProgress, UPDATE_SCRIPT_EXIT_CODES,
};
