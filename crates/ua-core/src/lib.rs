//! ua-core: Core abstractions and configuration for the firmware upgrade agent
//!
//! This crate provides the configuration snapshot and its file-watching
//! source, the error taxonomy, the control-plane and state-store traits,
//! and the durable upgrade-state record shared by the agent and the CLI.

pub mod config;
pub mod error;
pub mod state;
pub mod time;
pub mod traits;

pub use error::{ConfigError, ControlPlaneError, StateError, UaError, WatchError};
pub use state::{FileStateStore, MemoryStateStore, StateStore, UpgradeRecord};
