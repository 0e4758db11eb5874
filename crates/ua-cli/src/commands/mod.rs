//! CLI command implementations

mod config;
mod probe;
mod state;

pub use config::{config_set_version, config_show, set_version_in, VersionChange};
pub use probe::{probe_command, ProbeResult};
pub use state::{resolve_state_file, state_clear, state_show};
