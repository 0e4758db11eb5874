//! ua-cli: Operator command-line interface for the upgrade agent
//!
//! Provides the `upgrade-ctl` CLI for inspecting the durable upgrade record,
//! editing the watched config file, and probing the control plane.

pub mod commands;
pub mod output;
