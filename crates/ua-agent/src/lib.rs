//! ua-agent: Firmware upgrade agent
//!
//! The agent watches the upgrade configuration for a new desired firmware
//! version and drives the update, reboot and verification steps through the
//! device's control plane. A durable checkpoint taken before the reboot lets
//! a restarted agent finish verification.

pub mod control;
pub mod orchestrator;

pub use control::{GrpcConnector, GrpcControlPlane};
pub use orchestrator::{
    ActiveWorkflow, UpgradeOrchestrator, WorkflowHandle, WorkflowKind, WorkflowOutcome,
    WorkflowReport, WorkflowState,
};
