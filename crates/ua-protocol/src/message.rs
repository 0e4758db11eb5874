//! Control-plane message types
//!
//! Transport-independent forms of the requests and responses exchanged with
//! the control-plane peer. The orchestrator only ever sees these types; the
//! generated prost messages stay behind the gRPC client.
//!
//! # Firmware update stream
//!
//! 1. Client sends one `FirmwareRequest` and half-closes
//! 2. Server emits `UpdateProgress` events: `Started`, zero or more `Running`
//! 3. Server emits a terminal `Succeeded` or `Failed` event and ends the stream

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Exit codes reserved by the device-side update script for its own failures.
pub const UPDATE_SCRIPT_EXIT_CODES: RangeInclusive<i32> = 126..=140;

/// The remote operations the orchestrator issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rpc {
    /// `gnoi.system.System/Time`
    GetTime,
    /// `gnoi.os.OS/Verify`
    GetOsVersion,
    /// `gnoi.system.System/Reboot`
    Reboot,
    /// `gnoi.system.System/RebootStatus`
    GetRebootStatus,
    /// `gnoi_sonic.SonicUpgradeService/UpdateFirmware`
    RunFirmwareUpdate,
}

impl Rpc {
    /// Short name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetTime => "GetTime",
            Self::GetOsVersion => "GetOSVersion",
            Self::Reboot => "Reboot",
            Self::GetRebootStatus => "GetRebootStatus",
            Self::RunFirmwareUpdate => "RunFirmwareUpdate",
        }
    }
}

impl fmt::Display for Rpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running OS version as reported by `OS.Verify`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsVersion {
    /// Version string of the running image
    pub version: String,
    /// Set when the last image activation failed; empty otherwise
    pub activation_fail_message: String,
}

impl OsVersion {
    /// The activation failure message, if the peer reported one
    pub fn activation_failure(&self) -> Option<&str> {
        if self.activation_fail_message.is_empty() {
            None
        } else {
            Some(&self.activation_fail_message)
        }
    }
}

/// Reboot method requested from the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RebootMethod {
    /// Full power cycle of the chassis
    #[default]
    Cold,
    /// Warm restart, keeping the data plane where supported
    Warm,
    /// Power down without restarting
    Powerdown,
    /// Halt all processes
    Halt,
}

/// Parameters of a `System.Reboot` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebootRequest {
    /// How to reboot
    pub method: RebootMethod,
    /// Reboot even if the peer would otherwise refuse
    pub force: bool,
    /// Free-form reason recorded by the peer
    pub message: String,
}

impl RebootRequest {
    /// The forced cold reboot issued after a firmware update
    pub fn after_firmware_update() -> Self {
        Self {
            method: RebootMethod::Cold,
            force: true,
            message: "Rebooting to complete firmware update".to_string(),
        }
    }
}

/// Result of a `System.RebootStatus` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebootStatus {
    /// Whether a reboot is still pending or in progress
    pub active: bool,
    /// Reason the peer recorded for the reboot
    pub reason: String,
}

/// Parameters of a firmware update request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareRequest {
    /// Opaque locator of the firmware image
    pub firmware_source: String,
    /// Also update the Mellanox CPLD firmware (vendor-specific cold path)
    pub update_mlnx_cpld_fw: bool,
}

/// Coarse state carried by each update progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdatePhase {
    Started,
    Running,
    Succeeded,
    Failed,
}

impl UpdatePhase {
    /// Whether this phase ends the update
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Started => "STARTED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// One event read from the firmware update stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProgress {
    /// Human-readable output line from the update script
    pub log_line: String,
    /// Coarse state of the update
    pub phase: UpdatePhase,
    /// Script exit code; only present when `phase` is `Failed`
    pub exit_code: Option<i32>,
}

impl UpdateProgress {
    /// Whether the exit code falls in the range reserved by the update script
    pub fn is_script_failure(&self) -> bool {
        self.exit_code
            .is_some_and(|code| UPDATE_SCRIPT_EXIT_CODES.contains(&code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_failure_empty_is_none() {
        let v = OsVersion {
            version: "SONiC.202311".to_string(),
            activation_fail_message: String::new(),
        };
        assert_eq!(v.activation_failure(), None);
    }

    #[test]
    fn test_activation_failure_present() {
        let v = OsVersion {
            version: "SONiC.202311".to_string(),
            activation_fail_message: "image not bootable".to_string(),
        };
        assert_eq!(v.activation_failure(), Some("image not bootable"));
    }

    #[test]
    fn test_reboot_after_update_is_forced_cold() {
        let req = RebootRequest::after_firmware_update();
        assert_eq!(req.method, RebootMethod::Cold);
        assert!(req.force);
        assert!(!req.message.is_empty());
    }

    #[test]
    fn test_terminal_phases() {
        assert!(!UpdatePhase::Started.is_terminal());
        assert!(!UpdatePhase::Running.is_terminal());
        assert!(UpdatePhase::Succeeded.is_terminal());
        assert!(UpdatePhase::Failed.is_terminal());
    }

    #[test]
    fn test_script_failure_range() {
        let failed = |code| UpdateProgress {
            log_line: String::new(),
            phase: UpdatePhase::Failed,
            exit_code: Some(code),
        };
        assert!(failed(126).is_script_failure());
        assert!(failed(140).is_script_failure());
        assert!(!failed(1).is_script_failure());
        assert!(!failed(141).is_script_failure());
    }

    #[test]
    fn test_progress_json_form() {
        let progress = UpdateProgress {
            log_line: "image verification failed".to_string(),
            phase: UpdatePhase::Failed,
            exit_code: Some(130),
        };
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["phase"], "Failed");
        assert_eq!(json["exit_code"], 130);

        let running: UpdateProgress = serde_json::from_str(
            r#"{"log_line": "writing image", "phase": "Running", "exit_code": null}"#,
        )
        .unwrap();
        assert_eq!(running.phase, UpdatePhase::Running);
        assert_eq!(running.exit_code, None);
    }

    #[test]
    fn test_reboot_request_json_form() {
        let json = serde_json::to_value(RebootRequest::after_firmware_update()).unwrap();
        assert_eq!(json["method"], "Cold");
        assert_eq!(json["force"], true);

        let back: RebootRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, RebootRequest::after_firmware_update());
    }

    #[test]
    fn test_rpc_names() {
        assert_eq!(Rpc::GetOsVersion.to_string(), "GetOSVersion");
        assert_eq!(Rpc::RunFirmwareUpdate.to_string(), "RunFirmwareUpdate");
    }
}
