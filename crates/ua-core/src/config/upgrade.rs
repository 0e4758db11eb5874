//! Upgrade configuration snapshot

use serde::{Deserialize, Serialize};
use ua_protocol::FirmwareRequest;

use super::serde_utils::lenient_bool;

/// Vendor-specific flags passed through to the firmware update RPC
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirmwareOptions {
    /// Also update the Mellanox CPLD firmware
    #[serde(deserialize_with = "lenient_bool::deserialize")]
    pub update_mlnx_cpld_fw: bool,
}

/// Immutable snapshot of the upgrade configuration
///
/// A new snapshot is produced on every load of the config file. Only a change
/// of `desired_version` ever triggers an upgrade; the remaining fields are
/// carried along to the workflow as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeConfig {
    /// Network address of the control-plane peer (e.g. `localhost:50051`)
    pub control_target: String,

    /// Opaque firmware locator handed to the update RPC
    pub firmware_source: String,

    /// Flags handed to the update RPC
    #[serde(default)]
    pub firmware_options: FirmwareOptions,

    /// Firmware version the device should be running
    pub desired_version: String,

    /// Treat "not implemented" RPC errors as success.
    ///
    /// Bring-up and testing affordance for control-plane peers that do not
    /// yet implement every RPC. Never enable this in production.
    #[serde(default)]
    pub ignore_unimplemented: bool,
}

impl UpgradeConfig {
    /// Build the firmware update request for this snapshot
    pub fn firmware_request(&self) -> FirmwareRequest {
        FirmwareRequest {
            firmware_source: self.firmware_source.clone(),
            update_mlnx_cpld_fw: self.firmware_options.update_mlnx_cpld_fw,
        }
    }
}
