//! Agent process settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;

/// Default location of the durable upgrade-state record.
///
/// `/var/tmp` survives reboots on the devices this agent runs on and is
/// mounted into the agent container.
pub const DEFAULT_STATE_FILE: &str = "/var/tmp/upgrade-agent-state.json";

/// Settings read once at startup from the `[agent]` table of the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSettings {
    /// Path of the durable upgrade-state record
    pub state_file: PathBuf,

    /// Deadlines and delays of the upgrade workflow
    pub timeouts: WorkflowTimings,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            timeouts: WorkflowTimings::default(),
        }
    }
}

/// Deadlines and fixed delays used by the upgrade workflow
///
/// All values are whole seconds in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowTimings {
    /// Overall deadline of the firmware update stream
    #[serde(with = "duration_secs")]
    pub update: Duration,

    /// Deadline of each pre-check diagnostic call
    #[serde(with = "duration_secs")]
    pub probe: Duration,

    /// Deadline of the reboot request
    #[serde(with = "duration_secs")]
    pub reboot: Duration,

    /// Delay before the first reboot-status poll
    #[serde(with = "duration_secs")]
    pub reboot_settle: Duration,

    /// Interval between reboot-status polls
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,

    /// Give up polling (and assume the reboot finished) after this long
    #[serde(with = "duration_secs")]
    pub poll_deadline: Duration,

    /// Deadline of each reboot-status call
    #[serde(with = "duration_secs")]
    pub status_probe: Duration,

    /// Delay after the reboot for services to come up
    #[serde(with = "duration_secs")]
    pub stabilize: Duration,

    /// Deadline of the post-update version check
    #[serde(with = "duration_secs")]
    pub verify: Duration,
}

impl Default for WorkflowTimings {
    fn default() -> Self {
        Self {
            update: Duration::from_secs(300),
            probe: Duration::from_secs(30),
            reboot: Duration::from_secs(30),
            reboot_settle: Duration::from_secs(10),
            poll_interval: Duration::from_secs(10),
            poll_deadline: Duration::from_secs(300),
            status_probe: Duration::from_secs(5),
            stabilize: Duration::from_secs(60),
            verify: Duration::from_secs(30),
        }
    }
}
