//! Upgrade workflow state machine
//!
//! A workflow runs the full upgrade sequence for one configuration snapshot:
//!
//! ```text
//! PRE_CHECK -> UPDATING -> AWAITING_REBOOT_ACK -> POLLING_REBOOT
//!           -> STABILIZING -> VERIFYING -> DONE
//! ```
//!
//! `FAILED` is only reachable from `UPDATING`. Between a successful update and
//! the end of verification the durable record says verification is owed; the
//! reboot usually kills this process, and a restarted agent resumes at
//! `STABILIZING` from that record.
//!
//! Every remote call carries its own deadline. Diagnostic calls never affect
//! control flow, and state-store failures are logged and otherwise ignored.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};

use ua_core::config::{UpgradeConfig, WorkflowTimings};
use ua_core::error::ControlPlaneError;
use ua_core::state::{StateStore, UpgradeRecord};
use ua_core::time::format_unix_nanos;
use ua_core::traits::ControlPlane;
use ua_protocol::{RebootRequest, Rpc, UpdatePhase, UpdateProgress};

use super::classify::ErrorPolicy;

/// Steps of the upgrade workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowState {
    PreCheck,
    Updating,
    AwaitingRebootAck,
    PollingReboot,
    Stabilizing,
    Verifying,
    Done,
    Failed,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreCheck => "PRE_CHECK",
            Self::Updating => "UPDATING",
            Self::AwaitingRebootAck => "AWAITING_REBOOT_ACK",
            Self::PollingReboot => "POLLING_REBOOT",
            Self::Stabilizing => "STABILIZING",
            Self::Verifying => "VERIFYING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a workflow was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    /// A desired-version change started a full upgrade
    Update,
    /// Startup found verification owed from before a restart
    Resume,
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Update => f.write_str("update"),
            Self::Resume => f.write_str("resume"),
        }
    }
}

/// How a workflow ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    /// Verification ran
    Done,
    /// The firmware update failed; nothing after it ran
    Failed { reason: String },
    /// The update succeeded but the reboot could not be requested
    Degraded { reason: String },
}

/// Summary of a finished workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowReport {
    pub kind: WorkflowKind,
    pub target_version: String,
    pub outcome: WorkflowOutcome,
    /// States entered, in order
    pub states: Vec<WorkflowState>,
    /// Version reported by the verification call, if it answered
    pub observed_version: Option<String>,
}

impl WorkflowReport {
    /// Last state entered
    pub fn final_state(&self) -> Option<WorkflowState> {
        self.states.last().copied()
    }

    pub fn visited(&self, state: WorkflowState) -> bool {
        self.states.contains(&state)
    }
}

/// Handle of a spawned workflow task
///
/// Dropping the handle detaches the task; it keeps running.
#[derive(Debug)]
pub struct WorkflowHandle {
    kind: WorkflowKind,
    target_version: String,
    task: JoinHandle<WorkflowReport>,
}

impl WorkflowHandle {
    pub(crate) fn new(
        kind: WorkflowKind,
        target_version: String,
        task: JoinHandle<WorkflowReport>,
    ) -> Self {
        Self {
            kind,
            target_version,
            task,
        }
    }

    pub fn kind(&self) -> WorkflowKind {
        self.kind
    }

    pub fn target_version(&self) -> &str {
        &self.target_version
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the workflow to finish
    pub async fn wait(self) -> Result<WorkflowReport, JoinError> {
        self.task.await
    }
}

/// Result of the reboot request
enum RebootAck {
    /// The peer accepted the reboot
    Accepted,
    /// The peer does not implement reboot and the snapshot allows skipping it
    Skipped,
    /// The reboot could not be requested
    Failed(ControlPlaneError),
}

/// Why the update step did not succeed
enum UpdateFailure {
    Transport(ControlPlaneError),
    Reported(UpdateProgress),
}

/// Await `fut`, giving up after `after`
async fn with_deadline<T, F>(rpc: Rpc, after: Duration, fut: F) -> Result<T, ControlPlaneError>
where
    F: Future<Output = Result<T, ControlPlaneError>>,
{
    match time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(ControlPlaneError::Timeout { rpc, after }),
    }
}

/// One run of the upgrade sequence for a single configuration snapshot
pub struct Workflow {
    client: Arc<dyn ControlPlane>,
    store: Arc<dyn StateStore>,
    config: UpgradeConfig,
    timings: WorkflowTimings,
    policy: ErrorPolicy,
    states: Vec<WorkflowState>,
    observed_version: Option<String>,
}

impl Workflow {
    pub fn new(
        client: Arc<dyn ControlPlane>,
        store: Arc<dyn StateStore>,
        config: UpgradeConfig,
        timings: WorkflowTimings,
    ) -> Self {
        let policy = ErrorPolicy::from_config(&config);
        Self {
            client,
            store,
            config,
            timings,
            policy,
            states: Vec::new(),
            observed_version: None,
        }
    }

    pub fn target_version(&self) -> &str {
        &self.config.desired_version
    }

    /// Run the full upgrade sequence
    pub async fn run(mut self) -> WorkflowReport {
        tracing::info!(
            target_version = %self.config.desired_version,
            control_target = %self.config.control_target,
            firmware_source = %self.config.firmware_source,
            update_mlnx_cpld_fw = self.config.firmware_options.update_mlnx_cpld_fw,
            "Starting firmware upgrade"
        );

        self.pre_check().await;

        if let Err(reason) = self.update().await {
            self.enter(WorkflowState::Failed);
            return self.finish(WorkflowKind::Update, WorkflowOutcome::Failed { reason });
        }

        self.checkpoint().await;

        match self.request_reboot().await {
            RebootAck::Accepted => {
                self.poll_reboot().await;
                self.stabilize().await;
            }
            RebootAck::Skipped => {
                tracing::info!("Reboot not supported by peer, verifying immediately");
            }
            RebootAck::Failed(err) => {
                tracing::warn!(
                    target_version = %self.config.desired_version,
                    "Failed to request reboot after firmware update: {}",
                    err
                );
                self.clear_record().await;
                return self.finish(
                    WorkflowKind::Update,
                    WorkflowOutcome::Degraded {
                        reason: err.to_string(),
                    },
                );
            }
        }

        self.verify().await;
        self.enter(WorkflowState::Done);
        self.finish(WorkflowKind::Update, WorkflowOutcome::Done)
    }

    /// Finish verification owed from before a restart
    pub async fn resume(mut self) -> WorkflowReport {
        tracing::info!(
            target_version = %self.config.desired_version,
            "Resuming post-reboot verification"
        );

        self.stabilize().await;
        self.verify().await;
        self.enter(WorkflowState::Done);
        self.finish(WorkflowKind::Resume, WorkflowOutcome::Done)
    }

    fn enter(&mut self, state: WorkflowState) {
        tracing::info!(
            target_version = %self.config.desired_version,
            state = %state,
            "Upgrade workflow state"
        );
        self.states.push(state);
    }

    fn finish(self, kind: WorkflowKind, outcome: WorkflowOutcome) -> WorkflowReport {
        match &outcome {
            WorkflowOutcome::Done => tracing::info!(
                target_version = %self.config.desired_version,
                "Upgrade workflow finished"
            ),
            WorkflowOutcome::Failed { reason } => tracing::error!(
                target_version = %self.config.desired_version,
                "Upgrade workflow failed: {}",
                reason
            ),
            WorkflowOutcome::Degraded { reason } => tracing::warn!(
                target_version = %self.config.desired_version,
                "Upgrade workflow ended without reboot: {}",
                reason
            ),
        }

        WorkflowReport {
            kind,
            target_version: self.config.desired_version,
            outcome,
            states: self.states,
            observed_version: self.observed_version,
        }
    }

    /// Log a diagnostic failure at a level matching its class
    fn log_diagnostic(&self, what: &str, err: &ControlPlaneError) {
        if self.policy.is_ignorable(err) {
            tracing::info!("{} unimplemented, skipping: {}", what, err);
        } else {
            tracing::warn!("Failed to get {}: {}", what, err);
        }
    }

    async fn pre_check(&mut self) {
        self.enter(WorkflowState::PreCheck);

        match with_deadline(Rpc::GetTime, self.timings.probe, self.client.get_time()).await {
            Ok(nanos) => tracing::info!(
                "System time before update: {} (timestamp: {} ns)",
                format_unix_nanos(nanos),
                nanos
            ),
            Err(e) => self.log_diagnostic("system time", &e),
        }

        match with_deadline(
            Rpc::GetOsVersion,
            self.timings.probe,
            self.client.get_os_version(),
        )
        .await
        {
            Ok(version) => {
                tracing::info!("OS version before update: {}", version.version);
                if let Some(message) = version.activation_failure() {
                    tracing::warn!("Previous activation failure message: {}", message);
                }
            }
            Err(e) => self.log_diagnostic("OS version", &e),
        }
    }

    /// Run the firmware update; `Err` carries the failure reason
    async fn update(&mut self) -> Result<(), String> {
        self.enter(WorkflowState::Updating);

        let request = self.config.firmware_request();
        let deadline = self.timings.update;
        let result = match time::timeout(deadline, stream_update(self.client.as_ref(), request))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(UpdateFailure::Transport(ControlPlaneError::Timeout {
                rpc: Rpc::RunFirmwareUpdate,
                after: deadline,
            })),
        };

        match result {
            Ok(()) => {
                tracing::info!(
                    target_version = %self.config.desired_version,
                    "Firmware update completed successfully"
                );
                Ok(())
            }
            Err(UpdateFailure::Transport(e)) if self.policy.is_ignorable(&e) => {
                tracing::info!("Firmware update RPC unimplemented, skipping ahead: {}", e);
                Ok(())
            }
            Err(UpdateFailure::Transport(e)) => Err(format!("firmware update failed: {}", e)),
            Err(UpdateFailure::Reported(progress)) => {
                let code = progress.exit_code.unwrap_or_default();
                if progress.is_script_failure() {
                    Err(format!(
                        "firmware update script failed with exit code {}: {}",
                        code, progress.log_line
                    ))
                } else {
                    Err(format!(
                        "firmware update reported FAILED with exit code {}: {}",
                        code, progress.log_line
                    ))
                }
            }
        }
    }

    /// Persist that verification is owed, before the reboot can kill us
    async fn checkpoint(&self) {
        let record = UpgradeRecord::begin(&self.config);
        match self.store.save(&record).await {
            Ok(()) => tracing::info!(
                target_version = %record.target_version,
                "Saved upgrade state before reboot"
            ),
            Err(e) => tracing::warn!("Failed to save upgrade state: {}", e),
        }
    }

    async fn clear_record(&self) {
        if let Err(e) = self.store.clear().await {
            tracing::warn!("Failed to clear upgrade state: {}", e);
        }
    }

    async fn request_reboot(&mut self) -> RebootAck {
        self.enter(WorkflowState::AwaitingRebootAck);
        tracing::info!("Initiating system reboot to complete firmware update");

        let request = RebootRequest::after_firmware_update();
        match with_deadline(Rpc::Reboot, self.timings.reboot, self.client.reboot(request)).await {
            Ok(()) => {
                tracing::info!("System reboot request sent successfully");
                RebootAck::Accepted
            }
            Err(e) if self.policy.is_ignorable(&e) => {
                tracing::info!("Reboot RPC unimplemented, skipping ahead: {}", e);
                RebootAck::Skipped
            }
            Err(e) => RebootAck::Failed(e),
        }
    }

    /// Wait for the peer to report the reboot as finished
    ///
    /// Gives up, assuming the reboot finished, once the poll deadline elapses
    /// or the status call turns out to be unimplemented.
    async fn poll_reboot(&mut self) {
        self.enter(WorkflowState::PollingReboot);

        tracing::info!(
            "Waiting {:?} for system to begin reboot process",
            self.timings.reboot_settle
        );
        time::sleep(self.timings.reboot_settle).await;

        let deadline = time::sleep(self.timings.poll_deadline);
        tokio::pin!(deadline);

        let period = self.timings.poll_interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let timed_out = || tracing::warn!("Timeout waiting for reboot to complete, continuing");

        loop {
            tokio::select! {
                _ = &mut deadline => return timed_out(),
                _ = ticker.tick() => {}
            }

            tracing::debug!("Checking if device has completed reboot");
            // The poll deadline also bounds a status call already in flight
            let status = tokio::select! {
                _ = &mut deadline => return timed_out(),
                status = with_deadline(
                    Rpc::GetRebootStatus,
                    self.timings.status_probe,
                    self.client.get_reboot_status(),
                ) => status,
            };

            match status {
                Ok(status) if !status.active => {
                    tracing::info!("System reboot completed");
                    return;
                }
                Ok(status) => {
                    tracing::info!(reason = %status.reason, "Reboot still in progress");
                }
                Err(e) if self.policy.is_ignorable(&e) => {
                    tracing::info!(
                        "Reboot status RPC unimplemented, assuming reboot complete: {}",
                        e
                    );
                    return;
                }
                Err(e) => {
                    tracing::info!("Device unreachable during reboot (expected): {}", e);
                }
            }
        }
    }

    async fn stabilize(&mut self) {
        self.enter(WorkflowState::Stabilizing);
        tracing::info!(
            "Waiting {:?} for system to stabilize",
            self.timings.stabilize
        );
        time::sleep(self.timings.stabilize).await;
    }

    /// Check the running version and clear the record, whatever the answer
    async fn verify(&mut self) {
        self.enter(WorkflowState::Verifying);

        match with_deadline(
            Rpc::GetOsVersion,
            self.timings.verify,
            self.client.get_os_version(),
        )
        .await
        {
            Ok(version) => {
                tracing::info!(
                    target_version = %self.config.desired_version,
                    "OS version after update: {}",
                    version.version
                );
                if let Some(message) = version.activation_failure() {
                    tracing::warn!("Activation failure after update: {}", message);
                }
                self.observed_version = Some(version.version);
            }
            Err(e) => self.log_diagnostic("OS version after update", &e),
        }

        self.clear_record().await;
    }
}

/// Send the update request and drain the event stream
async fn stream_update(
    client: &dyn ControlPlane,
    request: ua_protocol::FirmwareRequest,
) -> Result<(), UpdateFailure> {
    let mut events = client
        .run_firmware_update(request)
        .await
        .map_err(UpdateFailure::Transport)?;

    while let Some(event) = events.next().await {
        let progress = event.map_err(UpdateFailure::Transport)?;
        tracing::info!(phase = %progress.phase, "Firmware update: {}", progress.log_line);

        if progress.phase == UpdatePhase::Failed {
            return Err(UpdateFailure::Reported(progress));
        }
    }

    Ok(())
}
