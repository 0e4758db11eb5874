//! Upgrade orchestrator
//!
//! Owns the control-plane client, the latest configuration snapshot and the
//! desired-version gate, all behind a single mutex that is never held across
//! an RPC or a state-store call. Workflows run as spawned tasks; the caller
//! gets a [`WorkflowHandle`] it may await or drop.
//!
//! At most one workflow runs at a time. A trigger that arrives while one is
//! active, or while `initialize` is still reading the durable record, still
//! moves the gate's baseline but starts nothing.

mod classify;
mod gate;
mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use classify::ErrorPolicy;
pub use gate::{ConfigGate, GateDecision};
pub use workflow::{
    Workflow, WorkflowHandle, WorkflowKind, WorkflowOutcome, WorkflowReport, WorkflowState,
};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ua_core::config::{UpgradeConfig, WorkflowTimings};
use ua_core::error::UaError;
use ua_core::state::StateStore;
use ua_core::traits::{Connector, ControlPlane};

/// The workflow currently holding the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveWorkflow {
    pub kind: WorkflowKind,
    pub target_version: String,
}

#[derive(Default)]
struct Inner {
    client: Option<Arc<dyn ControlPlane>>,
    current: Option<UpgradeConfig>,
    gate: ConfigGate,
    active: Option<ActiveWorkflow>,
    initializing: bool,
}

/// Releases the active-workflow marker when the workflow task ends
struct ActiveGuard {
    inner: Arc<Mutex<Inner>>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .active = None;
    }
}

/// Holds off triggers until `initialize` has decided whether to resume
struct InitGuard {
    inner: Arc<Mutex<Inner>>,
}

impl Drop for InitGuard {
    fn drop(&mut self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .initializing = false;
    }
}

/// Coordinates configuration changes, upgrade workflows and resume-on-restart
pub struct UpgradeOrchestrator {
    inner: Arc<Mutex<Inner>>,
    connector: Arc<dyn Connector>,
    store: Arc<dyn StateStore>,
    timings: WorkflowTimings,
}

impl UpgradeOrchestrator {
    pub fn new(
        connector: Arc<dyn Connector>,
        store: Arc<dyn StateStore>,
        timings: WorkflowTimings,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            connector,
            store,
            timings,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind the client, seed the gate and resume owed verification.
    ///
    /// Returns the handle of the resumed workflow, if verification was owed.
    /// Must be called from within a tokio runtime.
    pub async fn initialize(
        &self,
        config: UpgradeConfig,
    ) -> Result<Option<WorkflowHandle>, UaError> {
        let client = self.connector.connect(&config.control_target)?;

        let _initializing = {
            let mut inner = self.lock();
            inner.client = Some(Arc::clone(&client));
            inner.gate.observe(&config.desired_version);
            inner.current = Some(config.clone());
            inner.initializing = true;
            InitGuard {
                inner: Arc::clone(&self.inner),
            }
        };

        tracing::info!(
            target_version = %config.desired_version,
            control_target = %config.control_target,
            "Orchestrator initialized"
        );

        let record = match self.store.load().await {
            Ok(Some(record)) if record.in_progress => record,
            Ok(Some(_)) => {
                tracing::debug!("Stored upgrade state is not in progress, ignoring");
                return Ok(None);
            }
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!("Failed to load upgrade state, assuming none owed: {}", e);
                return Ok(None);
            }
        };

        tracing::info!(
            target_version = %record.target_version,
            "Found upgrade in progress from before restart"
        );

        // Resume against the persisted target, which may differ from the live one
        let resume_client = if record.config.control_target == config.control_target {
            client
        } else {
            match self.connector.connect(&record.config.control_target) {
                Ok(resume_client) => resume_client,
                Err(e) => {
                    tracing::warn!(
                        "Cannot bind persisted control target {:?}, using current: {}",
                        record.config.control_target,
                        e
                    );
                    client
                }
            }
        };

        let target_version = record.target_version.clone();
        let mut config = record.config;
        config.desired_version = target_version.clone();

        {
            let mut inner = self.lock();
            if let Some(active) = &inner.active {
                tracing::warn!(
                    target_version = %active.target_version,
                    "Workflow already active, not resuming"
                );
                return Ok(None);
            }
            inner.active = Some(ActiveWorkflow {
                kind: WorkflowKind::Resume,
                target_version: target_version.clone(),
            });
        }

        let workflow = Workflow::new(resume_client, Arc::clone(&self.store), config, self.timings);
        Ok(Some(self.spawn(WorkflowKind::Resume, workflow)))
    }

    /// Record a new configuration snapshot and start an upgrade if its
    /// desired version changed.
    ///
    /// Never blocks on the workflow. Must be called from within a tokio
    /// runtime.
    pub fn update_config(&self, config: UpgradeConfig) -> Option<WorkflowHandle> {
        tracing::info!(
            target_version = %config.desired_version,
            "Received config update"
        );

        let client = {
            let mut inner = self.lock();
            inner.current = Some(config.clone());

            match inner.gate.observe(&config.desired_version) {
                GateDecision::Trigger { previous } => {
                    tracing::info!(
                        "Target version changed from {} to {}, triggering update",
                        previous,
                        config.desired_version
                    );
                }
                GateDecision::Seed => {
                    tracing::debug!("Desired version baseline set");
                    return None;
                }
                GateDecision::Unchanged => return None,
                GateDecision::Cleared => {
                    tracing::info!("Desired version cleared, nothing to upgrade to");
                    return None;
                }
            }

            if inner.initializing {
                tracing::warn!(
                    requested_version = %config.desired_version,
                    "Orchestrator still checking for an owed verification, ignoring new target version"
                );
                return None;
            }

            if let Some(active) = &inner.active {
                tracing::warn!(
                    active_version = %active.target_version,
                    requested_version = %config.desired_version,
                    "Upgrade workflow already running, ignoring new target version"
                );
                return None;
            }

            let Some(client) = inner.client.clone() else {
                tracing::error!("Cannot perform update: client not initialized");
                return None;
            };

            inner.active = Some(ActiveWorkflow {
                kind: WorkflowKind::Update,
                target_version: config.desired_version.clone(),
            });
            client
        };

        let workflow = Workflow::new(client, Arc::clone(&self.store), config, self.timings);
        Some(self.spawn(WorkflowKind::Update, workflow))
    }

    /// Release the control-plane client
    ///
    /// Running workflows keep their own reference and finish normally.
    pub fn close(&self) {
        let mut inner = self.lock();
        if inner.client.take().is_some() {
            tracing::info!("Orchestrator closed");
        }
    }

    /// Most recent configuration snapshot
    pub fn current_config(&self) -> Option<UpgradeConfig> {
        self.lock().current.clone()
    }

    /// Gate baseline
    pub fn last_triggered_version(&self) -> String {
        self.lock().gate.last_triggered().to_string()
    }

    /// The running workflow, if any
    pub fn active_workflow(&self) -> Option<ActiveWorkflow> {
        self.lock().active.clone()
    }

    /// Spawn `workflow`; the active marker must already be set
    fn spawn(&self, kind: WorkflowKind, workflow: Workflow) -> WorkflowHandle {
        let guard = ActiveGuard {
            inner: Arc::clone(&self.inner),
        };
        let target_version = workflow.target_version().to_string();

        let task = tokio::spawn(async move {
            let _guard = guard;
            match kind {
                WorkflowKind::Update => workflow.run().await,
                WorkflowKind::Resume => workflow.resume().await,
            }
        });

        WorkflowHandle::new(kind, target_version, task)
    }
}
