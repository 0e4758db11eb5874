//! Scripted control plane for orchestrator tests

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ua_core::error::ControlPlaneError;
use ua_core::state::{MemoryStateStore, UpgradeRecord};
use ua_core::traits::{Connector, ControlPlane, UpdateStream};
use ua_protocol::{
    FirmwareRequest, OsVersion, RebootRequest, RebootStatus, Rpc, RpcCode, UpdatePhase,
    UpdateProgress,
};

pub fn unimplemented(rpc: Rpc) -> ControlPlaneError {
    ControlPlaneError::status(rpc, RpcCode::Unimplemented, "unknown method")
}

pub fn unavailable(rpc: Rpc) -> ControlPlaneError {
    ControlPlaneError::status(rpc, RpcCode::Unavailable, "connection refused")
}

pub fn event(phase: UpdatePhase, line: &str) -> UpdateProgress {
    UpdateProgress {
        log_line: line.to_string(),
        phase,
        exit_code: None,
    }
}

pub fn failed(exit_code: i32) -> UpdateProgress {
    UpdateProgress {
        log_line: "update script aborted".to_string(),
        phase: UpdatePhase::Failed,
        exit_code: Some(exit_code),
    }
}

/// How the firmware update call behaves
#[derive(Clone)]
pub enum UpdateScript {
    /// Stream these events, then end the stream
    Events(Vec<UpdateProgress>),
    /// Fail before any event is read
    OpenError(ControlPlaneError),
    /// Stream these events, then fail
    StreamError(Vec<UpdateProgress>, ControlPlaneError),
    /// Never produce an event
    Hang,
}

pub struct FakeControlPlane {
    calls: Mutex<Vec<Rpc>>,
    time: Result<u64, ControlPlaneError>,
    os_version: Result<OsVersion, ControlPlaneError>,
    update: UpdateScript,
    reboot: Result<(), ControlPlaneError>,
    reboot_status: Mutex<VecDeque<Result<RebootStatus, ControlPlaneError>>>,
    reboot_status_delay: Duration,
    reboot_requests: Mutex<Vec<RebootRequest>>,
    update_requests: Mutex<Vec<FirmwareRequest>>,
    observed_store: Option<Arc<MemoryStateStore>>,
    record_at_reboot: Mutex<Option<Option<UpgradeRecord>>>,
}

impl FakeControlPlane {
    /// A peer on which every call succeeds
    pub fn healthy() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            time: Ok(1_700_000_000_000_000_000),
            os_version: Ok(OsVersion {
                version: "SONiC.1.1.0".to_string(),
                activation_fail_message: String::new(),
            }),
            update: UpdateScript::Events(vec![
                event(UpdatePhase::Started, "starting"),
                event(UpdatePhase::Running, "writing image"),
                event(UpdatePhase::Succeeded, "done"),
            ]),
            reboot: Ok(()),
            reboot_status: Mutex::new(VecDeque::new()),
            reboot_status_delay: Duration::ZERO,
            reboot_requests: Mutex::new(Vec::new()),
            update_requests: Mutex::new(Vec::new()),
            observed_store: None,
            record_at_reboot: Mutex::new(None),
        }
    }

    /// A peer that implements nothing
    pub fn unimplemented_everywhere() -> Self {
        Self {
            time: Err(unimplemented(Rpc::GetTime)),
            os_version: Err(unimplemented(Rpc::GetOsVersion)),
            update: UpdateScript::OpenError(unimplemented(Rpc::RunFirmwareUpdate)),
            reboot: Err(unimplemented(Rpc::Reboot)),
            ..Self::healthy()
        }
        .with_reboot_statuses(vec![Err(unimplemented(Rpc::GetRebootStatus))])
    }

    pub fn with_time(mut self, result: Result<u64, ControlPlaneError>) -> Self {
        self.time = result;
        self
    }

    pub fn with_os_version(mut self, result: Result<OsVersion, ControlPlaneError>) -> Self {
        self.os_version = result;
        self
    }

    pub fn with_update(mut self, script: UpdateScript) -> Self {
        self.update = script;
        self
    }

    pub fn with_reboot(mut self, result: Result<(), ControlPlaneError>) -> Self {
        self.reboot = result;
        self
    }

    /// Responses returned by successive status polls; once exhausted the
    /// peer reports the reboot as finished
    pub fn with_reboot_statuses(
        self,
        statuses: Vec<Result<RebootStatus, ControlPlaneError>>,
    ) -> Self {
        *self.reboot_status.lock().unwrap() = statuses.into();
        self
    }

    /// Answer every status poll only after `delay`
    pub fn with_reboot_status_delay(mut self, delay: Duration) -> Self {
        self.reboot_status_delay = delay;
        self
    }

    /// Capture the contents of `store` at the moment the reboot is requested
    pub fn observing(mut self, store: Arc<MemoryStateStore>) -> Self {
        self.observed_store = Some(store);
        self
    }

    pub fn calls(&self) -> Vec<Rpc> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, rpc: Rpc) -> usize {
        self.calls().iter().filter(|c| **c == rpc).count()
    }

    pub fn reboot_requests(&self) -> Vec<RebootRequest> {
        self.reboot_requests.lock().unwrap().clone()
    }

    pub fn update_requests(&self) -> Vec<FirmwareRequest> {
        self.update_requests.lock().unwrap().clone()
    }

    /// Store contents seen by the reboot call; `None` if reboot never ran
    pub fn record_at_reboot(&self) -> Option<Option<UpgradeRecord>> {
        self.record_at_reboot.lock().unwrap().clone()
    }

    fn record(&self, rpc: Rpc) {
        self.calls.lock().unwrap().push(rpc);
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn get_time(&self) -> Result<u64, ControlPlaneError> {
        self.record(Rpc::GetTime);
        self.time.clone()
    }

    async fn get_os_version(&self) -> Result<OsVersion, ControlPlaneError> {
        self.record(Rpc::GetOsVersion);
        self.os_version.clone()
    }

    async fn reboot(&self, request: RebootRequest) -> Result<(), ControlPlaneError> {
        self.record(Rpc::Reboot);
        self.reboot_requests.lock().unwrap().push(request);
        if let Some(store) = &self.observed_store {
            *self.record_at_reboot.lock().unwrap() = Some(store.peek());
        }
        self.reboot.clone()
    }

    async fn get_reboot_status(&self) -> Result<RebootStatus, ControlPlaneError> {
        self.record(Rpc::GetRebootStatus);
        if !self.reboot_status_delay.is_zero() {
            tokio::time::sleep(self.reboot_status_delay).await;
        }
        let next = self.reboot_status.lock().unwrap().pop_front();
        next.unwrap_or(Ok(RebootStatus {
            active: false,
            reason: String::new(),
        }))
    }

    async fn run_firmware_update(
        &self,
        request: FirmwareRequest,
    ) -> Result<UpdateStream, ControlPlaneError> {
        self.record(Rpc::RunFirmwareUpdate);
        self.update_requests.lock().unwrap().push(request);

        match self.update.clone() {
            UpdateScript::Events(events) => {
                Ok(futures::stream::iter(events.into_iter().map(Ok)).boxed())
            }
            UpdateScript::OpenError(err) => Err(err),
            UpdateScript::StreamError(events, err) => {
                let items = events
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(err)));
                Ok(futures::stream::iter(items).boxed())
            }
            UpdateScript::Hang => Ok(futures::stream::pending().boxed()),
        }
    }
}

/// Connector handing out fakes by target address
pub struct FakeConnector {
    default: Arc<FakeControlPlane>,
    by_target: HashMap<String, Arc<FakeControlPlane>>,
    targets: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new(default: Arc<FakeControlPlane>) -> Self {
        Self {
            default,
            by_target: HashMap::new(),
            targets: Mutex::new(Vec::new()),
        }
    }

    pub fn with_target(mut self, target: &str, client: Arc<FakeControlPlane>) -> Self {
        self.by_target.insert(target.to_string(), client);
        self
    }

    /// Targets connected to, in order
    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

impl Connector for FakeConnector {
    fn connect(&self, target: &str) -> Result<Arc<dyn ControlPlane>, ControlPlaneError> {
        if target.is_empty() {
            return Err(ControlPlaneError::InvalidTarget {
                target: String::new(),
                reason: "target is empty".to_string(),
            });
        }
        self.targets.lock().unwrap().push(target.to_string());
        let client: Arc<dyn ControlPlane> = match self.by_target.get(target) {
            Some(client) => client.clone(),
            None => self.default.clone(),
        };
        Ok(client)
    }
}
