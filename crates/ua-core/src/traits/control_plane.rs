//! Control-plane traits
//!
//! The orchestrator drives the device exclusively through these traits, so
//! the workflow can run against the tonic client in production and against
//! scripted fakes in tests.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

use crate::error::ControlPlaneError;
use ua_protocol::{FirmwareRequest, OsVersion, RebootRequest, RebootStatus, UpdateProgress};

/// Events of a running firmware update, ending when the peer closes the stream
pub type UpdateStream = BoxStream<'static, Result<UpdateProgress, ControlPlaneError>>;

/// Abstraction over the remote control-plane service
///
/// Implementations do not apply deadlines of their own; the workflow wraps
/// every call in a timeout.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Device clock in nanoseconds since the Unix epoch
    async fn get_time(&self) -> Result<u64, ControlPlaneError>;

    /// Version of the running OS image
    async fn get_os_version(&self) -> Result<OsVersion, ControlPlaneError>;

    /// Ask the device to reboot
    async fn reboot(&self, request: RebootRequest) -> Result<(), ControlPlaneError>;

    /// Whether a reboot is still pending
    async fn get_reboot_status(&self) -> Result<RebootStatus, ControlPlaneError>;

    /// Start a firmware update.
    ///
    /// The request is sent and the sending half closed before this returns;
    /// the caller only reads progress events.
    async fn run_firmware_update(
        &self,
        request: FirmwareRequest,
    ) -> Result<UpdateStream, ControlPlaneError>;
}

/// Creates control-plane clients for a target address
pub trait Connector: Send + Sync {
    /// Bind a client to `target`.
    ///
    /// Connection establishment may be deferred to the first call.
    fn connect(&self, target: &str) -> Result<Arc<dyn ControlPlane>, ControlPlaneError>;
}
