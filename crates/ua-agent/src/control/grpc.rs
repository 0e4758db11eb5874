//! tonic-backed control-plane client
//!
//! Talks gNOI `System`/`OS` and the SONiC firmware upgrade service over a
//! plaintext HTTP/2 channel. The channel connects lazily, so binding a client
//! to a peer that is down (for instance mid-reboot) succeeds and individual
//! calls report `UNAVAILABLE` instead.

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tonic::transport::{Channel, Endpoint};

use ua_core::error::ControlPlaneError;
use ua_core::traits::{Connector, ControlPlane, UpdateStream};
use ua_protocol::proto::os::os_client::OsClient;
use ua_protocol::proto::os::VerifyRequest;
use ua_protocol::proto::sonic::sonic_upgrade_service_client::SonicUpgradeServiceClient;
use ua_protocol::proto::sonic::UpdateFirmwareRequest;
use ua_protocol::proto::system::system_client::SystemClient;
use ua_protocol::proto::system::{self, RebootStatusRequest, TimeRequest};
use ua_protocol::{
    FirmwareRequest, OsVersion, RebootRequest, RebootStatus, Rpc, UpdateProgress,
};

/// Map a tonic status onto the control-plane error taxonomy
fn status_error(rpc: Rpc, status: tonic::Status) -> ControlPlaneError {
    ControlPlaneError::status(rpc, status.code().into(), status.message())
}

/// Control-plane client over a single gRPC channel
#[derive(Clone)]
pub struct GrpcControlPlane {
    target: String,
    system: SystemClient<Channel>,
    os: OsClient<Channel>,
    upgrade: SonicUpgradeServiceClient<Channel>,
}

impl GrpcControlPlane {
    /// Bind a client to `target` (`host:port`, or a full `http://` URI).
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect_lazy(target: &str) -> Result<Self, ControlPlaneError> {
        if target.trim().is_empty() {
            return Err(ControlPlaneError::InvalidTarget {
                target: target.to_string(),
                reason: "target is empty".to_string(),
            });
        }

        let uri = if target.contains("://") {
            target.to_string()
        } else {
            format!("http://{}", target)
        };

        let endpoint =
            Endpoint::from_shared(uri).map_err(|e| ControlPlaneError::InvalidTarget {
                target: target.to_string(),
                reason: e.to_string(),
            })?;
        let channel = endpoint.connect_lazy();

        Ok(Self {
            target: target.to_string(),
            system: SystemClient::new(channel.clone()),
            os: OsClient::new(channel.clone()),
            upgrade: SonicUpgradeServiceClient::new(channel),
        })
    }

    /// Address this client is bound to
    pub fn target(&self) -> &str {
        &self.target
    }
}

#[async_trait]
impl ControlPlane for GrpcControlPlane {
    async fn get_time(&self) -> Result<u64, ControlPlaneError> {
        let mut client = self.system.clone();
        let response = client
            .time(TimeRequest {})
            .await
            .map_err(|s| status_error(Rpc::GetTime, s))?;
        Ok(response.into_inner().time)
    }

    async fn get_os_version(&self) -> Result<OsVersion, ControlPlaneError> {
        let mut client = self.os.clone();
        let response = client
            .verify(VerifyRequest {})
            .await
            .map_err(|s| status_error(Rpc::GetOsVersion, s))?;
        Ok(response.into_inner().into())
    }

    async fn reboot(&self, request: RebootRequest) -> Result<(), ControlPlaneError> {
        let mut client = self.system.clone();
        client
            .reboot(system::RebootRequest::from(&request))
            .await
            .map_err(|s| status_error(Rpc::Reboot, s))?;
        Ok(())
    }

    async fn get_reboot_status(&self) -> Result<RebootStatus, ControlPlaneError> {
        let mut client = self.system.clone();
        let response = client
            .reboot_status(RebootStatusRequest {})
            .await
            .map_err(|s| status_error(Rpc::GetRebootStatus, s))?;
        Ok(response.into_inner().into())
    }

    async fn run_firmware_update(
        &self,
        request: FirmwareRequest,
    ) -> Result<UpdateStream, ControlPlaneError> {
        let mut client = self.upgrade.clone();

        // A single-item request stream: the send side closes after the parameters
        let outbound = futures::stream::iter(vec![UpdateFirmwareRequest::from(&request)]);
        let inbound = client
            .update_firmware(outbound)
            .await
            .map_err(|s| status_error(Rpc::RunFirmwareUpdate, s))?
            .into_inner();

        let events = inbound.map(|item| match item {
            Ok(status) => UpdateProgress::try_from(status).map_err(|source| {
                ControlPlaneError::Malformed {
                    rpc: Rpc::RunFirmwareUpdate,
                    source,
                }
            }),
            Err(status) => Err(status_error(Rpc::RunFirmwareUpdate, status)),
        });

        Ok(events.boxed())
    }
}

/// Connector producing lazily-connected gRPC clients
#[derive(Debug, Clone, Default)]
pub struct GrpcConnector;

impl GrpcConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for GrpcConnector {
    fn connect(&self, target: &str) -> Result<Arc<dyn ControlPlane>, ControlPlaneError> {
        let client = GrpcControlPlane::connect_lazy(target)?;
        tracing::debug!(address = %client.target(), "Bound control-plane client");
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_target_is_rejected() {
        let result = GrpcControlPlane::connect_lazy("  ");
        assert!(matches!(
            result,
            Err(ControlPlaneError::InvalidTarget { .. })
        ));
    }

    #[tokio::test]
    async fn test_lazy_connect_does_not_dial() {
        // Nothing listens here; binding must still succeed
        let client = GrpcControlPlane::connect_lazy("127.0.0.1:1").unwrap();
        assert_eq!(client.target(), "127.0.0.1:1");
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_a_real_error() {
        let client = GrpcControlPlane::connect_lazy("127.0.0.1:1").unwrap();
        let err = client.get_time().await.unwrap_err();
        assert!(matches!(err, ControlPlaneError::Status { rpc: Rpc::GetTime, .. }));
        assert!(!err.is_unimplemented());
    }

    #[test]
    fn test_status_mapping() {
        let err = status_error(Rpc::Reboot, tonic::Status::unimplemented("no reboot"));
        assert!(err.is_unimplemented());
        assert_eq!(err.to_string(), "Reboot failed with UNIMPLEMENTED: no reboot");
    }
}
