//! Control-plane probe command

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::output::{format_probe, print_error, print_info, print_success, print_warning};
use ua_agent::GrpcControlPlane;
use ua_core::config;
use ua_core::error::ControlPlaneError;
use ua_core::time::format_unix_nanos;
use ua_core::traits::ControlPlane;
use ua_protocol::Rpc;

/// Outcome of one diagnostic call
#[derive(Debug)]
pub struct ProbeResult {
    pub rpc: Rpc,
    pub outcome: Result<String, ControlPlaneError>,
}

impl ProbeResult {
    /// Failed with something other than "not implemented"
    pub fn is_failure(&self) -> bool {
        matches!(&self.outcome, Err(e) if !e.is_unimplemented())
    }
}

async fn call<T, F>(rpc: Rpc, after: Duration, fut: F) -> Result<T, ControlPlaneError>
where
    F: Future<Output = Result<T, ControlPlaneError>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(ControlPlaneError::Timeout { rpc, after }),
    }
}

/// Run the read-only diagnostics against `client`
pub async fn run_probes(client: &dyn ControlPlane, timeout: Duration) -> Vec<ProbeResult> {
    let time = call(Rpc::GetTime, timeout, client.get_time())
        .await
        .map(|nanos| format!("{} ({}ns)", format_unix_nanos(nanos), nanos));

    let os_version = call(Rpc::GetOsVersion, timeout, client.get_os_version())
        .await
        .map(|v| match v.activation_failure() {
            Some(failure) => format!("{} (last activation failed: {})", v.version, failure),
            None => v.version,
        });

    let reboot_status = call(Rpc::GetRebootStatus, timeout, client.get_reboot_status())
        .await
        .map(|s| {
            if s.active {
                format!("reboot active: {}", s.reason)
            } else {
                "no reboot active".to_string()
            }
        });

    vec![
        ProbeResult {
            rpc: Rpc::GetTime,
            outcome: time,
        },
        ProbeResult {
            rpc: Rpc::GetOsVersion,
            outcome: os_version,
        },
        ProbeResult {
            rpc: Rpc::GetRebootStatus,
            outcome: reboot_status,
        },
    ]
}

/// Probe the control plane named by `target`, or by the config file
pub async fn probe_command(
    config_path: &Path,
    target: Option<&str>,
    timeout: Duration,
) -> Result<()> {
    let target = match target {
        Some(t) => t.to_string(),
        None => {
            let file = config::load_config(config_path)
                .with_context(|| format!("Failed to load config: {:?}", config_path))?;
            file.upgrade.control_target
        }
    };

    let client = GrpcControlPlane::connect_lazy(&target)?;
    print_info(&format!("Probing control plane at {}", client.target()));

    let results = run_probes(&client, timeout).await;
    println!("{}", format_probe(&results));

    let failures = results.iter().filter(|r| r.is_failure()).count();
    let unimplemented = results
        .iter()
        .filter(|r| matches!(&r.outcome, Err(e) if e.is_unimplemented()))
        .count();

    if failures > 0 {
        print_error(&format!("{} of {} probes failed", failures, results.len()));
        anyhow::bail!("Control plane at {} is not healthy", target);
    }
    if unimplemented > 0 {
        print_warning(&format!(
            "{} probe(s) not implemented by the peer",
            unimplemented
        ));
    } else {
        print_success("Control plane is reachable");
    }
    Ok(())
}
