//! Output formatting utilities for the CLI
//!
//! Tables for the upgrade record and probe results, plus the colored status
//! message helpers used by every command.

use tabled::{
    settings::{Style, Width},
    Table, Tabled,
};

use crate::commands::ProbeResult;
use ua_core::state::UpgradeRecord;
use ua_core::time::{elapsed_secs, format_unix_secs};

/// Format the stored upgrade record as a two-column table
pub fn format_record(record: &UpgradeRecord) -> String {
    #[derive(Tabled)]
    struct FieldRow {
        #[tabled(rename = "FIELD")]
        field: &'static str,
        #[tabled(rename = "VALUE")]
        value: String,
    }

    let started = if record.started_at == 0 {
        "-".to_string()
    } else {
        format!(
            "{} ({} ago)",
            format_unix_secs(record.started_at),
            format_duration(elapsed_secs(record.started_at))
        )
    };

    let rows = vec![
        FieldRow {
            field: "In progress",
            value: record.in_progress.to_string(),
        },
        FieldRow {
            field: "Target version",
            value: record.target_version.clone(),
        },
        FieldRow {
            field: "Control target",
            value: record.config.control_target.clone(),
        },
        FieldRow {
            field: "Firmware source",
            value: record.config.firmware_source.clone(),
        },
        FieldRow {
            field: "Update CPLD firmware",
            value: record
                .config
                .firmware_options
                .update_mlnx_cpld_fw
                .to_string(),
        },
        FieldRow {
            field: "Ignore unimplemented",
            value: record.config.ignore_unimplemented.to_string(),
        },
        FieldRow {
            field: "Checkpointed",
            value: started,
        },
    ];

    Table::new(rows)
        .with(Style::rounded())
        .with(Width::wrap(100))
        .to_string()
}

/// Format probe results as a table
pub fn format_probe(results: &[ProbeResult]) -> String {
    #[derive(Tabled)]
    struct ProbeRow {
        #[tabled(rename = "RPC")]
        rpc: String,
        #[tabled(rename = "RESULT")]
        result: &'static str,
        #[tabled(rename = "DETAIL")]
        detail: String,
    }

    let rows: Vec<ProbeRow> = results
        .iter()
        .map(|r| {
            let (result, detail) = match &r.outcome {
                Ok(detail) => ("ok", detail.clone()),
                Err(e) if e.is_unimplemented() => ("unimplemented", e.to_string()),
                Err(e) => ("error", e.to_string()),
            };
            ProbeRow {
                rpc: r.rpc.to_string(),
                result,
                detail,
            }
        })
        .collect();

    Table::new(rows)
        .with(Style::rounded())
        .with(Width::wrap(100))
        .to_string()
}

/// Format duration in human-readable form
fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow
///
/// Outputs to stderr.
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use ua_core::config::UpgradeConfig;
    use ua_core::error::ControlPlaneError;
    use ua_protocol::{Rpc, RpcCode};

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(7260), "2h 1m");
        assert_eq!(format_duration(90000), "1d 1h");
    }

    #[test]
    fn test_format_record() {
        let record = UpgradeRecord {
            in_progress: true,
            target_version: "1.1.0".to_string(),
            config: UpgradeConfig {
                control_target: "localhost:50051".to_string(),
                desired_version: "1.1.0".to_string(),
                ..Default::default()
            },
            started_at: 0,
        };
        let table = format_record(&record);
        assert!(table.contains("Target version"));
        assert!(table.contains("1.1.0"));
        assert!(table.contains("localhost:50051"));
    }

    #[test]
    fn test_format_probe() {
        let results = vec![
            ProbeResult {
                rpc: Rpc::GetTime,
                outcome: Ok("2023-11-14T22:13:20Z".to_string()),
            },
            ProbeResult {
                rpc: Rpc::GetRebootStatus,
                outcome: Err(ControlPlaneError::status(
                    Rpc::GetRebootStatus,
                    RpcCode::Unimplemented,
                    "unknown method",
                )),
            },
        ];
        let table = format_probe(&results);
        assert!(table.contains("GetTime"));
        assert!(table.contains("ok"));
        assert!(table.contains("unimplemented"));
    }
}
