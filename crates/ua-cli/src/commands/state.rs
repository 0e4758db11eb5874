//! Durable upgrade record commands

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::{format_record, print_info, print_success, print_warning};
use ua_core::config::{self, DEFAULT_STATE_FILE};
use ua_core::state::{FileStateStore, StateStore};

/// Pick the state file: explicit flag, else the config file's `agent.stateFile`,
/// else the built-in default
pub fn resolve_state_file(config_path: &Path, flag: Option<&PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path.clone();
    }

    match config::load_config(config_path) {
        Ok(file) => file.agent.state_file,
        Err(e) => {
            tracing::debug!("Using default state file ({})", e);
            PathBuf::from(DEFAULT_STATE_FILE)
        }
    }
}

/// Show the stored upgrade record
pub async fn state_show(state_file: &Path, json: bool) -> Result<()> {
    let store = FileStateStore::new(state_file);
    let record = store
        .load()
        .await
        .with_context(|| format!("Failed to read upgrade state: {:?}", state_file))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    match record {
        Some(record) => {
            print_info(&format!("Upgrade state file: {:?}", state_file));
            println!("{}", format_record(&record));
            if record.in_progress {
                print_warning(&format!(
                    "Verification of {} is owed; the agent resumes it on start",
                    record.target_version
                ));
            }
        }
        None => print_info("No upgrade in progress"),
    }

    Ok(())
}

/// Remove the stored upgrade record
pub async fn state_clear(state_file: &Path) -> Result<()> {
    let store = FileStateStore::new(state_file);
    let had_record = matches!(store.load().await, Ok(Some(_)));

    store
        .clear()
        .await
        .with_context(|| format!("Failed to clear upgrade state: {:?}", state_file))?;

    if had_record {
        print_success(&format!("Cleared upgrade state: {:?}", state_file));
    } else {
        print_info("No upgrade state to clear");
    }
    Ok(())
}
