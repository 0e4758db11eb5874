//! Config command implementations

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::output::{print_info, print_success, print_warning};
use ua_core::config::{self, ConfigFormat};

/// Keys the desired version may be stored under, preferred first
const VERSION_KEYS: [&str; 2] = ["desiredVersion", "targetVersion"];

/// Result of rewriting the desired version in a config document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionChange {
    /// New file contents
    pub content: String,
    /// Key the version was written under
    pub key: &'static str,
    /// Version stored before the edit, if any
    pub previous: Option<String>,
}

/// Show current configuration
pub fn config_show(config_path: &Path) -> Result<()> {
    if !config_path.exists() {
        print_warning(&format!("No configuration file found at {:?}", config_path));
        print_info("Run 'upgrade-ctl config set-version <version>' to create one");
        return Ok(());
    }

    print_info(&format!("Configuration file: {:?}", config_path));
    println!();

    let content = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
    println!("{}", content);

    match config::load_config(config_path) {
        Ok(file) if file.upgrade.desired_version.is_empty() => {
            print_info("No desired version set");
        }
        Ok(file) => {
            print_info(&format!(
                "Desired version: {}",
                file.upgrade.desired_version
            ));
        }
        Err(e) => print_warning(&format!("The agent cannot load this file: {}", e)),
    }

    Ok(())
}

/// Set the desired version in the config file, optionally after a delay.
///
/// With `only_if`, the file is left alone unless it currently names that version.
pub async fn config_set_version(
    config_path: &Path,
    version: &str,
    delay: Option<u64>,
    only_if: Option<&str>,
) -> Result<()> {
    if version.trim().is_empty() {
        anyhow::bail!("Version must not be empty");
    }

    if let Some(secs) = delay.filter(|s| *s > 0) {
        print_info(&format!(
            "Waiting {}s before setting desired version {}",
            secs, version
        ));
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    let content = if config_path.exists() {
        std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?
    } else {
        print_info(&format!("Creating configuration file: {:?}", config_path));
        String::new()
    };

    let change = set_version_in(
        &content,
        ConfigFormat::from_path(config_path),
        version,
        only_if,
    )?;

    if change.previous.as_deref() == Some(version) {
        print_info(&format!("Desired version is already {}", version));
        return Ok(());
    }

    write_atomically(config_path, &change.content)?;

    print_success(&format!(
        "Set {} = {} (was {})",
        change.key,
        version,
        change.previous.as_deref().unwrap_or("unset")
    ));
    Ok(())
}

/// Rewrite the desired version inside a config document.
///
/// The key already present in the document is reused, so files written for
/// the older `targetVersion` name keep it. Other keys are preserved.
pub fn set_version_in(
    content: &str,
    format: ConfigFormat,
    version: &str,
    only_if: Option<&str>,
) -> Result<VersionChange> {
    match format {
        ConfigFormat::Toml => set_version_toml(content, version, only_if),
        ConfigFormat::Yaml => set_version_yaml(content, version, only_if),
    }
}

fn set_version_toml(content: &str, version: &str, only_if: Option<&str>) -> Result<VersionChange> {
    let mut table: toml::Table = if content.trim().is_empty() {
        toml::Table::new()
    } else {
        toml::from_str(content).with_context(|| "Failed to parse config file")?
    };

    let key = VERSION_KEYS
        .into_iter()
        .find(|k| table.contains_key(*k))
        .unwrap_or(VERSION_KEYS[0]);

    let previous = table.get(key).and_then(|v| match v {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        _ => None,
    });
    check_only_if(previous.as_deref(), only_if)?;

    table.insert(key.to_string(), toml::Value::String(version.to_string()));

    Ok(VersionChange {
        content: toml::to_string_pretty(&table)?,
        key,
        previous,
    })
}

fn set_version_yaml(content: &str, version: &str, only_if: Option<&str>) -> Result<VersionChange> {
    let mut doc: serde_yaml::Value = if content.trim().is_empty() {
        serde_yaml::Value::Null
    } else {
        serde_yaml::from_str(content).with_context(|| "Failed to parse config file")?
    };
    if doc.is_null() {
        doc = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
    }

    let map = doc
        .as_mapping_mut()
        .ok_or_else(|| anyhow::anyhow!("Config file must be a mapping at the top level"))?;

    let key = VERSION_KEYS
        .into_iter()
        .find(|k| map.contains_key(*k))
        .unwrap_or(VERSION_KEYS[0]);

    let previous = map.get(key).and_then(|v| match v {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    check_only_if(previous.as_deref(), only_if)?;

    map.insert(
        serde_yaml::Value::String(key.to_string()),
        serde_yaml::Value::String(version.to_string()),
    );

    Ok(VersionChange {
        content: serde_yaml::to_string(&doc)?,
        key,
        previous,
    })
}

fn check_only_if(current: Option<&str>, expected: Option<&str>) -> Result<()> {
    if let Some(expected) = expected {
        let current = current.unwrap_or("");
        if current != expected {
            anyhow::bail!(
                "Desired version is {:?}, not {:?}; leaving the config unchanged",
                current,
                expected
            );
        }
    }
    Ok(())
}

/// Replace `path` with `content` via a synced temp file in the same directory.
///
/// The agent watches the directory, so it must never observe a half-written file.
fn write_atomically(path: &Path, content: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create config directory: {:?}", dir))?;

    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Config path has no file name: {:?}", path))?;
    let tmp = dir.join(format!(".{}.tmp", file_name.to_string_lossy()));

    let mut file = std::fs::File::create(&tmp)
        .with_context(|| format!("Failed to create temp file: {:?}", tmp))?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_keeps_legacy_key() {
        let yaml = "grpcTarget: localhost:50051\ntargetVersion: \"1.0.0\"\n";
        let change = set_version_in(yaml, ConfigFormat::Yaml, "1.1.0", None).unwrap();

        assert_eq!(change.key, "targetVersion");
        assert_eq!(change.previous.as_deref(), Some("1.0.0"));

        let parsed = config::parse_config(&change.content, ConfigFormat::Yaml).unwrap();
        assert_eq!(parsed.upgrade.desired_version, "1.1.0");
        assert_eq!(parsed.upgrade.control_target, "localhost:50051");
    }

    #[test]
    fn test_toml_inserts_key() {
        let toml = "controlTarget = \"10.0.0.1:8080\"\n\n[agent]\nstateFile = \"/data/state.json\"\n";
        let change = set_version_in(toml, ConfigFormat::Toml, "2.0", None).unwrap();

        assert_eq!(change.key, "desiredVersion");
        assert_eq!(change.previous, None);

        let parsed = config::parse_config(&change.content, ConfigFormat::Toml).unwrap();
        assert_eq!(parsed.upgrade.desired_version, "2.0");
        assert_eq!(parsed.upgrade.control_target, "10.0.0.1:8080");
        assert_eq!(
            parsed.agent.state_file,
            std::path::PathBuf::from("/data/state.json")
        );
    }

    #[test]
    fn test_empty_document() {
        let change = set_version_in("", ConfigFormat::Yaml, "1.0", None).unwrap();
        let parsed = config::parse_config(&change.content, ConfigFormat::Yaml).unwrap();
        assert_eq!(parsed.upgrade.desired_version, "1.0");
    }

    #[test]
    fn test_only_if_mismatch_is_rejected() {
        let yaml = "desiredVersion: \"1.0.0\"\n";
        let err = set_version_in(yaml, ConfigFormat::Yaml, "2.0.0", Some("0.9.0")).unwrap_err();
        assert!(err.to_string().contains("leaving the config unchanged"));

        assert!(set_version_in(yaml, ConfigFormat::Yaml, "2.0.0", Some("1.0.0")).is_ok());
    }

    #[test]
    fn test_non_mapping_yaml_is_rejected() {
        assert!(set_version_in("- a\n- b\n", ConfigFormat::Yaml, "1.0", None).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_set_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "controlTarget: localhost:50051\ndesiredVersion: \"1.0\"\n")
            .unwrap();

        let started = tokio::time::Instant::now();
        config_set_version(&path, "1.1", Some(30), None)
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_secs(30));

        let loaded = config::load_config(&path).unwrap();
        assert_eq!(loaded.upgrade.desired_version, "1.1");
        // No temp file left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_set_version_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        config_set_version(&path, "3.0", None, None).await.unwrap();

        let loaded = config::load_config(&path).unwrap();
        assert_eq!(loaded.upgrade.desired_version, "3.0");
    }
}
