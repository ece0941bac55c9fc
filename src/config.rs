// config.rs - Config loading, layering, resolution

use crate::patch::roles::RequiredNames;
use crate::rescan::{DEFAULT_RESCAN_PROGRAM, DEFAULT_RESCAN_TIMEOUT};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Name of the optional config file looked up next to the executable.
pub const CONFIG_FILE_NAME: &str = "elevate-service.json";

/// One configuration layer. Absent fields defer to lower layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElevateConfig {
    pub sysroot: Option<PathBuf>,
    pub runtime_dir: Option<PathBuf>,
    pub rescan_command: Option<String>,
    pub rescan_timeout_secs: Option<u64>,
    pub required_names: Option<Vec<String>>,
}

/// Resolved config with concrete values (no Options).
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub sysroot: PathBuf,
    pub runtime_dir: PathBuf,
    pub rescan_command: String,
    pub rescan_timeout: Duration,
    pub required_names: RequiredNames,
}

impl ElevateConfig {
    /// Merge another config on top of self (other wins for present fields).
    pub fn merge(self, other: ElevateConfig) -> ElevateConfig {
        ElevateConfig {
            sysroot: other.sysroot.or(self.sysroot),
            runtime_dir: other.runtime_dir.or(self.runtime_dir),
            rescan_command: other.rescan_command.or(self.rescan_command),
            rescan_timeout_secs: other.rescan_timeout_secs.or(self.rescan_timeout_secs),
            required_names: other.required_names.or(self.required_names),
        }
    }

    /// Resolve to concrete values. `exe_dir` backs the runtime directory default.
    pub fn resolve(self, exe_dir: &Path) -> ResolvedConfig {
        ResolvedConfig {
            sysroot: self.sysroot.unwrap_or_else(|| PathBuf::from("/")),
            runtime_dir: self.runtime_dir.unwrap_or_else(|| exe_dir.to_path_buf()),
            rescan_command: self
                .rescan_command
                .unwrap_or_else(|| DEFAULT_RESCAN_PROGRAM.to_string()),
            rescan_timeout: self
                .rescan_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RESCAN_TIMEOUT),
            required_names: self
                .required_names
                .map(RequiredNames::new)
                .unwrap_or_default(),
        }
    }
}

/// Load an optional config layer, returning an empty layer if it is missing or broken.
pub fn load_config_layer(path: &Path) -> ElevateConfig {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return ElevateConfig::default(),
    };
    match serde_json::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            warn!("Ignoring unreadable config {}: {}", path.display(), e);
            ElevateConfig::default()
        }
    }
}

/// Load a config layer the user asked for explicitly. Errors are fatal.
pub fn load_required_config(path: &Path) -> Result<ElevateConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Config file not found: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid config file: {}", path.display()))
}

/// Resolve the run configuration by merging layers.
///
/// Layers (lowest -> highest priority):
///   1. Hardcoded defaults
///   2. `elevate-service.json` next to the executable
///   3. The file given with `--config`
///   4. Command-line flags
pub fn resolve_config(
    exe_dir: &Path,
    explicit: Option<&Path>,
    cli: ElevateConfig,
) -> Result<ResolvedConfig> {
    let mut config = load_config_layer(&exe_dir.join(CONFIG_FILE_NAME));
    if let Some(path) = explicit {
        config = config.merge(load_required_config(path)?);
    }
    Ok(config.merge(cli).resolve(exe_dir))
}
