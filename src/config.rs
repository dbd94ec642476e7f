//! Sidecar configuration.
//!
//! Resolution order, highest first:
//! 1. Environment (`PREPKITD_WORKSPACE`, `PREPKITD_LOG`)
//! 2. TOML file named by `PREPKITD_CONFIG`
//! 3. Defaults

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG: &str = "PREPKITD_CONFIG";
pub const ENV_WORKSPACE: &str = "PREPKITD_WORKSPACE";
pub const ENV_LOG: &str = "PREPKITD_LOG";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        DaemonConfig {
            workspace: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// On-disk shape; every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    workspace: Option<PathBuf>,
    log_filter: Option<String>,
}

impl DaemonConfig {
    /// Loads from the process environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::resolve(|key| std::env::var(key).ok())
    }

    /// Resolves with `env` standing in for the process environment.
    pub fn resolve(env: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let file = match env(ENV_CONFIG) {
            Some(path) => read_file(Path::new(&path))?,
            None => FileConfig::default(),
        };

        let mut cfg = DaemonConfig::from_file(file);
        if let Some(ws) = env(ENV_WORKSPACE) {
            cfg.workspace = Some(PathBuf::from(ws));
        }
        if let Some(filter) = env(ENV_LOG) {
            cfg.log_filter = filter;
        }
        Ok(cfg)
    }

    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        Ok(Self::from_file(toml::from_str(text)?))
    }

    fn from_file(file: FileConfig) -> Self {
        let defaults = DaemonConfig::default();
        DaemonConfig {
            workspace: file.workspace,
            log_filter: file
                .log_filter
                .filter(|f| !f.trim().is_empty())
                .unwrap_or(defaults.log_filter),
        }
    }
}

fn read_file(path: &Path) -> anyhow::Result<FileConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
}
