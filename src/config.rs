//! Run configuration.
//!
//! An optional JSON file supplies defaults; command-line flags override it.
use crate::tool::{Directive, DEFAULT_DIRECTIVE, DEFAULT_TOOL};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub schema_version: u32,
    #[serde(default = "default_tool")]
    pub tool: String,
    #[serde(default = "default_directive")]
    pub directive: String,
    #[serde(default)]
    pub working_root: Option<PathBuf>,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    #[serde(default = "default_statistics")]
    pub statistics: bool,
}

fn default_tool() -> String {
    DEFAULT_TOOL.to_string()
}

fn default_directive() -> String {
    DEFAULT_DIRECTIVE.to_string()
}

fn default_jobs() -> usize {
    1
}

fn default_statistics() -> bool {
    true
}

/// Config used when no file is given.
pub fn default_config() -> RunConfig {
    RunConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        tool: default_tool(),
        directive: default_directive(),
        working_root: None,
        overwrite: false,
        jobs: default_jobs(),
        statistics: default_statistics(),
    }
}

pub fn load_config(path: &Path) -> Result<RunConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: RunConfig = serde_json::from_slice(&bytes).context("parse fslong config JSON")?;
    validate_config(&config)?;
    Ok(config)
}

/// Persist a config in a stable JSON format.
pub fn write_config(path: &Path, config: &RunConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut text = serde_json::to_string_pretty(config).context("serialize fslong config")?;
    text.push('\n');
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn validate_config(config: &RunConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported fslong config schema_version {}",
            config.schema_version
        ));
    }
    if config.tool.trim().is_empty() {
        return Err(anyhow!("tool must be non-empty"));
    }
    Directive::parse(&config.directive).context("invalid directive")?;
    if config.jobs == 0 {
        return Err(anyhow!("jobs must be at least 1"));
    }
    Ok(())
}

/// Expand a leading `~` the way a shell would.
pub fn expand_home(path: &Path) -> Result<PathBuf> {
    let Ok(rest) = path.strip_prefix("~") else {
        return Ok(path.to_path_buf());
    };
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot expand ~: no home directory"))?;
    Ok(home.join(rest))
}
