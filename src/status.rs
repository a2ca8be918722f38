//! Read-only per-unit diagnostics for archive entries.
//!
//! The recon-all status log is only read here, for users. Stage gating never
//! looks at it.
use crate::identity::UnitIdentity;
use crate::layout::{CapsLayout, WorkspaceLayout, PRIMARY_ARTIFACT_REL, STATUS_LOG_REL};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const FINISHED_MARKER: &str = "finished without error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    /// Archive entry holds the segmentation and the log reports success.
    Published,
    /// Archive entry exists but is incomplete or the log does not report success.
    Incomplete,
    /// Nothing in the archive; a result tree is waiting in the workspace.
    Pending,
    NotStarted,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitStatus {
    pub identity: UnitIdentity,
    pub state: UnitState,
    pub archive_entry: PathBuf,
    pub has_segmentation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_log_last_line: Option<String>,
    pub finished_without_error: bool,
}

/// Summarize one unit from the archive, falling back to its workspace.
pub fn unit_status(
    caps: &CapsLayout,
    working_root: Option<&Path>,
    identity: &UnitIdentity,
) -> Result<UnitStatus> {
    let archive_entry = caps.archive_entry(identity);
    if archive_entry.is_dir() {
        let has_segmentation = archive_entry.join(PRIMARY_ARTIFACT_REL).is_file();
        let last_line = last_log_line(&archive_entry.join(STATUS_LOG_REL))?;
        let finished = last_line
            .as_deref()
            .is_some_and(|line| line.to_lowercase().contains(FINISHED_MARKER));
        let state = if has_segmentation && finished {
            UnitState::Published
        } else {
            UnitState::Incomplete
        };
        return Ok(UnitStatus {
            identity: identity.clone(),
            state,
            archive_entry,
            has_segmentation,
            status_log_last_line: last_line,
            finished_without_error: finished,
        });
    }

    let pending_tree = working_root
        .map(|root| WorkspaceLayout::for_unit(root, identity))
        .map(|workspace| workspace.result_tree(&identity.corrected_id()))
        .filter(|tree| tree.is_dir());
    let (state, last_line, has_segmentation) = match pending_tree {
        Some(tree) => (
            UnitState::Pending,
            last_log_line(&tree.join(STATUS_LOG_REL))?,
            tree.join(PRIMARY_ARTIFACT_REL).is_file(),
        ),
        None => (UnitState::NotStarted, None, false),
    };
    let finished = last_line
        .as_deref()
        .is_some_and(|line| line.to_lowercase().contains(FINISHED_MARKER));
    Ok(UnitStatus {
        identity: identity.clone(),
        state,
        archive_entry,
        has_segmentation,
        status_log_last_line: last_line,
        finished_without_error: finished,
    })
}

fn last_log_line(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(text
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string))
}
