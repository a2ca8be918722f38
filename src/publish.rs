//! Commit a finished result tree into the CAPS archive.
//!
//! The tree is copied into a staging directory next to the archive entry and
//! renamed into place, so readers see either the previous entry or the new one.
use crate::error::{PipelineError, PipelineResult};
use crate::identity::{parse_corrected_id, UnitIdentity};
use crate::layout::{CapsLayout, WorkspaceLayout, PRIMARY_ARTIFACT_REL};
use serde::Serialize;
use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::Path;
use walkdir::WalkDir;

const STAGING_PREFIX: &str = ".fslong-staging-";
const BACKUP_NAME: &str = "previous";

/// What the publish stage did for a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishOutcome {
    Published,
    Replaced,
    AlreadyPublished,
    SkippedMissingArtifact,
}

/// Publish `<workspace>/<corrected_id>` and return `corrected_id`.
pub fn publish(
    workspace_path: &Path,
    corrected_id: &str,
    caps: &CapsLayout,
    overwrite: bool,
) -> PipelineResult<String> {
    publish_unit(workspace_path, corrected_id, caps, overwrite)?;
    Ok(corrected_id.to_string())
}

/// Same as [`publish`], reporting the outcome instead of the id.
pub fn publish_unit(
    workspace_path: &Path,
    corrected_id: &str,
    caps: &CapsLayout,
    overwrite: bool,
) -> PipelineResult<PublishOutcome> {
    let identity = parse_corrected_id(corrected_id)?;
    let workspace = WorkspaceLayout::new(workspace_path.to_path_buf());
    if !workspace.primary_artifact(corrected_id).is_file() {
        tracing::warn!(
            unit = %identity,
            artifact = PRIMARY_ARTIFACT_REL,
            "{corrected_id} does not contain {PRIMARY_ARTIFACT_REL}; copy skipped"
        );
        return Ok(PublishOutcome::SkippedMissingArtifact);
    }

    remove_scaffolding(&workspace, &identity)?;

    let destination = caps.archive_entry(&identity);
    let previously_published = destination.join(PRIMARY_ARTIFACT_REL).is_file();
    if previously_published && !overwrite {
        tracing::info!(
            corrected_id,
            destination = %destination.display(),
            "already published; keeping existing archive entry"
        );
        return Ok(PublishOutcome::AlreadyPublished);
    }

    commit_tree(&workspace.result_tree(corrected_id), &destination)?;
    tracing::info!(
        corrected_id,
        destination = %destination.display(),
        "end unit"
    );
    Ok(if previously_published {
        PublishOutcome::Replaced
    } else {
        PublishOutcome::Published
    })
}

/// Remove shared-reference and composition links from the workspace.
pub fn remove_scaffolding(
    workspace: &WorkspaceLayout,
    identity: &UnitIdentity,
) -> PipelineResult<()> {
    for link in workspace.scaffolding_links(identity) {
        match fs::remove_file(&link) {
            Ok(()) => tracing::debug!(link = %link.display(), "removed link"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(PipelineError::io("remove link", link, err)),
        }
    }
    Ok(())
}

/// Replace `destination` with a copy of `source` via a sibling staging directory.
///
/// A previous entry is moved aside first and restored if the final rename fails.
/// When the restore fails too, the staging directory is kept and the error names
/// the backup path holding the previous entry.
pub fn commit_tree(source: &Path, destination: &Path) -> PipelineResult<()> {
    commit_tree_with(source, destination, rename_path)
}

fn rename_path(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
}

fn commit_tree_with(
    source: &Path,
    destination: &Path,
    rename: impl Fn(&Path, &Path) -> io::Result<()>,
) -> PipelineResult<()> {
    let parent = destination.parent().ok_or_else(|| {
        PipelineError::io(
            "resolve parent of",
            destination,
            io::Error::from(io::ErrorKind::InvalidInput),
        )
    })?;
    fs::create_dir_all(parent).map_err(|err| PipelineError::io("create", parent, err))?;
    sweep_stale_staging(parent)?;

    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(parent)
        .map_err(|err| PipelineError::io("create staging dir in", parent, err))?;
    let staged = staging.path().join("tree");
    copy_tree(source, &staged)?;

    let backup = staging.path().join(BACKUP_NAME);
    let had_previous = fs::symlink_metadata(destination).is_ok();
    if had_previous {
        rename(destination, &backup)
            .map_err(|err| PipelineError::io("move aside", destination, err))?;
    }
    let Err(err) = rename(&staged, destination) else {
        // Dropping `staging` deletes the moved-aside entry.
        return Ok(());
    };
    if had_previous {
        if let Err(restore_err) = rename(&backup, destination) {
            let kept = staging.keep();
            tracing::error!(
                destination = %destination.display(),
                backup = %kept.join(BACKUP_NAME).display(),
                error = %err,
                "commit failed and the previous entry could not be restored"
            );
            return Err(PipelineError::io(
                "restore previous entry from",
                kept.join(BACKUP_NAME),
                restore_err,
            ));
        }
    }
    Err(PipelineError::io("commit", destination, err))
}

/// Remove staging directories left by an interrupted copy.
///
/// Directories holding a kept backup are left alone.
fn sweep_stale_staging(stage_dir: &Path) -> PipelineResult<()> {
    let entries =
        fs::read_dir(stage_dir).map_err(|err| PipelineError::io("read", stage_dir, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| PipelineError::io("read", stage_dir, err))?;
        let path = entry.path();
        let is_staging = entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX);
        if !is_staging || !path.is_dir() {
            continue;
        }
        if fs::symlink_metadata(path.join(BACKUP_NAME)).is_ok() {
            tracing::warn!(
                path = %path.display(),
                "staging directory holds a previous archive entry; leaving it"
            );
            continue;
        }
        fs::remove_dir_all(&path).map_err(|err| PipelineError::io("remove", &path, err))?;
        tracing::debug!(path = %path.display(), "removed stale staging directory");
    }
    Ok(())
}

/// Recursive copy that recreates symlinks instead of following them.
pub fn copy_tree(source: &Path, destination: &Path) -> PipelineResult<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry =
            entry.map_err(|err| PipelineError::io("walk", source, io::Error::from(err)))?;
        let rel = entry.path().strip_prefix(source).map_err(|_| {
            PipelineError::io(
                "relativize",
                entry.path(),
                io::Error::from(io::ErrorKind::InvalidInput),
            )
        })?;
        let target = destination.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|err| PipelineError::io("create", &target, err))?;
        } else if file_type.is_symlink() {
            let link_target = fs::read_link(entry.path())
                .map_err(|err| PipelineError::io("read link", entry.path(), err))?;
            symlink(&link_target, &target)
                .map_err(|err| PipelineError::io("create link", &target, err))?;
        } else {
            fs::copy(entry.path(), &target)
                .map_err(|err| PipelineError::io("copy", entry.path(), err))?;
        }
    }
    Ok(())
}
