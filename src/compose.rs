//! Workspace composition from upstream stage outputs.
//!
//! The workspace only references upstream data through symlinks; nothing is
//! copied and the upstream stages keep ownership of their outputs.
use crate::error::{PipelineError, PipelineResult, Upstream};
use crate::identity::UnitIdentity;
use crate::layout::{CapsLayout, WorkspaceLayout};
use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

/// Output of the composer: the unit's workspace name and location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedWorkspace {
    pub image_id: String,
    pub path: PathBuf,
}

/// Create `working_root/<image_id>` and link both upstream outputs into it.
///
/// Re-entry on an already composed workspace is a no-op.
pub fn prepare_workspace(
    caps: &CapsLayout,
    identity: &UnitIdentity,
    working_root: &Path,
) -> PipelineResult<PreparedWorkspace> {
    let image_id = identity.image_id();
    let workspace = WorkspaceLayout::for_unit(working_root, identity);

    let cross_sectional = caps.cross_sectional_dir(identity);
    let template = caps.template_dir(identity);
    require_upstream(Upstream::CrossSectional, &cross_sectional)?;
    require_upstream(Upstream::Template, &template)?;

    fs::create_dir_all(workspace.root())
        .map_err(|err| PipelineError::io("create workspace", workspace.root(), err))?;

    ensure_link(&cross_sectional, &workspace.cross_sectional_link(identity))?;
    ensure_link(&template, &workspace.template_link(identity))?;

    tracing::info!(
        image_id = %image_id,
        workspace = %workspace.root().display(),
        "begin unit"
    );

    Ok(PreparedWorkspace {
        image_id,
        path: workspace.root().to_path_buf(),
    })
}

fn require_upstream(upstream: Upstream, path: &Path) -> PipelineResult<()> {
    if path.is_dir() {
        return Ok(());
    }
    Err(PipelineError::MissingUpstreamOutput {
        upstream,
        path: path.to_path_buf(),
    })
}

fn ensure_link(target: &Path, link: &Path) -> PipelineResult<()> {
    match fs::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            let current = fs::read_link(link)
                .map_err(|err| PipelineError::io("read link", link, err))?;
            if current == target {
                tracing::debug!(link = %link.display(), "link already in place");
                return Ok(());
            }
            fs::remove_file(link).map_err(|err| PipelineError::io("replace link", link, err))?;
        }
        Ok(_) => {
            return Err(PipelineError::io(
                "link over existing entry",
                link,
                io::Error::from(io::ErrorKind::AlreadyExists),
            ));
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(PipelineError::io("inspect link", link, err)),
    }
    symlink(target, link).map_err(|err| PipelineError::io("create link", link, err))?;
    tracing::debug!(
        link = %link.display(),
        target = %target.display(),
        "created link"
    );
    Ok(())
}
