//! Typed paths into the CAPS archive and the per-unit workspace.
//!
//! Centralizing path construction keeps every stage reading and writing the
//! same locations.
use crate::identity::UnitIdentity;
use std::path::{Path, PathBuf};

pub const CROSS_SECTIONAL_STAGE: &str = "freesurfer_cross_sectional";
pub const TEMPLATE_STAGE: &str = "freesurfer_unbiased_template";
pub const LONGITUDINAL_STAGE: &str = "t1_freesurfer_longitudinal";

/// Primary segmentation volume, relative to a result tree.
pub const PRIMARY_ARTIFACT_REL: &str = "mri/aparc+aseg.mgz";

/// recon-all status log, relative to a result tree.
pub const STATUS_LOG_REL: &str = "scripts/recon-all-status.log";

/// Regional statistics folder, relative to a result tree.
pub const REGIONAL_MEASURES_DIR: &str = "regional_measures";

/// Links recon-all drops into `SUBJECTS_DIR` pointing at `$FREESURFER_HOME`.
pub const SHARED_REFERENCE_LINKS: [&str; 3] = ["fsaverage", "lh.EC_average", "rh.EC_average"];

/// Path helper rooted at a CAPS directory.
#[derive(Debug, Clone)]
pub struct CapsLayout {
    root: PathBuf,
}

impl CapsLayout {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return `subjects/<participant>`.
    pub fn participant_dir(&self, participant_id: &str) -> PathBuf {
        self.root.join("subjects").join(participant_id)
    }

    /// Return the cross-sectional recon-all subject directory for a timepoint.
    pub fn cross_sectional_dir(&self, identity: &UnitIdentity) -> PathBuf {
        self.participant_dir(&identity.participant_id)
            .join(&identity.session_id)
            .join("t1")
            .join(CROSS_SECTIONAL_STAGE)
            .join(identity.timepoint_id())
    }

    /// Return the unbiased template subject directory for a longitudinal group.
    pub fn template_dir(&self, identity: &UnitIdentity) -> PathBuf {
        self.participant_dir(&identity.participant_id)
            .join(&identity.long_id)
            .join(TEMPLATE_STAGE)
            .join(identity.template_id())
    }

    /// Return the stage folder that receives longitudinal results.
    pub fn longitudinal_stage_dir(&self, identity: &UnitIdentity) -> PathBuf {
        self.participant_dir(&identity.participant_id)
            .join(&identity.session_id)
            .join(&identity.long_id)
            .join(LONGITUDINAL_STAGE)
    }

    /// Return the archive entry holding a published result tree.
    pub fn archive_entry(&self, identity: &UnitIdentity) -> PathBuf {
        self.longitudinal_stage_dir(identity)
            .join(identity.corrected_id())
    }
}

/// Path helper rooted at one unit's workspace (recon-all `SUBJECTS_DIR`).
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn for_unit(working_root: &Path, identity: &UnitIdentity) -> Self {
        Self::new(working_root.join(identity.image_id()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cross_sectional_link(&self, identity: &UnitIdentity) -> PathBuf {
        self.root.join(identity.timepoint_id())
    }

    pub fn template_link(&self, identity: &UnitIdentity) -> PathBuf {
        self.root.join(identity.template_id())
    }

    /// Every link that must be gone before the result tree is committed.
    pub fn scaffolding_links(&self, identity: &UnitIdentity) -> Vec<PathBuf> {
        let mut links: Vec<PathBuf> = SHARED_REFERENCE_LINKS
            .iter()
            .map(|name| self.root.join(name))
            .collect();
        links.push(self.cross_sectional_link(identity));
        links.push(self.template_link(identity));
        links
    }

    pub fn result_tree(&self, corrected_id: &str) -> PathBuf {
        self.root.join(corrected_id)
    }

    pub fn primary_artifact(&self, corrected_id: &str) -> PathBuf {
        self.result_tree(corrected_id).join(PRIMARY_ARTIFACT_REL)
    }

    pub fn regional_measures_dir(&self, corrected_id: &str) -> PathBuf {
        self.result_tree(corrected_id).join(REGIONAL_MEASURES_DIR)
    }
}
