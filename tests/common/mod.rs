//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use fslong::layout::CapsLayout;
use fslong::tool::{ToolExit, ToolInvocation, ToolRunner};
use fslong::UnitIdentity;
use std::fs;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

pub const ASEG_STATS: &str = "\
# Title Segmentation Statistics
# ColHeaders  Index SegId NVoxels Volume_mm3 StructName
  1   4     6783     6783.0  Left-Lateral-Ventricle
  2  17     4123     4123.5  Left-Hippocampus
";

/// Temporary CAPS archive plus working root.
pub struct CapsFixture {
    pub dir: TempDir,
    pub caps: CapsLayout,
    pub working_root: PathBuf,
}

impl CapsFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let caps = CapsLayout::new(dir.path().join("caps"));
        let working_root = dir.path().join("work");
        Self {
            dir,
            caps,
            working_root,
        }
    }

    /// Create cross-sectional and template outputs for a unit.
    pub fn seed_upstreams(&self, identity: &UnitIdentity) {
        let cross = self.caps.cross_sectional_dir(identity);
        let template = self.caps.template_dir(identity);
        for dir in [&cross, &template] {
            fs::create_dir_all(dir.join("mri")).expect("create upstream dir");
            fs::write(dir.join("mri/norm.mgz"), b"upstream").expect("write upstream file");
        }
    }

    /// Write a shell script standing in for recon-all.
    pub fn fake_tool(&self, exit_code: i32, write_segmentation: bool) -> PathBuf {
        let path = self.dir.path().join(format!("fake-recon-all-{exit_code}"));
        let seg_line = if write_segmentation {
            "printf seg > \"$out/mri/aparc+aseg.mgz\""
        } else {
            ":"
        };
        let script = format!(
            "#!/bin/sh\n\
             tp=\"$2\"; template=\"$3\"; sd=\"$5\"\n\
             out=\"$sd/$tp.long.$template\"\n\
             mkdir -p \"$out/mri\" \"$out/scripts\" \"$out/stats\"\n\
             {seg_line}\n\
             cat > \"$out/stats/aseg.stats\" <<'STATS'\n{ASEG_STATS}STATS\n\
             echo \"recon-all -long $tp $template finished without error\" > \"$out/scripts/recon-all-status.log\"\n\
             ln -sfn /nonexistent/fsaverage \"$sd/fsaverage\"\n\
             exit {exit_code}\n"
        );
        fs::write(&path, script).expect("write fake tool");
        let mut perms = fs::metadata(&path).expect("stat fake tool").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("chmod fake tool");
        path
    }
}

/// In-process stand-in for recon-all that writes a result tree like the real tool.
pub struct MockReconAll {
    pub exit_code: i32,
    pub write_segmentation: bool,
    pub calls: Mutex<Vec<ToolInvocation>>,
}

impl MockReconAll {
    pub fn new(exit_code: i32, write_segmentation: bool) -> Self {
        Self {
            exit_code,
            write_segmentation,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }
}

impl ToolRunner for MockReconAll {
    fn invoke(&self, invocation: &ToolInvocation) -> anyhow::Result<ToolExit> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(invocation.clone());
        let args = &invocation.args;
        assert_eq!(args[0], "-long");
        assert_eq!(args[3], "-sd");
        let sd = Path::new(&args[4]);
        let out = sd.join(format!("{}.long.{}", args[1], args[2]));
        fs::create_dir_all(out.join("mri"))?;
        fs::create_dir_all(out.join("scripts"))?;
        fs::create_dir_all(out.join("stats"))?;
        fs::write(out.join("stats/aseg.stats"), ASEG_STATS)?;
        fs::write(
            out.join("scripts/recon-all-status.log"),
            "#@# Exit\nrecon-all finished without error\n",
        )?;
        if self.write_segmentation {
            fs::write(out.join("mri/aparc+aseg.mgz"), b"seg")?;
            let link = out.join("mri/aseg-link.mgz");
            if fs::symlink_metadata(&link).is_err() {
                symlink("aparc+aseg.mgz", link)?;
            }
        }
        let fsaverage = sd.join("fsaverage");
        if fs::symlink_metadata(&fsaverage).is_err() {
            symlink("/nonexistent/fsaverage", fsaverage)?;
        }
        Ok(ToolExit::code(self.exit_code))
    }
}

pub fn unit() -> UnitIdentity {
    UnitIdentity::new("sub-01", "ses-M00", "long-M00M18").expect("valid unit")
}
