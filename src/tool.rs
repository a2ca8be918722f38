//! recon-all invocation behind a mockable runner seam.
//!
//! Success is the exit status and nothing else: the tool's own status log is
//! left to diagnostics (`status` command) and never consulted here.
use crate::error::{PipelineError, PipelineResult};
use crate::identity::UnitIdentity;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

/// Default tool name resolved on `PATH`.
pub const DEFAULT_TOOL: &str = "recon-all";

/// Default completion scope.
pub const DEFAULT_DIRECTIVE: &str = "-all";

/// A fully built command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolInvocation {
    /// Shell-quoted form for logs and error messages.
    pub fn command_line(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }
}

/// Observed termination of a tool run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ToolExit {
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs a tool invocation to completion.
///
/// Implementations block until the process exits; callers run them on a
/// worker thread.
pub trait ToolRunner: Send + Sync {
    fn invoke(&self, invocation: &ToolInvocation) -> Result<ToolExit>;
}

/// Runner that spawns the real subprocess with its output streams discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn invoke(&self, invocation: &ToolInvocation) -> Result<ToolExit> {
        let start = Instant::now();
        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("spawn {}", invocation.program))?;
        let elapsed_ms = start.elapsed().as_millis();
        let exit = exit_from_status(status);
        tracing::info!(
            elapsed_ms,
            code = ?exit.code,
            signal = ?exit.signal,
            "{} complete",
            invocation.program
        );
        Ok(exit)
    }
}

#[cfg(unix)]
fn exit_from_status(status: std::process::ExitStatus) -> ToolExit {
    use std::os::unix::process::ExitStatusExt;
    ToolExit {
        code: status.code(),
        signal: status.signal(),
    }
}

#[cfg(not(unix))]
fn exit_from_status(status: std::process::ExitStatus) -> ToolExit {
    ToolExit {
        code: status.code(),
        signal: None,
    }
}

/// recon-all completion scope, e.g. `-all` or `-autorecon2 -autorecon3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive(Vec<String>);

impl Directive {
    pub fn parse(text: &str) -> Result<Self> {
        let words = shell_words::split(text).with_context(|| format!("parse directive {text:?}"))?;
        if words.is_empty() {
            return Err(anyhow!("directive must be non-empty"));
        }
        Ok(Self(words))
    }

    pub fn words(&self) -> &[String] {
        &self.0
    }
}

impl Default for Directive {
    fn default() -> Self {
        Self(vec![DEFAULT_DIRECTIVE.to_string()])
    }
}

/// Build `<tool> -long <tp> <template> -sd <workspace> <directive>`.
pub fn long_invocation(
    program: &str,
    workspace_path: &Path,
    identity: &UnitIdentity,
    directive: &Directive,
) -> ToolInvocation {
    let mut args = vec![
        "-long".to_string(),
        identity.timepoint_id(),
        identity.template_id(),
        "-sd".to_string(),
        workspace_path.display().to_string(),
    ];
    args.extend(directive.words().iter().cloned());
    ToolInvocation {
        program: program.to_string(),
        args,
    }
}

/// Run the longitudinal correction of one timepoint.
///
/// Returns the computed `corrected_id`; the output directory is not read back.
pub fn run_correction(
    runner: &dyn ToolRunner,
    program: &str,
    workspace_path: &Path,
    identity: &UnitIdentity,
    directive: &Directive,
) -> PipelineResult<String> {
    let invocation = long_invocation(program, workspace_path, identity, directive);
    let command = invocation.command_line();
    tracing::info!(command = %command, "running longitudinal correction");

    let exit = runner
        .invoke(&invocation)
        .map_err(|err| {
            tracing::error!(command = %command, error = %format!("{err:#}"), "tool did not start");
            PipelineError::ExternalToolFailed {
                command: command.clone(),
                code: None,
                signal: None,
            }
        })?;
    if !exit.success() {
        return Err(PipelineError::ExternalToolFailed {
            command,
            code: exit.code,
            signal: exit.signal,
        });
    }
    Ok(identity.corrected_id())
}

/// Locate the tool on `PATH` (or accept an explicit path) before any unit starts.
pub fn resolve_tool(program: &str) -> Result<PathBuf> {
    which::which(program).with_context(|| {
        format!("{program} not found; source $FREESURFER_HOME/SetUpFreeSurfer.sh or pass --tool")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedExit {
        exit: ToolExit,
        seen: Mutex<Vec<ToolInvocation>>,
    }

    impl FixedExit {
        fn new(exit: ToolExit) -> Self {
            Self {
                exit,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ToolRunner for FixedExit {
        fn invoke(&self, invocation: &ToolInvocation) -> Result<ToolExit> {
            self.seen.lock().unwrap().push(invocation.clone());
            Ok(self.exit)
        }
    }

    struct Unspawnable;

    impl ToolRunner for Unspawnable {
        fn invoke(&self, _invocation: &ToolInvocation) -> Result<ToolExit> {
            Err(anyhow!("no such file"))
        }
    }

    fn identity() -> UnitIdentity {
        UnitIdentity::new("sub-01", "ses-M00", "long-M00M18").unwrap()
    }

    #[test]
    fn builds_long_command_line() {
        let invocation = long_invocation(
            "recon-all",
            Path::new("/work/sub-01_ses-M00_long-M00M18"),
            &identity(),
            &Directive::default(),
        );
        assert_eq!(
            invocation.command_line(),
            "recon-all -long sub-01_ses-M00 sub-01_long-M00M18 -sd /work/sub-01_ses-M00_long-M00M18 -all"
        );
    }

    #[test]
    fn returns_corrected_id_on_zero_exit() {
        let runner = FixedExit::new(ToolExit::code(0));
        let corrected = run_correction(
            &runner,
            "recon-all",
            Path::new("/work/ws"),
            &identity(),
            &Directive::default(),
        )
        .unwrap();
        assert_eq!(corrected, "sub-01_ses-M00.long.sub-01_long-M00M18");
        let seen = runner.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].args[0], "-long");
    }

    #[test]
    fn non_zero_exit_is_tool_failure() {
        for code in [1, 137] {
            let runner = FixedExit::new(ToolExit::code(code));
            let err = run_correction(
                &runner,
                "recon-all",
                Path::new("/work/ws"),
                &identity(),
                &Directive::default(),
            )
            .unwrap_err();
            assert!(
                matches!(err, PipelineError::ExternalToolFailed { code: Some(c), .. } if c == code),
                "unexpected error for {code}: {err}"
            );
        }
    }

    #[test]
    fn killed_by_signal_is_tool_failure() {
        let runner = FixedExit::new(ToolExit {
            code: None,
            signal: Some(9),
        });
        let err = run_correction(
            &runner,
            "recon-all",
            Path::new("/work/ws"),
            &identity(),
            &Directive::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ExternalToolFailed {
                signal: Some(9),
                ..
            }
        ));
    }

    #[test]
    fn spawn_error_is_tool_failure() {
        let err = run_correction(
            &Unspawnable,
            "recon-all",
            Path::new("/work/ws"),
            &identity(),
            &Directive::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::ExternalToolFailed { code: None, .. }));
    }

    #[test]
    fn directive_splits_words() {
        let directive = Directive::parse("-autorecon2 -autorecon3").unwrap();
        assert_eq!(directive.words(), ["-autorecon2", "-autorecon3"]);
        assert!(Directive::parse("   ").is_err());
        assert!(Directive::parse("'-all").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn process_runner_reports_exit_code() {
        let exit = ProcessRunner
            .invoke(&ToolInvocation {
                program: "sh".to_string(),
                args: vec!["-c".to_string(), "exit 3".to_string()],
            })
            .unwrap();
        assert_eq!(exit, ToolExit::code(3));
    }
}
