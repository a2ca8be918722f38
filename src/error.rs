//! Typed failures for the per-unit stage chain.
//!
//! Every variant is fatal for the owning unit only. The degrade path (missing
//! artifact after a successful tool exit) is a warning, not an error.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Which upstream stage a workspace link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    CrossSectional,
    Template,
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Upstream::CrossSectional => f.write_str("cross-sectional segmentation"),
            Upstream::Template => f.write_str("unbiased template"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid {field} {value:?}: {reason}")]
    InvalidIdentity {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("malformed corrected id {0:?}: expected <p>_<s>.long.<p>_<l>")]
    MalformedIdentity(String),

    #[error("missing {upstream} output at {}", path.display())]
    MissingUpstreamOutput { upstream: Upstream, path: PathBuf },

    #[error("{command} failed with {}", describe_exit(*code, *signal))]
    ExternalToolFailed {
        command: String,
        code: Option<i32>,
        signal: Option<i32>,
    },

    #[error("statistics extraction failed for {corrected_id}")]
    StatisticsExtraction {
        corrected_id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{action} {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        PipelineError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

fn describe_exit(code: Option<i32>, signal: Option<i32>) -> String {
    match (code, signal) {
        (Some(code), _) => format!("exit code {code}"),
        (None, Some(signal)) => format!("signal {signal}"),
        (None, None) => "unknown status".to_string(),
    }
}
