//! Longitudinal correction stage for FreeSurfer outputs stored in a CAPS archive.
//!
//! Each unit (participant, session, longitudinal group) runs a fixed chain:
//! compose a workspace from upstream outputs, run `recon-all -long`, derive
//! regional statistics, then publish the result tree into the archive.
pub mod cli;
pub mod compose;
pub mod config;
pub mod error;
pub mod identity;
pub mod layout;
pub mod pipeline;
pub mod publish;
pub mod stats;
pub mod status;
pub mod tool;
pub mod units;
pub mod util;

pub use error::{PipelineError, PipelineResult};
pub use identity::UnitIdentity;
