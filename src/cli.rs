//! CLI argument parsing for the longitudinal correction stage.
//!
//! The CLI only wires arguments into the stage functions; every stage is also
//! exposed on its own so a partial run can be resumed by hand.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "fslong",
    version,
    about = "Longitudinal FreeSurfer correction for CAPS archives",
    after_help = "Commands:\n  run --caps <dir> --working-root <dir> --unit P,S,L   Run every stage for each unit\n  prepare/correct/stats/publish ...                     Run a single stage for one unit\n  status --caps <dir> --units-tsv <file>                Report archive state per unit\n  init-config --out <file>                              Write a default config\n\nExamples:\n  fslong run --caps ~/caps --working-root /tmp/fslong --unit sub-01,ses-M00,long-M00M18\n  fslong run --caps ~/caps --working-root /tmp/fslong --units-tsv units.tsv --jobs 4\n  fslong status --caps ~/caps --units-tsv units.tsv --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Emit debug-level logs
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Prepare(StageArgs),
    Correct(CorrectArgs),
    Stats(StageArgs),
    Publish(PublishArgs),
    Status(StatusArgs),
    InitConfig(InitConfigArgs),
}

/// Unit selection shared by batch commands.
#[derive(Args, Debug)]
pub struct UnitSelection {
    /// Unit as PARTICIPANT,SESSION,LONG (repeatable)
    #[arg(long = "unit", value_name = "P,S,L", required_unless_present = "units_tsv")]
    pub units: Vec<String>,

    /// TSV with participant_id, session_id and long_id columns
    #[arg(long, value_name = "FILE", conflicts_with = "units")]
    pub units_tsv: Option<PathBuf>,
}

/// Inputs for the full stage chain.
#[derive(Parser, Debug)]
#[command(about = "Compose, correct, extract statistics and publish each unit")]
pub struct RunArgs {
    /// CAPS directory holding upstream outputs and receiving results
    #[arg(long, value_name = "DIR")]
    pub caps: PathBuf,

    /// Root under which per-unit workspaces are created
    #[arg(long, value_name = "DIR")]
    pub working_root: Option<PathBuf>,

    #[command(flatten)]
    pub selection: UnitSelection,

    /// JSON config supplying defaults for the flags below
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// recon-all executable (name on PATH or explicit path)
    #[arg(long, value_name = "PATH")]
    pub tool: Option<String>,

    /// recon-all completion scope, e.g. "-all"
    #[arg(long, value_name = "FLAGS", allow_hyphen_values = true)]
    pub directive: Option<String>,

    /// Replace archive entries that are already published
    #[arg(long)]
    pub overwrite: bool,

    /// Units processed in parallel
    #[arg(long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Skip regional statistics extraction
    #[arg(long)]
    pub no_stats: bool,

    /// Emit the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Single-unit inputs shared by the per-stage commands.
#[derive(Parser, Debug)]
pub struct StageArgs {
    /// CAPS directory
    #[arg(long, value_name = "DIR")]
    pub caps: PathBuf,

    /// Root under which per-unit workspaces live
    #[arg(long, value_name = "DIR")]
    pub working_root: PathBuf,

    /// Unit as PARTICIPANT,SESSION,LONG
    #[arg(long, value_name = "P,S,L")]
    pub unit: String,
}

#[derive(Parser, Debug)]
#[command(about = "Run recon-all -long in a prepared workspace")]
pub struct CorrectArgs {
    #[command(flatten)]
    pub stage: StageArgs,

    /// recon-all executable
    #[arg(long, value_name = "PATH", default_value = crate::tool::DEFAULT_TOOL)]
    pub tool: String,

    /// recon-all completion scope
    #[arg(
        long,
        value_name = "FLAGS",
        allow_hyphen_values = true,
        default_value = crate::tool::DEFAULT_DIRECTIVE
    )]
    pub directive: String,
}

#[derive(Parser, Debug)]
#[command(about = "Commit a workspace result tree into the CAPS archive")]
pub struct PublishArgs {
    #[command(flatten)]
    pub stage: StageArgs,

    /// Replace an archive entry that is already published
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Report archive state and recon-all status per unit")]
pub struct StatusArgs {
    /// CAPS directory
    #[arg(long, value_name = "DIR")]
    pub caps: PathBuf,

    /// Also look for unpublished result trees here
    #[arg(long, value_name = "DIR")]
    pub working_root: Option<PathBuf>,

    #[command(flatten)]
    pub selection: UnitSelection,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Write a default fslong config")]
pub struct InitConfigArgs {
    /// Destination path
    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}
