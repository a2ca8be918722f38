use anyhow::{anyhow, Context, Result};
use clap::Parser;
use fslong::cli::{
    Command, CorrectArgs, InitConfigArgs, PublishArgs, RootArgs, RunArgs, StageArgs, StatusArgs,
    UnitSelection,
};
use fslong::compose::prepare_workspace;
use fslong::config::{default_config, expand_home, load_config, write_config};
use fslong::identity::UnitIdentity;
use fslong::layout::{CapsLayout, WorkspaceLayout};
use fslong::pipeline::{run_units, PipelineContext, UnitResult};
use fslong::publish::publish;
use fslong::stats::{maybe_extract_statistics, FreeSurferStats, StatisticsExtractor};
use fslong::status::unit_status;
use fslong::tool::{resolve_tool, run_correction, Directive, ProcessRunner};
use fslong::units::{parse_unit_arg, read_units_tsv};
use fslong::util::{display_path, print_json};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Run(args) => cmd_run(args),
        Command::Prepare(args) => cmd_prepare(args),
        Command::Correct(args) => cmd_correct(args),
        Command::Stats(args) => cmd_stats(args),
        Command::Publish(args) => cmd_publish(args),
        Command::Status(args) => cmd_status(args),
        Command::InitConfig(args) => cmd_init_config(args),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => default_config(),
    };
    let caps = CapsLayout::new(expand_home(&args.caps)?);
    let working_root = args
        .working_root
        .clone()
        .or_else(|| config.working_root.clone())
        .ok_or_else(|| anyhow!("--working-root is required (or set working_root in config)"))?;
    let working_root = expand_home(&working_root)?;
    let directive = Directive::parse(args.directive.as_deref().unwrap_or(&config.directive))?;
    let tool = resolve_tool(args.tool.as_deref().unwrap_or(&config.tool))?;
    let jobs = args.jobs.unwrap_or(config.jobs);
    if jobs == 0 {
        return Err(anyhow!("--jobs must be at least 1"));
    }
    let units = select_units(&args.selection)?;

    let runner = ProcessRunner;
    let extractor = FreeSurferStats;
    let statistics = config.statistics && !args.no_stats;
    let ctx = PipelineContext {
        caps,
        working_root,
        tool: tool.display().to_string(),
        directive,
        runner: &runner,
        extractor: statistics.then_some(&extractor as &dyn StatisticsExtractor),
        overwrite: args.overwrite || config.overwrite,
    };
    tracing::info!(
        units = units.len(),
        jobs,
        tool = %ctx.tool,
        "starting longitudinal correction"
    );
    let results = run_units(&ctx, &units, jobs)?;

    if args.json {
        print_json(&results)?;
    } else {
        print_run_summary(&results, &ctx.working_root);
    }
    let failed = results.iter().filter(|result| !result.succeeded()).count();
    if failed > 0 {
        return Err(anyhow!("{failed} of {} units failed", results.len()));
    }
    Ok(())
}

fn print_run_summary(results: &[UnitResult], working_root: &Path) {
    for result in results {
        match (&result.report, &result.error) {
            (Some(report), _) => println!(
                "ok      {}  statistics={:?} publish={:?}  {}",
                result.identity,
                report.statistics,
                report.publish,
                display_path(&report.workspace, Some(working_root))
            ),
            (None, Some(error)) => println!("failed  {}  {error}", result.identity),
            (None, None) => {}
        }
    }
}

fn select_units(selection: &UnitSelection) -> Result<Vec<UnitIdentity>> {
    let units = match &selection.units_tsv {
        Some(path) => read_units_tsv(path)?,
        None => selection
            .units
            .iter()
            .map(String::as_str)
            .map(parse_unit_arg)
            .collect::<Result<Vec<_>>>()?,
    };
    if units.is_empty() {
        return Err(anyhow!("no units selected"));
    }
    Ok(units)
}

struct StageTarget {
    caps: CapsLayout,
    identity: UnitIdentity,
    working_root: PathBuf,
    workspace: PathBuf,
}

fn stage_target(args: &StageArgs) -> Result<StageTarget> {
    let caps = CapsLayout::new(expand_home(&args.caps)?);
    let identity = parse_unit_arg(&args.unit)?;
    let working_root = expand_home(&args.working_root)?;
    let workspace = WorkspaceLayout::for_unit(&working_root, &identity)
        .root()
        .to_path_buf();
    Ok(StageTarget {
        caps,
        identity,
        working_root,
        workspace,
    })
}

fn require_workspace(target: &StageTarget) -> Result<()> {
    if target.workspace.is_dir() {
        return Ok(());
    }
    Err(anyhow!(
        "workspace {} not found; run `fslong prepare` first",
        target.workspace.display()
    ))
}

fn cmd_prepare(args: StageArgs) -> Result<()> {
    let target = stage_target(&args)?;
    let prepared = prepare_workspace(&target.caps, &target.identity, &target.working_root)?;
    println!("{}", prepared.path.display());
    Ok(())
}

fn cmd_correct(args: CorrectArgs) -> Result<()> {
    let target = stage_target(&args.stage)?;
    require_workspace(&target)?;
    let tool = resolve_tool(&args.tool)?;
    let directive = Directive::parse(&args.directive)?;
    let corrected_id = run_correction(
        &ProcessRunner,
        &tool.display().to_string(),
        &target.workspace,
        &target.identity,
        &directive,
    )?;
    println!("{corrected_id}");
    Ok(())
}

fn cmd_stats(args: StageArgs) -> Result<()> {
    let target = stage_target(&args)?;
    require_workspace(&target)?;
    let identity = maybe_extract_statistics(
        &FreeSurferStats,
        &target.workspace,
        &target.identity.corrected_id(),
    )?;
    println!("{identity}");
    Ok(())
}

fn cmd_publish(args: PublishArgs) -> Result<()> {
    let target = stage_target(&args.stage)?;
    require_workspace(&target)?;
    let corrected_id = publish(
        &target.workspace,
        &target.identity.corrected_id(),
        &target.caps,
        args.overwrite,
    )?;
    println!("{corrected_id}");
    Ok(())
}

fn cmd_status(args: StatusArgs) -> Result<()> {
    let caps = CapsLayout::new(expand_home(&args.caps)?);
    let working_root = args
        .working_root
        .as_deref()
        .map(expand_home)
        .transpose()?;
    let units = select_units(&args.selection)?;
    let statuses = units
        .iter()
        .map(|identity| unit_status(&caps, working_root.as_deref(), identity))
        .collect::<Result<Vec<_>>>()?;

    if args.json {
        return print_json(&statuses);
    }
    for status in &statuses {
        println!(
            "{:<12} {}  {}",
            format!("{:?}", status.state).to_lowercase(),
            status.identity,
            status.status_log_last_line.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn cmd_init_config(args: InitConfigArgs) -> Result<()> {
    if args.out.exists() && !args.force {
        return Err(anyhow!(
            "{} already exists (use --force to overwrite)",
            args.out.display()
        ));
    }
    write_config(&args.out, &default_config())
        .with_context(|| format!("init config {}", args.out.display()))?;
    println!("Wrote {}", args.out.display());
    Ok(())
}
