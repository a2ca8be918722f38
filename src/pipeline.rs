//! Per-unit stage chain and the cross-unit worker pool.
//!
//! Stages of one unit run strictly in order; units share nothing but the
//! read-only context, so they run in parallel without locking.
use crate::compose::prepare_workspace;
use crate::error::PipelineResult;
use crate::identity::UnitIdentity;
use crate::layout::CapsLayout;
use crate::publish::{publish_unit, PublishOutcome};
use crate::stats::{gate_statistics, GateDecision, StatisticsExtractor};
use crate::tool::{run_correction, Directive, ToolRunner};
use anyhow::{anyhow, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

/// Everything a unit needs besides its identity.
pub struct PipelineContext<'a> {
    pub caps: CapsLayout,
    pub working_root: PathBuf,
    pub tool: String,
    pub directive: Directive,
    pub runner: &'a dyn ToolRunner,
    /// `None` skips the statistics stage entirely.
    pub extractor: Option<&'a dyn StatisticsExtractor>,
    pub overwrite: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticsStatus {
    Extracted,
    SkippedMissingArtifact,
    Disabled,
}

impl From<GateDecision> for StatisticsStatus {
    fn from(decision: GateDecision) -> Self {
        match decision {
            GateDecision::Extracted => StatisticsStatus::Extracted,
            GateDecision::SkippedMissingArtifact => StatisticsStatus::SkippedMissingArtifact,
        }
    }
}

/// Terminal state of a unit that finished its chain.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub identity: UnitIdentity,
    pub image_id: String,
    pub corrected_id: String,
    pub workspace: PathBuf,
    pub statistics: StatisticsStatus,
    pub publish: PublishOutcome,
    pub elapsed_ms: u128,
}

/// Run compose, correct, statistics and publish for one unit.
pub fn run_unit(ctx: &PipelineContext<'_>, identity: &UnitIdentity) -> PipelineResult<UnitReport> {
    let start = Instant::now();
    let span = tracing::info_span!("unit", image_id = %identity.image_id());
    let _guard = span.enter();

    let prepared = prepare_workspace(&ctx.caps, identity, &ctx.working_root)?;
    let corrected_id = run_correction(
        ctx.runner,
        &ctx.tool,
        &prepared.path,
        identity,
        &ctx.directive,
    )?;
    let statistics = match ctx.extractor {
        Some(extractor) => gate_statistics(extractor, &prepared.path, &corrected_id)?.1.into(),
        None => StatisticsStatus::Disabled,
    };
    let publish = publish_unit(&prepared.path, &corrected_id, &ctx.caps, ctx.overwrite)?;

    Ok(UnitReport {
        identity: identity.clone(),
        image_id: prepared.image_id,
        corrected_id,
        workspace: prepared.path,
        statistics,
        publish,
        elapsed_ms: start.elapsed().as_millis(),
    })
}

/// Result of one unit inside a batch.
#[derive(Debug, Serialize)]
pub struct UnitResult {
    pub identity: UnitIdentity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<UnitReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UnitResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Run every unit on a pool of `jobs` threads; one unit's failure never stops the others.
pub fn run_units(
    ctx: &PipelineContext<'_>,
    units: &[UnitIdentity],
    jobs: usize,
) -> Result<Vec<UnitResult>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .thread_name(|index| format!("fslong-unit-{index}"))
        .build()
        .map_err(|err| anyhow!("build worker pool: {err}"))?;
    let results = pool.install(|| {
        units
            .par_iter()
            .map(|identity| match run_unit(ctx, identity) {
                Ok(report) => UnitResult {
                    identity: identity.clone(),
                    report: Some(report),
                    error: None,
                },
                Err(err) => {
                    let message = error_chain(&err);
                    tracing::error!(
                        image_id = %identity.image_id(),
                        error = %message,
                        "unit failed"
                    );
                    UnitResult {
                        identity: identity.clone(),
                        report: None,
                        error: Some(message),
                    }
                }
            })
            .collect()
    });
    Ok(results)
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
