//! Post-processing gate and regional statistics extraction.
//!
//! The gate only decides whether extraction is safe. A missing segmentation
//! after a successful tool exit degrades to a warning: the scheduler already
//! kept failed tool runs from getting this far.
use crate::error::{PipelineError, PipelineResult};
use crate::identity::{parse_corrected_id, UnitIdentity};
use crate::layout::{WorkspaceLayout, PRIMARY_ARTIFACT_REL};
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Produces regional measures from a finished result tree.
pub trait StatisticsExtractor: Send + Sync {
    /// Write measures for `identity` into `output_dir`, returning the files written.
    fn extract(
        &self,
        result_tree: &Path,
        output_dir: &Path,
        identity: &UnitIdentity,
    ) -> Result<Vec<PathBuf>>;
}

/// Outcome of the gate, for callers that report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Extracted,
    SkippedMissingArtifact,
}

/// Run extraction when the primary segmentation exists; skip with a warning otherwise.
pub fn maybe_extract_statistics(
    extractor: &dyn StatisticsExtractor,
    workspace_path: &Path,
    corrected_id: &str,
) -> PipelineResult<UnitIdentity> {
    gate_statistics(extractor, workspace_path, corrected_id).map(|(identity, _)| identity)
}

/// Same as [`maybe_extract_statistics`], also reporting which branch ran.
pub fn gate_statistics(
    extractor: &dyn StatisticsExtractor,
    workspace_path: &Path,
    corrected_id: &str,
) -> PipelineResult<(UnitIdentity, GateDecision)> {
    let identity = parse_corrected_id(corrected_id)?;
    let workspace = WorkspaceLayout::new(workspace_path.to_path_buf());
    if !workspace.primary_artifact(corrected_id).is_file() {
        tracing::warn!(
            unit = %identity,
            artifact = PRIMARY_ARTIFACT_REL,
            "{corrected_id} does not contain {PRIMARY_ARTIFACT_REL}; regional measures skipped"
        );
        return Ok((identity, GateDecision::SkippedMissingArtifact));
    }

    let output_dir = workspace.regional_measures_dir(corrected_id);
    let written = extractor
        .extract(&workspace.result_tree(corrected_id), &output_dir, &identity)
        .map_err(|source| PipelineError::StatisticsExtraction {
            corrected_id: corrected_id.to_string(),
            source: source.into(),
        })?;
    tracing::info!(
        corrected_id,
        files = written.len(),
        "regional measures written"
    );
    Ok((identity, GateDecision::Extracted))
}

/// Converts FreeSurfer `stats/*.stats` tables into TSV files.
#[derive(Debug, Default, Clone, Copy)]
pub struct FreeSurferStats;

impl StatisticsExtractor for FreeSurferStats {
    fn extract(
        &self,
        result_tree: &Path,
        output_dir: &Path,
        identity: &UnitIdentity,
    ) -> Result<Vec<PathBuf>> {
        let stats_dir = result_tree.join("stats");
        let mut sources = Vec::new();
        let entries =
            fs::read_dir(&stats_dir).with_context(|| format!("read {}", stats_dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "stats") && path.is_file() {
                sources.push(path);
            }
        }
        sources.sort();

        fs::create_dir_all(output_dir)
            .with_context(|| format!("create {}", output_dir.display()))?;
        let image_id = identity.image_id();
        let mut written = Vec::new();
        for source in sources {
            let text = fs::read_to_string(&source)
                .with_context(|| format!("read {}", source.display()))?;
            let Some(table) = parse_stats_table(&text) else {
                tracing::debug!(path = %source.display(), "no table in stats file");
                continue;
            };
            let stem = source
                .file_stem()
                .and_then(|stem| stem.to_str())
                .ok_or_else(|| anyhow!("stats file name is not valid UTF-8"))?;
            let dest = output_dir.join(format!("{image_id}_{stem}.tsv"));
            fs::write(&dest, table.to_tsv())
                .with_context(|| format!("write {}", dest.display()))?;
            written.push(dest);
        }
        if written.is_empty() {
            return Err(anyhow!("no stats tables found in {}", stats_dir.display()));
        }
        Ok(written)
    }
}

#[derive(Debug, PartialEq, Eq)]
struct StatsTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl StatsTable {
    fn to_tsv(&self) -> String {
        let mut out = self.headers.join("\t");
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.join("\t"));
            out.push('\n');
        }
        out
    }
}

fn parse_stats_table(text: &str) -> Option<StatsTable> {
    let mut headers = None;
    let mut rows = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            if let Some(cols) = comment.trim_start().strip_prefix("ColHeaders") {
                headers = Some(cols.split_whitespace().map(str::to_string).collect::<Vec<_>>());
            }
            continue;
        }
        rows.push(line.split_whitespace().map(str::to_string).collect());
    }
    let headers = headers.filter(|headers: &Vec<String>| !headers.is_empty())?;
    Some(StatsTable { headers, rows })
}
