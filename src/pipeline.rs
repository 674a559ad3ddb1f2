//! Stage orchestration: clean → transform → analyze.
//!
//! Each stage walks the configured partitions in order. A partition whose
//! input does not exist is skipped and listed in the stage's [`RunSummary`];
//! any other error aborts the run with the stage name and partition key.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::analysis::CabSummary;
use crate::clean::{CleanSummary, clean_partition, log_clean_results, verify_clean};
use crate::consolidate::{ViewScope, consolidate, consolidate_all};
use crate::enrich::enrich_partition;
use crate::error::Result;
use crate::output::{print_pretty, write_summary};
use crate::session::Session;
use crate::store::{ArtifactKey, Stage, Store};
use crate::trip::PartitionKey;

/// What one stage produced and what it had to skip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub stage: &'static str,
    pub produced: Vec<PartitionKey>,
    pub skipped: Vec<PartitionKey>,
    pub views: Vec<ViewScope>,
}

impl RunSummary {
    fn new(stage: &'static str) -> Self {
        Self {
            stage,
            produced: Vec::new(),
            skipped: Vec::new(),
            views: Vec::new(),
        }
    }

    /// Logs the end-of-stage report, including every skipped partition.
    pub fn log(&self) {
        let produced: Vec<String> = self.produced.iter().map(|k| k.to_string()).collect();
        let skipped: Vec<String> = self.skipped.iter().map(|k| k.to_string()).collect();
        let views: Vec<&str> = self.views.iter().map(|v| v.as_str()).collect();

        info!(
            stage = self.stage,
            produced = ?produced,
            views = ?views,
            "Stage complete"
        );
        if !skipped.is_empty() {
            warn!(stage = self.stage, skipped = ?skipped, "Partitions skipped");
        }
    }
}

/// Rewrites every view artifact for `stage` from `partitions`. Views with no
/// contributing partition are removed so stale output does not linger.
fn write_views<T: Serialize>(
    run_stage: &'static str,
    store: &Store,
    stage: Stage,
    partitions: &BTreeMap<PartitionKey, Vec<T>>,
) -> Result<Vec<ViewScope>> {
    let mut written = Vec::new();

    for scope in ViewScope::all() {
        let key = ArtifactKey::view(stage, scope);
        let result = match consolidate(partitions, scope) {
            Some(view) => store.write(&key, view.rows()).map(|_| {
                info!(view = %key, rows = view.len(), "View written");
                written.push(scope);
            }),
            None => store.remove(&key),
        };
        result.map_err(|e| e.in_view(run_stage, scope))?;
    }

    Ok(written)
}

/// Cleans every configured raw partition that exists.
#[tracing::instrument(skip(session))]
pub fn run_clean(session: &mut Session) -> Result<RunSummary> {
    let mut summary = RunSummary::new("clean");

    for key in session.config().partitions() {
        let raw = session
            .store()
            .read_raw(key)
            .map_err(|e| e.in_stage("clean", key))?;
        let Some(raw) = raw else {
            warn!(partition = %key, "Raw partition not found, skipping");
            summary.skipped.push(key);
            continue;
        };

        let cleaned = clean_partition(&raw);
        let report = verify_clean(&cleaned);
        log_clean_results(&key, &CleanSummary::new(raw.len(), cleaned.len()), &report);

        session
            .store()
            .write(&ArtifactKey::partition(Stage::Clean, key), &cleaned)
            .map_err(|e| e.in_stage("clean", key))?;
        session.clean.insert(key, cleaned);
        summary.produced.push(key);
    }

    if summary.produced.is_empty() {
        warn!("No raw partitions found");
    }
    summary.views = write_views("clean", session.store(), Stage::Clean, &session.clean)?;
    summary.log();
    Ok(summary)
}

/// Enriches every configured clean partition that exists.
///
/// The emission factor table is only required once at least one clean
/// partition is available; its absence then aborts the stage.
#[tracing::instrument(skip(session))]
pub fn run_transform(session: &mut Session) -> Result<RunSummary> {
    let mut summary = RunSummary::new("transform");

    let mut available = Vec::new();
    for key in session.config().partitions() {
        if session
            .ensure_clean(key)
            .map_err(|e| e.in_stage("transform", key))?
        {
            available.push(key);
        } else {
            warn!(partition = %key, "Clean partition not found, skipping");
            summary.skipped.push(key);
        }
    }

    if available.is_empty() {
        warn!("No clean partitions found");
        summary.log();
        return Ok(summary);
    }

    let factors = session
        .emission_factors()
        .map_err(|e| e.in_setup("transform"))?
        .clone();
    for key in available {
        let source = session.clean.get(&key).map(Vec::as_slice).unwrap_or_default();
        let enriched = enrich_partition(key, source, &factors)?;

        session
            .store()
            .write(&ArtifactKey::partition(Stage::Enriched, key), &enriched)
            .map_err(|e| e.in_stage("transform", key))?;
        session.enriched.insert(key, enriched);
        summary.produced.push(key);
    }

    summary.views = write_views("transform", session.store(), Stage::Enriched, &session.enriched)?;
    summary.log();
    Ok(summary)
}

/// Summaries produced by an analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub summaries: Vec<CabSummary>,
    /// Views with no contributing partition; nothing to report for them.
    pub absent: Vec<ViewScope>,
    pub skipped: Vec<PartitionKey>,
    pub written: Vec<PathBuf>,
}

/// Reports on every view over the enriched partitions, optionally limited to
/// a single year.
#[tracing::instrument(skip(session))]
pub fn run_analysis(session: &mut Session, year: Option<i32>) -> Result<AnalysisOutcome> {
    let mut selected = BTreeSet::new();
    let mut skipped = Vec::new();

    let keys = session
        .config()
        .partitions()
        .into_iter()
        .filter(|k| year.is_none_or(|y| k.year == y));
    for key in keys {
        if session
            .ensure_enriched(key)
            .map_err(|e| e.in_stage("analyze", key))?
        {
            selected.insert(key);
        } else {
            warn!(partition = %key, "Enriched partition not found, skipping");
            skipped.push(key);
        }
    }

    let mut outcome = AnalysisOutcome {
        summaries: Vec::new(),
        absent: Vec::new(),
        skipped,
        written: Vec::new(),
    };

    let partitions = session
        .enriched
        .iter()
        .filter(|(k, _)| selected.contains(*k));
    let views = consolidate_all(partitions);
    for scope in ViewScope::all() {
        let Some(view) = views.get(&scope) else {
            warn!(view = %scope, "No enriched data, nothing to report");
            outcome.absent.push(scope);
            continue;
        };

        let summary = CabSummary::from_view(view, year);
        summary.log();
        print_pretty(&summary);
        let path = write_summary(&session.config().output_dir, &summary)
            .map_err(|e| e.in_view("analyze", scope))?;
        outcome.written.push(path);
        outcome.summaries.push(summary);
    }

    if outcome.summaries.is_empty() {
        warn!("No enriched partitions found, nothing to analyze");
    }
    Ok(outcome)
}

/// Runs clean, transform and analyze in order within one session.
pub fn run_all(session: &mut Session, year: Option<i32>) -> Result<(RunSummary, RunSummary, AnalysisOutcome)> {
    let clean = run_clean(session)?;
    let transform = run_transform(session)?;
    let analysis = run_analysis(session, year)?;
    Ok((clean, transform, analysis))
}
