use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::AggregateArgs;
use crate::metrics::{
    self, AggregatedMetrics, AggregationMethod, CompositeScore, MetricsSummary, SingleRunMetrics,
    composite_score, metrics_summary, validate_metrics,
};
use crate::util::{
    now_utc_string, read_json, unused_json_path, utc_compact_string, write_json_pretty,
};

#[derive(Debug, Serialize)]
struct AggregateEntry {
    #[serde(flatten)]
    metrics: AggregatedMetrics,
    composite: Option<CompositeScore>,
}

#[derive(Debug, Serialize)]
struct AggregateReport {
    generated_at: String,
    aggregation_method: AggregationMethod,
    groups: Vec<AggregateEntry>,
    summary: MetricsSummary,
}

pub fn run(args: AggregateArgs) -> Result<()> {
    let mut runs = Vec::new();
    for path in &args.metrics_paths {
        let batch: Vec<SingleRunMetrics> = read_json(path)?;
        info!(path = %path.display(), runs = batch.len(), "loaded single-run metrics");
        runs.extend(batch);
    }
    if runs.is_empty() {
        bail!("no single-run metrics found in {} file(s)", args.metrics_paths.len());
    }

    let report = build_report(runs, args.method)?;

    let output_path: PathBuf = args.output_path.unwrap_or_else(|| {
        unused_json_path(
            &args.output_dir,
            &format!("aggregated_{}", utc_compact_string(Utc::now())),
        )
    });
    write_json_pretty(&output_path, &report)?;
    info!(
        path = %output_path.display(),
        groups = report.groups.len(),
        method = args.method.as_str(),
        "wrote aggregated metrics"
    );
    Ok(())
}

fn build_report(runs: Vec<SingleRunMetrics>, method: AggregationMethod) -> Result<AggregateReport> {
    let mut grouped: BTreeMap<(String, String), Vec<SingleRunMetrics>> = BTreeMap::new();
    for run in runs {
        let key = (
            run.raw_data.base.model_name.clone(),
            run.raw_data.base.document_name.clone(),
        );
        grouped.entry(key).or_default().push(run);
    }

    let mut groups = Vec::with_capacity(grouped.len());
    for ((model, document), group) in grouped {
        let aggregated = metrics::aggregate(&group, method)
            .with_context(|| format!("failed to aggregate runs of {model} on {document}"))?;
        for problem in validate_metrics(&aggregated.raw_data.base, &aggregated.scores) {
            warn!(model = %model, document = %document, problem = %problem, "implausible aggregated metrics");
        }
        info!(
            model = %model,
            document = %document,
            runs = group.len(),
            cv = ?aggregated.raw_data.processing_time_cv,
            "aggregated group"
        );
        groups.push(AggregateEntry {
            composite: composite_score(&[&aggregated.scores]),
            metrics: aggregated,
        });
    }

    let scores = groups
        .iter()
        .map(|entry| &entry.metrics.scores)
        .collect::<Vec<_>>();
    let summary = metrics_summary(&scores);

    Ok(AggregateReport {
        generated_at: now_utc_string(),
        aggregation_method: method,
        groups,
        summary,
    })
}
