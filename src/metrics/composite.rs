use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::stats;
use super::types::{BaseMetricsData, METRIC_NAMES, SixMetricsScores};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    HigherIsBetter,
    LowerIsBetter,
}

const COMPOSITE_WEIGHTS: [(&str, f64, Orientation); 6] = [
    ("coordinate_success_rate", 0.30, Orientation::HigherIsBetter),
    ("extraction_recall", 0.25, Orientation::HigherIsBetter),
    ("efficiency_coefficient", 0.20, Orientation::LowerIsBetter),
    ("location_recall", 0.15, Orientation::HigherIsBetter),
    ("processing_stability", 0.05, Orientation::HigherIsBetter),
    ("avg_location_processing_time", 0.05, Orientation::LowerIsBetter),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    /// Weighted contribution per metric that had at least one value.
    pub individual_scores: BTreeMap<String, f64>,
    pub comprehensive_score: f64,
    pub total_weight_used: f64,
}

/// Weighted composite over the mean of each metric. Lower-is-better metrics
/// contribute `1 / (1 + mean)`. Returns `None` when there is nothing to score.
pub fn composite_score(records: &[&SixMetricsScores]) -> Option<CompositeScore> {
    if records.is_empty() {
        return None;
    }

    let mut individual_scores = BTreeMap::new();
    let mut total_weight_used = 0.0;
    for (name, weight, orientation) in COMPOSITE_WEIGHTS {
        let values = records
            .iter()
            .filter_map(|scores| scores.get(name))
            .collect::<Vec<f64>>();
        let Some(mean) = stats::mean(&values) else {
            continue;
        };
        let normalized = match orientation {
            Orientation::HigherIsBetter => mean,
            Orientation::LowerIsBetter => 1.0 / (1.0 + mean),
        };
        individual_scores.insert(name.to_string(), normalized * weight);
        total_weight_used += weight;
    }

    Some(CompositeScore {
        comprehensive_score: individual_scores.values().sum(),
        individual_scores,
        total_weight_used,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricStatistics {
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_metrics: usize,
    pub metric_statistics: BTreeMap<String, MetricStatistics>,
    pub comprehensive_scores: Option<CompositeScore>,
}

pub fn metrics_summary(records: &[&SixMetricsScores]) -> MetricsSummary {
    let mut metric_statistics = BTreeMap::new();
    for name in METRIC_NAMES {
        let values = records
            .iter()
            .filter_map(|scores| scores.get(name))
            .collect::<Vec<f64>>();
        let (Some(mean), Some(std), Some(min), Some(max)) = (
            stats::mean(&values),
            stats::population_std(&values),
            stats::min(&values),
            stats::max(&values),
        ) else {
            continue;
        };
        metric_statistics.insert(
            name.to_string(),
            MetricStatistics {
                count: values.len(),
                mean,
                std,
                min,
                max,
            },
        );
    }

    MetricsSummary {
        total_metrics: records.len(),
        metric_statistics,
        comprehensive_scores: composite_score(records),
    }
}

/// Sanity problems with a metrics record. An empty list means the record
/// looks plausible.
pub fn validate_metrics(data: &BaseMetricsData, scores: &SixMetricsScores) -> Vec<String> {
    let mut problems = Vec::new();
    if data.model_name.trim().is_empty() {
        problems.push("model name is empty".to_string());
    }
    if data.document_name.trim().is_empty() {
        problems.push("document name is empty".to_string());
    }
    if let Some(recall) = scores.extraction_recall {
        if !(0.0..=2.0).contains(&recall) {
            problems.push(format!("extraction recall {recall} is outside [0, 2]"));
        }
    }
    if let Some(rate) = scores.coordinate_success_rate {
        if !(0.0..=1.0).contains(&rate) {
            problems.push(format!("coordinate success rate {rate} is outside [0, 1]"));
        }
    }
    problems
}
