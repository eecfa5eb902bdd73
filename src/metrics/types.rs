use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::stats;
use crate::model::RunError;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    #[default]
    Mean,
    Median,
}

impl AggregationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
        }
    }

    pub fn reduce(self, values: &[f64]) -> Option<f64> {
        match self {
            Self::Mean => stats::mean(values),
            Self::Median => stats::median(values),
        }
    }
}

/// Counts and timings shared by single-run and aggregated records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseMetricsData {
    pub model_name: String,
    pub document_name: String,
    pub true_total_entities: Option<usize>,
    pub true_entities_with_location: Option<usize>,
    pub document_token_length: Option<usize>,
    pub extracted_entities_count: usize,
    pub extracted_entities_with_location_count: usize,
    pub unique_location_descriptions_count: usize,
    pub unique_location_descriptions_processing_time: Option<f64>,
    pub extracted_coordinates_count: usize,
    /// Entities per 1,000 document tokens.
    pub extraction_density: Option<f64>,
    pub entity_extraction_time: f64,
    pub total_processing_time: f64,
}

impl BaseMetricsData {
    pub fn new(model_name: impl Into<String>, document_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            document_name: document_name.into(),
            ..Self::default()
        }
    }

    pub fn density_from_counts(&self) -> Option<f64> {
        self.document_token_length
            .filter(|tokens| *tokens > 0)
            .map(|tokens| self.extracted_entities_count as f64 / tokens as f64 * 1000.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SingleRunMetricsData {
    #[serde(flatten)]
    pub base: BaseMetricsData,
    #[serde(default)]
    pub location_processing_times: Vec<f64>,
    #[serde(default)]
    pub repetition_round: Option<u32>,
    #[serde(default)]
    pub errors: Vec<RunError>,
    /// Coordinates a reviewer confirmed correct for this run, when verified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_correct_coordinates: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetricsData {
    #[serde(flatten)]
    pub base: BaseMetricsData,
    pub total_repetitions: usize,
    pub aggregation_method: AggregationMethod,
    pub processing_time_cv: Option<f64>,
}

pub const METRIC_NAMES: [&str; 6] = [
    "extraction_recall",
    "location_recall",
    "coordinate_success_rate",
    "processing_stability",
    "efficiency_coefficient",
    "avg_location_processing_time",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SixMetricsScores {
    pub extraction_recall: Option<f64>,
    pub location_recall: Option<f64>,
    pub coordinate_success_rate: Option<f64>,
    pub processing_stability: Option<f64>,
    /// Lower is better.
    pub efficiency_coefficient: Option<f64>,
    /// Seconds; lower is better.
    pub avg_location_processing_time: Option<f64>,
}

impl SixMetricsScores {
    /// Scores in `METRIC_NAMES` order.
    pub fn values(&self) -> [Option<f64>; 6] {
        [
            self.extraction_recall,
            self.location_recall,
            self.coordinate_success_rate,
            self.processing_stability,
            self.efficiency_coefficient,
            self.avg_location_processing_time,
        ]
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        METRIC_NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .and_then(|index| self.values()[index])
    }

    pub fn populated(&self) -> usize {
        self.values().iter().filter(|value| value.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.populated() >= 4
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleRunMetrics {
    pub timestamp: String,
    pub raw_data: SingleRunMetricsData,
    pub scores: SixMetricsScores,
    /// All four count-based scores could be computed.
    pub calculated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    pub timestamp: String,
    pub raw_data: AggregatedMetricsData,
    pub scores: SixMetricsScores,
}
