//! Six-metrics scoring of extraction runs and aggregation across repeated
//! runs of the same model and document.

mod aggregate;
mod composite;
pub mod ground_truth;
mod single;
mod stats;
pub mod tokens;
mod types;

pub use aggregate::aggregate;
pub use composite::{CompositeScore, MetricsSummary, composite_score, metrics_summary, validate_metrics};
pub use ground_truth::{GroundTruthTable, VerificationTable};
pub use single::compute;
pub use types::{AggregatedMetrics, AggregationMethod, SingleRunMetrics, SixMetricsScores};
