use super::ground_truth::GroundTruthRecord;
use super::stats;
use super::types::{BaseMetricsData, SingleRunMetrics, SingleRunMetricsData, SixMetricsScores};
use crate::model::ProcessResult;
use crate::util::now_utc_string;

/// Scores one document pass against its annotation, when one exists.
pub fn compute(result: &ProcessResult, ground_truth: Option<&GroundTruthRecord>) -> SingleRunMetrics {
    let timing = &result.location_timing;

    let mut base = BaseMetricsData::new(&result.model_name, &result.document_name);
    if let Some(record) = ground_truth {
        base.true_total_entities = Some(record.true_total_entities_count);
        base.true_entities_with_location = Some(record.true_entities_with_location_count);
    }
    base.document_token_length = result.document_token_length;
    base.extracted_entities_count = result.entities.len();
    base.extracted_entities_with_location_count = result.entities_with_location();
    base.extracted_coordinates_count = result.coordinates.len();
    base.unique_location_descriptions_count = timing.unique_location_descriptions_count;
    base.unique_location_descriptions_processing_time = Some(timing.total_location_processing_time);
    base.entity_extraction_time = result.entity_extraction_time;
    base.total_processing_time = result.processing_time;
    base.extraction_density = base.density_from_counts();

    let raw_data = SingleRunMetricsData {
        base,
        location_processing_times: timing.location_processing_times.clone(),
        repetition_round: result.repetition_round,
        errors: result.errors.clone(),
        verified_correct_coordinates: None,
    };

    let mut scores = SixMetricsScores::default();
    let calculated = score_counts(&raw_data.base, &mut scores);
    scores.avg_location_processing_time = average_location_time(&raw_data);

    SingleRunMetrics {
        timestamp: now_utc_string(),
        raw_data,
        scores,
        calculated,
    }
}

/// Fills the four count-based scores. Returns whether all four were
/// computable.
fn score_counts(data: &BaseMetricsData, scores: &mut SixMetricsScores) -> bool {
    scores.extraction_recall = ratio(data.extracted_entities_count, data.true_total_entities);
    scores.location_recall = ratio(
        data.extracted_entities_with_location_count,
        data.true_entities_with_location,
    );
    // Coordinates are measured against location-bearing annotations; there
    // is no separate coordinate ground truth.
    scores.coordinate_success_rate =
        ratio(data.extracted_coordinates_count, data.true_entities_with_location);
    scores.efficiency_coefficient = data
        .extraction_density
        .filter(|density| *density > 0.0)
        .filter(|_| data.entity_extraction_time > 0.0)
        .map(|density| data.entity_extraction_time / density);

    [
        scores.extraction_recall,
        scores.location_recall,
        scores.coordinate_success_rate,
        scores.efficiency_coefficient,
    ]
    .iter()
    .all(Option::is_some)
}

fn ratio(numerator: usize, denominator: Option<usize>) -> Option<f64> {
    denominator
        .filter(|denominator| *denominator > 0)
        .map(|denominator| numerator as f64 / denominator as f64)
}

fn average_location_time(data: &SingleRunMetricsData) -> Option<f64> {
    if !data.location_processing_times.is_empty() {
        return stats::mean(&data.location_processing_times);
    }
    let total = data
        .base
        .unique_location_descriptions_processing_time
        .filter(|total| *total > 0.0)?;
    let count = data.base.unique_location_descriptions_count;
    (count > 0).then(|| total / count as f64)
}
