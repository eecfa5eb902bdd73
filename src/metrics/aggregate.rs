use tracing::debug;

use super::stats;
use super::types::{
    AggregatedMetrics, AggregatedMetricsData, AggregationMethod, BaseMetricsData,
    SingleRunMetrics, SixMetricsScores,
};
use crate::error::CoreError;
use crate::util::now_utc_string;

/// Folds repeated runs of one (model, document) pair into a single record.
///
/// Counts are reduced with `method` and truncated to whole entities. The
/// processing-time coefficient of variation is always the population value
/// and is left empty for a single run.
pub fn aggregate(
    runs: &[SingleRunMetrics],
    method: AggregationMethod,
) -> Result<AggregatedMetrics, CoreError> {
    let first = &runs.first().ok_or(CoreError::EmptyAggregation)?.raw_data.base;
    for run in &runs[1..] {
        let base = &run.raw_data.base;
        if base.model_name != first.model_name || base.document_name != first.document_name {
            return Err(CoreError::InconsistentRuns {
                expected_model: first.model_name.clone(),
                expected_document: first.document_name.clone(),
                found_model: base.model_name.clone(),
                found_document: base.document_name.clone(),
            });
        }
    }

    let column = |select: fn(&BaseMetricsData) -> f64| -> Vec<f64> {
        runs.iter().map(|run| select(&run.raw_data.base)).collect()
    };
    let reduce_count = |select: fn(&BaseMetricsData) -> f64| -> usize {
        method.reduce(&column(select)).unwrap_or_default() as usize
    };

    let mut base = BaseMetricsData::new(&first.model_name, &first.document_name);
    base.true_total_entities = first.true_total_entities;
    base.true_entities_with_location = first.true_entities_with_location;
    base.document_token_length = first.document_token_length;

    base.extracted_entities_count = reduce_count(|data| data.extracted_entities_count as f64);
    base.extracted_entities_with_location_count =
        reduce_count(|data| data.extracted_entities_with_location_count as f64);
    base.extracted_coordinates_count = reduce_count(|data| data.extracted_coordinates_count as f64);

    let processing_times = column(|data| data.total_processing_time);
    base.total_processing_time = method.reduce(&processing_times).unwrap_or_default();
    base.entity_extraction_time = method
        .reduce(&column(|data| data.entity_extraction_time))
        .unwrap_or_default();

    // Runs that resolved no locations do not dilute the location figures.
    let unique_counts = runs
        .iter()
        .map(|run| run.raw_data.base.unique_location_descriptions_count)
        .filter(|count| *count > 0)
        .map(|count| count as f64)
        .collect::<Vec<f64>>();
    if let Some(count) = method.reduce(&unique_counts) {
        base.unique_location_descriptions_count = count as usize;
    }
    let unique_times = runs
        .iter()
        .filter_map(|run| run.raw_data.base.unique_location_descriptions_processing_time)
        .filter(|time| *time > 0.0)
        .collect::<Vec<f64>>();
    base.unique_location_descriptions_processing_time = method.reduce(&unique_times);

    base.extraction_density = base.density_from_counts();

    let processing_time_cv = stats::coefficient_of_variation(&processing_times);
    debug!(
        model = %base.model_name,
        document = %base.document_name,
        runs = runs.len(),
        method = method.as_str(),
        cv = ?processing_time_cv,
        "aggregated run metrics"
    );

    Ok(AggregatedMetrics {
        timestamp: now_utc_string(),
        scores: aggregate_scores(runs, method, processing_time_cv),
        raw_data: AggregatedMetricsData {
            base,
            total_repetitions: runs.len(),
            aggregation_method: method,
            processing_time_cv,
        },
    })
}

fn aggregate_scores(
    runs: &[SingleRunMetrics],
    method: AggregationMethod,
    processing_time_cv: Option<f64>,
) -> SixMetricsScores {
    let reduce = |select: fn(&SixMetricsScores) -> Option<f64>| {
        let values = runs
            .iter()
            .filter_map(|run| select(&run.scores))
            .collect::<Vec<f64>>();
        method.reduce(&values)
    };

    SixMetricsScores {
        extraction_recall: reduce(|scores| scores.extraction_recall),
        location_recall: reduce(|scores| scores.location_recall),
        coordinate_success_rate: reduce(|scores| scores.coordinate_success_rate),
        processing_stability: processing_time_cv.map(processing_stability),
        efficiency_coefficient: reduce(|scores| scores.efficiency_coefficient),
        avg_location_processing_time: reduce(|scores| scores.avg_location_processing_time),
    }
}

/// `1 - cv`, clipped at zero.
pub fn processing_stability(cv: f64) -> f64 {
    (1.0 - cv).max(0.0)
}
