use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::ScoreArgs;
use crate::metrics::{
    self, GroundTruthTable, SingleRunMetrics, VerificationTable, validate_metrics,
};
use crate::model::ProcessResult;
use crate::util::{read_json, unused_json_path, utc_compact_string, write_json_pretty};

pub fn run(args: ScoreArgs) -> Result<()> {
    let ground_truth = GroundTruthTable::load(&args.ground_truth_path)?;
    for problem in ground_truth.validate() {
        warn!(problem = %problem, "ground-truth annotations");
    }
    if !ground_truth.is_empty() {
        let statistics = ground_truth.statistics();
        info!(
            documents = statistics.total_documents,
            entities = statistics.total_entities,
            with_location = statistics.total_entities_with_location,
            location_coverage = statistics.location_coverage_rate,
            "ground-truth coverage"
        );
    }
    let verifications = VerificationTable::load(&args.verification_path)?;
    let records = score_runs(&args.run_paths, &ground_truth, &verifications)?;

    let output_path = args.output_path.unwrap_or_else(|| {
        unused_json_path(
            &args.output_dir,
            &format!("metrics_{}", utc_compact_string(Utc::now())),
        )
    });
    write_json_pretty(&output_path, &records)?;

    let complete = records
        .iter()
        .filter(|record| record.scores.is_complete())
        .count();
    info!(path = %output_path.display(), runs = records.len(), complete, "wrote single-run metrics");
    Ok(())
}

fn score_runs(
    run_paths: &[PathBuf],
    ground_truth: &GroundTruthTable,
    verifications: &VerificationTable,
) -> Result<Vec<SingleRunMetrics>> {
    let mut records = Vec::with_capacity(run_paths.len());
    for path in run_paths {
        let result: ProcessResult = read_json(path)?;

        let annotation = ground_truth.get(&result.document_name);
        if annotation.is_none() {
            warn!(document = %result.document_name, "no ground-truth annotation; recall metrics left empty");
        }

        let mut record = metrics::compute(&result, annotation);
        record.raw_data.verified_correct_coordinates = verifications
            .get(
                &result.document_name,
                Some(&result.model_name),
                result.repetition_round,
            )
            .first()
            .map(|verification| verification.manually_verified_correct_coordinates_count);
        if let Some(verified) = record.raw_data.verified_correct_coordinates {
            info!(
                document = %result.document_name,
                verified,
                placed = result.coordinates.len(),
                "manually verified coordinates"
            );
        }
        for problem in validate_metrics(&record.raw_data.base, &record.scores) {
            warn!(run = %path.display(), problem = %problem, "implausible metrics");
        }
        info!(
            run = %path.display(),
            model = %result.model_name,
            document = %result.document_name,
            calculated = record.calculated,
            scores = record.scores.populated(),
            "scored run"
        );
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;

    use super::*;
    use crate::model::{DrillHoleEntity, LocationTimingStats};

    #[test]
    fn scores_every_run_record_against_its_annotation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ground_truth_path = dir.path().join("annotations.csv");
        fs::write(
            &ground_truth_path,
            "document_filename,true_total_entities_count,true_entities_with_location_count\nreport.md,4,2\n",
        )
        .expect("write annotations");
        let ground_truth = GroundTruthTable::load(&ground_truth_path).expect("annotations load");

        let mut run_paths = Vec::new();
        for (index, document) in ["report.md", "other.md"].into_iter().enumerate() {
            let result = ProcessResult {
                run_id: format!("run-{index}"),
                generated_at: "2026-01-01T00:00:00Z".to_string(),
                model_name: "qwen".to_string(),
                document_name: document.to_string(),
                repetition_round: None,
                entities: vec![DrillHoleEntity::new("ZK1"), DrillHoleEntity::new("ZK2")],
                coordinates: BTreeMap::new(),
                processing_time: 5.0,
                entity_extraction_time: 2.0,
                document_token_length: None,
                location_timing: LocationTimingStats::default(),
                survey_sha256: None,
                errors: Vec::new(),
            };
            let path = dir.path().join(format!("run_{index}.json"));
            write_json_pretty(&path, &result).expect("write run record");
            run_paths.push(path);
        }

        let verifications = VerificationTable::from_reader(
            "document_filename,model_name,repetition_round,manually_verified_correct_coordinates_count\n\
             report.md,qwen,1,1\n\
             report.md,deepseek,1,2\n"
                .as_bytes(),
        )
        .expect("verifications load");

        let records = score_runs(&run_paths, &ground_truth, &verifications).expect("runs score");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].raw_data.verified_correct_coordinates, Some(1));
        assert_eq!(records[1].raw_data.verified_correct_coordinates, None);
        assert_eq!(records[0].scores.extraction_recall, Some(0.5));
        assert_eq!(records[0].scores.location_recall, Some(0.0));
        assert_eq!(records[0].scores.coordinate_success_rate, Some(0.0));
        assert_eq!(records[1].scores.extraction_recall, None);
    }
}
