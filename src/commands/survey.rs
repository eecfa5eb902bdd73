use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::cli::SurveyArgs;
use crate::survey::{SuffixCollision, SurveyIndex};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

#[derive(Debug, Serialize)]
struct SurveyReport {
    generated_at: String,
    survey_path: String,
    survey_sha256: String,
    point_count: usize,
    suffix_collisions: Vec<SuffixCollision>,
}

pub fn run(args: SurveyArgs) -> Result<()> {
    let index = SurveyIndex::load(&args.survey_path)?;
    let survey_sha256 = sha256_file(&args.survey_path)?;

    for collision in index.collisions() {
        info!(
            suffix = %collision.suffix,
            replaced = %collision.replaced_id,
            winner = %collision.winning_id,
            "suffix alias resolves to the later point"
        );
    }
    info!(
        points = index.len(),
        suffix_collisions = index.collisions().len(),
        sha256 = %survey_sha256,
        "survey index ready"
    );

    if let Some(output_path) = args.output_path {
        let report = SurveyReport {
            generated_at: now_utc_string(),
            survey_path: args.survey_path.display().to_string(),
            survey_sha256,
            point_count: index.len(),
            suffix_collisions: index.collisions().to_vec(),
        };
        write_json_pretty(&output_path, &report)?;
        info!(path = %output_path.display(), "wrote survey report");
    }

    Ok(())
}
