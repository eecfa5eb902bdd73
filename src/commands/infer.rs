use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::InferArgs;
use crate::directive::{CommandModel, DirectiveCache, DirectiveModel, DirectiveResolver};
use crate::entities::entities_from_payload;
use crate::inference::CoordinateEngine;
use crate::metrics::tokens::TokenCounter;
use crate::model::{DrillHoleEntity, ProcessResult, RunError};
use crate::survey::SurveyIndex;
use crate::util::{
    now_utc_string, sha256_file, unused_json_path, utc_compact_string, write_json_pretty,
};

pub fn run(args: InferArgs) -> Result<()> {
    let model = CommandModel::from_command_line(&args.model_command)?;
    let result = process(&args, model)?;

    let output_path = args
        .output_path
        .clone()
        .unwrap_or_else(|| unused_json_path(&args.output_dir, &format!("run_{}", result.run_id)));
    write_json_pretty(&output_path, &result)?;

    info!(path = %output_path.display(), "wrote run record");
    info!(
        document = %result.document_name,
        entities = result.entities.len(),
        with_location = result.entities_with_location(),
        placed = result.coordinates.len(),
        success_rate = result.success_rate(),
        errors = result.errors.len(),
        "inference completed"
    );
    Ok(())
}

fn process<M: DirectiveModel>(args: &InferArgs, model: M) -> Result<ProcessResult> {
    let started = Instant::now();

    let survey = SurveyIndex::load(&args.survey_path)?;
    let survey_sha256 = sha256_file(&args.survey_path)?;

    let mut errors = Vec::new();
    let mut entities = load_entities(&args.entities_path, &mut errors)?;

    let document_token_length = match &args.document_text_path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read document text {}", path.display()))?;
            let counter = TokenCounter::load(args.tokenizer_path.as_deref());
            let tokens = counter.count(&text);
            info!(tokens, source = counter.source(), "measured document token length");
            Some(tokens)
        }
        None => None,
    };

    let mut resolver = DirectiveResolver::new(model).with_streaming(args.stream);
    if args.enable_cache {
        resolver = resolver.with_cache(DirectiveCache::new());
    }
    let mut engine = CoordinateEngine::new(&survey, resolver);
    let outcome = engine.infer(&mut entities);
    if let Some(cache) = engine.resolver().cache() {
        info!(entries = cache.len(), hits = cache.hits(), "directive cache usage");
    }

    let document_name = args
        .document_name
        .clone()
        .or_else(|| file_name(&args.entities_path))
        .unwrap_or_else(|| "unknown".to_string());

    Ok(ProcessResult {
        run_id: run_id(utc_compact_string(Utc::now()), args.repetition_round),
        generated_at: now_utc_string(),
        model_name: args.model_name.clone(),
        document_name,
        repetition_round: args.repetition_round,
        entities,
        coordinates: outcome.coordinates,
        processing_time: args.entity_extraction_time_secs + started.elapsed().as_secs_f64(),
        entity_extraction_time: args.entity_extraction_time_secs,
        document_token_length,
        location_timing: outcome.timing,
        survey_sha256: Some(survey_sha256),
        errors,
    })
}

/// An unrecoverable extraction reply is recorded on the run rather than
/// failing it, so the run still counts as an (empty) extraction.
fn load_entities(path: &Path, errors: &mut Vec<RunError>) -> Result<Vec<DrillHoleEntity>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read entity payload {}", path.display()))?;

    match entities_from_payload(&raw) {
        Ok(entities) => {
            info!(path = %path.display(), entities = entities.len(), "loaded drill-hole entities");
            Ok(entities)
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "entity payload could not be recovered");
            errors.push(RunError {
                kind: "malformed_payload".to_string(),
                message: err.to_string(),
            });
            Ok(Vec::new())
        }
    }
}

fn run_id(stamp: String, repetition_round: Option<u32>) -> String {
    match repetition_round {
        Some(round) => format!("{stamp}_r{round}"),
        None => stamp,
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
}
