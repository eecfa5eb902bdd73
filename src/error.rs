use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no JSON value could be recovered from model output: {preview}")]
    MalformedPayload { preview: String },

    #[error("survey table not found: {}", path.display())]
    SurveyNotFound { path: PathBuf },

    #[error("invalid survey table {}: {reason}", path.display())]
    InvalidSurveyData { path: PathBuf, reason: String },

    #[error("invalid location directive: {reason}")]
    InvalidDirective { reason: String },

    #[error("survey point {id} is not in the survey index")]
    UnresolvedPoint { id: String },

    #[error("survey points {from} and {toward} share an XY position; no heading between them")]
    DegenerateHeading { from: String, toward: String },

    #[error(
        "cannot aggregate runs of {found_model}/{found_document} together with {expected_model}/{expected_document}"
    )]
    InconsistentRuns {
        expected_model: String,
        expected_document: String,
        found_model: String,
        found_document: String,
    },

    #[error("no runs to aggregate")]
    EmptyAggregation,
}

const PREVIEW_CHARS: usize = 200;

/// First ~200 characters of `text`, with an ellipsis when truncated.
pub fn payload_preview(text: &str) -> String {
    let mut preview = text.chars().take(PREVIEW_CHARS).collect::<String>();
    if text.chars().nth(PREVIEW_CHARS).is_some() {
        preview.push_str("...");
    }
    preview
}
