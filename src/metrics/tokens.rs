use std::path::Path;

use tokenizers::Tokenizer;
use tracing::{info, warn};

/// Counts document tokens with the model's own tokenizer when one is
/// configured, and with [`estimate_tokens`] otherwise.
pub enum TokenCounter {
    Model(Box<Tokenizer>),
    Estimate,
}

impl TokenCounter {
    /// Loads a `tokenizer.json`. A missing or unreadable file falls back to
    /// the character estimate with a warning.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::Estimate;
        };
        match Tokenizer::from_file(path) {
            Ok(tokenizer) => {
                info!(path = %path.display(), "loaded model tokenizer");
                Self::Model(Box::new(tokenizer))
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "tokenizer unavailable; estimating token length");
                Self::Estimate
            }
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            Self::Model(_) => "tokenizer",
            Self::Estimate => "estimate",
        }
    }

    pub fn count(&self, text: &str) -> usize {
        match self {
            Self::Model(tokenizer) => match tokenizer.encode(text, false) {
                Ok(encoding) => encoding.get_ids().len(),
                Err(err) => {
                    warn!(error = %err, "tokenization failed; estimating token length");
                    estimate_tokens(text)
                }
            },
            Self::Estimate => estimate_tokens(text),
        }
    }
}

/// Approximate model token count: one token per CJK ideograph and three
/// tokens for every four other characters.
pub fn estimate_tokens(text: &str) -> usize {
    let (cjk, other) = text.chars().fold((0_usize, 0_usize), |(cjk, other), ch| {
        if ('\u{4e00}'..='\u{9fff}').contains(&ch) {
            (cjk + 1, other)
        } else {
            (cjk, other + 1)
        }
    });
    cjk + other * 3 / 4
}
