use std::collections::HashMap;

use anyhow::Result;
use tracing::{debug, warn};

use super::prompt::location_analysis_prompt;
use super::transport::DirectiveModel;
use super::types::LocationDirective;
use crate::recovery::recover_json_object;

/// Directives already resolved in this run, keyed by the exact description.
/// Failed resolutions are cached too. Not synchronised: share a resolver
/// across workers only with external locking or with the cache disabled.
#[derive(Debug, Default)]
pub struct DirectiveCache {
    entries: HashMap<String, Option<LocationDirective>>,
    hits: usize,
}

impl DirectiveCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&mut self, description: &str) -> Option<Option<LocationDirective>> {
        let cached = self.entries.get(description).cloned();
        if cached.is_some() {
            self.hits += 1;
        }
        cached
    }

    fn insert(&mut self, description: &str, directive: Option<LocationDirective>) {
        self.entries.insert(description.to_string(), directive);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}

pub struct DirectiveResolver<M> {
    model: M,
    stream: bool,
    cache: Option<DirectiveCache>,
}

impl<M: DirectiveModel> DirectiveResolver<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            stream: false,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: DirectiveCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn cache(&self) -> Option<&DirectiveCache> {
        self.cache.as_ref()
    }

    /// Resolves one description. Every failure (transport, unparseable reply,
    /// missing reference point) degrades to `None` so one bad description
    /// cannot abort a document.
    pub fn resolve(&mut self, description: &str) -> Option<LocationDirective> {
        if let Some(cache) = self.cache.as_mut() {
            if let Some(cached) = cache.get(description) {
                debug!(description, "using cached location directive");
                return cached;
            }
        }

        let directive = self.request(description);

        if let Some(cache) = self.cache.as_mut() {
            cache.insert(description, directive.clone());
        }
        directive
    }

    fn request(&self, description: &str) -> Option<LocationDirective> {
        let prompt = location_analysis_prompt(description);

        let reply = match self.reply(&prompt) {
            Ok(reply) => reply,
            Err(err) => {
                warn!(description, error = %err, "location analysis call failed");
                return None;
            }
        };
        debug!(description, reply_chars = reply.chars().count(), "location analysis reply");

        let payload = match recover_json_object(&reply) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(description, error = %err, "location analysis reply is not a JSON object");
                return None;
            }
        };

        match LocationDirective::from_payload(&payload) {
            Ok(directive) => Some(directive),
            Err(err) => {
                warn!(description, error = %err, "location analysis reply rejected");
                None
            }
        }
    }

    fn reply(&self, prompt: &str) -> Result<String> {
        if !self.stream {
            return self.model.send(prompt);
        }

        let mut reply = String::new();
        for chunk in self.model.stream(prompt)? {
            reply.push_str(&chunk?);
        }
        Ok(reply)
    }
}
