// Instruction templates keyed by corpus and template id

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::corpus::CorpusSelector;
use crate::{RagError, Result};

/// `{corpus -> {template_id -> instruction}}`, loaded once at startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptTemplates {
    templates: BTreeMap<CorpusSelector, BTreeMap<String, String>>,
}

impl PromptTemplates {
    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RagError::Config(format!(
                "failed to read prompt templates {}: {}",
                path.display(),
                e
            ))
        })?;
        let templates = Self::parse(&content).map_err(|e| match e {
            RagError::Config(msg) => RagError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;
        info!(
            "Loaded {} prompt templates from {}",
            templates.len(),
            path.display()
        );
        Ok(templates)
    }

    #[inline]
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| RagError::Config(format!("invalid prompt templates: {}", e)))
    }

    /// Instruction text for `(corpus, id)`; a missing pair is a configuration error
    #[inline]
    pub fn get(&self, corpus: CorpusSelector, id: &str) -> Result<&str> {
        self.templates
            .get(&corpus)
            .and_then(|by_id| by_id.get(id))
            .map(String::as_str)
            .ok_or_else(|| {
                RagError::Config(format!(
                    "prompt template '{}' not found for corpus '{}'",
                    id, corpus
                ))
            })
    }

    /// Template ids defined for a corpus, sorted
    #[inline]
    pub fn ids(&self, corpus: CorpusSelector) -> impl Iterator<Item = &str> {
        self.templates
            .get(&corpus)
            .into_iter()
            .flat_map(|by_id| by_id.keys().map(String::as_str))
    }

    /// Every `(corpus, template_id)` pair in corpus then id order
    #[inline]
    pub fn pairs(&self) -> impl Iterator<Item = (CorpusSelector, &str)> {
        self.templates
            .iter()
            .flat_map(|(corpus, by_id)| by_id.keys().map(move |id| (*corpus, id.as_str())))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.templates.values().map(BTreeMap::len).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
