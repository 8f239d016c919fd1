// Query inputs for offline runs: mode-tagged query files and experiment query sets

#[cfg(test)]
mod tests;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use crate::corpus::CorpusSelector;
use crate::{RagError, Result};

static MODE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Mode:\s*(\w+)").expect("valid regex"));
static EN_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)En:\s*(.*?)\s*(?=Es:|\z)").expect("valid regex"));
static ES_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)Es:\s*(.*)").expect("valid regex"));

/// One line of a query file together with the corpus it targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchQuery {
    pub corpus: CorpusSelector,
    pub query: String,
}

/// Parse a query file.
///
/// The file is a sequence of blocks, each opened by `Mode: <corpus>` and
/// holding an `En:` section followed by an optional `Es:` section. Every
/// non-blank line of those sections is a query, in file order (English lines
/// of a block before its Spanish lines).
#[inline]
pub fn parse_query_file(content: &str) -> Result<Vec<BatchQuery>> {
    let headers: Vec<(String, usize, usize)> = MODE_HEADER
        .captures_iter(content)
        .flatten()
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let mode = caps.get(1)?;
            Some((mode.as_str().to_lowercase(), whole.start(), whole.end()))
        })
        .collect();

    let mut parsed = Vec::new();
    for (i, (mode, _, body_start)) in headers.iter().enumerate() {
        let body_end = headers
            .get(i + 1)
            .map_or(content.len(), |(_, next_start, _)| *next_start);
        let block = &content[*body_start..body_end];
        let corpus: CorpusSelector = mode.parse()?;

        let english = first_capture(&EN_SECTION, block)?;
        let spanish = first_capture(&ES_SECTION, block)?;

        let lines = english
            .into_iter()
            .chain(spanish)
            .flat_map(|section| section.split('\n'))
            .map(str::trim)
            .filter(|line| !line.is_empty());

        parsed.extend(lines.map(|line| BatchQuery {
            corpus,
            query: line.to_string(),
        }));
    }

    Ok(parsed)
}

#[inline]
pub fn load_query_file(path: &Path) -> Result<Vec<BatchQuery>> {
    parse_query_file(&fs::read_to_string(path)?)
}

fn first_capture<'t>(regex: &Regex, text: &'t str) -> Result<Option<&'t str>> {
    let caps = regex
        .captures(text)
        .map_err(|e| RagError::Input(format!("failed to scan query file: {}", e)))?;
    Ok(caps.and_then(|caps| caps.get(1)).map(|m| m.as_str().trim()))
}

/// Experiment query sets: `{corpus -> {language -> [query]}}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentQueries {
    sets: BTreeMap<CorpusSelector, BTreeMap<String, Vec<String>>>,
}

impl ExperimentQueries {
    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| match e {
            RagError::Config(msg) => RagError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    #[inline]
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| RagError::Config(format!("invalid experiment queries: {}", e)))
    }

    /// Query lists per language for one corpus; missing corpus is a configuration error
    #[inline]
    pub fn for_corpus(&self, corpus: CorpusSelector) -> Result<&BTreeMap<String, Vec<String>>> {
        self.sets.get(&corpus).ok_or_else(|| {
            RagError::Config(format!("no experiment queries for corpus '{}'", corpus))
        })
    }
}
