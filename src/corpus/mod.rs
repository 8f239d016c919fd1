//! Closed set of corpora and the table that binds each one to its
//! backing store, default role header and sampling defaults.
//!
//! The registry holds one immutable snapshot per retrieving corpus. Readers
//! clone the `Arc` and keep working on it even if a rebuilt corpus is
//! installed meanwhile.


use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::config::Config;
use crate::embeddings::Embedder;
use crate::generation::SamplingParams;
use crate::index::FlatIndex;
use crate::metadata::{MetadataStore, RecordKind};
use crate::{RagError, Result};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum CorpusSelector {
    /// English/Spanish sentence pairs
    General,
    /// City travel-guide chunks
    Travel,
    /// Baseline without retrieval
    #[value(name = "no_retrieval", alias = "no-retrieval")]
    NoRetrieval,
}

/// Static bindings of one corpus
#[derive(Debug)]
pub struct CorpusProfile {
    pub selector: CorpusSelector,
    pub name: &'static str,
    /// Label shown when choosing a mode
    pub label: &'static str,
    pub default_header: &'static str,
    /// Record type stored in the corpus; `None` when nothing is retrieved
    pub record_kind: Option<RecordKind>,
    pub default_sampling: SamplingParams,
}

static PROFILES: [CorpusProfile; 3] = [
    CorpusProfile {
        selector: CorpusSelector::General,
        name: "general",
        label: "General Mode (translation, conversation)",
        default_header: "You are a Spanish tutor and language partner. Help the user by translating, rephrasing, or continuing the conversation. Be helpful and encouraging.",
        record_kind: Some(RecordKind::SentencePair),
        default_sampling: SamplingParams::sampled(0.9, 0.8),
    },
    CorpusProfile {
        selector: CorpusSelector::Travel,
        name: "travel",
        label: "Travel Mode (destination info, sightseeing)",
        default_header: "You are a friendly multilingual travel assistant. Provide helpful and accurate information about travel destinations, sightseeing, transportation, or local tips.",
        record_kind: Some(RecordKind::TravelChunk),
        default_sampling: SamplingParams::sampled(0.85, 0.6),
    },
    CorpusProfile {
        selector: CorpusSelector::NoRetrieval,
        name: "no_retrieval",
        label: "No Retrieval Mode (baseline LLM response only)",
        default_header: "You are a helpful multilingual assistant. Answer the user's question naturally and informatively.",
        record_kind: None,
        default_sampling: SamplingParams::GREEDY,
    },
];

impl CorpusSelector {
    pub const ALL: [Self; 3] = [Self::General, Self::Travel, Self::NoRetrieval];

    #[inline]
    pub fn profile(self) -> &'static CorpusProfile {
        match self {
            Self::General => &PROFILES[0],
            Self::Travel => &PROFILES[1],
            Self::NoRetrieval => &PROFILES[2],
        }
    }

    #[inline]
    pub fn name(self) -> &'static str {
        self.profile().name
    }

    #[inline]
    pub fn retrieves(self) -> bool {
        self.profile().record_kind.is_some()
    }
}

impl fmt::Display for CorpusSelector {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CorpusSelector {
    type Err = RagError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|selector| selector.name() == s)
            .ok_or_else(|| {
                RagError::Config(format!(
                    "unknown corpus '{}' (expected general, travel or no_retrieval)",
                    s
                ))
            })
    }
}

/// A loaded corpus: index, position-aligned records and the embedder that built the index
pub struct Corpus {
    selector: CorpusSelector,
    index: FlatIndex,
    store: MetadataStore,
    embedder: Arc<dyn Embedder>,
}

impl fmt::Debug for Corpus {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Corpus")
            .field("selector", &self.selector)
            .field("count", &self.index.count())
            .field("dimension", &self.index.dimension())
            .field("embedding_model", &self.embedder.model_name())
            .finish()
    }
}

impl Corpus {
    /// Bind an index and a store; fails unless both describe the same records
    #[inline]
    pub fn new(
        selector: CorpusSelector,
        index: FlatIndex,
        store: MetadataStore,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let Some(kind) = selector.profile().record_kind else {
            return Err(RagError::Config(format!(
                "corpus '{}' has no backing store",
                selector
            )));
        };

        if store.kind() != kind {
            return Err(RagError::Integrity(format!(
                "corpus '{}' expects {} records but the store holds {} records",
                selector,
                kind,
                store.kind()
            )));
        }

        if index.count() != store.len() {
            return Err(RagError::Integrity(format!(
                "corpus '{}': index holds {} vectors but metadata holds {} records",
                selector,
                index.count(),
                store.len()
            )));
        }

        Ok(Self {
            selector,
            index,
            store,
            embedder,
        })
    }

    /// Load a corpus from the paths configured for it
    #[inline]
    pub fn load(
        selector: CorpusSelector,
        config: &Config,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let (Some(corpus_config), Some(kind)) =
            (config.corpus(selector), selector.profile().record_kind)
        else {
            return Err(RagError::Config(format!(
                "corpus '{}' has no backing store",
                selector
            )));
        };

        let index = FlatIndex::load(&config.resolve_path(&corpus_config.index_path))?;
        let store = MetadataStore::load(&config.resolve_path(&corpus_config.metadata_path), kind)?;
        Self::new(selector, index, store, embedder)
    }

    /// Embed every record of `store` and build a fresh index over them.
    ///
    /// Texts are embedded `batch_size` at a time; `on_batch` receives the
    /// number of records embedded by each completed batch.
    #[inline]
    pub fn build<F>(
        selector: CorpusSelector,
        store: MetadataStore,
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
        mut on_batch: F,
    ) -> Result<Self>
    where
        F: FnMut(usize),
    {
        if batch_size == 0 {
            return Err(RagError::Config("batch size must be positive".to_string()));
        }

        let texts: Vec<String> = store
            .iter()
            .map(|record| record.indexed_text().to_string())
            .collect();
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(batch_size) {
            let embedded = embedder.embed_batch(batch).map_err(RagError::Embedding)?;
            if embedded.len() != batch.len() {
                return Err(RagError::Embedding(anyhow::anyhow!(
                    "embedder returned {} vectors for {} texts",
                    embedded.len(),
                    batch.len()
                )));
            }
            vectors.extend(embedded);
            on_batch(batch.len());
        }

        let index = FlatIndex::build(&vectors)?;
        info!(
            "Built corpus '{}' with {} vectors using '{}'",
            selector,
            index.count(),
            embedder.model_name()
        );
        Self::new(selector, index, store, embedder)
    }

    /// Write the index blob and the aligned metadata to the configured paths
    #[inline]
    pub fn save(&self, config: &Config) -> Result<()> {
        let corpus_config = config.corpus(self.selector).ok_or_else(|| {
            RagError::Config(format!("corpus '{}' has no backing store", self.selector))
        })?;
        self.index
            .save(&config.resolve_path(&corpus_config.index_path))?;
        self.store
            .save(&config.resolve_path(&corpus_config.metadata_path))?;
        Ok(())
    }

    #[inline]
    pub fn selector(&self) -> CorpusSelector {
        self.selector
    }

    #[inline]
    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    #[inline]
    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    #[inline]
    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Loaded corpora, each swappable as a whole
#[derive(Debug, Default)]
pub struct CorpusRegistry {
    corpora: RwLock<HashMap<CorpusSelector, Arc<Corpus>>>,
}

impl CorpusRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every retrieving corpus from configuration.
    ///
    /// `embedder_for` is called once per distinct embedding model. Any load
    /// failure aborts: a corpus that cannot be served is a startup error.
    #[inline]
    pub fn load_from_config<F>(config: &Config, embedder_for: F) -> Result<Self>
    where
        F: FnMut(&str) -> Result<Arc<dyn Embedder>>,
    {
        Self::load_selected(config, &CorpusSelector::ALL, embedder_for)
    }

    /// Load only the listed corpora; selectors without a backing store are skipped
    #[inline]
    pub fn load_selected<F>(
        config: &Config,
        selectors: &[CorpusSelector],
        mut embedder_for: F,
    ) -> Result<Self>
    where
        F: FnMut(&str) -> Result<Arc<dyn Embedder>>,
    {
        let registry = Self::new();
        let mut embedders: HashMap<String, Arc<dyn Embedder>> = HashMap::new();

        for &selector in selectors {
            let Some(corpus_config) = config.corpus(selector) else {
                continue;
            };

            let model = corpus_config.embedding_model.as_str();
            let embedder = match embedders.get(model) {
                Some(embedder) => Arc::clone(embedder),
                None => {
                    let embedder = embedder_for(model)?;
                    embedders.insert(model.to_string(), Arc::clone(&embedder));
                    embedder
                }
            };

            let corpus = Corpus::load(selector, config, embedder).inspect_err(|e| {
                warn!("Failed to load corpus '{}': {}", selector, e);
            })?;
            registry.install(corpus)?;
        }

        Ok(registry)
    }

    /// Replace (or add) a corpus snapshot.
    ///
    /// Requests already holding the previous snapshot finish on it.
    #[inline]
    pub fn install(&self, corpus: Corpus) -> Result<()> {
        let selector = corpus.selector();
        let count = corpus.len();
        let mut corpora = self
            .corpora
            .write()
            .map_err(|_| RagError::Integrity("corpus registry lock poisoned".to_string()))?;
        let replaced = corpora.insert(selector, Arc::new(corpus)).is_some();
        drop(corpora);

        info!(
            "{} corpus '{}' with {} records",
            if replaced { "Swapped in" } else { "Installed" },
            selector,
            count
        );
        Ok(())
    }

    /// Current snapshot of a corpus; missing means it was never loaded
    #[inline]
    pub fn snapshot(&self, selector: CorpusSelector) -> Result<Arc<Corpus>> {
        let corpora = self
            .corpora
            .read()
            .map_err(|_| RagError::Integrity("corpus registry lock poisoned".to_string()))?;
        corpora.get(&selector).cloned().ok_or_else(|| {
            RagError::Integrity(format!("corpus '{}' has no loaded backing store", selector))
        })
    }

    #[inline]
    pub fn is_loaded(&self, selector: CorpusSelector) -> bool {
        self.snapshot(selector).is_ok()
    }
}
