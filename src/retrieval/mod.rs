// Query -> ranked records over the selected corpus


use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::corpus::{Corpus, CorpusRegistry, CorpusSelector};
use crate::metadata::Record;
use crate::{RagError, Result};

/// One ranked retrieval result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    /// 0 is the nearest
    pub rank: usize,
    pub position: usize,
    /// Squared L2 distance to the query embedding
    pub distance: f32,
    pub record: Record,
}

#[derive(Debug, Clone)]
pub struct Retriever {
    registry: Arc<CorpusRegistry>,
}

impl Retriever {
    #[inline]
    pub fn new(registry: Arc<CorpusRegistry>) -> Self {
        Self { registry }
    }

    #[inline]
    pub fn registry(&self) -> &CorpusRegistry {
        &self.registry
    }

    /// Up to `k` nearest records of `corpus`, nearest first.
    ///
    /// `no_retrieval` always yields nothing. Otherwise the query must be
    /// non-blank and `k` positive; both are checked before embedding.
    #[inline]
    pub fn retrieve(&self, query: &str, k: usize, corpus: CorpusSelector) -> Result<Vec<Hit>> {
        if !corpus.retrieves() {
            return Ok(Vec::new());
        }
        validate_query(query)?;
        validate_k(k)?;

        let snapshot = self.registry.snapshot(corpus)?;
        let embedding = snapshot
            .embedder()
            .embed(query)
            .map_err(RagError::Embedding)?;

        let hits = search_and_hydrate(&snapshot, &embedding, k)?;
        debug!(
            "Retrieved {} records from '{}' for query of length {}",
            hits.len(),
            corpus,
            query.len()
        );
        Ok(hits)
    }

    /// Records only, in rank order
    #[inline]
    pub fn retrieve_context(
        &self,
        query: &str,
        k: usize,
        corpus: CorpusSelector,
    ) -> Result<Vec<Record>> {
        Ok(self
            .retrieve(query, k, corpus)?
            .into_iter()
            .map(|hit| hit.record)
            .collect())
    }

    /// Retrieve for a known list of queries, embedding them in fixed groups
    /// of `micro_batch_size`. Results line up with `queries`.
    #[inline]
    pub fn retrieve_batch(
        &self,
        queries: &[String],
        k: usize,
        corpus: CorpusSelector,
        micro_batch_size: usize,
    ) -> Result<Vec<Vec<Hit>>> {
        if !corpus.retrieves() {
            return Ok(vec![Vec::new(); queries.len()]);
        }
        for query in queries {
            validate_query(query)?;
        }
        validate_k(k)?;
        if micro_batch_size == 0 {
            return Err(RagError::Input(
                "micro batch size must be positive".to_string(),
            ));
        }

        let snapshot = self.registry.snapshot(corpus)?;
        let mut results = Vec::with_capacity(queries.len());

        for group in queries.chunks(micro_batch_size) {
            let embeddings = snapshot
                .embedder()
                .embed_batch(group)
                .map_err(RagError::Embedding)?;
            if embeddings.len() != group.len() {
                return Err(RagError::Embedding(anyhow::anyhow!(
                    "embedder returned {} vectors for {} queries",
                    embeddings.len(),
                    group.len()
                )));
            }
            for embedding in &embeddings {
                results.push(search_and_hydrate(&snapshot, embedding, k)?);
            }
        }

        info!(
            "Retrieved context for {} queries from '{}' in groups of {}",
            queries.len(),
            corpus,
            micro_batch_size
        );
        Ok(results)
    }
}

fn search_and_hydrate(corpus: &Corpus, embedding: &[f32], k: usize) -> Result<Vec<Hit>> {
    corpus
        .index()
        .search(embedding, k)?
        .into_iter()
        .enumerate()
        .map(|(rank, neighbor)| {
            Ok(Hit {
                rank,
                position: neighbor.position,
                distance: neighbor.distance,
                record: corpus.store().get(neighbor.position)?.clone(),
            })
        })
        .collect()
}

/// Reject empty or whitespace-only queries
#[inline]
pub fn validate_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(RagError::Input("query must not be empty".to_string()));
    }
    Ok(())
}

fn validate_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(RagError::Input("k must be a positive integer".to_string()));
    }
    Ok(())
}
