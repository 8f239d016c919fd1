// One request cycle: retrieve -> format -> generate -> extract


use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::corpus::CorpusSelector;
use crate::generation::{Generator, SamplingParams};
use crate::metadata::Record;
use crate::prompt::{extract_answer, format_prompt};
use crate::retrieval::{Retriever, validate_query};
use crate::{RagError, Result};

#[derive(Debug, Clone)]
pub struct AnswerRequest {
    pub query: String,
    pub corpus: CorpusSelector,
    /// Replaces the corpus default header when set
    pub instruction: Option<String>,
    /// Falls back to the corpus default sampling when unset
    pub sampling: Option<SamplingParams>,
}

impl AnswerRequest {
    #[inline]
    pub fn new(query: impl Into<String>, corpus: CorpusSelector) -> Self {
        Self {
            query: query.into(),
            corpus,
            instruction: None,
            sampling: None,
        }
    }

    #[inline]
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    #[inline]
    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = Some(sampling);
        self
    }

    #[inline]
    pub fn effective_sampling(&self) -> SamplingParams {
        self.sampling
            .unwrap_or(self.corpus.profile().default_sampling)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub prompt: String,
    pub context: Vec<Record>,
    /// Generator output before extraction
    pub raw_output: String,
}

/// Retriever and generator bound together for answering questions
#[derive(Clone)]
pub struct Assistant {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    top_k: usize,
}

impl Assistant {
    #[inline]
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>, top_k: usize) -> Self {
        Self {
            retriever,
            generator,
            top_k,
        }
    }

    #[inline]
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    #[inline]
    pub fn generator(&self) -> &dyn Generator {
        self.generator.as_ref()
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Run the full cycle for one request
    #[inline]
    pub fn answer(&self, request: &AnswerRequest) -> Result<Answer> {
        validate_query(&request.query)?;
        let sampling = request.effective_sampling();
        sampling.validate()?;

        let context = self
            .retriever
            .retrieve_context(&request.query, self.top_k, request.corpus)?;
        let prompt = format_prompt(
            &request.query,
            &context,
            request.corpus,
            request.instruction.as_deref(),
        )?;

        debug!(
            "Prompt for corpus '{}' has {} context records",
            request.corpus,
            context.len()
        );

        let raw_output = self
            .generator
            .generate(&prompt, &sampling)
            .map_err(RagError::Generation)?;
        let answer = extract_answer(&raw_output);

        info!(
            "Answered query on '{}' with {} context records",
            request.corpus,
            context.len()
        );

        Ok(Answer {
            answer,
            prompt,
            context,
            raw_output,
        })
    }
}
