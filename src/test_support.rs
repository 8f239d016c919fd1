// Fixed-vector test doubles shared by unit tests

use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::embeddings::Embedder;
use crate::generation::{Generator, SamplingParams};
use crate::metadata::{Record, SentencePair, TravelChunk};

/// Embedder that looks texts up in a fixed table and counts its calls
pub(crate) struct FixedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl FixedEmbedder {
    pub(crate) fn new(entries: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(text, vector)| ((*text).to_string(), vector.clone()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for FixedEmbedder {
    fn model_name(&self) -> &str {
        "fixed"
    }

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| anyhow!("no fixed vector for {:?}", text))
    }
}

/// Generator that echoes the prompt followed by a canned answer
pub(crate) struct EchoGenerator {
    answer: String,
    pub(crate) prompts: Mutex<Vec<(String, SamplingParams)>>,
    pub(crate) batch_sizes: Mutex<Vec<usize>>,
}

impl EchoGenerator {
    pub(crate) fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            prompts: Mutex::new(Vec::new()),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }
}

impl Generator for EchoGenerator {
    fn model_name(&self) -> &str {
        "echo"
    }

    fn generate(&self, prompt: &str, sampling: &SamplingParams) -> anyhow::Result<String> {
        self.prompts
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .push((prompt.to_string(), *sampling));
        Ok(format!("{} {}", prompt, self.answer))
    }

    fn generate_batch(
        &self,
        prompts: &[String],
        sampling: &SamplingParams,
    ) -> anyhow::Result<Vec<String>> {
        self.batch_sizes
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .push(prompts.len());
        prompts
            .iter()
            .map(|prompt| self.generate(prompt, sampling))
            .collect()
    }
}

pub(crate) fn pair(source: &str, target: &str) -> Record {
    Record::SentencePair(SentencePair {
        source_text: source.to_string(),
        target_text: target.to_string(),
        provenance: "test".to_string(),
    })
}

pub(crate) fn chunk(id: &str, text: &str) -> Record {
    Record::TravelChunk(TravelChunk {
        text: text.to_string(),
        chunk_id: id.to_string(),
        city: "Oaxaca".to_string(),
        section: "See".to_string(),
        lang: Some("en".to_string()),
        source: Some("wikivoyage".to_string()),
    })
}
