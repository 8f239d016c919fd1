// Embeddings module
// Text-to-vector encoders behind a small trait so corpora can use different models

pub mod ollama;

pub use ollama::{ModelInfo, OllamaClient};

/// Maps text to a fixed-length vector.
///
/// Every corpus must be queried with the same model it was indexed with;
/// the index only checks that the dimensions line up.
pub trait Embedder: Send + Sync {
    /// Name of the model behind this encoder
    fn model_name(&self) -> &str;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// Encode several texts, preserving input order
    #[inline]
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}
