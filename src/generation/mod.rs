// Generation module
// Uniform prompt -> text contract over the text-generation backend

pub mod ollama;


pub use ollama::OllamaGenerator;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{RagError, Result};

/// Sampling knobs passed through to the generator.
///
/// With `do_sample == false` decoding is greedy and the other fields are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub do_sample: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl SamplingParams {
    pub const GREEDY: Self = Self {
        do_sample: false,
        top_p: None,
        temperature: None,
    };

    #[inline]
    pub const fn sampled(top_p: f32, temperature: f32) -> Self {
        Self {
            do_sample: true,
            top_p: Some(top_p),
            temperature: Some(temperature),
        }
    }

    /// `top_p` must lie in (0, 1] and `temperature` must be positive
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if let Some(top_p) = self.top_p.filter(|p| !(*p > 0.0 && *p <= 1.0)) {
            return Err(RagError::Input(format!(
                "top_p must be in (0, 1], got {}",
                top_p
            )));
        }
        if let Some(temperature) = self
            .temperature
            .filter(|t| !(t.is_finite() && *t > 0.0))
        {
            return Err(RagError::Input(format!(
                "temperature must be positive, got {}",
                temperature
            )));
        }
        Ok(())
    }
}

impl Default for SamplingParams {
    #[inline]
    fn default() -> Self {
        Self::GREEDY
    }
}

/// Named sampling settings compared by prompt experiments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingPreset {
    Deterministic,
    Balanced,
}

impl SamplingPreset {
    pub const ALL: [Self; 2] = [Self::Deterministic, Self::Balanced];

    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Self::Deterministic => "deterministic",
            Self::Balanced => "balanced",
        }
    }

    #[inline]
    pub fn params(self) -> SamplingParams {
        match self {
            Self::Deterministic => SamplingParams::GREEDY,
            Self::Balanced => SamplingParams::sampled(0.85, 0.6),
        }
    }
}

impl fmt::Display for SamplingPreset {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SamplingPreset {
    type Err = RagError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name() == s)
            .ok_or_else(|| RagError::Config(format!("unknown sampling preset '{}'", s)))
    }
}

/// Text-generation backend.
///
/// Implementations do not retry; a failed call is reported to the caller as is.
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    fn generate(&self, prompt: &str, sampling: &SamplingParams) -> anyhow::Result<String>;

    /// Generate for several prompts with shared settings, preserving order
    #[inline]
    fn generate_batch(
        &self,
        prompts: &[String],
        sampling: &SamplingParams,
    ) -> anyhow::Result<Vec<String>> {
        prompts
            .iter()
            .map(|prompt| self.generate(prompt, sampling))
            .collect()
    }
}
