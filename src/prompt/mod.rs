//! Prompt assembly and answer extraction.
//!
//! A prompt is a role header, a `Context:` listing of retrieved records and
//! the user turn, closed by the [`ANSWER_MARKER`] the generator continues from.

pub mod templates;


pub use templates::PromptTemplates;

use crate::corpus::CorpusSelector;
use crate::metadata::Record;
use crate::{RagError, Result};

/// Last line of every prompt; the answer is whatever follows its last occurrence
pub const ANSWER_MARKER: &str = "Answer:";

/// Render the full prompt for `query` over `context`.
///
/// A non-empty `instruction` replaces the corpus default header after trimming,
/// so a whitespace-only one yields an empty header. Records whose kind does not
/// belong to `corpus` are rejected rather than rendered.
#[inline]
pub fn format_prompt(
    query: &str,
    context: &[Record],
    corpus: CorpusSelector,
    instruction: Option<&str>,
) -> Result<String> {
    let header = instruction
        .filter(|text| !text.is_empty())
        .map_or(corpus.profile().default_header, str::trim);

    let context_block = render_context(context, corpus)?;

    Ok(format!(
        "{}\n\nContext:\n{}\n\nUser: {}\n{}",
        header, context_block, query, ANSWER_MARKER
    ))
}

/// One line per record, in rank order; always empty for `no_retrieval`
#[inline]
pub fn render_context(context: &[Record], corpus: CorpusSelector) -> Result<String> {
    let Some(expected) = corpus.profile().record_kind else {
        return Ok(String::new());
    };

    let lines = context
        .iter()
        .map(|record| match record {
            Record::SentencePair(pair) if expected == record.kind() => {
                Ok(format!("- {} (-> {})", pair.source_text, pair.target_text))
            }
            Record::TravelChunk(chunk) if expected == record.kind() => {
                Ok(format!("- {}", chunk.text))
            }
            _ => Err(RagError::Integrity(format!(
                "{} record cannot be rendered as context for corpus '{}'",
                record.kind(),
                corpus
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(lines.join("\n"))
}

/// Text after the last answer marker, trimmed; the whole output trimmed if there is none
#[inline]
pub fn extract_answer(output: &str) -> String {
    match output.rfind(ANSWER_MARKER) {
        Some(at) => output[at + ANSWER_MARKER.len()..].trim().to_string(),
        None => output.trim().to_string(),
    }
}
