//! Offline prompt experiments.
//!
//! For one `(corpus, template)` pair every experiment query is answered under
//! each sampling preset and logged as one JSON line. Prompts are sent to the
//! generator in fixed-size micro-batches.

pub mod queries;


pub use queries::{BatchQuery, ExperimentQueries, load_query_file, parse_query_file};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::corpus::CorpusSelector;
use crate::generation::SamplingPreset;
use crate::pipeline::Assistant;
use crate::prompt::{PromptTemplates, extract_answer, format_prompt};
use crate::{RagError, Result};

/// Existing result files with at least this many lines are treated as complete
pub const MIN_COMPLETE_LINES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentLogEntry {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub mode: CorpusSelector,
    pub language: String,
    pub query: String,
    pub setting: SamplingPreset,
    pub prompt_id: String,
    pub do_sample: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub context_used: Vec<String>,
    pub prompt: String,
    pub model_output: String,
    pub final_answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { entries: usize },
    Skipped { existing_lines: usize },
}

struct PendingPrompt<'a> {
    query: &'a str,
    context_used: Vec<String>,
    prompt: String,
}

pub struct ExperimentRunner<'a> {
    assistant: &'a Assistant,
    templates: &'a PromptTemplates,
    micro_batch_size: usize,
}

impl<'a> ExperimentRunner<'a> {
    #[inline]
    pub fn new(
        assistant: &'a Assistant,
        templates: &'a PromptTemplates,
        micro_batch_size: usize,
    ) -> Result<Self> {
        if micro_batch_size == 0 {
            return Err(RagError::Config(
                "micro batch size must be positive".to_string(),
            ));
        }
        Ok(Self {
            assistant,
            templates,
            micro_batch_size,
        })
    }

    /// Run every query of `corpus` with template `prompt_id`, overwriting `output`
    #[inline]
    pub fn run(
        &self,
        corpus: CorpusSelector,
        prompt_id: &str,
        queries: &ExperimentQueries,
        output: &Path,
    ) -> Result<usize> {
        let instruction = self.templates.get(corpus, prompt_id)?;
        let languages = queries.for_corpus(corpus)?;

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(output)?);
        let run_id = Uuid::new_v4();
        let mut written = 0;

        info!(
            "Starting experiment run {} for '{}' with template '{}'",
            run_id, corpus, prompt_id
        );

        for (language, language_queries) in languages {
            let pending = self.prepare(corpus, instruction, language_queries)?;

            for preset in SamplingPreset::ALL {
                let params = preset.params();
                for group in pending.chunks(self.micro_batch_size) {
                    let prompts: Vec<String> =
                        group.iter().map(|entry| entry.prompt.clone()).collect();
                    let outputs = self
                        .assistant
                        .generator()
                        .generate_batch(&prompts, &params)
                        .map_err(RagError::Generation)?;
                    if outputs.len() != group.len() {
                        return Err(RagError::Generation(anyhow::anyhow!(
                            "generator returned {} outputs for {} prompts",
                            outputs.len(),
                            group.len()
                        )));
                    }

                    for (entry, model_output) in group.iter().zip(outputs) {
                        let log_entry = ExperimentLogEntry {
                            run_id,
                            timestamp: Utc::now(),
                            mode: corpus,
                            language: language.clone(),
                            query: entry.query.to_string(),
                            setting: preset,
                            prompt_id: prompt_id.to_string(),
                            do_sample: params.do_sample,
                            top_p: params.top_p,
                            temperature: params.temperature,
                            context_used: entry.context_used.clone(),
                            prompt: entry.prompt.clone(),
                            final_answer: extract_answer(&model_output),
                            model_output,
                        };
                        serde_json::to_writer(&mut writer, &log_entry).map_err(|e| {
                            RagError::Other(anyhow::anyhow!("failed to write log entry: {}", e))
                        })?;
                        writer.write_all(b"\n")?;
                        written += 1;
                    }
                    debug!(
                        "Logged {} results for [{}] [{}] [{}]",
                        group.len(),
                        corpus,
                        language,
                        preset
                    );
                }
            }
        }

        writer.flush()?;
        info!("Experiment results saved to {}", output.display());
        Ok(written)
    }

    /// Run every `(corpus, template)` pair into `output_dir`, skipping complete result files
    #[inline]
    pub fn run_all(
        &self,
        queries: &ExperimentQueries,
        output_dir: &Path,
    ) -> Result<Vec<(CorpusSelector, String, RunOutcome)>> {
        let mut outcomes = Vec::new();

        for (corpus, prompt_id) in self.templates.pairs() {
            let output = result_path(output_dir, corpus, prompt_id);
            let existing_lines = count_lines(&output)?;

            let outcome = if existing_lines >= MIN_COMPLETE_LINES {
                info!(
                    "Skipping {} | {}: {} lines already written",
                    corpus, prompt_id, existing_lines
                );
                RunOutcome::Skipped { existing_lines }
            } else {
                if existing_lines > 0 {
                    info!(
                        "Found incomplete file for {} | {} with {} lines, re-running",
                        corpus, prompt_id, existing_lines
                    );
                }
                let entries = self.run(corpus, prompt_id, queries, &output)?;
                RunOutcome::Completed { entries }
            };
            outcomes.push((corpus, prompt_id.to_string(), outcome));
        }

        Ok(outcomes)
    }

    fn prepare<'q>(
        &self,
        corpus: CorpusSelector,
        instruction: &str,
        queries: &'q [String],
    ) -> Result<Vec<PendingPrompt<'q>>> {
        let hits = self.assistant.retriever().retrieve_batch(
            queries,
            self.assistant.top_k(),
            corpus,
            self.micro_batch_size,
        )?;

        queries
            .iter()
            .zip(hits)
            .map(|(query, hits)| {
                let context: Vec<_> = hits.into_iter().map(|hit| hit.record).collect();
                let prompt = format_prompt(query, &context, corpus, Some(instruction))?;
                Ok(PendingPrompt {
                    query,
                    context_used: context.iter().map(|record| record.summary()).collect(),
                    prompt,
                })
            })
            .collect()
    }
}

/// `<dir>/<corpus>_<template_id>.jsonl`, with `/` in ids replaced
#[inline]
pub fn result_path(output_dir: &Path, corpus: CorpusSelector, prompt_id: &str) -> PathBuf {
    output_dir.join(format!("{}_{}.jsonl", corpus, prompt_id.replace('/', "_")))
}

fn count_lines(path: &Path) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let mut count = 0;
    for line in BufReader::new(File::open(path)?).lines() {
        line?;
        count += 1;
    }
    Ok(count)
}
