#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end tests over on-disk corpora with keyword embeddings and a canned generator

use lingua_rag::RagError;
use lingua_rag::config::Config;
use lingua_rag::corpus::{Corpus, CorpusRegistry, CorpusSelector};
use lingua_rag::embeddings::Embedder;
use lingua_rag::experiments::{
    ExperimentLogEntry, ExperimentQueries, ExperimentRunner, RunOutcome, parse_query_file,
    result_path,
};
use lingua_rag::generation::{Generator, SamplingParams, SamplingPreset};
use lingua_rag::index::FlatIndex;
use lingua_rag::metadata::{MetadataStore, RecordKind};
use lingua_rag::pipeline::{AnswerRequest, Assistant};
use lingua_rag::prompt::PromptTemplates;
use lingua_rag::retrieval::Retriever;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const KEYWORDS: [&str; 6] = ["hello", "thanks", "goodbye", "museum", "food", "beach"];

/// One dimension per keyword plus a constant bias dimension
struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keywords"
    }

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = KEYWORDS
            .iter()
            .map(|keyword| if lower.contains(keyword) { 1.0 } else { 0.0 })
            .collect();
        vector.push(0.1);
        Ok(vector)
    }
}

/// Echoes the prompt and appends a fixed answer, like a causal LM would
struct CannedGenerator;

impl Generator for CannedGenerator {
    fn model_name(&self) -> &str {
        "canned"
    }

    fn generate(&self, prompt: &str, _sampling: &SamplingParams) -> anyhow::Result<String> {
        Ok(format!("{} ¡Claro que sí!", prompt))
    }
}

const PAIRS_JSONL: &str = r#"{"en": "hello", "es": "hola", "source": "tatoeba"}
{"en": "thanks a lot", "es": "muchas gracias", "source": "tatoeba"}
{"en": "goodbye my friend", "es": "adiós mi amigo", "source": "opus"}
"#;

const TRAVEL_JSONL: &str = r#"{"text": "The anthropology museum opens at nine.", "chunk_id": "cdmx_en_0", "city": "Mexico City", "section": "See", "lang": "en"}
{"text": "Street food is best around the market.", "chunk_id": "cdmx_en_1", "city": "Mexico City", "section": "Eat", "lang": "en"}
{"text": "The beach at Puerto Escondido has strong waves.", "chunk_id": "oax_en_4", "city": "Oaxaca", "section": "Do", "lang": "en"}
"#;

fn test_config(temp_dir: &TempDir) -> Config {
    Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    }
}

fn embedder() -> Arc<dyn Embedder> {
    Arc::new(KeywordEmbedder)
}

/// Build and save both corpora from JSONL the way `build-index` does
fn write_corpora(config: &Config) {
    for (selector, kind, content) in [
        (CorpusSelector::General, RecordKind::SentencePair, PAIRS_JSONL),
        (CorpusSelector::Travel, RecordKind::TravelChunk, TRAVEL_JSONL),
    ] {
        let store = MetadataStore::parse(content, kind).expect("records parse");
        Corpus::build(selector, store, embedder(), 2, |_| {})
            .expect("corpus builds")
            .save(config)
            .expect("corpus saves");
    }
}

fn assistant(config: &Config) -> Assistant {
    let registry =
        CorpusRegistry::load_from_config(config, |_| Ok(embedder())).expect("corpora load");
    Assistant::new(
        Retriever::new(Arc::new(registry)),
        Arc::new(CannedGenerator),
        config.retrieval.top_k,
    )
}

#[test]
fn greeting_retrieves_matching_pair_first() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    write_corpora(&config);
    let assistant = assistant(&config);

    let answer = assistant
        .answer(&AnswerRequest::new("Hello!", CorpusSelector::General))
        .expect("question is answered");

    assert_eq!(answer.context.len(), 3);
    assert_eq!(answer.context[0].summary(), "hello -> hola");
    assert!(answer.prompt.contains("Context:\n- hello (-> hola)\n"));
    assert!(answer.prompt.ends_with("User: Hello!\nAnswer:"));
    assert_eq!(answer.answer, "¡Claro que sí!");
}

#[test]
fn travel_context_lists_passage_text() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    write_corpora(&config);
    let assistant = assistant(&config);

    let hits = assistant
        .retriever()
        .retrieve("Which museum should I visit?", 1, CorpusSelector::Travel)
        .expect("retrieval works");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].rank, 0);
    assert_eq!(hits[0].position, 0);

    let answer = assistant
        .answer(
            &AnswerRequest::new("Where can I find good food?", CorpusSelector::Travel)
                .with_instruction("  Answer like a local guide.  "),
        )
        .expect("question is answered");
    assert!(answer.prompt.starts_with("Answer like a local guide.\n\nContext:\n"));
    assert!(
        answer
            .prompt
            .contains("- Street food is best around the market.")
    );
}

#[test]
fn no_retrieval_needs_no_corpus() {
    let assistant = Assistant::new(
        Retriever::new(Arc::new(CorpusRegistry::new())),
        Arc::new(CannedGenerator),
        5,
    );

    let answer = assistant
        .answer(&AnswerRequest::new(
            "What is the capital of Peru?",
            CorpusSelector::NoRetrieval,
        ))
        .expect("baseline answers without retrieval");

    assert!(answer.context.is_empty());
    assert_eq!(
        answer.prompt,
        format!(
            "{}\n\nContext:\n\n\nUser: What is the capital of Peru?\nAnswer:",
            CorpusSelector::NoRetrieval.profile().default_header
        )
    );
}

#[test]
fn misaligned_index_and_metadata_refuse_to_load() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);

    let records: String = (0..10)
        .map(|i| format!("{{\"en\": \"line {i}\", \"es\": \"línea {i}\", \"source\": \"t\"}}\n"))
        .collect();
    fs::create_dir_all(
        config
            .resolve_path(&config.corpora.general.metadata_path)
            .parent()
            .expect("metadata path has a parent"),
    )
    .expect("should create data dir");
    fs::write(
        config.resolve_path(&config.corpora.general.metadata_path),
        records,
    )
    .expect("should write metadata");

    let vectors: Vec<Vec<f32>> = (0..9).map(|i| vec![i as f32; 4]).collect();
    FlatIndex::build(&vectors)
        .expect("index builds")
        .save(&config.resolve_path(&config.corpora.general.index_path))
        .expect("index saves");

    let result = CorpusRegistry::load_selected(&config, &[CorpusSelector::General], |_| {
        Ok(embedder())
    });
    let Err(RagError::Integrity(message)) = result else {
        panic!("expected an integrity error");
    };
    assert!(message.contains("9 vectors"));
    assert!(message.contains("10 records"));
}

#[test]
fn unloaded_corpus_is_an_integrity_error() {
    let assistant = Assistant::new(
        Retriever::new(Arc::new(CorpusRegistry::new())),
        Arc::new(CannedGenerator),
        5,
    );
    let result = assistant.answer(&AnswerRequest::new("hello", CorpusSelector::Travel));
    assert!(matches!(result, Err(RagError::Integrity(_))));
}

#[test]
fn query_file_drives_batch_answers() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    write_corpora(&config);
    let assistant = assistant(&config);

    let queries = parse_query_file(
        "Mode: general\nEn:\nhello\nthanks\nEs:\ngracias\n\nMode: no_retrieval\nEn:\nWhat time is it?\n",
    )
    .expect("query file parses");
    assert_eq!(queries.len(), 4);

    let answers: Vec<String> = queries
        .iter()
        .map(|q| {
            assistant
                .answer(&AnswerRequest::new(q.query.as_str(), q.corpus))
                .expect("each query is answered")
                .answer
        })
        .collect();
    assert!(answers.iter().all(|answer| answer == "¡Claro que sí!"));
}

#[test]
fn experiments_write_logs_and_skip_complete_runs() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    write_corpora(&config);
    let assistant = assistant(&config);

    let templates = PromptTemplates::parse(
        r#"{
            "general": {"tutor/v1": "Reply in Spanish only."},
            "no_retrieval": {"baseline": "Answer briefly."}
        }"#,
    )
    .expect("templates parse");
    let queries = ExperimentQueries::parse(
        r#"{
            "general": {"en": ["hello", "thanks", "goodbye", "hello again", "thanks again"]},
            "no_retrieval": {"en": ["one", "two", "three"], "es": ["uno", "dos"]}
        }"#,
    )
    .expect("queries parse");

    let runner = ExperimentRunner::new(&assistant, &templates, config.retrieval.micro_batch_size)
        .expect("runner builds");
    let output_dir = temp_dir.path().join("results");

    let outcomes = runner.run_all(&queries, &output_dir).expect("experiments run");
    assert_eq!(outcomes.len(), 2);
    assert!(
        outcomes
            .iter()
            .all(|(_, _, outcome)| matches!(outcome, RunOutcome::Completed { entries: 10 }))
    );

    let general_log = result_path(&output_dir, CorpusSelector::General, "tutor/v1");
    assert!(general_log.ends_with("general_tutor_v1.jsonl"));
    let entries: Vec<ExperimentLogEntry> = fs::read_to_string(&general_log)
        .expect("log exists")
        .lines()
        .map(|line| serde_json::from_str(line).expect("log line parses"))
        .collect();
    assert_eq!(entries.len(), 10);
    assert_eq!(entries[0].setting, SamplingPreset::Deterministic);
    assert!(!entries[0].do_sample);
    assert_eq!(entries[0].context_used[0], "hello -> hola");
    assert!(entries[0].prompt.starts_with("Reply in Spanish only."));
    assert_eq!(entries[0].final_answer, "¡Claro que sí!");
    assert!(
        entries
            .iter()
            .filter(|entry| entry.setting == SamplingPreset::Balanced)
            .all(|entry| entry.top_p == Some(0.85) && entry.temperature == Some(0.6))
    );

    // Every file now holds ten lines, so a second pass skips both
    let rerun = runner.run_all(&queries, &output_dir).expect("rerun works");
    assert!(
        rerun
            .iter()
            .all(|(_, _, outcome)| matches!(outcome, RunOutcome::Skipped { existing_lines: 10 }))
    );
}
