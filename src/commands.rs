use anyhow::{Context, Result, anyhow, bail};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::corpus::{Corpus, CorpusRegistry, CorpusSelector};
use crate::embeddings::{Embedder, OllamaClient};
use crate::experiments::{
    ExperimentQueries, ExperimentRunner, RunOutcome, load_query_file, result_path,
};
use crate::generation::{OllamaGenerator, SamplingParams};
use crate::index::FlatIndex;
use crate::mcp::{McpServer, register_rag_tools};
use crate::metadata::MetadataStore;
use crate::pipeline::{AnswerRequest, Assistant};
use crate::prompt::PromptTemplates;
use crate::retrieval::Retriever;

/// Number of leading vector components shown by `inspect`
const PREVIEW_DIMENSIONS: usize = 8;

/// Load the given corpora with one Ollama embedding client per model
#[inline]
pub fn load_registry(
    config: &Config,
    selectors: &[CorpusSelector],
) -> Result<Arc<CorpusRegistry>> {
    let registry = CorpusRegistry::load_selected(config, selectors, |model| {
        let client: Arc<dyn Embedder> = Arc::new(OllamaClient::new(&config.ollama, model)?);
        Ok(client)
    })
    .context("Failed to load corpora")?;
    Ok(Arc::new(registry))
}

/// Wire retriever and Ollama generator together for the given corpora
#[inline]
pub fn build_assistant(config: &Config, selectors: &[CorpusSelector]) -> Result<Assistant> {
    let registry = load_registry(config, selectors)?;
    let generator = OllamaGenerator::new(&config.ollama, &config.generation)
        .context("Failed to create generation client")?;
    Ok(Assistant::new(
        Retriever::new(registry),
        Arc::new(generator),
        config.retrieval.top_k,
    ))
}

/// Load the template table, or an empty one when the file does not exist yet
#[inline]
pub fn load_templates(config: &Config) -> Result<PromptTemplates> {
    let path = config.prompt_templates_path();
    if !path.exists() {
        warn!(
            "No prompt templates at {}, only default headers are available",
            path.display()
        );
        return Ok(PromptTemplates::default());
    }
    Ok(PromptTemplates::load(&path)?)
}

/// Answer one question and print the result
#[inline]
pub fn ask(
    config: &Config,
    query: &str,
    corpus: CorpusSelector,
    template: Option<&str>,
    sampling: Option<SamplingParams>,
    show_context: bool,
) -> Result<()> {
    let mut request = AnswerRequest::new(query, corpus);
    if let Some(id) = template {
        let templates = PromptTemplates::load(&config.prompt_templates_path())?;
        request = request.with_instruction(templates.get(corpus, id)?);
    }
    if let Some(sampling) = sampling {
        request = request.with_sampling(sampling);
    }

    let assistant = build_assistant(config, &[corpus])?;
    let answer = assistant.answer(&request)?;

    if show_context {
        println!("{}", style("Context:").bold().yellow());
        if answer.context.is_empty() {
            println!("  (none)");
        }
        for (rank, record) in answer.context.iter().enumerate() {
            println!("  {}. {}", rank + 1, record.summary());
        }
        println!();
    }
    println!("{}", answer.answer);

    Ok(())
}

/// Interactive conversation; `/switch` picks another mode, `exit` or `quit` leaves
#[inline]
pub fn chat(config: &Config) -> Result<()> {
    let assistant = build_assistant(config, &CorpusSelector::ALL)?;

    println!("{}", style("💬 lingua-rag chat").bold().cyan());
    println!("Type '/switch' to change mode, 'exit' or 'quit' to leave.");

    loop {
        let corpus = choose_mode()?;
        println!(
            "{} {}",
            style("Mode:").bold(),
            style(corpus.profile().label).cyan()
        );

        loop {
            let line: String = Input::new().with_prompt("You").interact_text()?;
            let input = line.trim();

            match input.to_lowercase().as_str() {
                "exit" | "quit" => {
                    println!("Goodbye!");
                    return Ok(());
                }
                "/switch" => break,
                _ => {}
            }

            match assistant.answer(&AnswerRequest::new(input, corpus)) {
                Ok(answer) => {
                    println!("{} {}", style("Assistant:").bold().green(), answer.answer);
                }
                Err(e) if e.is_recoverable() => {
                    println!("{}", style(format!("⚠️  {}", e)).yellow());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn choose_mode() -> Result<CorpusSelector> {
    println!();
    println!("Choose a mode:");
    for (number, selector) in CorpusSelector::ALL.iter().enumerate() {
        println!("  {}. {}", number + 1, selector.profile().label);
    }

    let choice: usize = Input::new()
        .with_prompt("Mode (1/2/3)")
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=CorpusSelector::ALL.len()).contains(input) {
                Ok(())
            } else {
                Err("Please enter 1, 2 or 3")
            }
        })
        .interact_text()?;

    CorpusSelector::ALL
        .get(choice - 1)
        .copied()
        .ok_or_else(|| anyhow!("invalid mode {}", choice))
}

/// Answer every query of a `Mode:`/`En:`/`Es:` query file in file order
#[inline]
pub fn run_batch(config: &Config, path: &Path) -> Result<()> {
    let queries = load_query_file(path)
        .with_context(|| format!("Failed to read query file {}", path.display()))?;
    if queries.is_empty() {
        println!("No queries found in {}", path.display());
        return Ok(());
    }

    let selectors: Vec<CorpusSelector> = queries
        .iter()
        .map(|q| q.corpus)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let assistant = build_assistant(config, &selectors)?;

    let mut failed = 0;
    for (number, query) in queries.iter().enumerate() {
        println!(
            "{} [{}] {}",
            style(format!("Q{}:", number + 1)).bold(),
            query.corpus,
            query.query
        );
        match assistant.answer(&AnswerRequest::new(query.query.as_str(), query.corpus)) {
            Ok(answer) => println!("{} {}", style("A:").bold().green(), answer.answer),
            Err(e) if e.is_recoverable() => {
                failed += 1;
                println!("{}", style(format!("⚠️  {}", e)).yellow());
            }
            Err(e) => return Err(e.into()),
        }
        println!();
    }

    println!(
        "Answered {} of {} queries",
        queries.len() - failed,
        queries.len()
    );
    Ok(())
}

/// Run one `(corpus, template)` experiment into `output_dir`
#[inline]
pub fn run_experiment(
    config: &Config,
    corpus: CorpusSelector,
    template: &str,
    queries_path: &Path,
    output_dir: &Path,
) -> Result<()> {
    let queries = ExperimentQueries::load(queries_path)?;
    let templates = PromptTemplates::load(&config.prompt_templates_path())?;
    let assistant = build_assistant(config, &[corpus])?;
    let runner = ExperimentRunner::new(&assistant, &templates, config.retrieval.micro_batch_size)?;

    let output = result_path(output_dir, corpus, template);
    let entries = runner.run(corpus, template, &queries, &output)?;

    println!(
        "✅ {} | {}: {} entries written to {}",
        corpus,
        template,
        entries,
        output.display()
    );
    Ok(())
}

/// Run every `(corpus, template)` pair, skipping result files that are already complete
#[inline]
pub fn run_all_experiments(config: &Config, queries_path: &Path, output_dir: &Path) -> Result<()> {
    let queries = ExperimentQueries::load(queries_path)?;
    let templates = PromptTemplates::load(&config.prompt_templates_path())?;
    if templates.is_empty() {
        bail!(
            "No prompt templates defined in {}",
            config.prompt_templates_path().display()
        );
    }

    let selectors: Vec<CorpusSelector> = templates
        .pairs()
        .map(|(corpus, _)| corpus)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let assistant = build_assistant(config, &selectors)?;
    let runner = ExperimentRunner::new(&assistant, &templates, config.retrieval.micro_batch_size)?;

    for (corpus, template, outcome) in runner.run_all(&queries, output_dir)? {
        match outcome {
            RunOutcome::Completed { entries } => {
                println!("✅ {} | {}: {} entries", corpus, template, entries);
            }
            RunOutcome::Skipped { existing_lines } => {
                println!(
                    "⏭️  {} | {}: skipped ({} lines already written)",
                    corpus, template, existing_lines
                );
            }
        }
    }

    println!("All experiments saved to {}", output_dir.display());
    Ok(())
}

/// Embed a JSONL of corpus records and write a fresh index plus aligned metadata
#[inline]
pub fn build_index(config: &Config, corpus: CorpusSelector, input: &Path) -> Result<()> {
    let kind = corpus
        .profile()
        .record_kind
        .ok_or_else(|| anyhow!("Corpus '{}' has no backing store to build", corpus))?;
    let corpus_config = config
        .corpus(corpus)
        .ok_or_else(|| anyhow!("Corpus '{}' is not configured", corpus))?;

    let store = MetadataStore::load(input, kind)
        .with_context(|| format!("Failed to read records from {}", input.display()))?;
    if store.is_empty() {
        bail!("No records found in {}", input.display());
    }

    let client = OllamaClient::new(&config.ollama, &corpus_config.embedding_model)
        .context("Failed to create embedding client")?;
    client
        .health_check()
        .context("Embedding model is not available")?;

    println!(
        "🧮 Embedding {} records for '{}' with {}",
        store.len(),
        corpus,
        corpus_config.embedding_model
    );

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(store.len() as u64).with_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} Embedding ({eta})")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };

    let built = Corpus::build(
        corpus,
        store,
        Arc::new(client),
        config.ollama.batch_size as usize,
        |embedded| bar.inc(embedded as u64),
    );
    bar.finish_and_clear();
    let built = built?;

    built.save(config)?;

    println!(
        "✅ Wrote {} vectors of dimension {}",
        built.index().count(),
        built.index().dimension()
    );
    println!(
        "   Index: {}",
        config.resolve_path(&corpus_config.index_path).display()
    );
    println!(
        "   Metadata: {}",
        config.resolve_path(&corpus_config.metadata_path).display()
    );
    Ok(())
}

/// Report index shape, check alignment with the metadata and preview the first vectors
#[inline]
pub fn inspect(config: &Config, corpus: CorpusSelector, preview: usize) -> Result<()> {
    let kind = corpus
        .profile()
        .record_kind
        .ok_or_else(|| anyhow!("Corpus '{}' has no backing store to inspect", corpus))?;
    let corpus_config = config
        .corpus(corpus)
        .ok_or_else(|| anyhow!("Corpus '{}' is not configured", corpus))?;

    let index = FlatIndex::load(&config.resolve_path(&corpus_config.index_path))?;
    let store = MetadataStore::load(&config.resolve_path(&corpus_config.metadata_path), kind)?;

    println!("{}", style(format!("🔍 Corpus '{}'", corpus)).bold().cyan());
    println!("   Vectors: {}", index.count());
    println!("   Dimension: {}", index.dimension());
    println!("   Records: {} ({})", store.len(), store.kind());
    println!("   Embedding model: {}", corpus_config.embedding_model);

    if index.count() != store.len() {
        bail!(
            "Index holds {} vectors but metadata holds {} records",
            index.count(),
            store.len()
        );
    }
    println!("   ✅ Index and metadata are aligned");

    let shown = preview.min(index.count());
    if shown > 0 {
        println!();
        println!("{}", style(format!("First {} entries:", shown)).bold());
    }
    for position in 0..shown {
        let head: Vec<String> = index
            .vector(position)
            .unwrap_or_default()
            .iter()
            .take(PREVIEW_DIMENSIONS)
            .map(|value| format!("{:.4}", value))
            .collect();
        let ellipsis = if index.dimension() > PREVIEW_DIMENSIONS {
            ", ..."
        } else {
            ""
        };
        println!("  [{}] [{}{}]", position, head.join(", "), ellipsis);
        println!("       {}", store.get(position)?.summary());
    }

    Ok(())
}

/// Show Ollama reachability and the load state of every corpus
#[inline]
pub fn show_status(config: &Config) -> Result<()> {
    println!("📊 lingua-rag Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama, &config.generation.model) {
        Ok(client) => match client.ping() {
            Ok(()) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                match client.validate_model() {
                    Ok(()) => println!("   📋 Generation model: {}", config.generation.model),
                    Err(e) => println!("   ⚠️  Generation model: {}", e),
                }
            }
            Err(e) => {
                println!("   ❌ Ollama: Not reachable - {:#}", e);
            }
        },
        Err(e) => {
            println!("   ❌ Ollama: Invalid client configuration - {:#}", e);
        }
    }

    println!();
    println!("📚 Corpora:");
    for selector in CorpusSelector::ALL {
        let Some(corpus_config) = config.corpus(selector) else {
            println!("   💤 {}: no retrieval", selector);
            continue;
        };

        let client = match OllamaClient::new(&config.ollama, &corpus_config.embedding_model) {
            Ok(client) => client,
            Err(e) => {
                println!("   ❌ {}: {:#}", selector, e);
                continue;
            }
        };
        if let Err(e) = client.validate_model() {
            println!("   ⚠️  {}: {:#}", selector, e);
        }

        match Corpus::load(selector, config, Arc::new(client)) {
            Ok(corpus) => println!(
                "   ✅ {}: {} vectors, dimension {}, model {}",
                selector,
                corpus.len(),
                corpus.index().dimension(),
                corpus_config.embedding_model
            ),
            Err(e) => println!("   ❌ {}: {}", selector, e),
        }
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'lingua-rag build-index --corpus <C> --input <F>' to (re)build a corpus");
    println!("   • Use 'lingua-rag chat' to talk to the assistant");
    println!("   • Use 'lingua-rag serve' to start the MCP server for front ends");

    Ok(())
}

/// Serve the retrieval tools over MCP stdio until stdin closes or Ctrl+C
#[inline]
pub async fn serve_mcp(config: &Config) -> Result<()> {
    info!("Starting MCP server on stdio");

    // stdout carries JSON-RPC, so all status output goes to stderr
    match OllamaClient::new(&config.ollama, &config.generation.model) {
        Ok(client) => {
            if let Err(e) = client.health_check() {
                warn!("⚠️  Ollama is reachable but unhealthy: {:#}", e);
                eprintln!("Warning: Ollama may not be ready. Answers may fail.");
            }
        }
        Err(e) => {
            error!("❌ Failed to create Ollama client: {:#}", e);
            eprintln!("Use 'lingua-rag config' to update connection settings.");
            return Err(e);
        }
    }

    let registry = load_registry(config, &CorpusSelector::ALL)?;
    let generator = OllamaGenerator::new(&config.ollama, &config.generation)
        .context("Failed to create generation client")?;
    let assistant = Assistant::new(
        Retriever::new(Arc::clone(&registry)),
        Arc::new(generator),
        config.retrieval.top_k,
    );
    let templates = Arc::new(load_templates(config)?);

    let server = Arc::new(McpServer::new(
        "lingua-rag".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    ));
    register_rag_tools(&server, assistant, templates, registry).await;

    eprintln!("✅ MCP server initialized with tools: retrieve_context, ask, list_corpora");
    eprintln!("Press Ctrl+C to stop the server");

    let mut restart_count = 0;
    const MAX_RESTARTS: u32 = 3;

    loop {
        tokio::select! {
            result = Arc::clone(&server).serve_stdio() => {
                match result {
                    Ok(()) => {
                        info!("MCP server stopped normally");
                        break;
                    }
                    Err(e) => {
                        error!("MCP server error (attempt {}/{}): {:#}", restart_count + 1, MAX_RESTARTS + 1, e);
                        restart_count += 1;

                        if restart_count > MAX_RESTARTS {
                            error!("Maximum restart attempts reached, shutting down");
                            break;
                        }

                        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                        eprintln!("🔄 Restarting MCP server (attempt {}/{})...", restart_count + 1, MAX_RESTARTS + 1);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n📴 Received interrupt signal, shutting down...");
                break;
            }
        }
    }

    eprintln!("✅ Shutdown complete");
    Ok(())
}
