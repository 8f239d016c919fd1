use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lingua_rag::commands::{
    ask, build_index, chat, inspect, run_all_experiments, run_batch, run_experiment, serve_mcp,
    show_status,
};
use lingua_rag::config::{Config, get_config_dir, run_interactive_config, show_config};
use lingua_rag::corpus::CorpusSelector;
use lingua_rag::generation::SamplingParams;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lingua-rag")]
#[command(about = "Multilingual retrieval-augmented assistant for language learners and travelers")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (defaults to ~/.lingua-rag)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection, models and corpus paths
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Answer a single question
    Ask {
        /// The question to answer
        query: String,
        /// Corpus to retrieve context from
        #[arg(long, value_enum, default_value_t = CorpusSelector::General)]
        corpus: CorpusSelector,
        /// Prompt template id whose instruction replaces the default header
        #[arg(long)]
        template: Option<String>,
        /// Sample instead of decoding greedily
        #[arg(long)]
        sample: bool,
        /// Nucleus sampling threshold, in (0, 1]
        #[arg(long, requires = "sample")]
        top_p: Option<f32>,
        /// Sampling temperature, greater than 0
        #[arg(long, requires = "sample")]
        temperature: Option<f32>,
        /// Print the retrieved context before the answer
        #[arg(long)]
        show_context: bool,
    },
    /// Start an interactive conversation
    Chat,
    /// Answer every query of a Mode:/En:/Es: query file
    Batch {
        /// Path to the query file
        file: PathBuf,
    },
    /// Run prompt-template experiments and log results as JSONL
    Experiment {
        /// Corpus to run against
        #[arg(long, value_enum, required_unless_present = "all")]
        corpus: Option<CorpusSelector>,
        /// Prompt template id
        #[arg(long, required_unless_present = "all")]
        template: Option<String>,
        /// Run every (corpus, template) pair, skipping complete result files
        #[arg(long, conflicts_with_all = ["corpus", "template"])]
        all: bool,
        /// Experiment queries JSON: {corpus: {language: [query]}}
        #[arg(long)]
        queries: PathBuf,
        /// Directory for result files (defaults to <config dir>/results)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Embed a JSONL of records and write the corpus index and metadata
    BuildIndex {
        /// Corpus to build
        #[arg(long, value_enum)]
        corpus: CorpusSelector,
        /// JSONL file with one record per line
        #[arg(long)]
        input: PathBuf,
    },
    /// Show index shape and preview its first vectors
    Inspect {
        /// Corpus to inspect
        #[arg(long, value_enum)]
        corpus: CorpusSelector,
        /// Number of vectors to preview
        #[arg(long, default_value_t = 5)]
        preview: usize,
    },
    /// Show Ollama and corpus status
    Status,
    /// Start MCP server on stdio
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = get_config_dir(cli.config_dir.as_deref())?;

    if let Commands::Config { show } = cli.command {
        if show {
            show_config(&config_dir)?;
        } else {
            run_interactive_config(&config_dir)?;
        }
        return Ok(());
    }

    let config = Config::load(&config_dir).context("Failed to load configuration")?;

    match cli.command {
        Commands::Config { .. } => {}
        Commands::Ask {
            query,
            corpus,
            template,
            sample,
            top_p,
            temperature,
            show_context,
        } => {
            let sampling = sampling_from_flags(sample, top_p, temperature);
            ask(
                &config,
                &query,
                corpus,
                template.as_deref(),
                sampling,
                show_context,
            )?;
        }
        Commands::Chat => {
            chat(&config)?;
        }
        Commands::Batch { file } => {
            run_batch(&config, &file)?;
        }
        Commands::Experiment {
            corpus,
            template,
            all,
            queries,
            output,
        } => {
            let output = output.unwrap_or_else(|| config.base_dir.join("results"));
            match (all, corpus, template) {
                (false, Some(corpus), Some(template)) => {
                    run_experiment(&config, corpus, &template, &queries, &output)?;
                }
                _ => {
                    run_all_experiments(&config, &queries, &output)?;
                }
            }
        }
        Commands::BuildIndex { corpus, input } => {
            build_index(&config, corpus, &input)?;
        }
        Commands::Inspect { corpus, preview } => {
            inspect(&config, corpus, preview)?;
        }
        Commands::Status => {
            show_status(&config)?;
        }
        Commands::Serve => {
            serve_mcp(&config).await?;
        }
    }

    Ok(())
}

/// `None` keeps the corpus default sampling
fn sampling_from_flags(
    sample: bool,
    top_p: Option<f32>,
    temperature: Option<f32>,
) -> Option<SamplingParams> {
    sample.then_some(SamplingParams {
        do_sample: true,
        top_p,
        temperature,
    })
}
