//! MCP Tools Implementation
//!
//! Retrieval-engine tools exposed to MCP clients. Embedding and generation
//! are blocking HTTP calls, so handlers run them on the blocking pool.

use crate::corpus::{CorpusRegistry, CorpusSelector};
use crate::generation::SamplingParams;
use crate::mcp::protocol::*;
use crate::mcp::server::{McpServer, ToolHandler};
use crate::pipeline::{AnswerRequest, Assistant};
use crate::prompt::PromptTemplates;
use crate::retrieval::Retriever;
use crate::RagError;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

const DEFAULT_K: usize = 5;

/// `retrieve_context` tool handler
pub struct RetrieveContextHandler {
    retriever: Retriever,
}

/// `ask` tool handler
pub struct AskHandler {
    assistant: Assistant,
    templates: Arc<PromptTemplates>,
}

/// `list_corpora` tool handler
pub struct ListCorporaHandler {
    registry: Arc<CorpusRegistry>,
    templates: Arc<PromptTemplates>,
}

/// Register every retrieval tool on `server`
#[inline]
pub async fn register_rag_tools(
    server: &McpServer,
    assistant: Assistant,
    templates: Arc<PromptTemplates>,
    registry: Arc<CorpusRegistry>,
) {
    server
        .register_tool(
            RetrieveContextHandler::tool_definition(),
            RetrieveContextHandler::new(assistant.retriever().clone()),
        )
        .await;
    server
        .register_tool(
            ListCorporaHandler::tool_definition(),
            ListCorporaHandler::new(registry, Arc::clone(&templates)),
        )
        .await;
    server
        .register_tool(
            AskHandler::tool_definition(),
            AskHandler::new(assistant, templates),
        )
        .await;
}

fn corpus_schema() -> Value {
    json!({
        "type": "string",
        "enum": ["general", "travel", "no_retrieval"],
        "description": "Corpus to search: general (sentence pairs), travel (guide passages) or no_retrieval"
    })
}

fn required_str<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a str> {
    match args.get(name) {
        Some(Value::String(text)) => Ok(text),
        Some(other) => {
            Err(InvalidParams(format!("{} must be a string, got {}", name, other)).into())
        }
        None => Err(InvalidParams(format!("Missing required parameter: {}", name)).into()),
    }
}

fn parse_corpus(args: &Map<String, Value>) -> Result<CorpusSelector> {
    required_str(args, "corpus")?
        .parse()
        .map_err(|e: RagError| InvalidParams(e.to_string()).into())
}

/// Absent or null is `None`; any other value must convert or the call is rejected
fn optional<T>(
    args: &Map<String, Value>,
    name: &str,
    expected: &str,
    convert: impl Fn(&Value) -> Option<T>,
) -> std::result::Result<Option<T>, String> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => convert(value)
            .map(Some)
            .ok_or_else(|| format!("{} must be {}, got {}", name, expected, value)),
    }
}

/// Sampling override from `do_sample`, `top_p` and `temperature`, if any is given
fn sampling_override(
    args: &Map<String, Value>,
) -> std::result::Result<Option<SamplingParams>, String> {
    let as_f32 = |value: &Value| value.as_f64().map(|number| number as f32);
    let top_p = optional(args, "top_p", "a number", as_f32)?;
    let temperature = optional(args, "temperature", "a number", as_f32)?;
    let do_sample = optional(args, "do_sample", "a boolean", Value::as_bool)?;

    if do_sample.is_none() && top_p.is_none() && temperature.is_none() {
        return Ok(None);
    }
    Ok(Some(SamplingParams {
        do_sample: do_sample.unwrap_or(true),
        top_p,
        temperature,
    }))
}

/// Recoverable failures become tool errors; anything else fails the request
fn recoverable_or_fail(error: RagError) -> Result<CallToolResult> {
    if error.is_recoverable() {
        warn!("Rejected tool input: {}", error);
        Ok(CallToolResult::error(error.to_string()))
    } else {
        Err(error.into())
    }
}

impl RetrieveContextHandler {
    #[inline]
    pub fn new(retriever: Retriever) -> Self {
        Self { retriever }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "retrieve_context".to_string(),
            description: Some(
                "Return the k records nearest to a query from the selected corpus".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Query text in English or Spanish"
                    },
                    "k": {
                        "type": "integer",
                        "description": "Number of records to return (default: 5)"
                    },
                    "corpus": corpus_schema()
                },
                "required": ["query", "corpus"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for RetrieveContextHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args: Map<String, Value> = params.arguments.unwrap_or_default().into_iter().collect();

        let query = required_str(&args, "query")?.to_string();
        let corpus = parse_corpus(&args)?;
        let k = match args.get("k") {
            None | Some(Value::Null) => DEFAULT_K,
            Some(value) => match value.as_u64() {
                Some(k) => usize::try_from(k)?,
                None => {
                    return Ok(CallToolResult::error(format!(
                        "k must be a positive integer, got {}",
                        value
                    )));
                }
            },
        };

        debug!("retrieve_context: corpus={}, k={}", corpus, k);

        let retriever = self.retriever.clone();
        let retrieved =
            tokio::task::spawn_blocking(move || retriever.retrieve(&query, k, corpus)).await?;

        match retrieved {
            Ok(hits) => CallToolResult::json(&json!({
                "corpus": corpus,
                "results": hits,
            }))
            .map_err(Into::into),
            Err(e) => recoverable_or_fail(e),
        }
    }
}

impl AskHandler {
    #[inline]
    pub fn new(assistant: Assistant, templates: Arc<PromptTemplates>) -> Self {
        Self {
            assistant,
            templates,
        }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "ask".to_string(),
            description: Some(
                "Answer a question with the generator, grounded on records retrieved from the selected corpus"
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Question in English or Spanish"
                    },
                    "corpus": corpus_schema(),
                    "template_id": {
                        "type": "string",
                        "description": "Optional: prompt template id replacing the default instruction"
                    },
                    "do_sample": {
                        "type": "boolean",
                        "description": "Optional: sample instead of greedy decoding (default: corpus setting)"
                    },
                    "top_p": {
                        "type": "number",
                        "description": "Optional: nucleus sampling threshold in (0, 1]"
                    },
                    "temperature": {
                        "type": "number",
                        "description": "Optional: sampling temperature > 0"
                    }
                },
                "required": ["query", "corpus"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for AskHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args: Map<String, Value> = params.arguments.unwrap_or_default().into_iter().collect();

        let corpus = parse_corpus(&args)?;
        let mut request = AnswerRequest::new(required_str(&args, "query")?, corpus);

        match args.get("template_id") {
            None | Some(Value::Null) => {}
            Some(Value::String(template_id)) => {
                let instruction = self
                    .templates
                    .get(corpus, template_id)
                    .map_err(|e| InvalidParams(e.to_string()))?;
                request = request.with_instruction(instruction);
            }
            Some(other) => {
                return Err(
                    InvalidParams(format!("template_id must be a string, got {}", other)).into(),
                );
            }
        }

        match sampling_override(&args) {
            Ok(Some(sampling)) => request = request.with_sampling(sampling),
            Ok(None) => {}
            Err(message) => {
                warn!("Rejected tool input: {}", message);
                return Ok(CallToolResult::error(message));
            }
        }

        debug!("ask: corpus={}, sampling={:?}", corpus, request.sampling);

        let assistant = self.assistant.clone();
        let answered = tokio::task::spawn_blocking(move || assistant.answer(&request)).await?;

        match answered {
            Ok(answer) => CallToolResult::json(&json!({
                "corpus": corpus,
                "answer": answer.answer,
                "context": answer.context.iter().map(|record| record.summary()).collect::<Vec<_>>(),
            }))
            .map_err(Into::into),
            Err(e) => recoverable_or_fail(e),
        }
    }
}

impl ListCorporaHandler {
    #[inline]
    pub fn new(registry: Arc<CorpusRegistry>, templates: Arc<PromptTemplates>) -> Self {
        Self {
            registry,
            templates,
        }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "list_corpora".to_string(),
            description: Some(
                "List corpora with their load state and prompt template ids".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for ListCorporaHandler {
    #[inline]
    async fn handle(&self, _params: CallToolParams) -> Result<CallToolResult> {
        debug!("Listing corpora");

        let corpora: Vec<Value> = CorpusSelector::ALL
            .into_iter()
            .map(|selector| {
                let profile = selector.profile();
                let templates: Vec<&str> = self.templates.ids(selector).collect();
                let mut entry = json!({
                    "name": profile.name,
                    "label": profile.label,
                    "retrieves": selector.retrieves(),
                    "templates": templates,
                });
                if let Ok(corpus) = self.registry.snapshot(selector) {
                    entry["records"] = json!(corpus.len());
                    entry["dimension"] = json!(corpus.index().dimension());
                    entry["embedding_model"] = json!(corpus.embedder().model_name());
                }
                entry["loaded"] = json!(!selector.retrieves() || self.registry.is_loaded(selector));
                entry
            })
            .collect();

        Ok(CallToolResult::json(&json!({ "corpora": corpora }))?)
    }
}
