//! MCP (Model Context Protocol) Server Implementation
//!
//! Exposes the retrieval engine to MCP clients over JSON-RPC 2.0 on stdio,
//! following MCP protocol version 2025-06-18.


pub mod protocol;
pub mod server;
pub mod tools;

pub use server::{ConnectionState, McpServer, ToolHandler};
pub use tools::register_rag_tools;
