// ABOUTME: MCP Dispatcher - JSON-RPC 2.0 over HTTP POST at a single endpoint (spec §4.5, §6).
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

pub mod dispatcher;
pub mod jsonrpc;
pub mod prompts;

pub use dispatcher::McpDispatcher;
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use prompts::{PromptStore, PromptTemplate};
