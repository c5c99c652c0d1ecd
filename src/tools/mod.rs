// ABOUTME: Tool Registry and Dispatch Core - lifecycle, the seven-stage call envelope,
// ABOUTME: metrics and audit trail (spec §3, §4.1).
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

pub mod audit;
pub mod definition;
pub mod envelope;
pub mod handler;
pub mod metrics;
pub mod registry;

pub use audit::{AuditLog, AuditOutcome, AuditRecord};
pub use definition::{HandlerKind, HandlerSpec, SourceKind, ToolDefinition, ToolMetadata, ToolSummary};
pub use envelope::ToolEnvelope;
pub use handler::{Deadline, ToolHandler};
pub use metrics::ToolMetrics;
pub use registry::ToolRegistry;
