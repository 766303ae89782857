// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Public error types.
//!
//! Decode-path errors never escape [`crate::propagation::distributed_context`]
//! other than as [`NoDistributedTrace`]. Flush-path errors ([`FlushError`]) are
//! logged by the engine and only reach callers through lifecycle events; the
//! only export failure a producer can observe is an [`ExportError`].

use std::time::Duration;

/// Neither the W3C nor the Datadog headers carried a usable context.
///
/// Recoverable: the caller starts a new trace without a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no distributed trace context found in headers")]
pub struct NoDistributedTrace;

/// A span was attached to a trace with a different trace id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("span {span_id} has trace id {span_trace_id}, expected {trace_id}")]
pub struct InvalidTrace {
    pub trace_id: u64,
    pub span_id: u64,
    pub span_trace_id: u64,
}

/// Errors returned to producers calling into the export engine.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// A synchronous `send_trace` waited longer than the configured deadline.
    #[error("timed out after {0:?} waiting for the exporter")]
    Timeout(Duration),

    /// The engine is no longer accepting commands.
    #[error("trace exporter is not running")]
    EngineStopped,
}

/// Outcome of a single failed flush. Logged and dropped by the engine.
#[derive(Debug, thiserror::Error)]
pub enum FlushError {
    #[error("failed to encode payload: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("agent responded with status {status}: {body}")]
    Agent { status: u16, body: String },

    #[error("could not parse agent response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

/// Invalid exporter configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },
}
