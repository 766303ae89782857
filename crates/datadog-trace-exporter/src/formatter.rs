// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Conversion of traces into the agent's v0.4 msgpack payload.
//!
//! The payload is an array with one entry per trace, each entry an array of
//! span maps in the order the tracer recorded the spans.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::FlushError;
use crate::trace::{Span, TagValue, Trace};

pub const SAMPLING_PRIORITY_KEY: &str = "_sampling_priority_v1";
pub const AGENT_PSR_KEY: &str = "_dd.agent_psr";
pub const ANALYTICS_SAMPLE_RATE_KEY: &str = "_dd1.sr.eausr";
pub const SAMPLING_DECISION_KEY: &str = "_dd.p.dm";
/// Span tag marking the span for trace analytics. Not copied into `meta`.
pub const ANALYTICS_EVENT_TAG: &str = "analytics_event";

const SAMPLING_DECISION_VALUE: &str = "1";

/// One span as the agent expects it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedSpan<'a> {
    pub trace_id: u64,
    pub span_id: u64,
    pub parent_id: u64,
    pub name: &'a str,
    pub resource: &'a str,
    pub service: &'a str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub span_type: Option<&'a str>,
    pub start: u64,
    pub duration: u64,
    pub error: i32,
    pub meta: IndexMap<&'a str, String>,
    pub metrics: IndexMap<&'static str, f64>,
}

/// Formats every span of `trace`, keeping span order.
#[must_use]
pub fn format_trace(trace: &Trace) -> Vec<FormattedSpan<'_>> {
    trace
        .spans()
        .iter()
        .map(|span| format_span(span, trace))
        .collect()
}

/// Formats a whole batch, keeping trace order.
#[must_use]
pub fn format_batch(traces: &[Arc<Trace>]) -> Vec<Vec<FormattedSpan<'_>>> {
    traces.iter().map(|trace| format_trace(trace)).collect()
}

/// Encodes a formatted batch as msgpack with named span fields.
///
/// # Errors
///
/// Returns [`FlushError::Encode`] if serialization fails.
pub fn encode(batch: &[Vec<FormattedSpan<'_>>]) -> Result<Vec<u8>, FlushError> {
    Ok(rmp_serde::to_vec_named(batch)?)
}

fn format_span<'a>(span: &'a Span, trace: &'a Trace) -> FormattedSpan<'a> {
    FormattedSpan {
        trace_id: span.trace_id,
        span_id: span.id,
        parent_id: span.parent_id.unwrap_or(0),
        name: &span.name,
        resource: span.resource.as_deref().unwrap_or(&span.name),
        service: &span.service,
        span_type: span.span_type.as_deref(),
        start: span.start,
        duration: span.duration(),
        error: i32::from(span.error),
        meta: meta(span),
        metrics: metrics(span, trace),
    }
}

fn meta(span: &Span) -> IndexMap<&str, String> {
    let mut meta: IndexMap<&str, String> = span
        .tags
        .iter()
        .filter(|(key, _)| key.as_str() != ANALYTICS_EVENT_TAG)
        .map(|(key, value)| (key.as_str(), value.to_string()))
        .collect();

    if let Some(env) = &span.env {
        meta.insert("env", env.clone());
    }
    if let Some(version) = &span.service_version {
        meta.insert("version", version.clone());
    }
    if let Some(details) = &span.error_details {
        if let Some(kind) = &details.kind {
            meta.insert("error.type", kind.clone());
        }
        if let Some(message) = &details.message {
            meta.insert("error.msg", message.clone());
        }
        if let Some(stack) = &details.stack {
            meta.insert("error.stack", stack.clone());
        }
    }
    meta.insert(SAMPLING_DECISION_KEY, SAMPLING_DECISION_VALUE.to_string());

    meta
}

fn metrics(span: &Span, trace: &Trace) -> IndexMap<&'static str, f64> {
    let sampling = trace.sampling();
    let mut metrics = IndexMap::new();

    metrics.insert(SAMPLING_PRIORITY_KEY, f64::from(sampling.priority));
    if let Some(rate) = sampling.sampling_rate_used {
        metrics.insert(AGENT_PSR_KEY, rate);
    }
    if is_analytics_event(span) {
        metrics.insert(ANALYTICS_SAMPLE_RATE_KEY, 1.0);
    }

    metrics
}

fn is_analytics_event(span: &Span) -> bool {
    match span.tags.get(ANALYTICS_EVENT_TAG) {
        Some(TagValue::Bool(enabled)) => *enabled,
        Some(TagValue::String(value)) => value == "true",
        _ => false,
    }
}
