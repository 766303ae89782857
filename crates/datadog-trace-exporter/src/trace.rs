// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Trace and span values handed to the exporter by the instrumentation library.
//!
//! These types are produced outside of this crate and are read-only here: once a
//! [`Trace`] has been passed to the exporter it is shared as an `Arc<Trace>` and
//! never mutated again.

use std::fmt;

use indexmap::IndexMap;

use crate::error::InvalidTrace;

/// Sampling priority used when the tracer did not make an explicit decision.
pub const DEFAULT_SAMPLING_PRIORITY: i8 = 1;

/// Scalar value of a span tag.
#[derive(Clone, Debug, PartialEq)]
pub enum TagValue {
    String(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::String(s) => f.write_str(s),
            TagValue::Bool(b) => write!(f, "{b}"),
            TagValue::Int(i) => write!(f, "{i}"),
            TagValue::Float(x) => write!(f, "{x}"),
        }
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::String(value.to_string())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::String(value)
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        TagValue::Bool(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::Int(value)
    }
}

impl From<f64> for TagValue {
    fn from(value: f64) -> Self {
        TagValue::Float(value)
    }
}

/// Error details recorded on a failed span.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpanError {
    pub kind: Option<String>,
    pub message: Option<String>,
    pub stack: Option<String>,
}

/// One timed unit of work within a trace.
///
/// Timestamps are nanoseconds since the Unix epoch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Span {
    pub id: u64,
    pub trace_id: u64,
    /// `None` for the root span of a trace.
    pub parent_id: Option<u64>,
    pub name: String,
    /// Resource name shown in the Datadog UI, falls back to `name`.
    pub resource: Option<String>,
    pub service: String,
    /// Datadog span type (`web`, `db`, `custom`, ...).
    pub span_type: Option<String>,
    pub service_version: Option<String>,
    pub env: Option<String>,
    pub start: u64,
    pub completion_time: u64,
    pub error: bool,
    pub error_details: Option<SpanError>,
    /// Tags in the order the tracer recorded them.
    pub tags: IndexMap<String, TagValue>,
}

impl Span {
    /// Elapsed time in nanoseconds. A completion time earlier than the start
    /// time yields zero rather than wrapping.
    #[must_use]
    pub fn duration(&self) -> u64 {
        self.completion_time.saturating_sub(self.start)
    }
}

/// Trace-level sampling record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sampling {
    pub priority: i8,
    pub sampling_rate_used: Option<f64>,
    pub sampling_mechanism_used: Option<u8>,
}

impl Default for Sampling {
    fn default() -> Self {
        Sampling {
            priority: DEFAULT_SAMPLING_PRIORITY,
            sampling_rate_used: None,
            sampling_mechanism_used: None,
        }
    }
}

/// An ordered set of spans sharing one trace identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct Trace {
    id: u64,
    spans: Vec<Span>,
    sampling: Sampling,
}

impl Trace {
    /// Builds a trace, rejecting spans that belong to another trace.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTrace`] naming the first span whose `trace_id` differs
    /// from `id`.
    pub fn new(id: u64, spans: Vec<Span>, sampling: Sampling) -> Result<Self, InvalidTrace> {
        if let Some(span) = spans.iter().find(|span| span.trace_id != id) {
            return Err(InvalidTrace {
                trace_id: id,
                span_id: span.id,
                span_trace_id: span.trace_id,
            });
        }

        Ok(Trace {
            id,
            spans,
            sampling,
        })
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    #[must_use]
    pub fn sampling(&self) -> &Sampling {
        &self.sampling
    }

    #[must_use]
    pub fn span_count(&self) -> usize {
        self.spans.len()
    }
}
