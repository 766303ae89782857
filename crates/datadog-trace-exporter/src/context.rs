// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The identity propagated across process boundaries.

use crate::trace::DEFAULT_SAMPLING_PRIORITY;

/// Minimal distributed trace context.
///
/// Both ids are 64-bit. Contexts decoded from 128-bit W3C trace ids keep only
/// the low 64 bits, which is all the Datadog backend correlates on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub struct SpanContext {
    pub trace_id: u64,
    /// Span id of the caller, i.e. the parent of the next local span.
    pub parent_id: u64,
    /// Sampling priority: -1 user reject, 0 auto reject, 1 auto keep, 2 user keep.
    pub priority: i8,
}

impl SpanContext {
    #[must_use]
    pub fn new(trace_id: u64, parent_id: u64, priority: i8) -> Self {
        SpanContext {
            trace_id,
            parent_id,
            priority,
        }
    }
}

impl Default for SpanContext {
    fn default() -> Self {
        SpanContext {
            trace_id: 0,
            parent_id: 0,
            priority: DEFAULT_SAMPLING_PRIORITY,
        }
    }
}
