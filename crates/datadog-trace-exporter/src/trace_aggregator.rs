// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batch of traces waiting for the next flush.
//!
//! Owned by the export engine only. Traces keep their arrival order and the
//! whole batch is handed over at once on flush.

use std::sync::Arc;

use crate::trace::Trace;

#[derive(Debug, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct TraceAggregator {
    traces: Vec<Arc<Trace>>,
    span_count: usize,
}

impl TraceAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `trace` and returns the batch length.
    pub fn add(&mut self, trace: Arc<Trace>) -> usize {
        self.span_count += trace.span_count();
        self.traces.push(trace);
        self.traces.len()
    }

    /// Takes the whole batch, leaving the aggregator empty.
    pub fn take(&mut self) -> Vec<Arc<Trace>> {
        self.span_count = 0;
        std::mem::take(&mut self.traces)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    #[must_use]
    pub fn span_count(&self) -> usize {
        self.span_count
    }
}
