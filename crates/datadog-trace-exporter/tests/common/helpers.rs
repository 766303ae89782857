// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use std::time::Duration;

use datadog_trace_exporter::{EventBus, ExporterEvent, Sampling, Span, Trace};

/// Create a single-span trace
pub fn create_test_trace(id: u64) -> Trace {
    let span = Span {
        id: id * 10,
        trace_id: id,
        name: "web.request".to_string(),
        service: "integration".to_string(),
        start: 1_000,
        completion_time: 2_500,
        ..Default::default()
    };
    Trace::new(id, vec![span], Sampling::default()).expect("span belongs to trace")
}

/// Receive events until the bus stays quiet for `idle`
#[allow(dead_code)]
pub async fn collect_events(bus: &mut EventBus, idle: Duration) -> Vec<ExporterEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(idle, bus.rx.recv()).await {
        events.push(event);
    }
    events
}

/// Trace id carried by an event, with the event kind
#[allow(dead_code)]
pub fn describe(event: &ExporterEvent) -> (&'static str, u64) {
    match event {
        ExporterEvent::Start { trace, .. } => ("start", trace.id()),
        ExporterEvent::Stop { trace, .. } => ("stop", trace.id()),
        ExporterEvent::Exception { trace, .. } => ("exception", trace.id()),
    }
}
