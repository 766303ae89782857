// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Distributed trace context propagation.
//!
//! Extraction tries W3C TraceContext first and falls back to the Datadog
//! native headers. Injection always writes the Datadog native headers.
//!
//! ```text
//! Incoming Request Headers
//!   ↓
//! distributed_context (traceparent/tracestate, then x-datadog-*)
//!   ↓
//! SpanContext (trace id, parent id, priority)
//!   ↓
//! inject_context (x-datadog-*)
//!   ↓
//! Outgoing Request Headers
//! ```

use tracing::debug;

use crate::context::SpanContext;
use crate::error::NoDistributedTrace;
use carrier::{Extractor, HeaderCarrier};
use text_map_propagator::{DatadogHeaderPropagator, TraceContextPropagator};

pub mod carrier;
pub mod error;
pub mod text_map_propagator;

/// Reads a trace context out of a header carrier.
pub trait Propagator {
    /// Returns `None` when the carrier holds no usable context in this
    /// propagator's format. Malformed headers are logged, never returned.
    fn extract(&self, carrier: &dyn Extractor) -> Option<SpanContext>;
}

/// Propagator trying W3C TraceContext, then Datadog native headers.
///
/// The first format that yields a context wins; contexts are never merged
/// across formats.
#[derive(Clone, Copy, Debug, Default)]
pub struct DatadogCompositePropagator;

impl Propagator for DatadogCompositePropagator {
    fn extract(&self, carrier: &dyn Extractor) -> Option<SpanContext> {
        if let Some(context) = TraceContextPropagator.extract(carrier) {
            return Some(context);
        }

        DatadogHeaderPropagator.extract(carrier)
    }
}

/// Decodes the distributed context carried by `carrier`.
///
/// # Errors
///
/// Returns [`NoDistributedTrace`] when neither a valid W3C `traceparent` nor a
/// complete set of Datadog headers is present. Callers start a new trace.
pub fn distributed_context(carrier: &HeaderCarrier) -> Result<SpanContext, NoDistributedTrace> {
    DatadogCompositePropagator.extract(carrier).ok_or_else(|| {
        debug!("No distributed trace context found in headers");
        NoDistributedTrace
    })
}

/// Writes the Datadog native headers for `context` into `carrier`.
///
/// List carriers get the generated headers in front. Map and request carriers
/// keep existing values on key collision.
#[must_use]
pub fn inject_context(carrier: HeaderCarrier, context: &SpanContext) -> HeaderCarrier {
    carrier.merge(DatadogHeaderPropagator::headers(context))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use std::collections::HashMap;

    use http::HeaderMap;

    use super::*;

    fn list(pairs: &[(&str, &str)]) -> HeaderCarrier {
        HeaderCarrier::List(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_inject_list_prepends_generated_headers() {
        let carrier = list(&[("header1", "value1")]);

        let injected = inject_context(carrier, &SpanContext::new(123, 456, 10));

        assert_eq!(
            injected,
            list(&[
                ("x-datadog-trace-id", "123"),
                ("x-datadog-parent-id", "456"),
                ("x-datadog-sampling-priority", "10"),
                ("header1", "value1"),
            ])
        );
    }

    #[test]
    fn test_inject_map_existing_keys_win() {
        let carrier = HeaderCarrier::Map(HashMap::from([
            ("header1".to_string(), "value1".to_string()),
            ("x-datadog-trace-id".to_string(), "999".to_string()),
        ]));

        let injected = inject_context(carrier, &SpanContext::new(123, 456, 10));

        let HeaderCarrier::Map(headers) = injected else {
            panic!("map carrier changed shape");
        };
        assert_eq!(headers.len(), 4);
        assert_eq!(headers["header1"], "value1");
        assert_eq!(headers["x-datadog-trace-id"], "999");
        assert_eq!(headers["x-datadog-parent-id"], "456");
        assert_eq!(headers["x-datadog-sampling-priority"], "10");
    }

    #[test]
    fn test_inject_request_existing_headers_win() {
        let mut headers = HeaderMap::new();
        headers.insert("x-datadog-parent-id", "1".parse().unwrap());

        let injected = inject_context(
            HeaderCarrier::Request(headers),
            &SpanContext::new(123, 456, 2),
        );

        assert_eq!(injected.get("x-datadog-trace-id"), Some("123"));
        assert_eq!(injected.get("x-datadog-parent-id"), Some("1"));
        assert_eq!(injected.get("x-datadog-sampling-priority"), Some("2"));
    }

    #[test]
    fn test_distributed_context_empty_carrier() {
        assert_eq!(
            distributed_context(&HeaderCarrier::List(Vec::new())),
            Err(NoDistributedTrace)
        );
        assert_eq!(
            distributed_context(&HeaderCarrier::Request(HeaderMap::new())),
            Err(NoDistributedTrace)
        );
    }

    #[test]
    fn test_distributed_context_prefers_traceparent() {
        let carrier = list(&[
            ("X-Datadog-Trace-Id", "123"),
            ("X-Datadog-Parent-Id", "456"),
            (
                "Traceparent",
                "00-672ce69300000000d2af5a72993ea4b4-b7ad6b7169203331-00",
            ),
            ("Tracestate", "dd=s:2;t.dm:-0;p:26251d1e51321aa0"),
        ]);

        let context = distributed_context(&carrier).unwrap();

        assert_eq!(
            context,
            SpanContext::new(15_181_452_317_133_022_388, 13_235_353_014_750_950_193, 2)
        );
    }

    #[test]
    fn test_distributed_context_malformed_traceparent_falls_back() {
        let carrier = list(&[
            ("traceparent", "garbage"),
            ("x-datadog-trace-id", "123"),
            ("x-datadog-parent-id", "456"),
            ("x-datadog-sampling-priority", "2"),
        ]);

        let context = distributed_context(&carrier).unwrap();

        assert_eq!(context, SpanContext::new(123, 456, 2));
    }

    #[test]
    fn test_inject_then_extract() {
        let context = SpanContext::new(123, 456, 0);

        let injected = inject_context(HeaderCarrier::Map(HashMap::new()), &context);

        assert_eq!(distributed_context(&injected).unwrap(), context);
    }
}
