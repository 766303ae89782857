// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Text map propagators for Datadog and W3C TraceContext formats.
//!
//! # Datadog Native Format
//!
//! ```text
//! x-datadog-trace-id: 1234567890
//! x-datadog-parent-id: 9876543210
//! x-datadog-sampling-priority: 1
//! ```
//!
//! # W3C TraceContext Format
//!
//! ```text
//! traceparent: 00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01
//! tracestate: dd=s:2;o:rum;t.dm:-4,congo=t61rcWkgMzE
//! ```
//!
//! W3C trace ids are 128-bit. Only the low 64 bits are kept, which is what the
//! Datadog backend correlates on.

use tracing::{debug, warn};

use crate::context::SpanContext;
use crate::propagation::{carrier::Extractor, error::Error, Propagator};
use crate::trace::DEFAULT_SAMPLING_PRIORITY;

pub const DATADOG_TRACE_ID_KEY: &str = "x-datadog-trace-id";
pub const DATADOG_PARENT_ID_KEY: &str = "x-datadog-parent-id";
/// Values: -1 (user reject), 0 (auto reject), 1 (auto keep), 2 (user keep)
pub const DATADOG_SAMPLING_PRIORITY_KEY: &str = "x-datadog-sampling-priority";

/// Format: `00-{32-char-trace-id}-{16-char-span-id}-{2-char-flags}`
pub const TRACEPARENT_KEY: &str = "traceparent";
pub const TRACESTATE_KEY: &str = "tracestate";

const TRACESTATE_DATADOG_PREFIX: &str = "dd=";
const TRACESTATE_SAMPLING_PRIORITY_KEY: &str = "s";

/// Propagator for the Datadog native header format.
///
/// Trace and parent ids are required decimal `u64`s. A missing or unparsable
/// sampling priority falls back to auto keep.
#[derive(Clone, Copy, Debug, Default)]
pub struct DatadogHeaderPropagator;

impl Propagator for DatadogHeaderPropagator {
    fn extract(&self, carrier: &dyn Extractor) -> Option<SpanContext> {
        Self::extract_context(carrier)
    }
}

impl DatadogHeaderPropagator {
    fn extract_context(carrier: &dyn Extractor) -> Option<SpanContext> {
        let ids = Self::extract_trace_id(carrier)
            .and_then(|trace_id| Ok((trace_id, Self::extract_parent_id(carrier)?)));
        let (trace_id, parent_id) = match ids {
            Ok(ids) => ids,
            Err(e) => {
                debug!("{e}");
                return None;
            }
        };

        let priority = Self::extract_sampling_priority(carrier).unwrap_or_else(|e| {
            debug!("{e}");
            DEFAULT_SAMPLING_PRIORITY
        });

        Some(SpanContext::new(trace_id, parent_id, priority))
    }

    fn extract_trace_id(carrier: &dyn Extractor) -> Result<u64, Error> {
        let trace_id = carrier
            .get(DATADOG_TRACE_ID_KEY)
            .ok_or(Error::extract("`trace_id` not found", "datadog"))?;

        parse_decimal_u64(trace_id)
            .ok_or(Error::extract("Failed to decode `trace_id`", "datadog"))
    }

    fn extract_parent_id(carrier: &dyn Extractor) -> Result<u64, Error> {
        let parent_id = carrier
            .get(DATADOG_PARENT_ID_KEY)
            .ok_or(Error::extract("`parent_id` not found", "datadog"))?;

        parse_decimal_u64(parent_id)
            .ok_or(Error::extract("Failed to decode `parent_id`", "datadog"))
    }

    fn extract_sampling_priority(carrier: &dyn Extractor) -> Result<i8, Error> {
        let Some(sampling_priority) = carrier.get(DATADOG_SAMPLING_PRIORITY_KEY) else {
            return Ok(DEFAULT_SAMPLING_PRIORITY);
        };

        let sampling_priority = sampling_priority.trim();
        let digits = sampling_priority
            .strip_prefix('-')
            .unwrap_or(sampling_priority);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::extract(
                "Failed to decode `sampling_priority`",
                "datadog",
            ));
        }

        sampling_priority
            .parse::<i8>()
            .map_err(|_| Error::extract("Failed to decode `sampling_priority`", "datadog"))
    }

    /// The three Datadog headers for `context`, as decimal strings, in
    /// trace id, parent id, priority order.
    #[must_use]
    pub fn headers(context: &SpanContext) -> Vec<(&'static str, String)> {
        vec![
            (DATADOG_TRACE_ID_KEY, context.trace_id.to_string()),
            (DATADOG_PARENT_ID_KEY, context.parent_id.to_string()),
            (DATADOG_SAMPLING_PRIORITY_KEY, context.priority.to_string()),
        ]
    }
}

/// Unsigned decimal id. Signs, whitespace inside the value and empty values
/// are rejected.
fn parse_decimal_u64(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    value.parse().ok()
}

/// Parsed W3C traceparent header components.
struct Traceparent {
    trace_id: u128,
    span_id: u64,
}

/// Propagator for the W3C TraceContext format.
///
/// The `traceparent` flags byte is validated but does not drive the sampling
/// priority: priority comes from the `s` entry of the `dd` tracestate member
/// and defaults to auto keep.
#[derive(Clone, Copy, Debug, Default)]
pub struct TraceContextPropagator;

impl Propagator for TraceContextPropagator {
    fn extract(&self, carrier: &dyn Extractor) -> Option<SpanContext> {
        Self::extract_context(carrier)
    }
}

impl TraceContextPropagator {
    fn extract_context(carrier: &dyn Extractor) -> Option<SpanContext> {
        let tp = carrier.get(TRACEPARENT_KEY)?.trim();

        match Self::extract_traceparent(tp) {
            Ok(traceparent) => {
                let priority = carrier
                    .get(TRACESTATE_KEY)
                    .map_or(DEFAULT_SAMPLING_PRIORITY, Self::extract_sampling_priority);

                let (_, trace_id_lower_order_bits) = Self::split_trace_id(traceparent.trace_id);

                Some(SpanContext::new(
                    trace_id_lower_order_bits,
                    traceparent.span_id,
                    priority,
                ))
            }
            Err(e) => {
                warn!("Failed to extract traceparent: {e}");
                None
            }
        }
    }

    fn extract_traceparent(traceparent: &str) -> Result<Traceparent, Error> {
        let parts: Vec<&str> = traceparent.split('-').collect();
        let [version, trace_id, span_id, flags] = parts.as_slice() else {
            return Err(Error::extract(
                "traceparent should contain 4 values delimited by `-`",
                "traceparent",
            ));
        };

        Self::extract_hex_byte(version)
            .map_err(|_| Error::extract("Failed to decode version", "traceparent"))?;
        let trace_id = Self::extract_trace_id(trace_id)?;
        let span_id = Self::extract_span_id(span_id)?;
        Self::extract_hex_byte(flags)
            .map_err(|_| Error::extract("Failed to decode trace_flags", "traceparent"))?;

        Ok(Traceparent { trace_id, span_id })
    }

    fn extract_hex_byte(value: &str) -> Result<u8, ()> {
        if value.len() != 2 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(());
        }

        u8::from_str_radix(value, 16).map_err(|_| ())
    }

    fn extract_trace_id(trace_id: &str) -> Result<u128, Error> {
        if trace_id.is_empty() || !trace_id.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::extract("Failed to decode trace_id", "traceparent"));
        }

        u128::from_str_radix(trace_id, 16)
            .map_err(|_| Error::extract("Failed to decode trace_id", "traceparent"))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn split_trace_id(trace_id: u128) -> (u64, u64) {
        let trace_id_lower_order_bits = trace_id as u64;
        let trace_id_higher_order_bits = (trace_id >> 64) as u64;

        (trace_id_higher_order_bits, trace_id_lower_order_bits)
    }

    fn extract_span_id(span_id: &str) -> Result<u64, Error> {
        if span_id.is_empty() || !span_id.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::extract("Failed to decode span_id", "traceparent"));
        }

        u64::from_str_radix(span_id, 16)
            .map_err(|_| Error::extract("Failed to decode span_id", "traceparent"))
    }

    /// Reads `s` from the `dd=` member of a tracestate header.
    fn extract_sampling_priority(tracestate: &str) -> i8 {
        let Some(dd) = tracestate
            .split(',')
            .map(str::trim)
            .find_map(|member| member.strip_prefix(TRACESTATE_DATADOG_PREFIX))
        else {
            debug!("No `dd` value found in tracestate");
            return DEFAULT_SAMPLING_PRIORITY;
        };

        let Some(sampling_priority) = dd.split(';').find_map(|item| {
            let (key, value) = item.split_once(':')?;
            (key.trim() == TRACESTATE_SAMPLING_PRIORITY_KEY).then_some(value.trim())
        }) else {
            return DEFAULT_SAMPLING_PRIORITY;
        };

        sampling_priority.parse::<i8>().unwrap_or_else(|_| {
            warn!("Failed to decode tracestate sampling priority: {sampling_priority}");
            DEFAULT_SAMPLING_PRIORITY
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_extract_datadog_propagator() {
        let carrier = headers(&[
            ("x-datadog-trace-id", "123"),
            ("x-datadog-parent-id", "456"),
            ("x-datadog-sampling-priority", "2"),
        ]);

        let context = DatadogHeaderPropagator
            .extract(&carrier)
            .expect("couldn't extract trace context");

        assert_eq!(context, SpanContext::new(123, 456, 2));
    }

    #[test]
    fn test_extract_datadog_default_priority() {
        let carrier = headers(&[("x-datadog-trace-id", "123"), ("x-datadog-parent-id", "456")]);

        let context = DatadogHeaderPropagator.extract(&carrier).unwrap();

        assert_eq!(context.priority, 1);
    }

    #[test]
    fn test_extract_datadog_unparsable_priority_falls_back() {
        let carrier = headers(&[
            ("x-datadog-trace-id", "123"),
            ("x-datadog-parent-id", "456"),
            ("x-datadog-sampling-priority", "keep"),
        ]);

        let context = DatadogHeaderPropagator.extract(&carrier).unwrap();

        assert_eq!(context, SpanContext::new(123, 456, 1));
    }

    #[test]
    fn test_extract_datadog_requires_both_ids() {
        let missing_parent = headers(&[("x-datadog-trace-id", "123")]);
        let bad_trace = headers(&[("x-datadog-trace-id", "abc"), ("x-datadog-parent-id", "456")]);

        assert!(DatadogHeaderPropagator.extract(&missing_parent).is_none());
        assert!(DatadogHeaderPropagator.extract(&bad_trace).is_none());
    }

    #[test]
    fn test_extract_datadog_rejects_signed_ids() {
        let signed_trace = headers(&[("x-datadog-trace-id", "+123"), ("x-datadog-parent-id", "456")]);
        let signed_parent = headers(&[("x-datadog-trace-id", "123"), ("x-datadog-parent-id", "+456")]);
        let empty_trace = headers(&[("x-datadog-trace-id", " "), ("x-datadog-parent-id", "456")]);

        assert!(DatadogHeaderPropagator.extract(&signed_trace).is_none());
        assert!(DatadogHeaderPropagator.extract(&signed_parent).is_none());
        assert!(DatadogHeaderPropagator.extract(&empty_trace).is_none());
        assert_eq!(parse_decimal_u64(" 123 "), Some(123));
        assert_eq!(parse_decimal_u64("-1"), None);
    }

    #[test]
    fn test_extract_datadog_priority_sign() {
        let negative = headers(&[
            ("x-datadog-trace-id", "123"),
            ("x-datadog-parent-id", "456"),
            ("x-datadog-sampling-priority", "-1"),
        ]);
        let plus = headers(&[
            ("x-datadog-trace-id", "123"),
            ("x-datadog-parent-id", "456"),
            ("x-datadog-sampling-priority", "+2"),
        ]);

        assert_eq!(
            DatadogHeaderPropagator.extract(&negative).unwrap(),
            SpanContext::new(123, 456, -1)
        );
        assert_eq!(
            DatadogHeaderPropagator.extract(&plus).unwrap(),
            SpanContext::new(123, 456, 1)
        );
    }

    #[test]
    fn test_datadog_headers_order() {
        let generated = DatadogHeaderPropagator::headers(&SpanContext::new(123, 456, 10));

        assert_eq!(
            generated,
            vec![
                ("x-datadog-trace-id", "123".to_string()),
                ("x-datadog-parent-id", "456".to_string()),
                ("x-datadog-sampling-priority", "10".to_string()),
            ]
        );
    }

    #[test]
    fn test_extract_traceparent_low_order_bits() {
        let carrier = headers(&[(
            "traceparent",
            "00-672ce69300000000d2af5a72993ea4b4-b7ad6b7169203331-00",
        )]);

        let context = TraceContextPropagator.extract(&carrier).unwrap();

        assert_eq!(context.trace_id, 15_181_452_317_133_022_388);
        assert_eq!(context.parent_id, 13_235_353_014_750_950_193);
        assert_eq!(context.priority, 1);
        assert_eq!(format!("{:016x}", context.trace_id), "d2af5a72993ea4b4");
        assert_eq!(format!("{:016x}", context.parent_id), "b7ad6b7169203331");
    }

    #[test]
    fn test_extract_traceparent_with_tracestate() {
        let carrier = headers(&[
            (
                "traceparent",
                "00-80f198ee56343ba864fe8b2a57d3eff7-00f067aa0ba902b7-01",
            ),
            ("tracestate", "congo=t61rcWkgMzE, dd=s:2;t.dm:-0;p:26251d1e51321aa0"),
        ]);

        let context = TraceContextPropagator.extract(&carrier).unwrap();

        assert_eq!(context.trace_id, 7_277_407_061_855_694_839);
        assert_eq!(context.parent_id, 67_667_974_448_284_343);
        assert_eq!(context.priority, 2);
    }

    #[test]
    fn test_tracestate_priority() {
        assert_eq!(
            TraceContextPropagator::extract_sampling_priority("dd=s:2;t.dm:-0;p:26251d1e51321aa0"),
            2
        );
        assert_eq!(
            TraceContextPropagator::extract_sampling_priority("dd=s:-1"),
            -1
        );
        assert_eq!(
            TraceContextPropagator::extract_sampling_priority("dd=t.dm:-0;p:26251d1e51321aa0"),
            1
        );
        assert_eq!(
            TraceContextPropagator::extract_sampling_priority("congo=t61rcWkgMzE"),
            1
        );
        assert_eq!(TraceContextPropagator::extract_sampling_priority("dd=s:high"), 1);
    }

    #[test]
    fn test_extract_traceparent_invalid() {
        for tp in [
            "00-672ce69300000000d2af5a72993ea4b4-b7ad6b7169203331",
            "00-672ce69300000000d2af5a72993ea4b4-b7ad6b7169203331-00-extra",
            "zz-672ce69300000000d2af5a72993ea4b4-b7ad6b7169203331-00",
            "00-not-hex-b7ad6b7169203331-00",
            "00-672ce69300000000d2af5a72993ea4b4-b7ad6b7169203331-1",
            "00-672ce69300000000d2af5a72993ea4b4aa-b7ad6b7169203331-00",
        ] {
            let carrier = headers(&[("traceparent", tp)]);
            assert!(
                TraceContextPropagator.extract(&carrier).is_none(),
                "{tp} should be rejected"
            );
        }
    }

    #[test]
    fn test_split_trace_id() {
        let (high, low) = TraceContextPropagator::split_trace_id(
            0x672c_e693_0000_0000_d2af_5a72_993e_a4b4,
        );

        assert_eq!(high, 0x672c_e693_0000_0000);
        assert_eq!(low, 0xd2af_5a72_993e_a4b4);
    }
}
