// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Header carriers for trace context propagation.
//!
//! Callers hand us headers in one of three shapes: the header map of an HTTP
//! request, a plain name to value mapping, or an ordered list of name/value
//! pairs. [`HeaderCarrier`] is the closed set of those shapes; each variant has
//! its own lookup and its own merge rule on injection.
//!
//! # Case Insensitivity
//!
//! All lookups are case-insensitive to handle HTTP header normalization
//! (`X-Datadog-Trace-Id` vs `x-datadog-trace-id`).
//!
//! # Inspired By
//!
//! Code inspired and adapted from the OpenTelemetry Rust project:
//! <https://github.com/open-telemetry/opentelemetry-rust/blob/main/opentelemetry/src/propagation/mod.rs>

use std::collections::HashMap;

use http::HeaderMap;

/// Read access to a header carrier.
///
/// Implementations must not have side effects.
pub trait Extractor {
    /// Gets the first value stored under `key`, ignoring ASCII case.
    fn get(&self, key: &str) -> Option<&str>;
}

impl<S: std::hash::BuildHasher> Extractor for HashMap<String, String, S> {
    fn get(&self, key: &str) -> Option<&str> {
        // Fast path for the usual lowercase keys
        if let Some(value) = HashMap::get(self, key) {
            return Some(value.as_str());
        }

        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

impl Extractor for Vec<(String, String)> {
    fn get(&self, key: &str) -> Option<&str> {
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

impl Extractor for HeaderMap {
    /// Values that are not visible ASCII are treated as absent.
    fn get(&self, key: &str) -> Option<&str> {
        HeaderMap::get(self, key).and_then(|value| value.to_str().ok())
    }
}

/// The header shapes accepted by the propagation API.
#[derive(Clone, Debug, PartialEq)]
pub enum HeaderCarrier {
    /// Headers of an HTTP request.
    Request(HeaderMap),
    /// Header name to value mapping.
    Map(HashMap<String, String>),
    /// Ordered header list, duplicates allowed.
    List(Vec<(String, String)>),
}

impl HeaderCarrier {
    /// Merges generated headers into the carrier.
    ///
    /// `List` carriers get the generated headers prepended without
    /// deduplication. `Map` and `Request` carriers keep their existing value
    /// when a generated key collides with one already present.
    #[must_use]
    pub fn merge(self, generated: Vec<(&'static str, String)>) -> Self {
        match self {
            HeaderCarrier::List(existing) => {
                let mut headers: Vec<(String, String)> = generated
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect();
                headers.extend(existing);
                HeaderCarrier::List(headers)
            }
            HeaderCarrier::Map(existing) => {
                let mut headers: HashMap<String, String> = generated
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect();
                headers.extend(existing);
                HeaderCarrier::Map(headers)
            }
            HeaderCarrier::Request(mut existing) => {
                for (key, value) in generated {
                    if existing.contains_key(key) {
                        continue;
                    }
                    // Decimal ids are always valid header values
                    if let Ok(value) = value.parse() {
                        existing.insert(key, value);
                    }
                }
                HeaderCarrier::Request(existing)
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            HeaderCarrier::Request(headers) => headers.is_empty(),
            HeaderCarrier::Map(headers) => headers.is_empty(),
            HeaderCarrier::List(headers) => headers.is_empty(),
        }
    }
}

impl Extractor for HeaderCarrier {
    fn get(&self, key: &str) -> Option<&str> {
        match self {
            HeaderCarrier::Request(headers) => Extractor::get(headers, key),
            HeaderCarrier::Map(headers) => Extractor::get(headers, key),
            HeaderCarrier::List(headers) => Extractor::get(headers, key),
        }
    }
}

impl From<HeaderMap> for HeaderCarrier {
    fn from(headers: HeaderMap) -> Self {
        HeaderCarrier::Request(headers)
    }
}

impl From<HashMap<String, String>> for HeaderCarrier {
    fn from(headers: HashMap<String, String>) -> Self {
        HeaderCarrier::Map(headers)
    }
}

impl From<Vec<(String, String)>> for HeaderCarrier {
    fn from(headers: Vec<(String, String)>) -> Self {
        HeaderCarrier::List(headers)
    }
}
