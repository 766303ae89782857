// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! One flush: format the batch, encode it, send it, read the sampling rates
//! out of the agent's reply.
//!
//! There is no retry. A failed flush is logged with the traces it carried and
//! the traces are dropped.

use std::sync::Arc;

use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::HeaderMap;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::agent_client::AgentClient;
use crate::config::ExporterConfig;
use crate::container;
use crate::error::FlushError;
use crate::formatter;
use crate::sampling_rates::{AgentResponse, SamplingRateCache};
use crate::trace::Trace;

const MSGPACK_CONTENT_TYPE: &str = "application/msgpack";
const LANG: &str = "rust";
const LANG_VERSION: &str = env!("CARGO_PKG_RUST_VERSION");
const TRACER_VERSION: &str = env!("CARGO_PKG_VERSION");

const DATADOG_META_LANG: HeaderName = HeaderName::from_static("datadog-meta-lang");
const DATADOG_META_LANG_VERSION: HeaderName =
    HeaderName::from_static("datadog-meta-lang-version");
const DATADOG_META_TRACER_VERSION: HeaderName =
    HeaderName::from_static("datadog-meta-tracer-version");
const DATADOG_TRACE_COUNT: HeaderName = HeaderName::from_static("x-datadog-trace-count");
const DATADOG_CONTAINER_ID: HeaderName = HeaderName::from_static("datadog-container-id");

/// Sends batches to the agent and keeps the sampling rate cache current.
#[derive(Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct TraceFlusher {
    url: String,
    client: Arc<dyn AgentClient>,
    sampling_rates: SamplingRateCache,
    container_id: Option<String>,
    verbose: bool,
}

impl TraceFlusher {
    #[must_use]
    pub fn new(
        config: &ExporterConfig,
        client: Arc<dyn AgentClient>,
        sampling_rates: SamplingRateCache,
    ) -> Self {
        TraceFlusher {
            url: config.traces_url(),
            client,
            sampling_rates,
            container_id: container::container_id().map(str::to_string),
            verbose: config.verbose,
        }
    }

    #[must_use]
    pub fn with_container_id(mut self, container_id: Option<String>) -> Self {
        self.container_id = container_id;
        self
    }

    /// Flushes `traces`, logging any failure. Never fails the caller.
    pub async fn flush(&self, traces: Vec<Arc<Trace>>) {
        if traces.is_empty() {
            return;
        }

        let start = Instant::now();
        if let Err(e) = self.send(&traces).await {
            warn!(
                "TRACES | Failed to send {} traces: {e}. Dropping traces: {traces:?}",
                traces.len()
            );
        }
        debug!("TRACES | Flushing took {} ms", start.elapsed().as_millis());
    }

    /// Sends `traces` in a single request.
    ///
    /// # Errors
    ///
    /// Returns a [`FlushError`] when encoding fails, the request cannot be
    /// sent, the agent replies with a non-2xx status, or the reply body is not
    /// a valid agent response. The sampling rate cache is only updated on
    /// success.
    pub async fn send(&self, traces: &[Arc<Trace>]) -> Result<(), FlushError> {
        let formatted = formatter::format_batch(traces);
        let payload = formatter::encode(&formatted)?;

        if self.verbose {
            let span_count: usize = traces.iter().map(|trace| trace.span_count()).sum();
            debug!(
                "TRACES | Sending {} traces, {span_count} spans: {formatted:?}",
                traces.len()
            );
        }

        let reply = self
            .client
            .put(&self.url, self.headers(traces.len()), payload)
            .await?;

        if self.verbose {
            debug!(
                "TRACES | Agent responded with status {}: {}",
                reply.status, reply.body
            );
        }

        if !reply.is_success() {
            return Err(FlushError::Agent {
                status: reply.status,
                body: reply.body,
            });
        }

        let response: AgentResponse = serde_json::from_str(&reply.body)?;
        if let Some(rates) = response.rate_by_service {
            self.sampling_rates.replace(rates);
        }

        Ok(())
    }

    fn headers(&self, trace_count: usize) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(MSGPACK_CONTENT_TYPE));
        headers.insert(DATADOG_META_LANG, HeaderValue::from_static(LANG));
        headers.insert(
            DATADOG_META_LANG_VERSION,
            HeaderValue::from_static(LANG_VERSION),
        );
        headers.insert(
            DATADOG_META_TRACER_VERSION,
            HeaderValue::from_static(TRACER_VERSION),
        );
        headers.insert(DATADOG_TRACE_COUNT, HeaderValue::from(trace_count));

        if let Some(container_id) = &self.container_id {
            match HeaderValue::from_str(container_id) {
                Ok(value) => {
                    headers.insert(DATADOG_CONTAINER_ID, value);
                }
                Err(e) => debug!("TRACES | Skipping invalid container id {container_id}: {e}"),
            }
        }

        headers
    }
}
