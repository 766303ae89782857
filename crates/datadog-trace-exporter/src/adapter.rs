// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The surface an instrumentation library talks to.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::agent_client::ReqwestAgentClient;
use crate::config::ExporterConfig;
use crate::context::SpanContext;
use crate::error::{ExportError, NoDistributedTrace};
use crate::exporter_service::{ExporterHandle, ExporterService};
use crate::propagation::{self, carrier::HeaderCarrier};
use crate::sampling_rates::{SamplingRateCache, SamplingRates};
use crate::telemetry::EventEmitter;
use crate::trace::Trace;

/// Operations a tracer needs from its exporter.
#[async_trait]
pub trait TracerAdapter: Send + Sync {
    /// Hands a finished trace over for export.
    async fn send_trace(&self, trace: Trace) -> Result<(), ExportError>;

    /// Decodes the caller's context from incoming headers.
    fn distributed_context(&self, headers: &HeaderCarrier)
        -> Result<SpanContext, NoDistributedTrace>;

    /// Adds the Datadog context headers to outgoing headers.
    fn inject_context(&self, headers: HeaderCarrier, context: &SpanContext) -> HeaderCarrier;

    /// Latest per-service sampling rates reported by the agent.
    fn get_sampling_rates(&self) -> Arc<SamplingRates>;
}

#[derive(Clone)]
pub struct DatadogAdapter {
    handle: ExporterHandle,
}

impl DatadogAdapter {
    #[must_use]
    pub fn new(handle: ExporterHandle) -> Self {
        DatadogAdapter { handle }
    }

    /// Spawns an export engine talking to the agent over HTTP and sharing the
    /// process-wide sampling rate cache.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(config: ExporterConfig, events: EventEmitter) -> (Self, JoinHandle<()>) {
        let client = Arc::new(ReqwestAgentClient::new(config.http_timeout));
        let (service, handle) = ExporterService::new(
            config,
            client,
            SamplingRateCache::global().clone(),
            events,
        );

        (DatadogAdapter::new(handle), tokio::spawn(service.run()))
    }

    #[must_use]
    pub fn handle(&self) -> &ExporterHandle {
        &self.handle
    }
}

#[async_trait]
impl TracerAdapter for DatadogAdapter {
    async fn send_trace(&self, trace: Trace) -> Result<(), ExportError> {
        self.handle.send_trace(trace).await
    }

    fn distributed_context(
        &self,
        headers: &HeaderCarrier,
    ) -> Result<SpanContext, NoDistributedTrace> {
        propagation::distributed_context(headers)
    }

    fn inject_context(&self, headers: HeaderCarrier, context: &SpanContext) -> HeaderCarrier {
        propagation::inject_context(headers, context)
    }

    fn get_sampling_rates(&self) -> Arc<SamplingRates> {
        self.handle.get_sampling_rates()
    }
}
