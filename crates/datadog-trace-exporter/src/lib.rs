// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batches finished traces and ships them to a local Datadog agent over the
//! v0.4 msgpack API, and propagates trace context across process boundaries
//! using the W3C `traceparent` and Datadog `x-datadog-*` headers.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod adapter;
pub mod agent_client;
pub mod config;
pub mod container;
pub mod context;
pub mod error;
pub mod exporter_service;
pub mod formatter;
pub mod logger;
pub mod propagation;
pub mod sampling_rates;
pub mod telemetry;
pub mod trace;
pub mod trace_aggregator;
pub mod trace_flusher;

pub use adapter::{DatadogAdapter, TracerAdapter};
pub use config::ExporterConfig;
pub use context::SpanContext;
pub use error::{ConfigError, ExportError, FlushError, InvalidTrace, NoDistributedTrace};
pub use exporter_service::{ExporterHandle, ExporterService};
pub use propagation::carrier::HeaderCarrier;
pub use propagation::{distributed_context, inject_context};
pub use sampling_rates::{SamplingRateCache, SamplingRates};
pub use telemetry::{EventBus, EventEmitter, ExporterEvent, FailureKind};
pub use trace::{Sampling, Span, SpanError, TagValue, Trace};
