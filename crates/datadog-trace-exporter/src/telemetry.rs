// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle events for flush-triggering sends.
//!
//! Every `send_trace` that triggers a flush produces one
//! [`ExporterEvent::Start`] followed by exactly one [`ExporterEvent::Stop`] or
//! [`ExporterEvent::Exception`]. Sends that only enqueue produce nothing.
//!
//! ```text
//! send_trace ──> engine ──> Start ──> flush ──┬──> Stop
//!                                             └──> Exception (timeout, panic)
//! ```
//!
//! Events travel over a bounded channel. Emitting never waits: when the
//! consumer lags and the channel is full the event is dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use tracing::debug;

use crate::trace::Trace;

pub(crate) const MAX_EVENTS: usize = 100;

/// Why a flush-triggering send did not complete normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A synchronous caller gave up waiting for the engine.
    Timeout,
    /// The flush task panicked.
    Panicked,
    /// The flush task was cancelled by the runtime.
    Cancelled,
}

#[derive(Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub enum ExporterEvent {
    Start {
        monotonic_time: Instant,
        trace: Arc<Trace>,
    },
    Stop {
        duration: Duration,
        trace: Arc<Trace>,
    },
    Exception {
        duration: Duration,
        trace: Arc<Trace>,
        kind: FailureKind,
    },
}

/// Receiving end of the lifecycle event channel.
pub struct EventBus {
    pub rx: mpsc::Receiver<ExporterEvent>,
}

impl EventBus {
    /// Creates the bus and the emitter handed to the export engine.
    #[must_use]
    pub fn run() -> (EventBus, EventEmitter) {
        let (tx, rx) = mpsc::channel(MAX_EVENTS);
        (EventBus { rx }, EventEmitter { tx: Some(tx) })
    }
}

/// Sending end of the lifecycle event channel.
///
/// A disabled emitter discards everything.
#[derive(Debug, Clone, Default)]
pub struct EventEmitter {
    tx: Option<mpsc::Sender<ExporterEvent>>,
}

impl EventEmitter {
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: ExporterEvent) {
        let Some(tx) = &self.tx else {
            return;
        };

        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                debug!("Event bus full, dropping event: {event:?}");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Emits `Start` and returns its timestamp for the matching end event.
    pub fn start(&self, trace: &Arc<Trace>) -> Instant {
        let monotonic_time = Instant::now();
        self.emit(ExporterEvent::Start {
            monotonic_time,
            trace: Arc::clone(trace),
        });
        monotonic_time
    }

    pub fn stop(&self, started: Instant, trace: &Arc<Trace>) {
        self.emit(ExporterEvent::Stop {
            duration: started.elapsed(),
            trace: Arc::clone(trace),
        });
    }

    pub fn exception(&self, started: Instant, trace: &Arc<Trace>, kind: FailureKind) {
        self.emit(ExporterEvent::Exception {
            duration: started.elapsed(),
            trace: Arc::clone(trace),
            kind,
        });
    }
}
