// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The export engine.
//!
//! A single task owns the batch and processes commands from any number of
//! [`ExporterHandle`]s in arrival order:
//!
//! ```text
//! ExporterHandle (many) ──> unbounded mpsc ──> ExporterService::run
//!                                               ├─ TraceAggregator (batch)
//!                                               ├─ TraceFlusher ──> agent
//!                                               └─ JoinSet (in-flight async flushes)
//! ```
//!
//! A send that brings the batch to `batch_size` flushes the whole batch. In
//! asynchronous mode the flush runs as a tracked task, unless `sync_threshold`
//! flushes are already in flight, in which case the engine flushes inline and
//! stops reading its mailbox until the flush is done. In synchronous mode the
//! flush always runs inline and the caller is answered once it finished.
//!
//! On shutdown the mailbox is closed first and every command already queued is
//! processed before the final drain, so no accepted trace is lost.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::agent_client::AgentClient;
use crate::config::ExporterConfig;
use crate::error::ExportError;
use crate::sampling_rates::{SamplingRateCache, SamplingRates};
use crate::telemetry::{EventEmitter, FailureKind};
use crate::trace::Trace;
use crate::trace_aggregator::TraceAggregator;
use crate::trace_flusher::TraceFlusher;

#[derive(Debug)]
pub enum ExporterCommand {
    SendTrace {
        trace: Arc<Trace>,
        /// Present for synchronous sends only.
        reply: Option<SyncReply>,
    },
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Progress of one synchronous send.
///
/// Shared by the waiting caller and the engine. Whichever side observes the
/// last transition emits the event closing the lifecycle the engine opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    Queued,
    Enqueued,
    Flushing { started: Instant },
    Flushed,
    /// The caller stopped waiting.
    Abandoned,
}

fn lock(state: &Mutex<SyncState>) -> MutexGuard<'_, SyncState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Engine side of a synchronous send.
#[derive(Debug)]
pub struct SyncReply {
    done: oneshot::Sender<()>,
    state: Arc<Mutex<SyncState>>,
}

impl SyncReply {
    fn enqueued(self) {
        {
            let mut state = lock(&self.state);
            if *state == SyncState::Queued {
                *state = SyncState::Enqueued;
            }
        }
        if self.done.send(()).is_err() {
            debug!("TRACES | Synchronous sender gave up before the trace was enqueued");
        }
    }

    /// Emits `Start` and returns its timestamp, with whether the caller is
    /// still waiting.
    fn flush_started(&self, events: &EventEmitter, trace: &Arc<Trace>) -> (Instant, bool) {
        let mut state = lock(&self.state);
        let started = events.start(trace);
        if *state == SyncState::Queued {
            *state = SyncState::Flushing { started };
            (started, true)
        } else {
            (started, false)
        }
    }

    fn flush_finished(
        self,
        events: &EventEmitter,
        trace: &Arc<Trace>,
        started: Instant,
        caller_waiting: bool,
    ) {
        if !caller_waiting {
            // Timed out before the engine got to it, nobody else closes this one
            events.exception(started, trace, FailureKind::Timeout);
            return;
        }

        {
            let mut state = lock(&self.state);
            if matches!(*state, SyncState::Flushing { .. }) {
                events.stop(started, trace);
                *state = SyncState::Flushed;
            }
        }
        if self.done.send(()).is_err() {
            debug!("TRACES | Synchronous sender gave up before the flush finished");
        }
    }
}

#[derive(Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct ExporterHandle {
    tx: mpsc::UnboundedSender<ExporterCommand>,
    sampling_rates: SamplingRateCache,
    events: EventEmitter,
    asynchronous_send: bool,
    sync_timeout: Duration,
    cancel: CancellationToken,
}

impl ExporterHandle {
    /// Hands `trace` to the engine.
    ///
    /// Asynchronous mode returns as soon as the trace is queued. Synchronous
    /// mode waits until the engine has added the trace to the batch and, if
    /// that triggered a flush, until the flush is done.
    ///
    /// # Errors
    ///
    /// [`ExportError::Timeout`] when a synchronous send waits longer than
    /// `sync_timeout`; the engine keeps running, still batches the trace and
    /// finishes the flush on its own. [`ExportError::EngineStopped`] when the
    /// engine is gone.
    pub async fn send_trace(&self, trace: Trace) -> Result<(), ExportError> {
        let trace = Arc::new(trace);

        if self.asynchronous_send {
            return self
                .tx
                .send(ExporterCommand::SendTrace { trace, reply: None })
                .map_err(|_| ExportError::EngineStopped);
        }

        let state = Arc::new(Mutex::new(SyncState::Queued));
        let (done, done_rx) = oneshot::channel();
        self.tx
            .send(ExporterCommand::SendTrace {
                trace: Arc::clone(&trace),
                reply: Some(SyncReply {
                    done,
                    state: Arc::clone(&state),
                }),
            })
            .map_err(|_| ExportError::EngineStopped)?;

        match tokio::time::timeout(self.sync_timeout, done_rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(ExportError::EngineStopped),
            Err(_) => self.abandon(&state, &trace),
        }
    }

    fn abandon(&self, state: &Mutex<SyncState>, trace: &Arc<Trace>) -> Result<(), ExportError> {
        let mut state = lock(state);
        match *state {
            // Answered right at the deadline
            SyncState::Enqueued | SyncState::Flushed => return Ok(()),
            SyncState::Flushing { started } => {
                self.events.exception(started, trace, FailureKind::Timeout);
            }
            SyncState::Queued | SyncState::Abandoned => {}
        }
        *state = SyncState::Abandoned;

        Err(ExportError::Timeout(self.sync_timeout))
    }

    /// Flushes the current batch whatever its size and waits for it.
    ///
    /// # Errors
    ///
    /// [`ExportError::EngineStopped`] when the engine is gone.
    pub async fn flush(&self) -> Result<(), ExportError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(ExporterCommand::Flush(response_tx))
            .map_err(|_| ExportError::EngineStopped)?;

        response_rx.await.map_err(|_| ExportError::EngineStopped)
    }

    /// Latest per-service sampling rates. Never waits on the engine.
    #[must_use]
    pub fn get_sampling_rates(&self) -> Arc<SamplingRates> {
        self.sampling_rates.snapshot()
    }

    /// Graceful shutdown: stops accepting commands, processes the ones already
    /// queued, flushes the residual batch, waits for in-flight flushes, then
    /// stops the engine.
    ///
    /// # Errors
    ///
    /// [`ExportError::EngineStopped`] when the engine was already gone.
    pub async fn shutdown(&self) -> Result<(), ExportError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(ExporterCommand::Shutdown(response_tx))
            .map_err(|_| ExportError::EngineStopped)?;

        response_rx.await.map_err(|_| ExportError::EngineStopped)
    }

    /// Forced termination. Queued commands and the batch are dropped, unless
    /// `trap_exits` is set, in which case the engine shuts down gracefully.
    /// Flushes already in flight always run to completion.
    pub fn terminate(&self) {
        self.cancel.cancel();
    }
}

#[allow(clippy::module_name_repetitions)]
pub struct ExporterService {
    config: ExporterConfig,
    aggregator: TraceAggregator,
    flusher: TraceFlusher,
    events: EventEmitter,
    in_flight: JoinSet<()>,
    rx: mpsc::UnboundedReceiver<ExporterCommand>,
    cancel: CancellationToken,
}

impl ExporterService {
    #[must_use]
    pub fn new(
        config: ExporterConfig,
        client: Arc<dyn AgentClient>,
        sampling_rates: SamplingRateCache,
        events: EventEmitter,
    ) -> (Self, ExporterHandle) {
        let flusher = TraceFlusher::new(&config, client, sampling_rates.clone());
        Self::with_flusher(config, flusher, sampling_rates, events)
    }

    #[must_use]
    pub fn with_flusher(
        config: ExporterConfig,
        flusher: TraceFlusher,
        sampling_rates: SamplingRateCache,
        events: EventEmitter,
    ) -> (Self, ExporterHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let handle = ExporterHandle {
            tx,
            sampling_rates,
            events: events.clone(),
            asynchronous_send: config.asynchronous_send,
            sync_timeout: config.sync_timeout,
            cancel: cancel.clone(),
        };

        let service = ExporterService {
            config,
            aggregator: TraceAggregator::new(),
            flusher,
            events,
            in_flight: JoinSet::new(),
            rx,
            cancel,
        };

        (service, handle)
    }

    pub async fn run(mut self) {
        debug!("TRACES | Exporter service started");

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    self.terminate().await;
                    break;
                }

                Some(result) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    if let Err(e) = result {
                        error!("TRACES | Flush task failed: {e}");
                    }
                }

                command = self.rx.recv() => match command {
                    Some(ExporterCommand::SendTrace { trace, reply }) => {
                        self.send_trace(trace, reply).await;
                    }
                    Some(ExporterCommand::Flush(response_tx)) => {
                        self.flush(response_tx).await;
                    }
                    Some(ExporterCommand::Shutdown(response_tx)) => {
                        debug!("TRACES | Exporter service shutting down");
                        self.shutdown(vec![response_tx]).await;
                        break;
                    }
                    None => {
                        debug!("TRACES | All exporter handles dropped, shutting down");
                        self.drain().await;
                        break;
                    }
                },
            }
        }

        debug!("TRACES | Exporter service stopped");
    }

    async fn send_trace(&mut self, trace: Arc<Trace>, reply: Option<SyncReply>) {
        if self.config.verbose {
            debug!("TRACES | Enqueued trace with {} spans", trace.span_count());
        }

        if self.aggregator.add(Arc::clone(&trace)) < self.config.batch_size {
            if let Some(reply) = reply {
                reply.enqueued();
            }
            return;
        }

        let batch = self.aggregator.take();

        match reply {
            Some(reply) => {
                let (started, caller_waiting) = reply.flush_started(&self.events, &trace);
                self.flusher.flush(batch).await;
                reply.flush_finished(&self.events, &trace, started, caller_waiting);
            }
            None => {
                let started = self.events.start(&trace);
                self.spawn_flush(batch, trace, started).await;
            }
        }
    }

    async fn flush(&mut self, response_tx: oneshot::Sender<()>) {
        self.flusher.flush(self.aggregator.take()).await;
        if response_tx.send(()).is_err() {
            error!("TRACES | Failed to send flush response - receiver dropped");
        }
    }

    async fn spawn_flush(&mut self, batch: Vec<Arc<Trace>>, trace: Arc<Trace>, started: Instant) {
        if self.in_flight.len() >= self.config.sync_threshold {
            debug!(
                "TRACES | {} flushes in flight, flushing inline",
                self.in_flight.len()
            );
            self.flusher.flush(batch).await;
            self.events.stop(started, &trace);
            return;
        }

        let flusher = self.flusher.clone();
        let events = self.events.clone();
        self.in_flight.spawn(async move {
            let flush = tokio::spawn(async move { flusher.flush(batch).await });
            match flush.await {
                Ok(()) => events.stop(started, &trace),
                Err(e) if e.is_panic() => {
                    error!("TRACES | Flush task panicked: {e}");
                    events.exception(started, &trace, FailureKind::Panicked);
                }
                Err(e) => {
                    error!("TRACES | Flush task cancelled: {e}");
                    events.exception(started, &trace, FailureKind::Cancelled);
                }
            }
        });
    }

    /// Closes the mailbox, processes every command still queued, drains, then
    /// answers all shutdown callers.
    async fn shutdown(&mut self, mut waiters: Vec<oneshot::Sender<()>>) {
        self.rx.close();
        while let Some(command) = self.rx.recv().await {
            match command {
                ExporterCommand::SendTrace { trace, reply } => self.send_trace(trace, reply).await,
                ExporterCommand::Flush(response_tx) => self.flush(response_tx).await,
                ExporterCommand::Shutdown(response_tx) => waiters.push(response_tx),
            }
        }

        self.drain().await;

        for response_tx in waiters {
            if response_tx.send(()).is_err() {
                error!("TRACES | Failed to send shutdown response - receiver dropped");
            }
        }
    }

    /// Flushes the residual batch and waits for every in-flight flush.
    async fn drain(&mut self) {
        let batch = self.aggregator.take();
        if !batch.is_empty() {
            debug!("TRACES | Draining {} traces", batch.len());
            self.flusher.flush(batch).await;
        }

        while let Some(result) = self.in_flight.join_next().await {
            if let Err(e) = result {
                error!("TRACES | Flush task failed: {e}");
            }
        }
    }

    async fn terminate(&mut self) {
        if self.config.trap_exits {
            debug!("TRACES | Exporter service terminated, shutting down");
            self.shutdown(Vec::new()).await;
            return;
        }

        if !self.aggregator.is_empty() {
            debug!(
                "TRACES | Exporter service terminated, dropping {} traces",
                self.aggregator.len()
            );
        }
        self.aggregator.take();

        // Detached flushes still report their outcome
        self.in_flight.detach_all();
    }
}
