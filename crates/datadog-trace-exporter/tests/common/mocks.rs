// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock agent client recording every request it receives

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use datadog_trace_exporter::agent_client::{AgentClient, AgentReply};
use datadog_trace_exporter::FlushError;
use http::HeaderMap;

/// How the mock answers each `put`
#[derive(Clone, Debug)]
#[allow(dead_code)]
pub enum Behavior {
    Reply { status: u16, body: String },
    TransportError,
    Panic,
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

impl RecordedRequest {
    #[allow(dead_code)]
    pub fn trace_count(&self) -> &str {
        self.headers
            .get("x-datadog-trace-count")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    }
}

pub struct MockAgentClient {
    behavior: Behavior,
    delay: Duration,
    requests: Mutex<Vec<RecordedRequest>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

#[allow(dead_code)]
impl MockAgentClient {
    pub fn new(behavior: Behavior) -> Self {
        MockAgentClient {
            behavior,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Replies 200 with a single sampling rate
    pub fn ok() -> Self {
        Self::new(Behavior::Reply {
            status: 200,
            body: r#"{"rate_by_service":{"service:,env:":1}}"#.to_string(),
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("lock poisoned").clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("lock poisoned").len()
    }

    /// Highest number of requests that were in progress at the same time
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AgentClient for MockAgentClient {
    async fn put(
        &self,
        url: &str,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Result<AgentReply, FlushError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        let decoded = rmp_serde::from_slice(&body).expect("payload is valid msgpack");
        self.requests
            .lock()
            .expect("lock poisoned")
            .push(RecordedRequest {
                url: url.to_string(),
                headers,
                body: decoded,
            });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        match &self.behavior {
            Behavior::Reply { status, body } => Ok(AgentReply {
                status: *status,
                body: body.clone(),
            }),
            Behavior::TransportError => Err(FlushError::Transport("connection refused".into())),
            Behavior::Panic => panic!("agent client exploded"),
        }
    }
}
