// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use async_trait::async_trait;
use http::HeaderMap;
use tracing::error;

use crate::error::FlushError;

/// Status and body of an agent reply, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    pub status: u16,
    pub body: String,
}

impl AgentReply {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound HTTP capability used to reach the local agent.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Sends `body` with a `PUT` to `url`.
    ///
    /// Only transport failures are errors; non-2xx replies are returned as
    /// [`AgentReply`]s.
    async fn put(
        &self,
        url: &str,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Result<AgentReply, FlushError>;
}

#[derive(Clone, Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct ReqwestAgentClient {
    client: reqwest::Client,
}

impl ReqwestAgentClient {
    /// Builds a client whose connect, request and idle pool timeouts all use
    /// `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let client = match reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .pool_idle_timeout(Some(timeout))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to build HTTP client: {e}, using reqwest defaults");
                reqwest::Client::new()
            }
        };

        ReqwestAgentClient { client }
    }
}

#[async_trait]
impl AgentClient for ReqwestAgentClient {
    async fn put(
        &self,
        url: &str,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Result<AgentReply, FlushError> {
        let response = self
            .client
            .put(url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| FlushError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FlushError::Transport(e.to_string()))?;

        Ok(AgentReply { status, body })
    }
}
