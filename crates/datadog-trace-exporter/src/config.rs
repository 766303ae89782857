// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_AGENT_HOST: &str = "localhost";
const DEFAULT_AGENT_PORT: u16 = 8126;
const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_SYNC_THRESHOLD: usize = 20;
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_millis(200);
const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(30);

pub const TRACES_PATH: &str = "/v0.4/traces";

#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
#[allow(clippy::struct_excessive_bools)]
pub struct ExporterConfig {
    pub agent_host: String,
    pub agent_port: u16,
    /// Number of traces that triggers a flush. `0` flushes every trace.
    pub batch_size: usize,
    /// When false, `send_trace` waits for the engine to process the trace.
    pub asynchronous_send: bool,
    /// In-flight async flushes after which the engine flushes inline.
    pub sync_threshold: usize,
    /// Log every payload and agent response at debug level.
    pub verbose: bool,
    /// Drain the batch on forced termination too.
    pub trap_exits: bool,
    /// Connect, request and idle pool timeout for the agent client.
    pub http_timeout: Duration,
    /// How long a synchronous `send_trace` waits for the engine.
    pub sync_timeout: Duration,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        ExporterConfig {
            agent_host: DEFAULT_AGENT_HOST.to_string(),
            agent_port: DEFAULT_AGENT_PORT,
            batch_size: DEFAULT_BATCH_SIZE,
            asynchronous_send: true,
            sync_threshold: DEFAULT_SYNC_THRESHOLD,
            verbose: false,
            trap_exits: false,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
        }
    }
}

impl ExporterConfig {
    /// Reads the configuration from `DD_*` environment variables, falling
    /// back to defaults for unset ones.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first variable that is
    /// set but cannot be parsed.
    pub fn from_env() -> Result<ExporterConfig, ConfigError> {
        let defaults = ExporterConfig::default();

        Ok(ExporterConfig {
            agent_host: env::var("DD_AGENT_HOST")
                .ok()
                .filter(|host| !host.trim().is_empty())
                .unwrap_or(defaults.agent_host),
            agent_port: parse_var("DD_TRACE_AGENT_PORT")?.unwrap_or(defaults.agent_port),
            batch_size: parse_var("DD_TRACE_BATCH_SIZE")?.unwrap_or(defaults.batch_size),
            asynchronous_send: parse_bool_var("DD_TRACE_ASYNC_SEND")?
                .unwrap_or(defaults.asynchronous_send),
            sync_threshold: parse_var("DD_TRACE_SYNC_THRESHOLD")?
                .unwrap_or(defaults.sync_threshold),
            verbose: parse_bool_var("DD_TRACE_VERBOSE")?.unwrap_or(defaults.verbose),
            trap_exits: parse_bool_var("DD_TRACE_TRAP_EXITS")?.unwrap_or(defaults.trap_exits),
            http_timeout: parse_var("DD_TRACE_HTTP_TIMEOUT_MS")?
                .map_or(defaults.http_timeout, Duration::from_millis),
            sync_timeout: parse_var("DD_TRACE_SYNC_TIMEOUT_MS")?
                .map_or(defaults.sync_timeout, Duration::from_millis),
        })
    }

    #[must_use]
    pub fn traces_url(&self) -> String {
        format!(
            "http://{}:{}{TRACES_PATH}",
            self.agent_host, self.agent_port
        )
    }
}

fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    let Ok(value) = env::var(name) else {
        return Ok(None);
    };

    value
        .trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue { name, value })
}

fn parse_bool_var(name: &'static str) -> Result<Option<bool>, ConfigError> {
    let Ok(value) = env::var(name) else {
        return Ok(None);
    };

    match value.trim().to_lowercase().as_str() {
        "true" | "1" => Ok(Some(true)),
        "false" | "0" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidValue { name, value }),
    }
}
