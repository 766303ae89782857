// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log line formatting for the exporter.
//!
//! ```text
//! DD_TRACE_EXPORTER | LEVEL | [span_name{span_fields}:] message {event_fields}
//! ```
//!
//! Applications that already install a subscriber keep theirs; [`init`] is for
//! processes that want the exporter's format and filter.

use std::fmt;

use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields, MakeWriter,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

const PREFIX: &str = "DD_TRACE_EXPORTER";

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("could not parse log level: {0}")]
    InvalidLevel(#[from] tracing_subscriber::filter::ParseError),
    #[error("setting default subscriber failed: {0}")]
    AlreadySet(#[from] TryInitError),
}

#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        write!(&mut writer, "{PREFIX} | {} | ", metadata.level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;

                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Filter directive for `log_level`, with the HTTP stack silenced.
#[must_use]
pub fn env_filter_directive(log_level: &str) -> String {
    format!("h2=off,hyper=off,reqwest=off,{log_level}")
}

/// Builds the exporter's subscriber writing to `writer`.
///
/// # Errors
///
/// Returns [`InitError::InvalidLevel`] if `log_level` is not a valid filter.
pub fn subscriber<W>(
    log_level: &str,
    writer: W,
) -> Result<impl Subscriber + Send + Sync + 'static, InitError>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_new(env_filter_directive(log_level))?;

    Ok(tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(writer)
        .event_format(Formatter)
        .finish())
}

/// Installs the exporter's subscriber as the global default, writing to
/// stdout, and routes `log` records from dependencies into it.
///
/// # Errors
///
/// Fails if `log_level` is invalid, or a global subscriber or `log` logger is
/// already set.
pub fn init(log_level: &str) -> Result<(), InitError> {
    subscriber(log_level, std::io::stdout)?.try_init()?;
    tracing::debug!("Logging subsystem enabled");
    Ok(())
}
