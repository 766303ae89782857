// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Global logger installation, in its own process

use datadog_trace_exporter::logger::{self, InitError};

#[test]
fn test_init_installs_subscriber_and_log_bridge() {
    logger::init("info").unwrap();

    // `log` records are routed through the tracing filter
    assert!(log::log_enabled!(log::Level::Info));
    assert!(!log::log_enabled!(log::Level::Debug));

    assert!(matches!(
        logger::init("debug"),
        Err(InitError::AlreadySet(_))
    ));
}
