// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Malformed header errors.
//!
//! These never leave the propagation module: an extraction error is logged and
//! the offending header format is treated as absent.

use thiserror::Error;

/// A header was present but could not be decoded.
///
/// Errors are formatted as: `"Cannot extract from {message}, {propagator_name}"`
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
#[error("Cannot extract from {}, {}", message, propagator_name)]
pub struct Error {
    message: &'static str,
    propagator_name: &'static str,
}

impl Error {
    #[must_use]
    pub fn extract(message: &'static str, propagator_name: &'static str) -> Self {
        Self {
            message,
            propagator_name,
        }
    }
}
