// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-service sampling rates reported by the agent.
//!
//! Every successful flush response may carry a `rate_by_service` map. The last
//! one received replaces the previous map wholesale. Readers take a snapshot
//! and never wait on the export engine.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use serde::Deserialize;
use tracing::error;

/// Sampling rates keyed by the agent's `service:<name>,env:<env>` strings.
pub type SamplingRates = HashMap<String, f64>;

/// Body of a `/v0.4/traces` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AgentResponse {
    pub rate_by_service: Option<SamplingRates>,
}

/// Shared handle to the current sampling rate map.
#[derive(Debug, Clone, Default)]
pub struct SamplingRateCache {
    rates: Arc<RwLock<Arc<SamplingRates>>>,
}

static GLOBAL: OnceLock<SamplingRateCache> = OnceLock::new();

impl SamplingRateCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache used by engines that are not given their own.
    pub fn global() -> &'static SamplingRateCache {
        GLOBAL.get_or_init(SamplingRateCache::new)
    }

    /// The current rates. Empty until the agent has reported any.
    #[must_use]
    pub fn snapshot(&self) -> Arc<SamplingRates> {
        match self.rates.read() {
            Ok(rates) => Arc::clone(&rates),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn replace(&self, rates: SamplingRates) {
        let rates = Arc::new(rates);
        match self.rates.write() {
            Ok(mut current) => *current = rates,
            Err(poisoned) => {
                error!("sampling rate cache lock poisoned, recovering");
                *poisoned.into_inner() = rates;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_until_replaced() {
        let cache = SamplingRateCache::new();
        assert!(cache.snapshot().is_empty());

        cache.replace(HashMap::from([("service:,env:".to_string(), 1.0)]));

        assert_eq!(cache.snapshot().get("service:,env:"), Some(&1.0));
    }

    #[test]
    fn test_replace_is_wholesale() {
        let cache = SamplingRateCache::new();
        cache.replace(HashMap::from([
            ("service:a,env:prod".to_string(), 0.5),
            ("service:b,env:prod".to_string(), 0.1),
        ]));
        let before = cache.snapshot();

        cache.replace(HashMap::from([("service:c,env:prod".to_string(), 0.2)]));

        let after = cache.snapshot();
        assert_eq!(after.len(), 1);
        assert_eq!(after.get("service:c,env:prod"), Some(&0.2));
        // Earlier snapshots are unaffected
        assert_eq!(before.len(), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let cache = SamplingRateCache::new();
        let clone = cache.clone();

        clone.replace(HashMap::from([("service:a,env:dev".to_string(), 0.3)]));

        assert_eq!(cache.snapshot().get("service:a,env:dev"), Some(&0.3));
    }

    #[test]
    fn test_parse_agent_response() {
        let response: AgentResponse = serde_json::from_str(
            r#"{"rate_by_service":{"service:,env:":1,"service:web,env:prod":0.5}}"#,
        )
        .unwrap();

        let rates = response.rate_by_service.unwrap();
        assert_eq!(rates.get("service:,env:"), Some(&1.0));
        assert_eq!(rates.get("service:web,env:prod"), Some(&0.5));

        let empty: AgentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.rate_by_service, None);
    }
}
