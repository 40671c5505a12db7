// Copyright 2024 Aegis Network Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use prometheus::core::{AtomicF64, GenericCounter, GenericGauge};
use prometheus::{Encoder, Opts, Registry, TextEncoder};

/// A struct for collecting metrics in the relayer.
///
/// Each instance owns its own [`Registry`], so building a fresh `Metrics`
/// per process (or per test) never collides with a previous registration.
#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    /// Number of currently connected WebSocket sessions.
    pub connected_sessions: GenericGauge<AtomicF64>,
    /// Total number of transfer events durably recorded.
    pub transactions_recorded: GenericCounter<AtomicF64>,
    /// Total number of redelivered events dropped by the idempotency check.
    pub duplicate_events_ignored: GenericCounter<AtomicF64>,
    /// Total number of events fanned out to sessions.
    pub events_broadcasted: GenericCounter<AtomicF64>,
    /// Total number of disaster events ingested through the webhook.
    pub disasters_ingested: GenericCounter<AtomicF64>,
    /// Total number of requests rejected by the admission gateway.
    pub rate_limited_requests: GenericCounter<AtomicF64>,
    /// How many times the event watcher backed off.
    pub event_watcher_back_off: GenericCounter<AtomicF64>,
    /// Total amount of data stored on disk.
    pub total_amount_of_data_stored: GenericGauge<AtomicF64>,
}

impl Metrics {
    /// Instantiates the various counters and gauges and registers them in a
    /// registry owned by this instance.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let connected_sessions = GenericGauge::with_opts(Opts::new(
            "connected_sessions",
            "Number of currently connected WebSocket sessions",
        ))?;

        let transactions_recorded = GenericCounter::with_opts(Opts::new(
            "transactions_recorded",
            "The total number of transfer events durably recorded",
        ))?;

        let duplicate_events_ignored = GenericCounter::with_opts(Opts::new(
            "duplicate_events_ignored",
            "The total number of redelivered events dropped as duplicates",
        ))?;

        let events_broadcasted = GenericCounter::with_opts(Opts::new(
            "events_broadcasted",
            "The total number of events fanned out to sessions",
        ))?;

        let disasters_ingested = GenericCounter::with_opts(Opts::new(
            "disasters_ingested",
            "The total number of disaster events ingested via webhook",
        ))?;

        let rate_limited_requests = GenericCounter::with_opts(Opts::new(
            "rate_limited_requests",
            "The total number of requests rejected by the admission gateway",
        ))?;

        let event_watcher_back_off = GenericCounter::with_opts(Opts::new(
            "event_watcher_back_off",
            "Specifies how many times the event watcher backed off",
        ))?;

        let total_amount_of_data_stored = GenericGauge::with_opts(Opts::new(
            "total_amount_of_data_stored",
            "The total amount of data stored on disk",
        ))?;

        registry.register(Box::new(connected_sessions.clone()))?;
        registry.register(Box::new(transactions_recorded.clone()))?;
        registry.register(Box::new(duplicate_events_ignored.clone()))?;
        registry.register(Box::new(events_broadcasted.clone()))?;
        registry.register(Box::new(disasters_ingested.clone()))?;
        registry.register(Box::new(rate_limited_requests.clone()))?;
        registry.register(Box::new(event_watcher_back_off.clone()))?;
        registry.register(Box::new(total_amount_of_data_stored.clone()))?;

        Ok(Self {
            registry,
            connected_sessions,
            transactions_recorded,
            duplicate_events_ignored,
            events_broadcasted,
            disasters_ingested,
            rate_limited_requests,
            event_watcher_back_off,
            total_amount_of_data_stored,
        })
    }

    /// Gathers all registered metrics, text-encoded for the metrics endpoint.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("metrics are not valid utf-8: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_instances_do_not_collide() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.transactions_recorded.inc();
        assert_eq!(a.transactions_recorded.get(), 1.0);
        assert_eq!(b.transactions_recorded.get(), 0.0);
    }

    #[test]
    fn gather_renders_registered_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.connected_sessions.set(3.0);
        let text = metrics.gather().unwrap();
        assert!(text.contains("connected_sessions 3"));
    }
}
