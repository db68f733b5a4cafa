//! Metrics collection using Prometheus
//!
//! This module provides metrics for the snapshot cache: hit rates, remote
//! refills, staleness probes, skipped matches and persistence failures.

use crate::types::DataKind;
use anyhow::Result;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use std::time::Duration;

/// Main metrics collector for the ladder service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Cache-level metrics
    cache_metrics: CacheMetrics,

    /// Ladder content metrics
    ladder_metrics: LadderMetrics,
}

/// Cache-level metrics
#[derive(Clone)]
pub struct CacheMetrics {
    /// Snapshot reads by kind and hit/miss
    pub cache_requests_total: IntCounterVec,

    /// Remote refills by outcome
    pub remote_loads_total: IntCounterVec,

    /// Callers that waited on another caller's refill
    pub joined_loads_total: IntCounter,

    /// Staleness probes by result
    pub staleness_checks_total: IntCounterVec,

    /// Persistent store failures by operation
    pub persistence_failures_total: IntCounterVec,

    /// Duration of a full refill (fetch + replay + persist)
    pub load_duration_seconds: Histogram,
}

/// Ladder content metrics
#[derive(Clone)]
pub struct LadderMetrics {
    /// Players in the current snapshot
    pub players: IntGauge,

    /// Matches in the current snapshot
    pub matches: IntGauge,

    /// Matches left out of replays, by reason
    pub skipped_matches_total: IntCounterVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let cache_metrics = CacheMetrics::new(&registry)?;
        let ladder_metrics = LadderMetrics::new(&registry)?;

        Ok(Self {
            registry,
            cache_metrics,
            ladder_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get cache metrics
    pub fn cache(&self) -> &CacheMetrics {
        &self.cache_metrics
    }

    /// Get ladder metrics
    pub fn ladder(&self) -> &LadderMetrics {
        &self.ladder_metrics
    }

    /// Record a snapshot read
    pub fn record_cache_request(&self, kind: DataKind, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_metrics
            .cache_requests_total
            .with_label_values(&[kind.as_str(), result])
            .inc();
    }

    /// Record a finished remote refill
    pub fn record_load(&self, success: bool, duration: Duration) {
        let status = if success { "success" } else { "error" };
        self.cache_metrics
            .remote_loads_total
            .with_label_values(&[status])
            .inc();
        self.cache_metrics
            .load_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// Record a caller served by someone else's refill
    pub fn record_joined_load(&self) {
        self.cache_metrics.joined_loads_total.inc();
    }

    /// Record a staleness probe; `None` means the probe itself failed
    pub fn record_staleness_check(&self, stale: Option<bool>) {
        let result = match stale {
            Some(true) => "stale",
            Some(false) => "fresh",
            None => "error",
        };
        self.cache_metrics
            .staleness_checks_total
            .with_label_values(&[result])
            .inc();
    }

    /// Record a persistent store failure
    pub fn record_persistence_failure(&self, operation: &str) {
        self.cache_metrics
            .persistence_failures_total
            .with_label_values(&[operation])
            .inc();
    }

    /// Record a match skipped during replay
    pub fn record_skipped_match(&self, reason: &str) {
        self.ladder_metrics
            .skipped_matches_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Update snapshot size gauges
    pub fn update_snapshot_size(&self, players: usize, matches: usize) {
        self.ladder_metrics.players.set(players as i64);
        self.ladder_metrics.matches.set(matches as i64);
    }

    /// Encode all metrics in the Prometheus text format
    pub fn encode_text(&self) -> Result<String> {
        use prometheus::{Encoder, TextEncoder};

        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl CacheMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let cache_requests_total = IntCounterVec::new(
            Opts::new(
                "doubles_ladder_cache_requests_total",
                "Snapshot reads by kind and result",
            ),
            &["kind", "result"],
        )?;
        registry.register(Box::new(cache_requests_total.clone()))?;

        let remote_loads_total = IntCounterVec::new(
            Opts::new(
                "doubles_ladder_remote_loads_total",
                "Remote refills by outcome",
            ),
            &["status"],
        )?;
        registry.register(Box::new(remote_loads_total.clone()))?;

        let joined_loads_total = IntCounter::new(
            "doubles_ladder_joined_loads_total",
            "Callers served by an in-flight refill",
        )?;
        registry.register(Box::new(joined_loads_total.clone()))?;

        let staleness_checks_total = IntCounterVec::new(
            Opts::new(
                "doubles_ladder_staleness_checks_total",
                "Staleness probes by result",
            ),
            &["result"],
        )?;
        registry.register(Box::new(staleness_checks_total.clone()))?;

        let persistence_failures_total = IntCounterVec::new(
            Opts::new(
                "doubles_ladder_persistence_failures_total",
                "Persistent store failures by operation",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(persistence_failures_total.clone()))?;

        let load_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "doubles_ladder_load_duration_seconds",
                "Full refill duration",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        )?;
        registry.register(Box::new(load_duration_seconds.clone()))?;

        Ok(Self {
            cache_requests_total,
            remote_loads_total,
            joined_loads_total,
            staleness_checks_total,
            persistence_failures_total,
            load_duration_seconds,
        })
    }
}

impl LadderMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let players = IntGauge::new("doubles_ladder_players", "Players in the current snapshot")?;
        registry.register(Box::new(players.clone()))?;

        let matches = IntGauge::new("doubles_ladder_matches", "Matches in the current snapshot")?;
        registry.register(Box::new(matches.clone()))?;

        let skipped_matches_total = IntCounterVec::new(
            Opts::new(
                "doubles_ladder_skipped_matches_total",
                "Matches left out of replays",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(skipped_matches_total.clone()))?;

        Ok(Self {
            players,
            matches,
            skipped_matches_total,
        })
    }
}
