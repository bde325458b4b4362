// src/metrics/collector.rs
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> prometheus::Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // Inbound metrics
    pub connections_total: IntCounter,
    pub active_sessions: IntGauge,

    // Probe metrics
    pub probe_attempts_total: IntCounterVec,
    pub connect_duration_seconds: HistogramVec,

    // Routing metrics
    pub routed_total: IntCounterVec,
    pub dropped_total: IntCounter,
    pub rotations_total: IntCounter,
    pub bytes_relayed_total: IntCounterVec,

    pub backends: IntGauge,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let connections_total = IntCounter::new(
            "failover_connections_total",
            "Total inbound connections accepted",
        )?;
        registry.register(Box::new(connections_total.clone()))?;

        let active_sessions =
            IntGauge::new("failover_active_sessions", "Sessions currently probing or relaying")?;
        registry.register(Box::new(active_sessions.clone()))?;

        let probe_attempts_total = IntCounterVec::new(
            Opts::new(
                "failover_probe_attempts_total",
                "Outward connect attempts made while probing",
            ),
            &["backend", "result"],
        )?;
        registry.register(Box::new(probe_attempts_total.clone()))?;

        let connect_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "failover_connect_duration_seconds",
                "Outward connect attempt duration in seconds",
            ),
            &["backend"],
        )?;
        registry.register(Box::new(connect_duration_seconds.clone()))?;

        let routed_total = IntCounterVec::new(
            Opts::new("failover_routed_total", "Sessions routed to a backend"),
            &["backend"],
        )?;
        registry.register(Box::new(routed_total.clone()))?;

        let dropped_total = IntCounter::new(
            "failover_dropped_total",
            "Sessions dropped because every backend was unreachable",
        )?;
        registry.register(Box::new(dropped_total.clone()))?;

        let rotations_total = IntCounter::new(
            "failover_rotations_total",
            "Backend list rotations committed",
        )?;
        registry.register(Box::new(rotations_total.clone()))?;

        let bytes_relayed_total = IntCounterVec::new(
            Opts::new("failover_bytes_relayed_total", "Bytes relayed between peers"),
            &["direction"],
        )?;
        registry.register(Box::new(bytes_relayed_total.clone()))?;

        let backends = IntGauge::new("failover_backends", "Number of configured backends")?;
        registry.register(Box::new(backends.clone()))?;

        Ok(Self {
            connections_total,
            active_sessions,
            probe_attempts_total,
            connect_duration_seconds,
            routed_total,
            dropped_total,
            rotations_total,
            bytes_relayed_total,
            backends,
        })
    }

    pub fn record_attempt(&self, backend: &str, success: bool, duration: Duration) {
        let result = if success { "success" } else { "failure" };
        self.probe_attempts_total
            .with_label_values(&[backend, result])
            .inc();

        self.connect_duration_seconds
            .with_label_values(&[backend])
            .observe(duration.as_secs_f64());
    }

    pub fn record_routed(&self, backend: &str, rotated: bool) {
        self.routed_total.with_label_values(&[backend]).inc();
        if rotated {
            self.record_rotation();
        }
    }

    pub fn record_rotation(&self) {
        self.rotations_total.inc();
    }

    pub fn record_dropped(&self) {
        self.dropped_total.inc();
    }

    pub fn record_relayed(&self, to_backend: u64, from_backend: u64) {
        self.bytes_relayed_total
            .with_label_values(&["to_backend"])
            .inc_by(to_backend);
        self.bytes_relayed_total
            .with_label_values(&["from_backend"])
            .inc_by(from_backend);
    }

    pub fn session_opened(&self) {
        self.connections_total.inc();
        self.active_sessions.inc();
    }

    pub fn session_closed(&self) {
        self.active_sessions.dec();
    }

    pub fn set_backend_count(&self, total: usize) {
        self.backends.set(total as i64);
    }
}
