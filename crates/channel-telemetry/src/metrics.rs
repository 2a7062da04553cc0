//! Prometheus metrics for the state channel node.
//!
//! All metrics follow the naming convention: `sc_<area>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Registry all node metrics are registered with
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // METHOD DISPATCHER (Subsystem 6)
    // =========================================================================

    /// Calls by method and outcome (`ok` or an error code)
    pub static ref METHOD_CALLS: CounterVec = CounterVec::new(
        Opts::new("sc_method_calls_total", "Method calls by method and outcome"),
        &["method", "outcome"]
    ).expect("metric creation failed");

    /// Call latency by method
    pub static ref METHOD_LATENCY: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "sc_method_duration_seconds",
            "Time from call to response"
        ).buckets(exponential_buckets(0.0001, 2.0, 16).expect("valid buckets")),
        &["method"]
    ).expect("metric creation failed");

    // =========================================================================
    // PEER MESSAGING (Subsystem 5)
    // =========================================================================

    /// Protocol messages by kind and direction (inbound/outbound)
    pub static ref PROTOCOL_MESSAGES: CounterVec = CounterVec::new(
        Opts::new("sc_protocol_messages_total", "Protocol messages by kind and direction"),
        &["kind", "direction"]
    ).expect("metric creation failed");

    // =========================================================================
    // CHANNELS AND APPS (Subsystems 3, 4)
    // =========================================================================

    /// Channels created, locally or by a counterparty
    pub static ref CHANNELS_CREATED: Counter = Counter::new(
        "sc_channels_created_total",
        "Total state channels created"
    ).expect("metric creation failed");

    /// App instances installed, by kind (direct/virtual)
    pub static ref APPS_INSTALLED: CounterVec = CounterVec::new(
        Opts::new("sc_apps_installed_total", "App instances installed"),
        &["kind"]
    ).expect("metric creation failed");

    /// App instances uninstalled, by kind (direct/virtual)
    pub static ref APPS_UNINSTALLED: CounterVec = CounterVec::new(
        Opts::new("sc_apps_uninstalled_total", "App instances uninstalled"),
        &["kind"]
    ).expect("metric creation failed");

    /// Channels faulted after their replicas diverged (for alerting)
    pub static ref CONSISTENCY_FAULTS: Counter = Counter::new(
        "sc_consistency_faults_total",
        "Channels faulted after a consistency violation"
    ).expect("metric creation failed");
}

/// Register every metric with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Dispatcher
        Box::new(METHOD_CALLS.clone()),
        Box::new(METHOD_LATENCY.clone()),
        // Messaging
        Box::new(PROTOCOL_MESSAGES.clone()),
        // Channels and apps
        Box::new(CHANNELS_CREATED.clone()),
        Box::new(APPS_INSTALLED.clone()),
        Box::new(APPS_UNINSTALLED.clone()),
        Box::new(CONSISTENCY_FAULTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_twice() {
        register_metrics().unwrap();
        register_metrics().unwrap();
    }

    #[test]
    fn test_counter_increment() {
        METHOD_CALLS.with_label_values(&["TAKE_ACTION", "ok"]).inc();
        assert!(METHOD_CALLS.with_label_values(&["TAKE_ACTION", "ok"]).get() >= 1.0);
    }

    #[test]
    fn test_encode_contains_registered_metrics() {
        register_metrics().unwrap();
        CONSISTENCY_FAULTS.inc();
        let text = encode_metrics().unwrap();
        assert!(text.contains("sc_consistency_faults_total"));
    }
}
