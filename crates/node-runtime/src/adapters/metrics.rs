//! # Metrics Adapters
//!
//! Prometheus implementations of the observer ports exposed by the
//! messaging bridge and the method dispatcher.

use channel_telemetry::{METHOD_CALLS, METHOD_LATENCY, PROTOCOL_MESSAGES};
use sc_05_peer_messaging::{Direction, MessageKind, MessageObserver};
use sc_06_method_dispatcher::CallObserver;
use shared_types::{ErrorCode, MethodName};
use std::time::Duration;

/// Counts protocol messages by kind and direction.
pub struct PrometheusMessageObserver;

impl MessageObserver for PrometheusMessageObserver {
    fn on_message(&self, kind: MessageKind, direction: Direction) {
        PROTOCOL_MESSAGES
            .with_label_values(&[kind.as_str(), direction.as_str()])
            .inc();
    }
}

/// Counts method calls by outcome and records their latency.
pub struct PrometheusCallObserver;

impl CallObserver for PrometheusCallObserver {
    fn on_call(&self, method: MethodName, outcome: Result<(), ErrorCode>, elapsed: Duration) {
        let outcome = match outcome {
            Ok(()) => "ok",
            Err(code) => code.as_str(),
        };
        METHOD_CALLS
            .with_label_values(&[method.as_str(), outcome])
            .inc();
        METHOD_LATENCY
            .with_label_values(&[method.as_str()])
            .observe(elapsed.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_observer_labels_by_code() {
        let before = METHOD_CALLS
            .with_label_values(&["TAKE_ACTION", "NO_APP_INSTANCE_FOR_TAKE_ACTION"])
            .get();
        PrometheusCallObserver.on_call(
            MethodName::TakeAction,
            Err(ErrorCode::NoAppInstanceForTakeAction),
            Duration::from_millis(1),
        );
        let after = METHOD_CALLS
            .with_label_values(&["TAKE_ACTION", "NO_APP_INSTANCE_FOR_TAKE_ACTION"])
            .get();
        assert_eq!(after - before, 1.0);
    }

    #[test]
    fn test_message_observer_counts() {
        let counter = PROTOCOL_MESSAGES.with_label_values(&["relay_update", "inbound"]);
        let before = counter.get();
        PrometheusMessageObserver.on_message(MessageKind::RelayUpdate, Direction::Inbound);
        assert_eq!(counter.get() - before, 1.0);
    }
}
