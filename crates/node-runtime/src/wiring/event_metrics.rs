//! # Event Metrics
//!
//! Bus listeners turning node events into Prometheus counters.

use channel_telemetry::{
    metric_inc, APPS_INSTALLED, APPS_UNINSTALLED, CHANNELS_CREATED, CONSISTENCY_FAULTS,
};
use shared_bus::{EventTopic, InMemoryEventBus, Listener, ListenerError, ListenerId, NodeEvent};
use std::sync::Arc;

fn record(event: &NodeEvent) -> Result<(), ListenerError> {
    match event {
        NodeEvent::CreateChannel(_) => metric_inc!(CHANNELS_CREATED),
        NodeEvent::Install(_) => metric_inc!(APPS_INSTALLED, &["direct"]),
        NodeEvent::InstallVirtual(_) => metric_inc!(APPS_INSTALLED, &["virtual"]),
        NodeEvent::Uninstall(_) => metric_inc!(APPS_UNINSTALLED, &["direct"]),
        NodeEvent::UninstallVirtual(_) => metric_inc!(APPS_UNINSTALLED, &["virtual"]),
        NodeEvent::ProtocolFault { .. } => metric_inc!(CONSISTENCY_FAULTS),
        _ => {}
    }
    Ok(())
}

/// Register the metric listener on every topic it counts.
pub fn register_metric_listeners(events: &InMemoryEventBus) -> Vec<ListenerId> {
    let listener: Listener = Arc::new(record);
    [
        EventTopic::CreateChannel,
        EventTopic::Install,
        EventTopic::InstallVirtual,
        EventTopic::Uninstall,
        EventTopic::UninstallVirtual,
        EventTopic::ProtocolFault,
    ]
    .into_iter()
    .map(|topic| events.on(topic, listener.clone()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_bus::EventPublisher;
    use shared_types::Address;

    #[tokio::test]
    async fn test_fault_event_counted() {
        let events = InMemoryEventBus::new();
        let ids = register_metric_listeners(&events);
        assert_eq!(ids.len(), 6);

        let before = CONSISTENCY_FAULTS.get();
        let delivered = events
            .publish(NodeEvent::ProtocolFault {
                multisig_address: Address::zero(),
                reason: "diverged".to_string(),
            })
            .await;
        assert_eq!(delivered, 1);
        assert!(CONSISTENCY_FAULTS.get() - before >= 1.0);
    }
}
