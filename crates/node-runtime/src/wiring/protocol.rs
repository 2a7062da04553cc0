//! # Protocol Routing
//!
//! Binds every inbound message kind to the component that answers it.
//! Direct-channel kinds go to the lifecycle manager, routing kinds to the
//! virtual router. Kinds without a handler are dropped by the bridge.

use sc_03_app_lifecycle::AppLifecycleManager;
use sc_04_virtual_router::VirtualRouter;
use sc_05_peer_messaging::{MessageKind, MessagingBridge};
use std::sync::Arc;
use tracing::debug;

pub fn register_protocol_handlers(
    bridge: &MessagingBridge,
    lifecycle: &Arc<AppLifecycleManager>,
    router: &Arc<VirtualRouter>,
) {
    for kind in MessageKind::DIRECT {
        bridge.register_handler(kind, lifecycle.clone());
    }
    for kind in MessageKind::VIRTUAL {
        bridge.register_handler(kind, router.clone());
    }
    debug!(
        direct = MessageKind::DIRECT.len(),
        routed = MessageKind::VIRTUAL.len(),
        "[sc-node] Protocol handlers registered"
    );
}
