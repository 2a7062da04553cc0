//! # Subsystem Container
//!
//! Builds and holds the channel subsystems of one node.
//!
//! ## Initialization Order
//!
//! ```text
//! Level 0: event bus, app registry (no dependencies)
//! Level 1: [1] channel store, [2] free-balance reconciler, [5] bridge
//! Level 2: [3] lifecycle manager (context over level 0-1)
//! Level 3: [4] virtual router (wraps the lifecycle manager)
//! Level 4: [6] method dispatcher (fronts 3 and 4)
//! ```
//!
//! Nothing here is process-wide: two containers in one process share only
//! the collaborators they were handed.

use std::sync::Arc;

use sc_01_channel_store::{ChannelStore, StoreService};
use sc_02_free_balance::{BlockchainClient, FreeBalanceReconciler};
use sc_03_app_lifecycle::{AppLifecycleManager, AppRegistry, ChannelContext, CommitmentSigner};
use sc_04_virtual_router::VirtualRouter;
use sc_05_peer_messaging::{MessagingBridge, MessagingService};
use sc_06_method_dispatcher::MethodDispatcher;
use shared_bus::InMemoryEventBus;
use tracing::info;

use crate::adapters::{PrometheusCallObserver, PrometheusMessageObserver};
use crate::apps::register_reference_apps;
use crate::container::config::NodeConfig;
use crate::wiring::{register_metric_listeners, register_protocol_handlers};

/// External collaborators a node is built over.
#[derive(Clone)]
pub struct Collaborators {
    /// Key-value persistence for the signing seed and channel snapshots.
    pub store: Arc<dyn StoreService>,
    /// Chain reads, multisig deployment and funding.
    pub chain: Arc<dyn BlockchainClient>,
    /// Peer transport.
    pub transport: Arc<dyn MessagingService>,
}

/// All channel subsystems of one node, wired together.
pub struct ChannelSubsystems {
    /// Channel State Store (Subsystem 1)
    pub store: Arc<ChannelStore>,

    /// Free-Balance Reconciler (Subsystem 2)
    pub reconciler: Arc<FreeBalanceReconciler>,

    /// App-Instance Lifecycle Manager (Subsystem 3)
    pub lifecycle: Arc<AppLifecycleManager>,

    /// Virtual-Channel Router (Subsystem 4)
    pub router: Arc<VirtualRouter>,

    /// Peer Messaging Bridge (Subsystem 5)
    pub bridge: Arc<MessagingBridge>,

    /// Method Dispatcher (Subsystem 6)
    pub dispatcher: Arc<MethodDispatcher>,

    /// App definitions this node can run.
    pub registry: Arc<AppRegistry>,

    /// This node's event bus.
    pub event_bus: Arc<InMemoryEventBus>,
}

impl ChannelSubsystems {
    /// Build every subsystem for the identity behind `signer`. The bridge
    /// is not started.
    pub fn new(
        config: &NodeConfig,
        signer: Arc<dyn CommitmentSigner>,
        collaborators: &Collaborators,
    ) -> Self {
        let me = signer.identity();
        info!(peer = %me, "[sc-node] Initializing channel subsystems");

        // Level 0
        let event_bus = Arc::new(InMemoryEventBus::new());
        let registry = Arc::new(AppRegistry::new());
        register_reference_apps(&registry);
        register_metric_listeners(&event_bus);

        // Level 1
        let store = Arc::new(ChannelStore::new(
            collaborators.store.clone(),
            config.store_key_prefix.clone(),
        ));
        let reconciler = Arc::new(FreeBalanceReconciler::new(collaborators.chain.clone()));
        let bridge = Arc::new(
            MessagingBridge::new(
                me.clone(),
                collaborators.transport.clone(),
                config.dedup_window_secs,
            )
            .with_observer(Arc::new(PrometheusMessageObserver)),
        );

        // Level 2
        let ctx = ChannelContext {
            me,
            store: store.clone(),
            reconciler: reconciler.clone(),
            chain: collaborators.chain.clone(),
            bridge: bridge.clone(),
            registry: registry.clone(),
            signer,
            events: event_bus.clone(),
        };
        let lifecycle = Arc::new(AppLifecycleManager::new(ctx));

        // Level 3
        let router = Arc::new(VirtualRouter::new(lifecycle.clone()));
        register_protocol_handlers(&bridge, &lifecycle, &router);

        // Level 4
        let dispatcher = Arc::new(
            MethodDispatcher::new(lifecycle.clone(), router.clone(), event_bus.clone())
                .with_observer(Arc::new(PrometheusCallObserver)),
        );

        Self {
            store,
            reconciler,
            lifecycle,
            router,
            bridge,
            dispatcher,
            registry,
            event_bus,
        }
    }
}
