//! # Dispatcher Service
//!
//! Sole caller-facing entry point. Every request gets exactly one response
//! carrying its request id; delegate failures come back as structured
//! errors, never as panics or dropped requests.

use crate::ports::{CallObserver, NoopCallObserver};
use sc_03_app_lifecycle::AppLifecycleApi;
use sc_04_virtual_router::VirtualRoutingApi;
use shared_bus::{
    EventFilter, EventPublisher, EventTopic, InMemoryEventBus, Listener, ListenerId, NodeEvent,
    Subscription,
};
use shared_types::{
    ApiError, ErrorCode, MethodName, MethodParams, MethodRequest, MethodResponse, MethodResult,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct MethodDispatcher {
    lifecycle: Arc<dyn AppLifecycleApi>,
    router: Arc<dyn VirtualRoutingApi>,
    events: Arc<InMemoryEventBus>,
    observer: Arc<dyn CallObserver>,
}

impl MethodDispatcher {
    pub fn new(
        lifecycle: Arc<dyn AppLifecycleApi>,
        router: Arc<dyn VirtualRoutingApi>,
        events: Arc<InMemoryEventBus>,
    ) -> Self {
        Self {
            lifecycle,
            router,
            events,
            observer: Arc::new(NoopCallObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Answer `request` as method `method`.
    ///
    /// A `method` that does not match the request's parameters is answered
    /// with `INVALID_PARAMS` without touching any state.
    pub async fn call(&self, method: MethodName, request: MethodRequest) -> MethodResponse {
        let started = Instant::now();
        let request_id = request.request_id;

        let outcome = if request.method() != method {
            Err(ApiError::new(
                ErrorCode::InvalidParams,
                format!("{method} called with {} parameters", request.method()),
            ))
        } else {
            self.route(request.params.clone()).await
        };

        let elapsed = started.elapsed();
        self.observer.on_call(
            method,
            outcome.as_ref().map(|_| ()).map_err(|e| e.code),
            elapsed,
        );
        match outcome {
            Ok(result) => {
                debug!(method = %method, request_id = %request_id, elapsed_ms = elapsed.as_millis() as u64, "[sc-06] Call completed");
                MethodResponse::ok(&request, result)
            }
            Err(error) => {
                warn!(method = %method, request_id = %request_id, code = %error.code, error = %error.message, "[sc-06] Call failed");
                MethodResponse::err(request_id, method, error)
            }
        }
    }

    /// [`call`](Self::call) with the method taken from the request itself.
    pub async fn execute(&self, request: MethodRequest) -> MethodResponse {
        let method = request.method();
        self.call(method, request).await
    }

    async fn route(&self, params: MethodParams) -> Result<MethodResult, ApiError> {
        let lifecycle = &self.lifecycle;
        let router = &self.router;
        let result = match params {
            MethodParams::CreateChannel(p) => {
                MethodResult::CreateChannel(lifecycle.create_channel(p).await?)
            }
            MethodParams::Deposit(p) => MethodResult::Deposit(lifecycle.deposit(p).await?),
            MethodParams::ProposeInstall(p) => {
                MethodResult::ProposeInstall(lifecycle.propose_install(p).await?)
            }
            MethodParams::ProposeInstallVirtual(p) => {
                MethodResult::ProposeInstall(router.propose_install_virtual(p).await?)
            }
            MethodParams::RejectInstall(p) => {
                MethodResult::RejectInstall(lifecycle.reject_install(p).await?)
            }
            MethodParams::Install(p) => MethodResult::Install(lifecycle.install(p).await?),
            MethodParams::InstallVirtual(p) => {
                MethodResult::Install(router.install_virtual(p).await?)
            }
            MethodParams::GetAppInstanceDetails(p) => MethodResult::AppInstanceDetails(
                lifecycle.app_instance_details(&p.app_instance_id)?,
            ),
            MethodParams::GetAppInstances => MethodResult::AppInstances(lifecycle.app_instances()),
            MethodParams::GetProposedAppInstances => {
                MethodResult::ProposedAppInstances(lifecycle.proposed_app_instances())
            }
            MethodParams::GetState(p) => {
                MethodResult::State(lifecycle.app_state(&p.app_instance_id)?)
            }
            MethodParams::TakeAction(p) => MethodResult::TakeAction(lifecycle.take_action(p).await?),
            MethodParams::UpdateState(p) => {
                MethodResult::UpdateState(lifecycle.update_state(p).await?)
            }
            MethodParams::Uninstall(p) => MethodResult::Uninstall(lifecycle.uninstall(p).await?),
            MethodParams::UninstallVirtual(p) => {
                MethodResult::Uninstall(router.uninstall_virtual(p).await?)
            }
            MethodParams::GetFreeBalance(p) => {
                MethodResult::FreeBalance(lifecycle.free_balance(&p.multisig_address)?)
            }
            MethodParams::GetStateChannel(p) => {
                MethodResult::StateChannel(lifecycle.state_channel(&p.multisig_address)?)
            }
            MethodParams::GetChannelAddresses => {
                MethodResult::ChannelAddresses(lifecycle.channel_addresses())
            }
        };
        Ok(result)
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Register a listener. Listeners run in registration order.
    pub fn on(&self, topic: EventTopic, listener: Listener) -> ListenerId {
        self.events.on(topic, listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    /// Publish an event to this node's listeners and subscriptions.
    pub async fn emit(&self, event: NodeEvent) -> usize {
        self.events.publish(event).await
    }

    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.events.subscribe(filter)
    }

    /// Fire-and-forget call. The response is published as a
    /// `MethodCompleted` event on the request's method topic.
    pub fn emit_request(self: &Arc<Self>, request: MethodRequest) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let response = dispatcher.execute(request).await;
            dispatcher
                .events
                .publish(NodeEvent::MethodCompleted(response))
                .await;
        })
    }
}
