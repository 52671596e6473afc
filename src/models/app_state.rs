use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::coordinator::CoordinatorConfig;
use crate::services::batch::BatchProcessor;
use crate::services::broadcast::{BroadcastAdapter, Broadcaster, LocalBroadcaster};
use crate::services::coordinator::InstanceCoordinator;
use crate::services::engine::ProcessingEngine;
use crate::services::store::SharedStore;
use crate::services::wallets::TrackedWallets;

/// API endpoint information for documentation
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EndpointInfo {
    pub method: String,
    pub path: String,
    pub description: String,
    pub requires_auth: bool,
    pub status: EndpointStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub enum EndpointStatus {
    Working,
    NotImplemented,
    Deprecated,
}

/// Central registry of all API endpoints
pub struct ApiEndpoints;

impl ApiEndpoints {
    pub fn get_all() -> Vec<EndpointInfo> {
        let endpoint = |method: &str, path: &str, description: &str, requires_auth: bool| {
            EndpointInfo {
                method: method.to_string(),
                path: path.to_string(),
                description: description.to_string(),
                requires_auth,
                status: EndpointStatus::Working,
            }
        };

        vec![
            endpoint("GET", "/", "Welcome page with API documentation", false),
            endpoint(
                "GET",
                "/status",
                "Current timer, queue, balances and processing state",
                false,
            ),
            endpoint("GET", "/queue", "Transfers waiting for the next batch", false),
            endpoint("POST", "/transactions", "Queue a signed transfer", false),
            endpoint("GET", "/wallets", "List tracked wallets", false),
            endpoint("POST", "/wallets", "Start tracking a wallet", false),
            endpoint(
                "GET",
                "/events/<channel>",
                "Server-sent event stream of timer, queue and batch updates (configured channel only)",
                false,
            ),
            endpoint(
                "POST",
                "/admin/trigger_batch",
                "Run a batch attempt immediately",
                true,
            ),
            endpoint(
                "POST",
                "/admin/clear_queue",
                "Drop every pending transfer and restart the timer",
                true,
            ),
            endpoint(
                "POST",
                "/admin/settle",
                "Settle now, optionally clearing a stuck processing flag and batch lock first",
                true,
            ),
        ]
    }

    pub fn get_summary() -> ApiSummary {
        let endpoints = Self::get_all();
        let total = endpoints.len();
        let working = endpoints
            .iter()
            .filter(|e| matches!(e.status, EndpointStatus::Working))
            .count();
        let not_implemented = endpoints
            .iter()
            .filter(|e| matches!(e.status, EndpointStatus::NotImplemented))
            .count();
        let deprecated = endpoints
            .iter()
            .filter(|e| matches!(e.status, EndpointStatus::Deprecated))
            .count();

        ApiSummary {
            total_endpoints: total,
            working_endpoints: working,
            not_implemented,
            deprecated,
            endpoints,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApiSummary {
    pub total_endpoints: usize,
    pub working_endpoints: usize,
    pub not_implemented: usize,
    pub deprecated: usize,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: CoordinatorConfig,
    pub store: Arc<dyn SharedStore>,
    pub engine: Arc<dyn ProcessingEngine>,
    // SSE clients on this instance subscribe here
    pub hub: Arc<LocalBroadcaster>,
    pub broadcaster: BroadcastAdapter,
    pub wallets: TrackedWallets,
    pub processor: BatchProcessor,
    pub coordinator: InstanceCoordinator,
    // Set when events fan out through Redis pub/sub
    pub redis: Option<redis::Client>,
    // Authentication
    pub access_token: String,
}

impl AppState {
    /// Wire every component from its dependencies.
    ///
    /// `publisher` decides where events go: the local hub directly, or Redis
    /// pub/sub with a relay back into the hub.
    pub fn new(
        config: CoordinatorConfig,
        store: Arc<dyn SharedStore>,
        engine: Arc<dyn ProcessingEngine>,
        hub: Arc<LocalBroadcaster>,
        publisher: Arc<dyn Broadcaster>,
        redis: Option<redis::Client>,
        access_token: String,
    ) -> Self {
        let broadcaster = BroadcastAdapter::new(publisher);
        let wallets = TrackedWallets::new(store.clone(), config.keys());
        let processor =
            BatchProcessor::new(&config, store.clone(), engine.clone(), broadcaster.clone());
        let coordinator = InstanceCoordinator::new(&config, processor.clone(), broadcaster.clone());

        Self {
            config,
            store,
            engine,
            hub,
            broadcaster,
            wallets,
            processor,
            coordinator,
            redis,
            access_token,
        }
    }

    /// Single-instance wiring: events go straight to the local hub
    pub fn local(
        config: CoordinatorConfig,
        store: Arc<dyn SharedStore>,
        engine: Arc<dyn ProcessingEngine>,
        access_token: String,
    ) -> Self {
        let hub = Arc::new(LocalBroadcaster::default());
        Self::new(config, store, engine, hub.clone(), hub, None, access_token)
    }

    /// Channel used by the HTTP routes when publishing
    pub fn channel(&self) -> &str {
        &self.config.broadcast_channel
    }
}
