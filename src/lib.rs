use rocket::{Build, Rocket};
use rocket_okapi::{openapi_get_routes, settings::OpenApiSettings};
use std::env;
use std::sync::Arc;

pub mod fairings;
pub mod guards;
pub mod models;
pub mod routes;
pub mod services;

use crate::models::{AppState, CoordinatorConfig};
use crate::services::broadcast::{Broadcaster, LocalBroadcaster, RedisBroadcaster};
use crate::services::engine::{HttpEngine, ProcessingEngine};
use crate::services::store::{MemoryStore, RedisStore, SharedStore};

/// Build the application state from environment configuration
pub fn build_state() -> Result<AppState, String> {
    let config = CoordinatorConfig::from_env()?;

    let access_token = env::var("SUBNET_ACCESS_TOKEN")
        .map_err(|_| "SUBNET_ACCESS_TOKEN environment variable not set".to_string())?;

    let engine: Arc<dyn ProcessingEngine> = Arc::new(HttpEngine::new(
        &config.engine_url,
        config.engine_timeout,
        config.batch_lock_ttl,
    )?);

    tracing::info!("Coordinator configuration:");
    tracing::info!("  - Instance: {}", config.instance_id);
    tracing::info!("  - Engine: {}", config.engine_url);
    tracing::info!("  - Batch timer: {}s", config.batch_timer_seconds);
    tracing::info!(
        "  - Max queue length: {} / max batch size: {}",
        config.max_queue_length,
        config.max_batch_size
    );

    let hub = Arc::new(LocalBroadcaster::default());

    match config.redis_url.clone() {
        Some(url) => {
            let store = RedisStore::open(&url)?;
            let redis = store.redis_client().clone();
            let publisher: Arc<dyn Broadcaster> =
                Arc::new(RedisBroadcaster::new(redis.clone(), config.keys()));
            tracing::info!("  - Store: Redis (multi-instance)");

            Ok(AppState::new(
                config,
                Arc::new(store),
                engine,
                hub,
                publisher,
                Some(redis),
                access_token,
            ))
        }
        None => {
            tracing::warn!("  - Store: in-memory (REDIS_URL not set, single instance only)");
            let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
            Ok(AppState::new(
                config,
                store,
                engine,
                hub.clone(),
                hub,
                None,
                access_token,
            ))
        }
    }
}

/// Mount routes and fairings around an already-built state
pub fn rocket_with_state(app_state: AppState) -> Rocket<Build> {
    let openapi_settings = OpenApiSettings::new();

    rocket::build()
        .manage(app_state)
        .attach(fairings::RequestLogger)
        .attach(fairings::ServerErrorReporter)
        .attach(fairings::CoordinatorBootstrap)
        .mount(
            "/",
            openapi_get_routes![
                openapi_settings:
                routes::info::index,
                routes::status::status,
                routes::status::queue,
                routes::transactions::submit_transaction,
                routes::wallets::track_wallet,
                routes::wallets::list_wallets,
                routes::admin::trigger_batch,
                routes::admin::clear_queue,
                routes::admin::settle,
            ],
        )
        .mount("/", rocket::routes![routes::events::events])
}

pub async fn create_rocket() -> Rocket<Build> {
    dotenvy::dotenv().ok();

    let app_state = build_state().expect("Invalid coordinator configuration");
    rocket_with_state(app_state)
}
