use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Data, Orbit, Request, Response, Rocket};
use std::time::Duration;

use crate::models::AppState;
use crate::services::broadcast::spawn_relay;

/// Paths polled often enough that logging them at info drowns everything else
const CHATTY_PREFIXES: [&str; 2] = ["/status", "/events/"];

fn is_chatty(path: &str) -> bool {
    CHATTY_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Logs incoming requests and outgoing responses.
pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request/Response Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        let method = request.method();
        let uri = request.uri();
        let remote = request
            .remote()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        if is_chatty(uri.path().as_str()) {
            tracing::debug!("Incoming request: {} {} from {}", method, uri, remote);
        } else {
            tracing::info!("Incoming request: {} {} from {}", method, uri, remote);
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let method = request.method();
        let uri = request.uri();
        let status = response.status();

        if !status.class().is_success() {
            tracing::warn!("Error response: {} {} returned {}", method, uri, status);
        } else if is_chatty(uri.path().as_str()) {
            tracing::debug!("Response: {} {} - Status: {}", method, uri, status);
        } else {
            tracing::info!("Response: {} {} - Status: {}", method, uri, status);
        }
    }
}

/// Reports 5xx responses to Sentry.
pub struct ServerErrorReporter;

#[rocket::async_trait]
impl Fairing for ServerErrorReporter {
    fn info(&self) -> Info {
        Info {
            name: "Server Error Reporter",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let status = response.status();
        if !status.class().is_server_error() {
            return;
        }

        let method = request.method();
        let uri = request.uri();
        tracing::error!("{} {} failed with {}", method, uri, status);
        sentry::capture_message(
            &format!("Server error {}: {method} {uri}", status.code),
            sentry::Level::Error,
        );
    }
}

/// Starts the instance-wide background work once the server is up:
/// timer initialization, the tracked wallet sweep, and the pub/sub relay.
pub struct CoordinatorBootstrap;

#[rocket::async_trait]
impl Fairing for CoordinatorBootstrap {
    fn info(&self) -> Info {
        Info {
            name: "Coordinator Bootstrap",
            kind: Kind::Liftoff,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let Some(state) = rocket.state::<AppState>() else {
            tracing::error!("Coordinator bootstrap skipped: application state not managed");
            return;
        };

        tracing::info!(
            "Instance {} coordinating on prefix '{}'",
            state.config.instance_id,
            state.config.key_prefix
        );

        if let Err(e) = state.store.ping().await {
            // Loops keep retrying on their normal cadence
            tracing::error!("Coordination store unreachable at startup: {}", e);
            sentry::capture_message(
                &format!("Coordination store unreachable at startup: {e}"),
                sentry::Level::Error,
            );
        }

        if let Err(e) = state.processor.timer().initialize().await {
            tracing::warn!("{}", e);
        }

        let wallets = state.wallets.clone();
        let max_age = state.config.wallet_max_age;
        let sweep_interval = state.config.wallet_sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            loop {
                ticker.tick().await;
                if let Err(e) = wallets.prune(max_age).await {
                    tracing::warn!("Tracked wallet sweep failed: {}", e);
                }
            }
        });

        if let Some(redis) = state.redis.clone() {
            spawn_relay(
                redis,
                state.config.keys(),
                state.hub.clone(),
                Duration::from_secs(5),
            );
        }
    }
}
