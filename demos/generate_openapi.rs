/// Prints the OpenAPI document without starting the server
///
/// Usage: cargo run --example generate_openapi > openapi.json
use rocket_okapi::{openapi_get_routes_spec, settings::OpenApiSettings};

use subnet_batcher::routes;

fn main() {
    let openapi_settings = OpenApiSettings::new();

    // The SSE stream is not an OpenAPI route and is left out
    let (_routes, openapi_spec) = openapi_get_routes_spec![
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
    ];

    let json = serde_json::to_string_pretty(&openapi_spec)
        .expect("Failed to serialize OpenAPI document");

    println!("{json}");
}
