use rocket::get;
use rocket::serde::json::Json;
use rocket_okapi::openapi;

use crate::models::{ApiEndpoints, ApiResponse, ApiSummary};

/// Lists every endpoint this server exposes.
#[openapi(tag = "Info")]
#[get("/")]
pub fn index() -> Json<ApiResponse<ApiSummary>> {
    tracing::info!("Received request: GET /");

    let api_summary = ApiEndpoints::get_summary();
    let message = format!(
        "Subnet batch coordinator: {} endpoints available ({} require a token)",
        api_summary.total_endpoints,
        api_summary
            .endpoints
            .iter()
            .filter(|e| e.requires_auth)
            .count()
    );

    Json(ApiResponse {
        success: true,
        data: Some(api_summary),
        message,
    })
}
