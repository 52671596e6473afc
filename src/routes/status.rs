use rocket::serde::json::Json;
use rocket::{State, get, http::Status};
use rocket_okapi::openapi;

use super::error_response;
use crate::models::{ApiResponse, AppState, StatusSnapshot, TransferRequest};

/// Current timer, queue, balances and processing state.
///
/// Always answers; a failing store or engine shows up as a degraded status.
#[openapi(tag = "Status")]
#[get("/status")]
pub async fn status(state: &State<AppState>) -> Json<ApiResponse<StatusSnapshot>> {
    let snapshot = state.processor.snapshots().build().await;
    let message = if snapshot.status.is_healthy() {
        "Status retrieved".to_string()
    } else {
        "Status retrieved with degraded dependencies".to_string()
    };

    Json(ApiResponse {
        success: true,
        data: Some(snapshot),
        message,
    })
}

/// Transfers waiting for the next batch, oldest first.
#[openapi(tag = "Status")]
#[get("/queue")]
pub async fn queue(
    state: &State<AppState>,
) -> Result<Json<ApiResponse<Vec<TransferRequest>>>, (Status, Json<ApiResponse<Vec<TransferRequest>>>)>
{
    match state.engine.queue().await {
        Ok(queue) => Ok(Json(ApiResponse {
            success: true,
            message: format!("{} transfers queued", queue.len()),
            data: Some(queue),
        })),
        Err(e) => {
            tracing::error!("Failed to read queue: {}", e);
            Err(error_response(
                Status::BadGateway,
                format!("Failed to read queue: {e}"),
            ))
        }
    }
}
