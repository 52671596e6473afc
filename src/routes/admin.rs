use rocket::serde::json::Json;
use rocket::{State, http::Status, post};
use rocket_okapi::openapi;

use super::error_response;
use crate::guards::ApiToken;
use crate::models::{
    ApiResponse, AppState, BatchOutcomeKind, BatchOutcomeResponse, ClearQueueResponse, EventKind,
    SettleRequest, SettleResponse, TriggerReason,
};

fn outcome_message(response: &BatchOutcomeResponse) -> String {
    match response.outcome {
        BatchOutcomeKind::Processed if response.settled() => "Batch settled".to_string(),
        BatchOutcomeKind::Processed => "Batch attempted but failed".to_string(),
        BatchOutcomeKind::Rejected => format!(
            "Batch not started: {}",
            response.reason.as_deref().unwrap_or("rejected")
        ),
        BatchOutcomeKind::NothingToDo => "Nothing to settle".to_string(),
        BatchOutcomeKind::TimerReset => "Queue empty, timer reset".to_string(),
    }
}

/// Run a batch attempt right now, with the same guarantees as the timer.
#[openapi(tag = "Admin")]
#[post("/admin/trigger_batch")]
pub async fn trigger_batch(
    _token: ApiToken,
    state: &State<AppState>,
) -> Json<ApiResponse<BatchOutcomeResponse>> {
    tracing::info!("Received request: POST /admin/trigger_batch");

    let response =
        BatchOutcomeResponse::from(state.processor.process(TriggerReason::Manual).await);

    Json(ApiResponse {
        success: response.settled(),
        message: outcome_message(&response),
        data: Some(response),
    })
}

/// Drop every pending transfer and restart the countdown.
#[openapi(tag = "Admin")]
#[post("/admin/clear_queue")]
pub async fn clear_queue(
    _token: ApiToken,
    state: &State<AppState>,
) -> Result<Json<ApiResponse<ClearQueueResponse>>, (Status, Json<ApiResponse<ClearQueueResponse>>)>
{
    tracing::info!("Received request: POST /admin/clear_queue");

    let cleared = match state.engine.clear_queue().await {
        Ok(cleared) => cleared,
        Err(e) => {
            tracing::error!("Failed to clear queue: {}", e);
            return Err(error_response(
                Status::BadGateway,
                format!("Failed to clear queue: {e}"),
            ));
        }
    };

    if let Err(e) = state.processor.timer().reset().await {
        tracing::warn!("Queue cleared but timer reset failed: {}", e);
    }
    tracing::info!("Cleared {} queued transfers", cleared);

    let snapshot = state.processor.snapshots().build().await;
    state
        .broadcaster
        .publish(state.channel(), EventKind::Status, &snapshot)
        .await;

    Ok(Json(ApiResponse {
        success: true,
        message: format!("Cleared {cleared} queued transfers"),
        data: Some(ClearQueueResponse {
            cleared,
            timer: snapshot.timer,
        }),
    }))
}

/// Settle the queue now.
///
/// With `force_unlock`, clears the processing flag and batch lock first.
/// Only use that when the instance that set them is known to be gone.
#[openapi(tag = "Admin")]
#[post("/admin/settle", format = "json", data = "<request>")]
pub async fn settle(
    _token: ApiToken,
    state: &State<AppState>,
    request: Json<SettleRequest>,
) -> Json<ApiResponse<SettleResponse>> {
    tracing::info!(
        "Received request: POST /admin/settle (force_unlock: {})",
        request.force_unlock
    );

    if request.force_unlock {
        tracing::warn!("Forcing batch unlock before settling");
        if !state.processor.cleanup().await {
            tracing::warn!("Forced unlock could not reach the store");
        }
    }

    let batch =
        BatchOutcomeResponse::from(state.processor.process(TriggerReason::Manual).await);

    Json(ApiResponse {
        success: batch.settled(),
        message: outcome_message(&batch),
        data: Some(SettleResponse {
            forced_unlock: request.force_unlock,
            batch,
        }),
    })
}
