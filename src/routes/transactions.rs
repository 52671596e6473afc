use rocket::serde::json::Json;
use rocket::{State, http::Status, post};
use rocket_okapi::openapi;

use super::error_response;
use crate::models::events::now_millis;
use crate::models::{
    ApiResponse, AppState, EnqueueResponse, EventKind, TransactionAdded, TransferRequest,
};

/// Queue a signed transfer for the next batch.
///
/// Tracks both wallets, publishes `transaction-added`, then evaluates the
/// batch triggers in the background (a full queue settles right away).
#[openapi(tag = "Transactions")]
#[post("/transactions", format = "json", data = "<request>")]
pub async fn submit_transaction(
    state: &State<AppState>,
    request: Json<TransferRequest>,
) -> Result<Json<ApiResponse<EnqueueResponse>>, (Status, Json<ApiResponse<EnqueueResponse>>)> {
    tracing::info!("Received request: POST /transactions");
    let transfer = request.into_inner();

    if let Err(e) = transfer.validate() {
        return Err(error_response(Status::BadRequest, e));
    }

    let queue_length = match state.engine.enqueue(transfer.clone()).await {
        Ok(len) => len,
        Err(e) => {
            tracing::error!("Failed to enqueue transfer from {}: {}", transfer.from, e);
            return Err(error_response(
                Status::BadGateway,
                format!("Failed to enqueue transfer: {e}"),
            ));
        }
    };
    tracing::info!(
        "Queued transfer of {} from {} to {} (queue: {})",
        transfer.amount,
        transfer.from,
        transfer.to,
        queue_length
    );

    for address in [&transfer.from, &transfer.to] {
        if let Err(e) = state.wallets.track(address).await {
            tracing::warn!("{}", e);
        }
    }

    let queue = state.engine.queue().await.unwrap_or_else(|e| {
        tracing::warn!("Failed to read queue after enqueue: {}", e);
        Vec::new()
    });
    let event = TransactionAdded {
        instance_id: state.config.instance_id.clone(),
        timestamp_ms: now_millis(),
        transaction: transfer.clone(),
        queue_length: queue.len().max(queue_length),
        queue,
    };
    state
        .broadcaster
        .publish(state.channel(), EventKind::TransactionAdded, &event)
        .await;

    let processor = state.processor.clone();
    tokio::spawn(async move {
        processor.evaluate_and_act().await;
    });

    Ok(Json(ApiResponse {
        success: true,
        data: Some(EnqueueResponse {
            transaction: transfer,
            queue_length,
        }),
        message: "Transfer queued".to_string(),
    }))
}
