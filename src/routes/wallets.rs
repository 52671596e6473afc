use rocket::serde::json::Json;
use rocket::{State, get, http::Status, post};
use rocket_okapi::openapi;

use super::error_response;
use crate::models::{
    ApiResponse, AppState, TrackWalletRequest, TrackedWallet, WalletListResponse,
};

/// Start tracking a wallet so it shows up in every balance snapshot.
#[openapi(tag = "Wallets")]
#[post("/wallets", format = "json", data = "<request>")]
pub async fn track_wallet(
    state: &State<AppState>,
    request: Json<TrackWalletRequest>,
) -> Result<Json<ApiResponse<TrackedWallet>>, (Status, Json<ApiResponse<TrackedWallet>>)> {
    let address = request.address.trim().to_string();
    if address.is_empty() {
        return Err(error_response(
            Status::BadRequest,
            "Wallet address is empty".to_string(),
        ));
    }

    if let Err(e) = state.wallets.track(&address).await {
        tracing::error!("{}", e);
        return Err(error_response(Status::ServiceUnavailable, e));
    }
    let last_seen_ms = state.wallets.last_seen(&address).await.unwrap_or(None);

    Ok(Json(ApiResponse {
        success: true,
        data: Some(TrackedWallet {
            address,
            last_seen_ms,
        }),
        message: "Wallet tracked".to_string(),
    }))
}

/// Tracked wallets with their last-seen time.
#[openapi(tag = "Wallets")]
#[get("/wallets")]
pub async fn list_wallets(
    state: &State<AppState>,
) -> Result<Json<ApiResponse<WalletListResponse>>, (Status, Json<ApiResponse<WalletListResponse>>)>
{
    let addresses = match state.wallets.list().await {
        Ok(addresses) => addresses,
        Err(e) => {
            tracing::error!("{}", e);
            return Err(error_response(Status::ServiceUnavailable, e));
        }
    };

    let mut wallets = Vec::with_capacity(addresses.len());
    for address in addresses {
        let last_seen_ms = state.wallets.last_seen(&address).await.unwrap_or(None);
        wallets.push(TrackedWallet {
            address,
            last_seen_ms,
        });
    }

    Ok(Json(ApiResponse {
        success: true,
        message: format!("{} wallets tracked", wallets.len()),
        data: Some(WalletListResponse { wallets }),
    }))
}
