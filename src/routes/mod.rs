use rocket::http::Status;
use rocket::serde::json::Json;

use crate::models::ApiResponse;

pub mod admin;
pub mod events;
pub mod info;
pub mod status;
pub mod transactions;
pub mod wallets;

/// Error tuple returned by the JSON routes
pub fn error_response<T>(status: Status, message: String) -> (Status, Json<ApiResponse<T>>) {
    (
        status,
        Json(ApiResponse {
            success: false,
            data: None,
            message,
        }),
    )
}
