use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::entity::ErrorItem;

/// `{result, errors}` envelope shared by every endpoint
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub result: T,
    pub errors: Vec<ErrorItem>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 with soft errors alongside the result
    pub fn new(result: T, errors: Vec<ErrorItem>) -> Self {
        Self { result, errors }
    }

    /// 200 with no errors
    pub fn success(result: T) -> Self {
        Self::new(result, vec![])
    }
}

impl<T: Serialize> From<(T, Vec<ErrorItem>)> for ApiResponse<T> {
    fn from((result, errors): (T, Vec<ErrorItem>)) -> Self {
        Self::new(result, errors)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let result = match serde_json::to_value(&self.result) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "result": [],
                        "errors": [{"selector": "response", "reason": "Failed to serialize response data"}]
                    })),
                )
                    .into_response();
            }
        };

        (StatusCode::OK, Json(json!({ "result": result, "errors": self.errors }))).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
