use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

/// Successful API response: the serialized body plus a status code.
///
/// Bodies are sent as-is; list endpoints already carry their own
/// `{data, pagination}` shape.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 OK
    pub fn success(data: T) -> Self {
        Self::with_status(data, StatusCode::OK)
    }

    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self { data, status_code }
    }

    /// 201 Created
    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }
}

impl ApiResponse<()> {
    /// 204 No Content
    pub fn no_content() -> Self {
        Self::with_status((), StatusCode::NO_CONTENT)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        if self.status_code == StatusCode::NO_CONTENT {
            return self.status_code.into_response();
        }

        match serde_json::to_value(&self.data) {
            Ok(body) => (self.status_code, Json(body)).into_response(),
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Erro interno do servidor" })),
                )
                    .into_response()
            }
        }
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
