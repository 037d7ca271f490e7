// HTTP API error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::services::ServiceError;
use crate::validation::FieldError;

pub(crate) const INTERNAL_MESSAGE: &str = "Erro interno do servidor";

/// HTTP-facing error with status code and client-safe message.
///
/// Field validation failures render as `{"errors": [{field, message}]}`;
/// everything else as `{"error": message}`.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    Validation(Vec<FieldError>),
    BadRequest(String),
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 422 Unprocessable Entity (valid input, but not allowed in the current state)
    UnprocessableEntity(String),

    // 500 Internal Server Error
    InternalServerError(String),
    IncompleteDelete { message: String, steps: Vec<&'static str> },

    // 502 Bad Gateway (external service issues)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) | ApiError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalServerError(_) | ApiError::IncompleteDelete { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Client-safe message
    pub fn message(&self) -> &str {
        match self {
            ApiError::Validation(errors) => errors.first().map_or("Dados inválidos", |e| e.message.as_str()),
            ApiError::BadRequest(msg)
            | ApiError::InvalidJson(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::UnprocessableEntity(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::BadGateway(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
            ApiError::IncompleteDelete { message, .. } => message,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ApiError::Validation(errors) => json!({ "errors": errors }),
            ApiError::IncompleteDelete { message, steps } => json!({
                "error": message,
                "incompleteSteps": steps,
            }),
            _ => json!({ "error": self.message() }),
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(errors) => ApiError::Validation(errors.into_errors()),
            ServiceError::InvalidId(msg) => ApiError::BadRequest(msg),
            ServiceError::NotFound(msg) => ApiError::NotFound(msg),
            ServiceError::Forbidden(msg) => ApiError::Forbidden(msg),
            ServiceError::Conflict(msg) => ApiError::Conflict(msg),
            ServiceError::Unauthenticated(msg) => ApiError::Unauthorized(msg),
            ServiceError::ImmutableState(msg) => ApiError::UnprocessableEntity(msg),
            err @ ServiceError::InvalidTransition { .. } => ApiError::UnprocessableEntity(err.to_string()),
            ServiceError::CascadeIncomplete(failure) => {
                tracing::error!(%failure, "Cascade delete incomplete");
                ApiError::IncompleteDelete {
                    message: "Não foi possível excluir todos os registros da empresa".to_string(),
                    steps: failure.incomplete_steps().iter().map(|s| s.as_str()).collect(),
                }
            }
            ServiceError::Upstream(msg) => ApiError::BadGateway(msg),
            ServiceError::Store(err) => {
                // Driver detail stays in the logs
                tracing::error!(error = %err, "Store error");
                match err {
                    crate::database::StoreError::Timeout(_) => {
                        ApiError::ServiceUnavailable("Banco de dados indisponível, tente novamente".to_string())
                    }
                    _ => ApiError::InternalServerError(INTERNAL_MESSAGE.to_string()),
                }
            }
            ServiceError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ApiError::InternalServerError(INTERNAL_MESSAGE.to_string())
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{CascadeFailure, CascadeStep, StoreError};
    use crate::database::store::FailedStep;
    use crate::types::QuoteStatus;
    use crate::validation::ValidationErrors;

    #[test]
    fn validation_errors_keep_every_field() {
        let errors = ValidationErrors::single(FieldError::new("amount", "amount deve ser positivo"));
        let api: ApiError = ServiceError::Validation(errors).into();
        assert_eq!(api.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            api.to_json(),
            json!({ "errors": [{ "field": "amount", "message": "amount deve ser positivo" }] })
        );
    }

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases = [
            (ServiceError::InvalidId("ID inválido".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ServiceError::Conflict("x".into()), StatusCode::CONFLICT),
            (ServiceError::ImmutableState("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (
                ServiceError::InvalidTransition {
                    from: QuoteStatus::Draft,
                    to: QuoteStatus::Executed,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (ServiceError::Upstream("x".into()), StatusCode::BAD_GATEWAY),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn internal_detail_never_reaches_the_client() {
        let api: ApiError = ServiceError::Internal("bcrypt exploded at 0xdeadbeef".into()).into();
        assert_eq!(api.to_json(), json!({ "error": INTERNAL_MESSAGE }));

        let api: ApiError = ServiceError::Store(StoreError::Decode("column \"type\"".into())).into();
        assert_eq!(api.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message(), INTERNAL_MESSAGE);
    }

    #[test]
    fn incomplete_delete_lists_remaining_steps() {
        let failure = CascadeFailure {
            completed: Vec::new(),
            failed: vec![FailedStep {
                step: CascadeStep::Quotes,
                error: "timeout".to_string(),
            }],
        };
        let api: ApiError = ServiceError::CascadeIncomplete(failure).into();
        let body = api.to_json();
        assert_eq!(body["incompleteSteps"], json!(["quotes", "company"]));
        assert!(body["error"].is_string());
    }
}
