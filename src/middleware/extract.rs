//! Body and query extractors that fail with the API's JSON error shape
//! instead of axum's plain-text rejections.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::validation::{rules, FieldError};

pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_error(rejection)),
        }
    }
}

fn json_error(rejection: JsonRejection) -> ApiError {
    tracing::debug!(error = %rejection.body_text(), "Rejected request body");
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::invalid_json("Content-Type deve ser application/json")
        }
        JsonRejection::JsonSyntaxError(_) => ApiError::invalid_json("JSON malformado"),
        JsonRejection::JsonDataError(err) => {
            let field = data_error_field(&err.body_text());
            ApiError::Validation(vec![FieldError::new(field.clone(), rules::invalid_type_message(&field))])
        }
        _ => ApiError::invalid_json("Corpo da requisição inválido"),
    }
}

/// Field path of a body that parsed as JSON but did not fit the target type.
///
/// axum reports `"...target type: <path>: <reason>"`; errors at the top
/// level carry no path and are attributed to `body`.
fn data_error_field(text: &str) -> String {
    let detail = text.split_once("target type: ").map_or(text, |(_, rest)| rest);
    match detail.split_once(": ") {
        Some((path, _)) if !path.is_empty() && !path.contains(' ') => path.to_string(),
        _ => "body".to_string(),
    }
}

pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| ApiQuery(value))
            .map_err(|_| ApiError::bad_request("Parâmetros de consulta inválidos"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_errors_name_the_offending_field() {
        let text = "Failed to deserialize the JSON body into the target type: items[0].description: \
                    invalid type: integer `5`, expected a string at line 1 column 40";
        assert_eq!(data_error_field(text), "items[0].description");
    }

    #[test]
    fn top_level_data_errors_blame_the_body() {
        let text = "Failed to deserialize the JSON body into the target type: \
                    invalid type: sequence, expected struct at line 1 column 1";
        assert_eq!(data_error_field(text), "body");
    }
}
