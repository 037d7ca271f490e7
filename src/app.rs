// app.rs - Shared state and router assembly

use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    BoxError, Router,
};
use std::sync::Arc;
use tower::{
    timeout::{error::Elapsed, TimeoutLayer},
    ServiceBuilder,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::error::{ApiError, INTERNAL_MESSAGE};
use crate::handlers::{protected, public};
use crate::middleware::jwt_auth_middleware;
use crate::services::Services;

/// Everything a handler can reach, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Services,
}

impl AppState {
    pub fn new(config: AppConfig, services: Services) -> Self {
        Self {
            config: Arc::new(config),
            services,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(auth_routes())
        .merge(company_routes())
        .merge(category_routes())
        .merge(transaction_routes())
        .merge(recurring_routes())
        .merge(quote_routes())
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/auth/register", post(public::register))
        .route("/auth/login", post(public::login))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config))
                .layer(HandleErrorLayer::new(handle_layer_error))
                .layer(TimeoutLayer::new(state.config.request_timeout()))
                .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes)),
        )
        .with_state(state)
}

/// Turns errors raised by the tower stack into the usual JSON error body
async fn handle_layer_error(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        tracing::warn!("Request timed out");
        ApiError::ServiceUnavailable("Tempo limite da requisição excedido".to_string())
    } else {
        tracing::error!(error = %err, "Unhandled middleware error");
        ApiError::internal_server_error(INTERNAL_MESSAGE)
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

fn auth_routes() -> Router<AppState> {
    use protected::auth;

    Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/refresh", post(auth::refresh))
}

fn company_routes() -> Router<AppState> {
    use protected::companies;

    Router::new()
        .route("/companies", get(companies::list).post(companies::create))
        .route(
            "/companies/:id",
            get(companies::get).put(companies::update).delete(companies::delete),
        )
        .route("/companies/cnpj/:cnpj", get(companies::cnpj_lookup))
}

fn category_routes() -> Router<AppState> {
    use protected::categories;

    Router::new()
        .route("/categories", get(categories::list).post(categories::create))
        .route(
            "/categories/:id",
            get(categories::get).put(categories::update).delete(categories::delete),
        )
}

fn transaction_routes() -> Router<AppState> {
    use protected::transactions;

    Router::new()
        .route("/transactions", get(transactions::list).post(transactions::create))
        .route("/transactions/summary", get(transactions::summary))
        .route(
            "/transactions/:id",
            get(transactions::get)
                .put(transactions::update)
                .delete(transactions::delete),
        )
        .route("/transactions/:id/toggle-status", patch(transactions::toggle_status))
}

fn recurring_routes() -> Router<AppState> {
    use protected::recurring;

    Router::new()
        .route("/recurring", get(recurring::list).post(recurring::create))
        .route("/recurring/process", post(recurring::process))
        .route(
            "/recurring/:id",
            get(recurring::get).put(recurring::update).delete(recurring::delete),
        )
}

fn quote_routes() -> Router<AppState> {
    use protected::{quote_templates, quotes};

    Router::new()
        .route("/quotes", get(quotes::list).post(quotes::create))
        .route(
            "/quotes/:id",
            get(quotes::get).put(quotes::update).delete(quotes::delete),
        )
        .route("/quotes/:id/status", patch(quotes::update_status))
        .route("/quotes/:id/duplicate", post(quotes::duplicate))
        .route("/quotes/:id/comparison", get(quotes::comparison))
        .route(
            "/quote-templates",
            get(quote_templates::list).post(quote_templates::create),
        )
        .route(
            "/quote-templates/:id",
            get(quote_templates::get).delete(quote_templates::delete),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::IntoResponse,
    };
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn slow_requests_get_a_json_error() {
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(handle_layer_error))
                    .layer(TimeoutLayer::new(Duration::from_millis(20))),
            );

        let response = app
            .oneshot(Request::get("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Tempo limite da requisição excedido");
    }

    #[tokio::test]
    async fn other_layer_errors_stay_opaque() {
        let response = handle_layer_error("pool exhausted".into()).await.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"], INTERNAL_MESSAGE);
    }
}
