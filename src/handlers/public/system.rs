use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET / - Service banner
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "Finance Tracker API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": "/auth/register, /auth/login (public), /auth/me, /auth/refresh",
            "companies": "/companies[/:id], /companies/cnpj/:cnpj",
            "categories": "/categories[/:id]",
            "transactions": "/transactions[/:id], /transactions/summary, /transactions/:id/toggle-status",
            "recurring": "/recurring[/:id], /recurring/process",
            "quotes": "/quotes[/:id], /quotes/:id/{status,duplicate,comparison}",
            "quoteTemplates": "/quote-templates[/:id]",
        }
    }))
}

/// GET /health - Store connectivity check
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.services.store().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "database": "unavailable"
                })),
            )
        }
    }
}
