#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use finance_tracker_api::app::{router, AppState};
use finance_tracker_api::auth::TokenIssuer;
use finance_tracker_api::config::AppConfig;
use finance_tracker_api::database::{MemoryStore, Store};
use finance_tracker_api::services::{BrasilApiClient, CnpjLookup, Services};

const TEST_SECRET: &str = "integration-test-secret-at-least-32-bytes";

/// The real router over an in-memory store, one per test
pub struct TestServer {
    pub base_url: String,
    client: reqwest::Client,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut config = AppConfig::development();
        config.security.bcrypt_cost = 4;
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let tokens = TokenIssuer::new(TEST_SECRET, config.security.jwt_expiry_hours);
        let cnpj: Arc<dyn CnpjLookup> = Arc::new(BrasilApiClient::new(&config.cnpj)?);
        let services = Services::new(store, tokens, &config, cnpj);
        let app = router(AppState::new(config, services));

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind port {port}"))?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self {
            base_url,
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(format!("{}/health", self.base_url)).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    /// Send a request and return the status plus the JSON body (`Null` when empty)
    pub async fn call(&self, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut req = self.client.request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await?;
        let status = res.status();
        let text = res.text().await?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).with_context(|| format!("non-JSON body: {text}"))?
        };
        Ok((status, body))
    }

    pub async fn get(&self, path: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.call(Method::GET, path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.call(Method::POST, path, Some(token), Some(body)).await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.call(Method::PUT, path, Some(token), Some(body)).await
    }

    pub async fn patch(&self, path: &str, token: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
        self.call(Method::PATCH, path, Some(token), body).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.call(Method::DELETE, path, Some(token), None).await
    }

    /// Register a user and return its token
    pub async fn register(&self, email: &str) -> Result<String> {
        let (status, body) = self
            .call(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({ "name": "Test User", "email": email, "password": "secret123" })),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "register failed: {status} {body}");
        body["token"]
            .as_str()
            .map(str::to_string)
            .context("register response has no token")
    }

    /// Create a company and return its ID
    pub async fn company(&self, token: &str, name: &str) -> Result<String> {
        let (status, body) = self.post("/companies", token, json!({ "name": name })).await?;
        anyhow::ensure!(status == StatusCode::CREATED, "create company failed: {status} {body}");
        id_of(&body)
    }
}

pub fn id_of(body: &Value) -> Result<String> {
    body["id"].as_str().map(str::to_string).context("response has no id")
}

/// Field names listed in a `{"errors": [...]}` body
pub fn error_fields(body: &Value) -> Vec<String> {
    body["errors"]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e["field"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
