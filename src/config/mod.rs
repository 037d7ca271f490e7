use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Minimum accepted length for a configured JWT secret
const MIN_SECRET_BYTES: usize = 32;

/// bcrypt cost floor; lower values are rejected by `from_env`
pub const MIN_BCRYPT_COST: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set in {0:?} environments")]
    MissingJwtSecret(Environment),

    #[error("JWT_SECRET must be at least {MIN_SECRET_BYTES} bytes long")]
    WeakJwtSecret,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub cnpj: CnpjConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub operation_timeout_secs: u64,
    pub enable_query_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub request_timeout_secs: u64,
    pub max_request_size_bytes: usize,
    pub default_page_limit: u64,
    pub max_page_limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: Option<String>,
    pub jwt_expiry_hours: u64,
    pub bcrypt_cost: u32,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CnpjConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_OPERATION_TIMEOUT") {
            self.database.operation_timeout_secs = v.parse().unwrap_or(self.database.operation_timeout_secs);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging = v.parse().unwrap_or(self.database.enable_query_logging);
        }

        // API overrides
        if let Some(v) = env::var("API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_REQUEST_TIMEOUT_SECS") {
            self.api.request_timeout_secs = v.parse().unwrap_or(self.api.request_timeout_secs);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            if !v.trim().is_empty() {
                self.security.jwt_secret = Some(v);
            }
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_BCRYPT_COST") {
            self.security.bcrypt_cost = v.parse().unwrap_or(self.security.bcrypt_cost);
        }
        self.security.bcrypt_cost = self.security.bcrypt_cost.max(MIN_BCRYPT_COST);
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // CNPJ lookup overrides
        if let Ok(v) = env::var("CNPJ_API_URL") {
            self.cnpj.base_url = v;
        }
        if let Ok(v) = env::var("CNPJ_TIMEOUT_SECS") {
            self.cnpj.timeout_secs = v.parse().unwrap_or(self.cnpj.timeout_secs);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                operation_timeout_secs: 15,
                enable_query_logging: true,
            },
            api: ApiConfig {
                port: 8080,
                request_timeout_secs: 30,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
                default_page_limit: 50,
                max_page_limit: 100,
            },
            security: SecurityConfig {
                jwt_secret: None,
                jwt_expiry_hours: 72,
                bcrypt_cost: MIN_BCRYPT_COST,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            cnpj: CnpjConfig {
                base_url: "https://brasilapi.com.br/api".to_string(),
                timeout_secs: 10,
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                operation_timeout_secs: 10,
                enable_query_logging: true,
            },
            api: ApiConfig {
                port: 8080,
                request_timeout_secs: 15,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
                default_page_limit: 50,
                max_page_limit: 100,
            },
            security: SecurityConfig {
                jwt_secret: None,
                jwt_expiry_hours: 72,
                bcrypt_cost: 12,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            cnpj: CnpjConfig {
                base_url: "https://brasilapi.com.br/api".to_string(),
                timeout_secs: 5,
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                operation_timeout_secs: 10,
                enable_query_logging: false,
            },
            api: ApiConfig {
                port: 8080,
                request_timeout_secs: 15,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
                default_page_limit: 50,
                max_page_limit: 100,
            },
            security: SecurityConfig {
                jwt_secret: None,
                jwt_expiry_hours: 72,
                bcrypt_cost: 12,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            cnpj: CnpjConfig {
                base_url: "https://brasilapi.com.br/api".to_string(),
                timeout_secs: 5,
            },
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self.environment, Environment::Development)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.database.operation_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }

    /// Resolve the token signing secret.
    ///
    /// Staging and production refuse to start without a strong `JWT_SECRET`.
    /// Development falls back to a random per-process secret, so tokens stop
    /// validating on every restart.
    pub fn resolve_jwt_secret(&self) -> Result<String, ConfigError> {
        match (&self.security.jwt_secret, self.environment) {
            (Some(secret), _) if secret.len() >= MIN_SECRET_BYTES => Ok(secret.clone()),
            (Some(_), _) => Err(ConfigError::WeakJwtSecret),
            (None, Environment::Development) => {
                tracing::warn!(
                    "JWT_SECRET is not set; generated a throwaway signing secret. \
                     Every token becomes invalid when the process restarts. NEVER run like this outside development."
                );
                Ok(format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()))
            }
            (None, environment) => Err(ConfigError::MissingJwtSecret(environment)),
        }
    }
}
