use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::auth::{hash_password, verify_password, TokenIssuer};
use crate::database::models::User;
use crate::database::store::USERS_EMAIL_KEY;
use crate::database::Store;
use crate::validation::{rules, Validator};

const MIN_PASSWORD_LEN: usize = 6;
/// bcrypt ignores everything past 72 bytes
const MAX_PASSWORD_LEN: usize = 72;

const INVALID_CREDENTIALS: &str = "Email ou senha inválidos";
const EMAIL_TAKEN: &str = "Email já cadastrado";
const USER_GONE: &str = "Usuário não encontrado";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// A user together with a freshly signed token
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    tokens: TokenIssuer,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, tokens: TokenIssuer, bcrypt_cost: u32) -> Self {
        Self {
            store,
            tokens,
            bcrypt_cost,
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub async fn register(&self, input: RegisterInput) -> ServiceResult<AuthSession> {
        let mut v = Validator::new();
        let name = v.require_text(input.name.as_deref(), 100, "name");
        let email = normalize_email(input.email.as_deref());
        if v.check(rules::required(&email, "email")) {
            v.check(rules::email(&email, "email"));
        }
        let password = input.password.unwrap_or_default();
        if v.check(rules::required(&password, "password")) {
            v.check(rules::min_length(&password, MIN_PASSWORD_LEN, "password"));
            v.check(rules::max_length(&password, MAX_PASSWORD_LEN, "password"));
        }
        v.finish()?;

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict(EMAIL_TAKEN.to_string()));
        }

        let user = User {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash: hash_password(password, self.bcrypt_cost).await?,
            created_at: Utc::now(),
        };

        // The unique constraint settles concurrent registrations
        match self.store.insert_user(&user).await {
            Ok(()) => {}
            Err(err) if err.is_unique_violation(USERS_EMAIL_KEY) => {
                return Err(ServiceError::Conflict(EMAIL_TAKEN.to_string()));
            }
            Err(err) => return Err(err.into()),
        }

        info!(user_id = %user.id, "Registered new user");
        self.session(user)
    }

    pub async fn login(&self, input: LoginInput) -> ServiceResult<AuthSession> {
        let mut v = Validator::new();
        let email = normalize_email(input.email.as_deref());
        v.check(rules::required(&email, "email"));
        let password = input.password.unwrap_or_default();
        v.check(rules::required(&password, "password"));
        v.finish()?;

        let user = self.store.find_user_by_email(&email).await?;
        let stored = user.as_ref().map(|u| u.password_hash.clone());

        // Unknown e-mail and wrong password take the same path and the same time
        if !verify_password(password, stored).await? {
            return Err(ServiceError::Unauthenticated(INVALID_CREDENTIALS.to_string()));
        }
        let user = user.ok_or_else(|| ServiceError::Unauthenticated(INVALID_CREDENTIALS.to_string()))?;

        self.session(user)
    }

    /// Resolve the user behind a raw bearer token
    pub async fn current_user(&self, token: &str) -> ServiceResult<User> {
        let claims = self.tokens.verify(token)?;
        self.user(claims.sub).await
    }

    pub async fn user(&self, user_id: Uuid) -> ServiceResult<User> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::Unauthenticated(USER_GONE.to_string()))
    }

    /// New token for a still-existing user
    pub async fn refresh(&self, user_id: Uuid) -> ServiceResult<AuthSession> {
        let user = self.user(user_id).await?;
        self.session(user)
    }

    fn session(&self, user: User) -> ServiceResult<AuthSession> {
        let token = self.tokens.issue(user.id, &user.email)?;
        Ok(AuthSession { user, token })
    }
}

fn normalize_email(raw: Option<&str>) -> String {
    raw.unwrap_or_default().trim().to_lowercase()
}
