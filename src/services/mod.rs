//! Domain services.
//!
//! Each service owns a handle to the store and to the [`Ownership`] resolver.
//! Every operation on an existing record goes through the resolver first, so
//! a caller can never touch another tenant's data by guessing an ID.

pub mod auth_service;
pub mod category_service;
pub mod cnpj;
pub mod company_service;
pub mod ownership;
pub mod pagination;
pub mod quote_service;
pub mod quote_template_service;
pub mod recurring_service;
pub mod transaction_service;

use std::sync::Arc;
use thiserror::Error;

use crate::auth::{PasswordError, TokenError, TokenIssuer};
use crate::config::AppConfig;
use crate::database::{CascadeFailure, Store, StoreError};
use crate::types::QuoteStatus;
use crate::validation::{FieldError, ValidationErrors};

pub use auth_service::AuthService;
pub use category_service::CategoryService;
pub use cnpj::{BrasilApiClient, CnpjLookup};
pub use company_service::CompanyService;
pub use ownership::Ownership;
pub use pagination::{PageParams, PageRequest, Paginated, Pagination};
pub use quote_service::QuoteService;
pub use quote_template_service::QuoteTemplateService;
pub use recurring_service::RecurringService;
pub use transaction_service::TransactionService;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("{0}")]
    InvalidId(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    ImmutableState(String),

    #[error("não é possível alterar o status de {from} para {to}")]
    InvalidTransition { from: QuoteStatus, to: QuoteStatus },

    #[error(transparent)]
    CascadeIncomplete(#[from] CascadeFailure),

    #[error("{0}")]
    Upstream(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        ServiceError::Validation(ValidationErrors::single(FieldError::new(field, message)))
    }
}

impl From<PasswordError> for ServiceError {
    fn from(err: PasswordError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Generation(msg) => ServiceError::Internal(msg),
            TokenError::Expired | TokenError::Invalid(_) => {
                ServiceError::Unauthenticated("Token inválido ou expirado".to_string())
            }
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Every service, wired once at startup and shared through `AppState`
#[derive(Clone)]
pub struct Services {
    pub auth: AuthService,
    pub companies: CompanyService,
    pub categories: CategoryService,
    pub transactions: TransactionService,
    pub recurring: RecurringService,
    pub quotes: QuoteService,
    pub quote_templates: QuoteTemplateService,
    pub cnpj: Arc<dyn CnpjLookup>,
    store: Arc<dyn Store>,
}

impl Services {
    pub fn new(store: Arc<dyn Store>, tokens: TokenIssuer, config: &AppConfig, cnpj: Arc<dyn CnpjLookup>) -> Self {
        let ownership = Ownership::new(store.clone());
        Self {
            auth: AuthService::new(store.clone(), tokens, config.security.bcrypt_cost),
            companies: CompanyService::new(store.clone(), ownership.clone()),
            categories: CategoryService::new(store.clone(), ownership.clone()),
            transactions: TransactionService::new(store.clone(), ownership.clone()),
            recurring: RecurringService::new(store.clone(), ownership.clone()),
            quotes: QuoteService::new(store.clone(), ownership.clone()),
            quote_templates: QuoteTemplateService::new(store.clone(), ownership),
            cnpj,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}
