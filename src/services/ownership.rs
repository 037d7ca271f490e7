//! The single authorization choke point.
//!
//! Resolution always runs in the same order: the raw ID is parsed, the record
//! is loaded, then the owning company's `user_id` is compared with the caller.
//! A malformed ID is therefore a 400 even when a record with a similar ID
//! exists, and a record owned by someone else is a 403, never a 404.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::database::models::{Category, Company, Quote, QuoteTemplate, RecurringTransaction, Transaction};
use crate::database::{Store, StoreResult};

/// A record that belongs to exactly one company
#[async_trait]
pub trait OwnedResource: Sized + Send {
    /// Message returned when the record does not exist
    const NOT_FOUND: &'static str;

    fn company_id(&self) -> Uuid;

    async fn load(store: &dyn Store, id: Uuid) -> StoreResult<Option<Self>>;
}

macro_rules! owned_resource {
    ($ty:ty, $loader:ident, $message:literal) => {
        #[async_trait]
        impl OwnedResource for $ty {
            const NOT_FOUND: &'static str = $message;

            fn company_id(&self) -> Uuid {
                self.company_id
            }

            async fn load(store: &dyn Store, id: Uuid) -> StoreResult<Option<Self>> {
                store.$loader(id).await
            }
        }
    };
}

owned_resource!(Category, find_category, "Categoria não encontrada");
owned_resource!(Transaction, find_transaction, "Transação não encontrada");
owned_resource!(RecurringTransaction, find_recurring, "Transação recorrente não encontrada");
owned_resource!(Quote, find_quote, "Orçamento não encontrado");
owned_resource!(QuoteTemplate, find_quote_template, "Modelo de orçamento não encontrado");

pub const COMPANY_NOT_FOUND: &str = "Empresa não encontrada";
const FORBIDDEN: &str = "Acesso negado: você não é o proprietário desta empresa";
const INVALID_ID: &str = "ID inválido";

#[derive(Clone)]
pub struct Ownership {
    store: Arc<dyn Store>,
}

impl Ownership {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Parse an opaque ID taken from a path, query or body
    pub fn parse_id(raw: &str) -> ServiceResult<Uuid> {
        Uuid::parse_str(raw.trim()).map_err(|_| ServiceError::InvalidId(INVALID_ID.to_string()))
    }

    /// Load a company and confirm `user_id` owns it
    pub async fn company(&self, user_id: Uuid, raw_company_id: &str) -> ServiceResult<Company> {
        let company_id = Self::parse_id(raw_company_id)?;
        self.company_by_id(user_id, company_id).await
    }

    pub async fn company_by_id(&self, user_id: Uuid, company_id: Uuid) -> ServiceResult<Company> {
        let company = self
            .store
            .find_company(company_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(COMPANY_NOT_FOUND.to_string()))?;

        if company.user_id != user_id {
            warn!(%user_id, %company_id, "Denied access to company owned by another user");
            return Err(ServiceError::Forbidden(FORBIDDEN.to_string()));
        }
        Ok(company)
    }

    /// Load a company-owned record and confirm `user_id` owns its company
    pub async fn resolve<T: OwnedResource>(&self, user_id: Uuid, raw_id: &str) -> ServiceResult<(T, Company)> {
        let id = Self::parse_id(raw_id)?;
        let resource = T::load(self.store.as_ref(), id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(T::NOT_FOUND.to_string()))?;
        let company = self.company_by_id(user_id, resource.company_id()).await?;
        Ok((resource, company))
    }
}
