//! Isolated service stack for unit tests.
//!
//! Every `TestContext` owns its own `MemoryStore`, so tests never share state.
//! The seeding helpers go through the real services and panic on failure.

use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::TokenIssuer;
use crate::config::AppConfig;
use crate::database::models::{Category, Company, Quote, RecurringTransaction, Transaction, User};
use crate::database::{MemoryStore, Store};
use crate::services::auth_service::RegisterInput;
use crate::services::category_service::CategoryInput;
use crate::services::company_service::CompanyInput;
use crate::services::quote_service::{QuoteInput, QuoteItemInput};
use crate::services::recurring_service::RecurringInput;
use crate::services::transaction_service::TransactionInput;
use crate::services::{BrasilApiClient, CnpjLookup, Ownership, Services};

pub const TEST_SECRET: &str = "test-secret-that-is-at-least-32-bytes-long";

/// Lowest cost bcrypt accepts; keeps hashing fast in tests
const TEST_BCRYPT_COST: u32 = 4;

pub struct TestContext {
    pub services: Services,
    pub store: Arc<dyn Store>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<MemoryStore>) -> Self {
        let store: Arc<dyn Store> = store;
        let mut config = AppConfig::development();
        config.security.bcrypt_cost = TEST_BCRYPT_COST;
        let tokens = TokenIssuer::new(TEST_SECRET, config.security.jwt_expiry_hours);
        let cnpj: Arc<dyn CnpjLookup> =
            Arc::new(BrasilApiClient::new(&config.cnpj).expect("default CNPJ config is valid"));

        Self {
            services: Services::new(store.clone(), tokens, &config, cnpj),
            store,
        }
    }

    pub fn ownership(&self) -> Ownership {
        Ownership::new(self.store.clone())
    }

    /// Register a user named after the e-mail's local part
    pub async fn register(&self, email: &str) -> (User, String) {
        let name = email.split('@').next().unwrap_or(email).to_string();
        let session = self
            .services
            .auth
            .register(RegisterInput {
                name: Some(name),
                email: Some(email.to_string()),
                password: Some("secret123".to_string()),
            })
            .await
            .expect("register test user");
        (session.user, session.token)
    }

    pub async fn company(&self, user_id: Uuid, name: &str) -> Company {
        self.services
            .companies
            .create(
                user_id,
                CompanyInput {
                    name: Some(name.to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("create test company")
    }

    /// An INCOME category
    pub async fn category(&self, user_id: Uuid, company_id: Uuid, name: &str) -> Category {
        self.services
            .categories
            .create(
                user_id,
                CategoryInput {
                    company_id: Some(company_id.to_string()),
                    name: Some(name.to_string()),
                    kind: Some("INCOME".to_string()),
                    color: Some("#22c55e".to_string()),
                    budget: None,
                },
            )
            .await
            .expect("create test category")
    }

    /// An open transaction of 100.00 in `month` of 2025
    pub async fn transaction(&self, user_id: Uuid, company_id: Uuid, month: &str, category: &str) -> Transaction {
        self.services
            .transactions
            .create(
                user_id,
                TransactionInput {
                    company_id: Some(company_id.to_string()),
                    month: Some(month.to_string()),
                    year: Some(2025_i64.into()),
                    amount: Some(Decimal::from(100).into()),
                    category: Some(category.to_string()),
                    status: Some("ABERTO".to_string()),
                    description: None,
                    quote_id: None,
                },
            )
            .await
            .expect("create test transaction")
    }

    pub async fn recurring(&self, user_id: Uuid, company_id: Uuid, description: &str, day: i64) -> RecurringTransaction {
        self.services
            .recurring
            .create(
                user_id,
                RecurringInput {
                    company_id: Some(company_id.to_string()),
                    description: Some(description.to_string()),
                    amount: Some(Decimal::new(9990, 2).into()),
                    category: Some("Serviços".to_string()),
                    kind: None,
                    day_of_month: Some(day.into()),
                    active: None,
                },
            )
            .await
            .expect("create test recurring rule")
    }

    /// A DRAFT quote with one 500.00 item
    pub async fn quote(&self, user_id: Uuid, company_id: Uuid) -> Quote {
        self.services
            .quotes
            .create(
                user_id,
                QuoteInput {
                    company_id: Some(company_id.to_string()),
                    client_name: Some("Cliente Teste".to_string()),
                    items: Some(vec![QuoteItemInput {
                        description: Some("Serviço".to_string()),
                        quantity: Some(Decimal::ONE.into()),
                        unit_price: Some(Decimal::from(500).into()),
                        category_id: None,
                    }]),
                    ..Default::default()
                },
            )
            .await
            .expect("create test quote")
    }
}
