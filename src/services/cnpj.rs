//! CNPJ registry lookup.
//!
//! Only the [`CnpjLookup`] trait is part of the core; [`BrasilApiClient`] is
//! the HTTP implementation wired in at startup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use super::{ServiceError, ServiceResult};
use crate::config::CnpjConfig;
use crate::validation::{rules, ValidationErrors};

#[derive(Debug, Error)]
pub enum CnpjError {
    #[error("CNPJ não encontrado")]
    NotFound,

    #[error("invalid CNPJ service URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("CNPJ service answered {0}")]
    Upstream(u16),

    #[error("CNPJ service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

impl From<CnpjError> for ServiceError {
    fn from(err: CnpjError) -> Self {
        match err {
            CnpjError::NotFound => ServiceError::NotFound(err.to_string()),
            CnpjError::InvalidUrl(_) => ServiceError::Internal(err.to_string()),
            CnpjError::Upstream(_) | CnpjError::Transport(_) => {
                warn!(error = %err, "CNPJ lookup failed");
                ServiceError::Upstream("Serviço de consulta de CNPJ indisponível".to_string())
            }
        }
    }
}

/// Registry data used to prefill a company
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CnpjInfo {
    pub cnpj: String,
    pub legal_name: Option<String>,
    pub trade_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub status: Option<String>,
}

#[async_trait]
pub trait CnpjLookup: Send + Sync {
    /// `cnpj` is already normalized to 14 digits
    async fn lookup(&self, cnpj: &str) -> Result<CnpjInfo, CnpjError>;
}

/// Validate and normalize `raw`, then ask the registry
pub async fn lookup(client: &dyn CnpjLookup, raw: &str) -> ServiceResult<CnpjInfo> {
    let cnpj = match rules::normalize_cnpj(raw) {
        Some(cnpj) => cnpj,
        None => {
            rules::cnpj(raw, "cnpj").map_err(ValidationErrors::single)?;
            return Err(ServiceError::invalid_field("cnpj", "CNPJ inválido"));
        }
    };
    Ok(client.lookup(&cnpj).await?)
}

#[derive(Debug, Deserialize)]
struct BrasilApiCompany {
    razao_social: Option<String>,
    nome_fantasia: Option<String>,
    email: Option<String>,
    ddd_telefone_1: Option<String>,
    logradouro: Option<String>,
    numero: Option<String>,
    municipio: Option<String>,
    uf: Option<String>,
    cep: Option<String>,
    descricao_situacao_cadastral: Option<String>,
}

impl BrasilApiCompany {
    fn into_info(self, cnpj: &str) -> CnpjInfo {
        let address = [
            self.logradouro,
            self.numero,
            self.municipio,
            self.uf,
            self.cep,
        ]
        .into_iter()
        .flatten()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

        CnpjInfo {
            cnpj: cnpj.to_string(),
            legal_name: non_empty(self.razao_social),
            trade_name: non_empty(self.nome_fantasia),
            email: non_empty(self.email).map(|e| e.to_lowercase()),
            phone: non_empty(self.ddd_telefone_1),
            address: (!address.is_empty()).then_some(address),
            status: non_empty(self.descricao_situacao_cadastral),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// BrasilAPI (`GET {base}/cnpj/v1/{cnpj}`) with a bounded timeout
#[derive(Debug, Clone)]
pub struct BrasilApiClient {
    base_url: Url,
    http: reqwest::Client,
}

impl BrasilApiClient {
    pub fn new(config: &CnpjConfig) -> Result<Self, CnpjError> {
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: Url::parse(&base)?,
            http,
        })
    }

    fn endpoint(&self, cnpj: &str) -> Result<Url, CnpjError> {
        Ok(self.base_url.join(&format!("cnpj/v1/{cnpj}"))?)
    }
}

#[async_trait]
impl CnpjLookup for BrasilApiClient {
    async fn lookup(&self, cnpj: &str) -> Result<CnpjInfo, CnpjError> {
        let endpoint = self.endpoint(cnpj)?;
        debug!(%endpoint, "Looking up CNPJ");

        let res = self.http.get(endpoint).send().await?;
        match res.status().as_u16() {
            200..=299 => Ok(res.json::<BrasilApiCompany>().await?.into_info(cnpj)),
            404 => Err(CnpjError::NotFound),
            status => Err(CnpjError::Upstream(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<CnpjInfo, u16>);

    #[async_trait]
    impl CnpjLookup for Fixed {
        async fn lookup(&self, cnpj: &str) -> Result<CnpjInfo, CnpjError> {
            match &self.0 {
                Ok(info) => Ok(CnpjInfo {
                    cnpj: cnpj.to_string(),
                    ..info.clone()
                }),
                Err(404) => Err(CnpjError::NotFound),
                Err(status) => Err(CnpjError::Upstream(*status)),
            }
        }
    }

    #[tokio::test]
    async fn lookup_normalizes_before_calling_the_registry() {
        let client = Fixed(Ok(CnpjInfo::default()));
        let info = lookup(&client, "11.222.333/0001-81").await.unwrap();
        assert_eq!(info.cnpj, "11222333000181");
    }

    #[tokio::test]
    async fn invalid_cnpj_never_reaches_the_registry() {
        let client = Fixed(Err(500));
        let err = lookup(&client, "123").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(e) if e.has_field("cnpj")));
    }

    #[tokio::test]
    async fn registry_failures_map_to_service_errors() {
        let missing = lookup(&Fixed(Err(404)), "11222333000181").await.unwrap_err();
        assert!(matches!(missing, ServiceError::NotFound(_)));
        let down = lookup(&Fixed(Err(503)), "11222333000181").await.unwrap_err();
        assert!(matches!(down, ServiceError::Upstream(_)));
    }

    #[test]
    fn registry_payload_becomes_company_fields() {
        let payload = BrasilApiCompany {
            razao_social: Some("ALICE COMERCIO LTDA".to_string()),
            nome_fantasia: Some(" ".to_string()),
            email: Some("CONTATO@ALICE.CO".to_string()),
            ddd_telefone_1: Some("1133334444".to_string()),
            logradouro: Some("RUA A".to_string()),
            numero: Some("10".to_string()),
            municipio: Some("SAO PAULO".to_string()),
            uf: Some("SP".to_string()),
            cep: None,
            descricao_situacao_cadastral: Some("ATIVA".to_string()),
        };
        let info = payload.into_info("11222333000181");
        assert_eq!(info.legal_name.as_deref(), Some("ALICE COMERCIO LTDA"));
        assert_eq!(info.trade_name, None);
        assert_eq!(info.email.as_deref(), Some("contato@alice.co"));
        assert_eq!(info.address.as_deref(), Some("RUA A, 10, SAO PAULO, SP"));
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let config = CnpjConfig {
            base_url: "https://brasilapi.com.br/api/".to_string(),
            timeout_secs: 5,
        };
        let client = BrasilApiClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint("11222333000181").unwrap().as_str(),
            "https://brasilapi.com.br/api/cnpj/v1/11222333000181"
        );
    }
}
