use bcrypt::BcryptError;
use thiserror::Error;

/// Hash verified when the e-mail is unknown, so a login attempt costs the
/// same whether or not the account exists.
const DUMMY_HASH: &str = "$2b$12$Gwf0uvxH3L7JLfo0CC/NCOoijK2vQ/wbgP.LeNup8vj6gg31IiFkm";

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] BcryptError),

    #[error("password hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Hash `raw` with bcrypt on the blocking pool
pub async fn hash_password(raw: String, cost: u32) -> Result<String, PasswordError> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(raw, cost)).await??;
    Ok(hash)
}

/// Check `raw` against `stored`. With no stored hash the dummy hash is
/// checked instead and the result is always `false`.
pub async fn verify_password(raw: String, stored: Option<String>) -> Result<bool, PasswordError> {
    let known = stored.is_some();
    let hash = stored.unwrap_or_else(|| DUMMY_HASH.to_string());
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(raw, &hash)).await??;
    Ok(known && matches)
}
