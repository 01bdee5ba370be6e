//! Merchant account authentication.
//!
//! A fixed per-deployment salt is prepended to the password before
//! hashing, and equality is constant-time. Account lookups/creation are
//! delegated to `AccountRepository` (see `db::repositories::account_repo`).

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::db::repositories::account_repo::AccountRepository;
use crate::models::Account;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user not found")]
    UserNotFound,
    #[error("user already exists")]
    UserExists,
    #[error("incorrect password")]
    IncorrectPassword,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Hashes passwords with a fixed deployment salt and authenticates against
/// `AccountRepository`. The salt is a deployment secret (see
/// `config::SecurityConfig::password_salt`), not a hardcoded literal.
#[derive(Clone)]
pub struct PasswordHasher {
    salt: Vec<u8>,
}

impl PasswordHasher {
    pub fn new(salt: impl Into<String>) -> Self {
        Self {
            salt: salt.into().into_bytes(),
        }
    }

    /// base64(SHA-256(salt || password)).
    pub fn hash(&self, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.salt);
        hasher.update(password.as_bytes());
        let digest = hasher.finalize();
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, digest)
    }

    pub fn verify(&self, password: &str, expected_hash: &str) -> bool {
        let computed = self.hash(password);
        constant_time_eq(computed.as_bytes(), expected_hash.as_bytes())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Authenticate and provision merchant accounts.
#[derive(Clone)]
pub struct AuthService {
    repo: AccountRepository,
    hasher: PasswordHasher,
}

impl AuthService {
    pub fn new(repo: AccountRepository, hasher: PasswordHasher) -> Self {
        Self { repo, hasher }
    }

    /// Returns the account on a matching username/password, otherwise the
    /// reason authentication failed.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Account, AuthError> {
        let account = self
            .repo
            .find_by_username(username)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if self.hasher.verify(password, &account.password) {
            Ok(account)
        } else {
            Err(AuthError::IncorrectPassword)
        }
    }

    pub async fn create_account(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<Account, AuthError> {
        if self.repo.find_by_username(username).await?.is_some() {
            return Err(AuthError::UserExists);
        }

        let password_hash = self.hasher.hash(password);
        let account = self.repo.insert(username, &password_hash, email).await?;
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_password_and_salt_hash_identically() {
        let hasher = PasswordHasher::new("deployment-salt");
        assert_eq!(hasher.hash("hunter2"), hasher.hash("hunter2"));
    }

    #[test]
    fn different_salts_produce_different_hashes() {
        let a = PasswordHasher::new("salt-a");
        let b = PasswordHasher::new("salt-b");
        assert_ne!(a.hash("hunter2"), b.hash("hunter2"));
    }

    #[test]
    fn verify_accepts_correct_password_only() {
        let hasher = PasswordHasher::new("deployment-salt");
        let stored = hasher.hash("correct-horse");
        assert!(hasher.verify("correct-horse", &stored));
        assert!(!hasher.verify("wrong-password", &stored));
    }
}
