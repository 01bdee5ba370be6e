use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A merchant account. Created once by `create_account`; immutable for the
/// purposes of this core (no profile-editing operation is in scope).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub account_id: i64,
    pub username: String,
    /// base64(SHA-256(salt || password)); never serialized back to clients.
    #[serde(skip_serializing)]
    pub password: String,
    pub email: String,
    pub address: Option<String>,
}
