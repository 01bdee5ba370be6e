use sqlx::PgPool;

use crate::db::pool::DbPool;
use crate::error::AppResult;
use crate::models::Account;

/// Runtime-checked queries against `accounts`. We use `sqlx::query_as`
/// rather than the `query_as!` macro here: the macro needs a live database
/// (or a checked offline cache) at compile time, which this deployment
/// process does not produce.
#[derive(Clone)]
pub struct AccountRepository {
    pool: DbPool,
}

impl AccountRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT account_id, username, password, email, address \
             FROM accounts WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.pool())
        .await?;

        Ok(account)
    }

    pub async fn insert(&self, username: &str, password_hash: &str, email: &str) -> AppResult<Account> {
        let account = sqlx::query_as::<_, Account>(
            "INSERT INTO accounts (username, password, email) \
             VALUES ($1, $2, $3) \
             RETURNING account_id, username, password, email, address",
        )
        .bind(username)
        .bind(password_hash)
        .bind(email)
        .fetch_one(self.pool())
        .await?;

        Ok(account)
    }
}
