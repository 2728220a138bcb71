//! PostgreSQL implementation of AccountReader.

use async_trait::async_trait;
use sqlx::PgPool;

use super::rows::{db_error, PrincipalRow, UserRow, PRINCIPAL_COLUMNS, USER_COLUMNS};
use crate::domain::foundation::{DomainError, PrincipalId, Timestamp};
use crate::domain::identity::{Principal, User};
use crate::domain::token::SessionToken;
use crate::ports::AccountReader;

/// Pool-backed reads of committed account state.
#[derive(Clone)]
pub struct PostgresAccountReader {
    pool: PgPool,
}

impl PostgresAccountReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountReader for PostgresAccountReader {
    async fn find_principal_id_by_token(
        &self,
        token: &SessionToken,
        now: Timestamp,
    ) -> Result<Option<PrincipalId>, DomainError> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT principal_id FROM access_tokens
            WHERE token = $1 AND (expires IS NULL OR expires > $2)
            "#,
        )
        .bind(token.as_str())
        .bind(now.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("look up access token", e))?;

        Ok(row.map(|(id,)| PrincipalId::from_i64(id)))
    }

    async fn find_user_by_principal(
        &self,
        principal_id: PrincipalId,
    ) -> Result<Option<User>, DomainError> {
        let sql = format!(
            "SELECT {} FROM users u \
             JOIN principals p ON p.id = u.principal_id \
             WHERE u.principal_id = $1",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(principal_id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("fetch user by principal", e))?
            .map(User::try_from)
            .transpose()
    }

    async fn find_principal(&self, id: PrincipalId) -> Result<Option<Principal>, DomainError> {
        let sql = format!("SELECT {} FROM principals WHERE id = $1", PRINCIPAL_COLUMNS);
        sqlx::query_as::<_, PrincipalRow>(&sql)
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("fetch principal", e))?
            .map(Principal::try_from)
            .transpose()
    }
}
